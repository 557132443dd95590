//! 라우트/IP 접근 규칙.
//!
//! 규칙 문서는 세 개의 매핑으로 구성됩니다.
//!
//! ```json
//! {
//!   "blacklist": { "*": ["10.0.0.9"], "/auth/login": ["10.0.0.7"] },
//!   "whitelist": { "*": ["127.0.0.1"], "/auth/users": ["10.0.0.2"] },
//!   "endpoints": ["http://localhost:44444", "https://api.andaluciadescubre.es"]
//! }
//! ```
//!
//! `"endpoints": "*"`는 URL 검사를 하지 않습니다. 빈 배열은 모든 URL을 거부합니다.
//!
//! 규칙은 외부에서 관리되며 요청마다 새로 읽습니다. 캐시는 두지 않습니다.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// 모든 라우트에 적용되는 규칙 키.
pub const WILDCARD_ROUTE: &str = "*";

/// 접근 규칙 집합.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessRules {
    /// 라우트(또는 `*`) → 차단 IP 목록
    pub blacklist: HashMap<String, Vec<String>>,
    /// 라우트(또는 `*`) → 허용 IP 목록
    pub whitelist: HashMap<String, Vec<String>>,
    /// 허용 URL 범위
    pub endpoints: EndpointScope,
}

impl AccessRules {
    /// 특정 라우트의 차단 목록에 IP가 있는지 확인.
    pub fn is_blacklisted(&self, route: &str, ip: &str) -> bool {
        contains_ip(self.blacklist.get(route), ip)
    }

    /// 특정 라우트의 허용 목록에 IP가 있는지 확인.
    pub fn is_whitelisted(&self, route: &str, ip: &str) -> bool {
        contains_ip(self.whitelist.get(route), ip)
    }

    /// 라우트에 전용 허용 목록이 있는지 확인.
    pub fn has_whitelist(&self, route: &str) -> bool {
        self.whitelist.contains_key(route)
    }

    /// URL이 허용된 접두사 중 하나로 시작하는지 확인.
    pub fn is_permitted_url(&self, url: &str) -> bool {
        self.endpoints.permits(url)
    }
}

/// 허용 URL 범위.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointScope {
    /// URL 제한 없음
    Any,
    /// 허용된 URL 접두사 목록
    Prefixes(Vec<String>),
}

impl Default for EndpointScope {
    fn default() -> Self {
        EndpointScope::Prefixes(Vec::new())
    }
}

impl EndpointScope {
    /// 접두사 목록으로 범위를 만듭니다.
    pub fn prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EndpointScope::Prefixes(prefixes.into_iter().map(Into::into).collect())
    }

    pub fn permits(&self, url: &str) -> bool {
        match self {
            EndpointScope::Any => true,
            EndpointScope::Prefixes(prefixes) => prefixes
                .iter()
                .any(|prefix| !prefix.is_empty() && url.starts_with(prefix.as_str())),
        }
    }
}

impl Serialize for EndpointScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EndpointScope::Any => serializer.serialize_str(WILDCARD_ROUTE),
            EndpointScope::Prefixes(prefixes) => prefixes.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for EndpointScope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Wildcard(String),
            Prefixes(Vec<String>),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Wildcard(s) if s == WILDCARD_ROUTE => Ok(EndpointScope::Any),
            Raw::Wildcard(other) => Err(de::Error::invalid_value(
                de::Unexpected::Str(&other),
                &"\"*\" 또는 URL 접두사 배열",
            )),
            Raw::Prefixes(prefixes) => Ok(EndpointScope::Prefixes(prefixes)),
        }
    }
}

fn contains_ip(entries: Option<&Vec<String>>, ip: &str) -> bool {
    entries.is_some_and(|entries| entries.iter().any(|entry| ip_matches(entry, ip)))
}

/// IP 문자열 비교.
///
/// 양쪽 모두 IP로 파싱되면 주소 값으로 비교하므로 `::1`과
/// `0:0:0:0:0:0:0:1`은 같은 주소입니다. 그 외에는 문자열 그대로 비교합니다.
pub fn ip_matches(entry: &str, ip: &str) -> bool {
    match (entry.trim().parse::<IpAddr>(), ip.parse::<IpAddr>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => entry.trim() == ip,
    }
}

/// 규칙 로드 에러.
#[derive(Debug, thiserror::Error)]
pub enum RuleSourceError {
    #[error("규칙 파일 읽기 실패 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("규칙 파싱 실패: {0}")]
    Parse(#[from] serde_json::Error),
}

/// 규칙 공급자.
#[async_trait]
pub trait RuleSource: Send + Sync {
    /// 현재 규칙을 읽습니다.
    async fn load(&self) -> Result<AccessRules, RuleSourceError>;
}

/// JSON 파일 기반 규칙 공급자. 호출마다 파일을 다시 읽습니다.
#[derive(Debug, Clone)]
pub struct FileRuleSource {
    path: PathBuf,
}

impl FileRuleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RuleSource for FileRuleSource {
    async fn load(&self) -> Result<AccessRules, RuleSourceError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| RuleSourceError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// 고정 규칙 공급자 (테스트, 임베디드 설정용).
#[derive(Debug, Clone, Default)]
pub struct StaticRuleSource {
    rules: AccessRules,
}

impl StaticRuleSource {
    pub fn new(rules: AccessRules) -> Self {
        Self { rules }
    }

    /// 모든 URL과 IP를 허용하는 규칙.
    pub fn allow_all() -> Self {
        Self::new(AccessRules {
            endpoints: EndpointScope::Any,
            ..Default::default()
        })
    }
}

#[async_trait]
impl RuleSource for StaticRuleSource {
    async fn load(&self) -> Result<AccessRules, RuleSourceError> {
        Ok(self.rules.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_matching() {
        assert!(ip_matches("10.0.0.1", "10.0.0.1"));
        assert!(ip_matches(" 10.0.0.1 ", "10.0.0.1"));
        assert!(ip_matches("::1", "0:0:0:0:0:0:0:1"));
        assert!(!ip_matches("10.0.0.1", "10.0.0.2"));
        assert!(ip_matches("localhost", "localhost"));
    }

    #[test]
    fn test_parse_partial_document() {
        let rules: AccessRules =
            serde_json::from_str(r#"{"endpoints": ["http://localhost"]}"#).unwrap();
        assert!(rules.blacklist.is_empty());
        assert!(!rules.has_whitelist("/"));
        assert!(rules.is_permitted_url("http://localhost:44444/auth/login"));
        assert!(!rules.is_permitted_url("http://evil.example/auth/login"));
    }

    #[test]
    fn test_endpoint_scope_forms() {
        let any: AccessRules = serde_json::from_str(r#"{"endpoints": "*"}"#).unwrap();
        assert_eq!(any.endpoints, EndpointScope::Any);
        assert!(any.is_permitted_url("http://anything.example/x"));
        assert_eq!(serde_json::to_value(&any.endpoints).unwrap(), serde_json::json!("*"));

        // 빈 목록과 빈 접두사는 아무 URL도 허용하지 않음
        let empty: AccessRules = serde_json::from_str(r#"{"endpoints": []}"#).unwrap();
        assert!(!empty.is_permitted_url("http://localhost:44444/"));
        assert!(!AccessRules::default().is_permitted_url("http://localhost:44444/"));
        let blank: AccessRules = serde_json::from_str(r#"{"endpoints": [""]}"#).unwrap();
        assert!(!blank.is_permitted_url("http://localhost:44444/"));

        assert!(serde_json::from_str::<AccessRules>(r#"{"endpoints": "http://a"}"#).is_err());
    }

    #[test]
    fn test_allow_all_has_no_url_restriction() {
        assert_eq!(StaticRuleSource::allow_all().rules.endpoints, EndpointScope::Any);
    }

    #[tokio::test]
    async fn test_file_source_reads_on_every_call() {
        let path = std::env::temp_dir().join(format!("descubre-rules-{}.json", std::process::id()));
        tokio::fs::write(&path, r#"{"endpoints": ["http://a"]}"#).await.unwrap();

        let source = FileRuleSource::new(&path);
        assert_eq!(
            source.load().await.unwrap().endpoints,
            EndpointScope::prefixes(["http://a"])
        );

        tokio::fs::write(&path, r#"{"endpoints": ["http://b"]}"#).await.unwrap();
        assert_eq!(
            source.load().await.unwrap().endpoints,
            EndpointScope::prefixes(["http://b"])
        );

        tokio::fs::remove_file(&path).await.unwrap();
        assert!(matches!(
            source.load().await,
            Err(RuleSourceError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_file_source_rejects_invalid_json() {
        let path = std::env::temp_dir().join(format!("descubre-bad-{}.json", std::process::id()));
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let result = FileRuleSource::new(&path).load().await;
        tokio::fs::remove_file(&path).await.unwrap();
        assert!(matches!(result, Err(RuleSourceError::Parse(_))));
    }
}
