//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 `Arc`로 래핑되어 요청 간에 공유됩니다. 요청 사이에 변경되는
//! 상태는 없으며, 모든 영속 상태는 저장소에 있습니다.

use std::sync::Arc;

use descubre_core::PasswordScheme;

use crate::access::{AccessGate, RuleSource};
use crate::audit::AuditLog;
use crate::auth::{AuthorizationPolicy, CredentialStore, TokenService};
use crate::repository::{AuditStore, UserStore};

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 토큰 발급/검증
    pub tokens: TokenService,
    /// 자격증명 규칙
    pub credentials: CredentialStore,
    /// 사용자 저장소
    pub users: Arc<dyn UserStore>,
    /// 감사 로그
    pub audit: AuditLog,
    /// 접근 게이트
    pub gate: AccessGate,
    /// 권한 정책
    pub policy: AuthorizationPolicy,
    /// 서버 시작 시간
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// API 버전
    pub version: String,
}

impl AppState {
    /// 사용자/감사 로그를 모두 구현한 저장소로 상태를 구성합니다.
    pub fn new<S>(
        store: Arc<S>,
        tokens: TokenService,
        scheme: PasswordScheme,
        rules: Arc<dyn RuleSource>,
    ) -> Self
    where
        S: UserStore + AuditStore + 'static,
    {
        let users: Arc<dyn UserStore> = store.clone();
        let audit_store: Arc<dyn AuditStore> = store;

        Self {
            tokens,
            credentials: CredentialStore::new(users.clone(), scheme),
            users,
            audit: AuditLog::new(audit_store),
            gate: AccessGate::new(rules),
            policy: AuthorizationPolicy::new(),
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 서버 업타임 (초).
    pub fn uptime_secs(&self) -> i64 {
        (chrono::Utc::now() - self.started_at).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::StaticRuleSource;
    use crate::repository::MemoryStore;
    use secrecy::SecretString;

    #[test]
    fn test_state_construction() {
        let tokens = TokenService::new(&SecretString::from("state-test-secret".to_string()), 30).unwrap();
        let state = AppState::new(
            Arc::new(MemoryStore::new()),
            tokens,
            PasswordScheme::Sha512,
            Arc::new(StaticRuleSource::allow_all()),
        );

        assert_eq!(state.credentials.scheme(), PasswordScheme::Sha512);
        assert!(state.uptime_secs() >= 0);
        assert!(!state.version.is_empty());
    }
}
