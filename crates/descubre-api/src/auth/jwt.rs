//! JWT 토큰 처리.
//!
//! 프로세스 전역 대칭 키(HS256)로 서명된 Access Token을 발급하고 검증합니다.
//! 토큰은 상태를 갖지 않으며 만료 전에 폐기할 수 없습니다.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use descubre_core::Role;

/// 토큰에 담을 신원 정보.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub email: String,
    pub role: Role,
    pub town_id: Option<i64>,
}

/// JWT Access Token 페이로드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// 사용자 이메일
    pub email: String,
    /// 사용자 역할
    pub role: Role,
    /// 소속 마을 ID
    #[serde(rename = "townID", default, skip_serializing_if = "Option::is_none")]
    pub town_id: Option<i64>,
    /// Issued At (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// 서명 대상 신원 정보만 추출합니다.
    pub fn subject(&self) -> TokenSubject {
        TokenSubject {
            email: self.email.clone(),
            role: self.role,
            town_id: self.town_id,
        }
    }

    /// 주어진 시각에 만료되었는지 확인.
    ///
    /// 만료 시각과 같은 순간도 만료로 취급합니다.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

/// JWT 토큰 에러.
///
/// `Malformed`와 `Expired`는 관측용으로만 구분되며 호출자는 둘 다
/// 미인증으로 처리해야 합니다.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("토큰 인코딩 실패: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),
    #[error("잘못되었거나 위조된 토큰")]
    Malformed,
    #[error("토큰이 만료되었습니다")]
    Expired,
    #[error("토큰 유효 시간은 0보다 커야 합니다: {0}분")]
    InvalidTtl(i64),
}

/// 서명 비밀 키를 무작위로 생성합니다.
///
/// 16바이트 난수를 hex로 인코딩한 32자 문자열입니다. 프로세스가 재시작되면
/// 이전에 발급된 모든 토큰이 무효화됩니다.
pub fn generate_secret() -> SecretString {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    SecretString::from(hex::encode(bytes))
}

/// 토큰 발급/검증 서비스.
///
/// 서명 키는 생성 시점에 고정되며 프로세스 수명 동안 교체되지 않습니다.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl_minutes", &self.ttl.num_minutes())
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// 새 토큰 서비스 생성.
    ///
    /// # Arguments
    ///
    /// * `secret` - HS256 서명 키
    /// * `ttl_minutes` - 토큰 유효 시간 (분, 1 이상)
    pub fn new(secret: &SecretString, ttl_minutes: i64) -> Result<Self, JwtError> {
        if ttl_minutes <= 0 {
            return Err(JwtError::InvalidTtl(ttl_minutes));
        }

        let key = secret.expose_secret().as_bytes();

        // 만료는 verify_at에서 직접 판단 (leeway 없이, 주입된 시각 기준)
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(key),
            decoding_key: DecodingKey::from_secret(key),
            validation,
            ttl: Duration::minutes(ttl_minutes),
        })
    }

    /// 토큰 유효 시간.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 현재 시각 기준으로 토큰을 발급합니다.
    pub fn issue(&self, subject: &TokenSubject) -> Result<String, JwtError> {
        self.issue_at(subject, Utc::now())
    }

    /// 주어진 발급 시각 기준으로 토큰을 발급합니다.
    ///
    /// 만료 시각은 `issued_at + ttl`이며 항상 발급 시각보다 늦습니다.
    pub fn issue_at(&self, subject: &TokenSubject, issued_at: DateTime<Utc>) -> Result<String, JwtError> {
        let claims = Claims {
            email: subject.email.clone(),
            role: subject.role,
            town_id: subject.town_id,
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(JwtError::from)
    }

    /// 현재 시각 기준으로 토큰을 검증합니다.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        self.verify_at(token, Utc::now())
    }

    /// 주어진 시각 기준으로 토큰을 검증합니다.
    ///
    /// 서명이 일치하지 않으면 `Malformed`, `now >= exp`이면 `Expired`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, JwtError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| JwtError::Malformed)?;

        if data.claims.is_expired_at(now) {
            return Err(JwtError::Expired);
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use proptest::prelude::*;

    const TEST_SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

    fn service() -> TokenService {
        TokenService::new(&SecretString::from(TEST_SECRET.to_string()), 30).unwrap()
    }

    fn subject() -> TokenSubject {
        TokenSubject {
            email: "a@b.com".to_string(),
            role: Role::User,
            town_id: Some(12),
        }
    }

    /// 서명 부분의 디코딩된 바이트 중 한 비트를 뒤집습니다.
    fn flip_signature_bit(token: &str, bit: usize) -> String {
        let (head, signature) = token.rsplit_once('.').unwrap();
        let mut bytes = URL_SAFE_NO_PAD.decode(signature).unwrap();
        let idx = (bit / 8) % bytes.len();
        bytes[idx] ^= 1 << (bit % 8);
        format!("{}.{}", head, URL_SAFE_NO_PAD.encode(bytes))
    }

    #[test]
    fn test_issue_and_verify() {
        let service = service();
        let token = service.issue(&subject()).unwrap();
        assert!(!token.is_empty());

        let claims = service.verify(&token).unwrap();
        assert_eq!(claims.subject(), subject());
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn test_town_is_optional() {
        let service = service();
        let subject = TokenSubject {
            town_id: None,
            ..subject()
        };
        let token = service.issue(&subject).unwrap();
        assert_eq!(service.verify(&token).unwrap().town_id, None);
    }

    #[test]
    fn test_expired_at_exact_expiry() {
        let service = service();
        let issued = Utc::now();
        let token = service.issue_at(&subject(), issued).unwrap();

        let just_before = issued + Duration::minutes(30) - Duration::seconds(1);
        assert!(service.verify_at(&token, just_before).is_ok());

        let at_expiry = issued + Duration::minutes(30);
        assert!(matches!(
            service.verify_at(&token, at_expiry),
            Err(JwtError::Expired)
        ));
        assert!(matches!(
            service.verify_at(&token, at_expiry + Duration::hours(5)),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn test_wrong_secret_is_malformed() {
        let token = service().issue(&subject()).unwrap();
        let other = TokenService::new(
            &SecretString::from("another-secret-key-for-testing-32-chars".to_string()),
            30,
        )
        .unwrap();
        assert!(matches!(other.verify(&token), Err(JwtError::Malformed)));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            service().verify("invalid.token.here"),
            Err(JwtError::Malformed)
        ));
        assert!(matches!(service().verify(""), Err(JwtError::Malformed)));
    }

    #[test]
    fn test_rejects_non_positive_ttl() {
        let secret = SecretString::from(TEST_SECRET.to_string());
        assert!(matches!(
            TokenService::new(&secret, 0),
            Err(JwtError::InvalidTtl(0))
        ));
        assert_eq!(
            TokenService::new(&secret, 45).unwrap().ttl(),
            Duration::minutes(45)
        );
    }

    #[test]
    fn test_generated_secret_shape() {
        let a = generate_secret();
        let b = generate_secret();
        assert_eq!(a.expose_secret().len(), 32);
        assert!(a.expose_secret().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a.expose_secret(), b.expose_secret());
    }

    proptest! {
        #[test]
        fn prop_round_trip_before_expiry(
            email in "[a-z0-9]{1,20}@[a-z]{1,10}\\.[a-z]{2,4}",
            admin in any::<bool>(),
            town in proptest::option::of(0i64..100_000),
            offset in 0i64..(30 * 60),
        ) {
            let service = service();
            let subject = TokenSubject {
                email,
                role: if admin { Role::Admin } else { Role::User },
                town_id: town,
            };
            let issued = Utc::now();
            let token = service.issue_at(&subject, issued).unwrap();
            let claims = service.verify_at(&token, issued + Duration::seconds(offset)).unwrap();
            prop_assert_eq!(claims.subject(), subject);
        }

        #[test]
        fn prop_any_signature_bit_flip_rejected(bit in 0usize..256) {
            let service = service();
            let token = service.issue(&subject()).unwrap();
            let tampered = flip_signature_bit(&token, bit);
            prop_assert!(matches!(service.verify(&tampered), Err(JwtError::Malformed)));
        }
    }
}
