//! 자격증명 규칙.
//!
//! 이메일/비밀번호 형식 검증, 비밀번호 다이제스트 생성 및 비교,
//! 이메일 중복 확인을 담당합니다. 형식 검증 함수는 절대 실패하지 않고
//! `bool`만 반환합니다.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use descubre_core::PasswordScheme;

use super::password::{hash_password_with, verify_password, PasswordError};
use crate::repository::{StoreError, UserStore};

/// 이메일 최소 길이 (문자 수).
pub const EMAIL_MIN_LEN: usize = 6;
/// 이메일 최대 길이 (문자 수).
pub const EMAIL_MAX_LEN: usize = 100;
/// 비밀번호 최소 길이 (문자 수).
pub const PASSWORD_MIN_LEN: usize = 8;
/// 비밀번호 최대 길이 (문자 수).
pub const PASSWORD_MAX_LEN: usize = 128;

/// RSA-4096 OAEP(SHA-256) 한 블록에 담을 수 있는 평문 길이.
///
/// `4096 / 8 - 2 * 32 - 2 = 446`. 현재 해시 방식과는 무관하지만 기존 저장
/// 데이터와의 호환을 위해 상한으로 유지합니다.
pub const PASSWORD_PADDING_LIMIT: usize = 4096 / 8 - 2 * 32 - 2;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.-]+@[\w.-]+\.\w+$").expect("valid email pattern"));

static PASSWORD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[\w!@#$%^&*()_+{}\[\]:;"'<>?,./\\|-]+$"#).expect("valid password pattern")
});

/// 이메일 형식 검증.
///
/// 길이가 6~100자이고 `local@domain.tld` 형태일 때만 `true`.
pub fn validate_email_syntax(value: &str) -> bool {
    let len = value.chars().count();
    if !(EMAIL_MIN_LEN..=EMAIL_MAX_LEN).contains(&len) {
        return false;
    }
    EMAIL_PATTERN.is_match(value)
}

/// 비밀번호 형식 검증.
///
/// 길이가 8~128자이고 영숫자와 허용된 특수문자만 포함할 때 `true`.
pub fn validate_password_syntax(value: &str) -> bool {
    let len = value.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return false;
    }
    if !PASSWORD_PATTERN.is_match(value) {
        return false;
    }
    len <= PASSWORD_PADDING_LIMIT
}

/// 사용자 저장소와 연결된 자격증명 서비스.
#[derive(Clone)]
pub struct CredentialStore {
    users: Arc<dyn UserStore>,
    scheme: PasswordScheme,
}

impl CredentialStore {
    /// 새 자격증명 서비스 생성.
    pub fn new(users: Arc<dyn UserStore>, scheme: PasswordScheme) -> Self {
        Self { users, scheme }
    }

    /// 새 비밀번호 저장에 사용하는 방식.
    pub fn scheme(&self) -> PasswordScheme {
        self.scheme
    }

    /// 저장용 다이제스트 생성.
    pub fn hash_password(&self, plaintext: &str) -> Result<String, PasswordError> {
        hash_password_with(self.scheme, plaintext)
    }

    /// 평문과 저장된 다이제스트 비교.
    pub fn verify_password(&self, plaintext: &str, stored_digest: &str) -> bool {
        verify_password(plaintext, stored_digest)
    }

    /// 이메일이 이미 등록되어 있는지 확인.
    pub async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        self.users.user_exists(email).await
    }
}
