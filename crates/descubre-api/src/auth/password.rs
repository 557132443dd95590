//! 비밀번호 해싱 유틸리티.
//!
//! 기본 저장 형식은 솔트 없는 SHA-512 hex 다이제스트입니다. 같은 평문은 항상
//! 같은 다이제스트가 되므로 레인보우 테이블에 취약합니다. `argon2id` 방식을
//! 설정하면 새로 저장되는 비밀번호부터 솔트가 포함된 PHC 문자열로 저장되며,
//! 검증은 저장된 형식을 보고 자동으로 선택합니다.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

use descubre_core::PasswordScheme;

/// SHA-512 다이제스트의 hex 길이.
pub const SHA512_HEX_LEN: usize = 128;

/// 비밀번호 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("비밀번호 해싱 실패")]
    HashingFailed,
}

/// 비밀번호 다이제스트 계산 (SHA-512, hex 소문자).
///
/// 결정적입니다. 같은 평문은 항상 같은 128자 다이제스트를 반환합니다.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha512::digest(password.as_bytes()))
}

/// 설정된 방식으로 비밀번호를 해싱합니다.
pub fn hash_password_with(scheme: PasswordScheme, password: &str) -> Result<String, PasswordError> {
    match scheme {
        PasswordScheme::Sha512 => Ok(hash_password(password)),
        PasswordScheme::Argon2id => {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|_| PasswordError::HashingFailed)
        }
    }
}

/// 비밀번호 검증.
///
/// 저장된 값이 `$argon2`로 시작하면 PHC 문자열로, 아니면 SHA-512 다이제스트로
/// 비교합니다. 형식이 잘못된 저장 값은 불일치로 처리합니다.
pub fn verify_password(password: &str, stored: &str) -> bool {
    if stored.starts_with("$argon2") {
        return match PasswordHash::new(stored) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is not a valid PHC string");
                false
            }
        };
    }

    // 길이가 다르면 ct_eq는 즉시 0을 반환
    hash_password(password)
        .as_bytes()
        .ct_eq(stored.as_bytes())
        .into()
}
