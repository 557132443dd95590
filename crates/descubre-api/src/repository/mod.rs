//! 사용자/감사 로그 저장소.
//!
//! 핸들러와 서비스는 `UserStore`, `AuditStore` 트레이트에만 의존합니다.
//! 구현체는 PostgreSQL(`PgStore`)과 인메모리(`MemoryStore`) 두 가지입니다.
//! 이메일 고유성은 저장소가 직접 보장하며, 위반 시 `StoreError::Duplicate`를
//! 반환합니다.

mod memory;
mod postgres;

use async_trait::async_trait;

use descubre_core::{AuditEntry, NewAuditEntry, NewUser, User, UserSummary, UserUpdate};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// 저장소 에러.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 고유 제약 위반 (예: 이메일 중복)
    #[error("중복된 값: {0}")]
    Duplicate(String),
    /// 백엔드 에러
    #[error("저장소 에러: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                let field = match db_err.constraint() {
                    Some(name) if name.contains("email") => "email",
                    Some(name) => name,
                    None => "unknown",
                };
                return StoreError::Duplicate(field.to_string());
            }
        }
        StoreError::Backend(err.to_string())
    }
}

/// 사용자 저장소.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 이메일로 사용자 존재 여부 확인.
    async fn user_exists(&self, email: &str) -> Result<bool, StoreError>;

    /// 이메일로 사용자 조회.
    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// ID로 사용자 조회.
    async fn fetch_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    /// 사용자 추가. 이메일이 이미 있으면 `Duplicate`.
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    /// 사용자 수정. 대상이 없으면 `false`.
    async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<bool, StoreError>;

    /// 사용자 삭제. 대상이 없으면 `false`.
    async fn delete_user(&self, id: i64) -> Result<bool, StoreError>;

    /// 다음 사용자 ID (현재 최대값 + 1).
    async fn next_id(&self) -> Result<i64, StoreError>;

    /// 마을 정보를 포함한 전체 사용자 목록.
    async fn list_users(&self) -> Result<Vec<UserSummary>, StoreError>;
}

/// 감사 로그 저장소. 추가와 조회만 제공합니다.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// 항목 추가 후 부여된 ID 반환.
    async fn append_audit_entry(&self, entry: NewAuditEntry) -> Result<i64, StoreError>;

    /// 전체 항목 (ID 오름차순).
    async fn list_audit_entries(&self) -> Result<Vec<AuditEntry>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_error_is_backend() {
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            StoreError::Duplicate("email".to_string()).to_string(),
            "중복된 값: email"
        );
    }
}
