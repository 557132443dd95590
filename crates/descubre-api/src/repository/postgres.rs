//! PostgreSQL 저장소.
//!
//! `ad_users`, `ad_logs` 테이블을 사용하며 사용자 목록은 `ad_towns`와
//! 조인합니다. 스키마는 `migrations/` 디렉토리에서 관리합니다.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, QueryBuilder};
use tracing::info;

use descubre_core::{
    AuditEntry, DatabaseConfig, NewAuditEntry, NewUser, Role, User, UserSummary, UserUpdate,
};

use super::{AuditStore, StoreError, UserStore};

// ================================================================================================
// Rows
// ================================================================================================

#[derive(Debug, FromRow)]
struct UserRow {
    user_id: i64,
    user_ip: Option<String>,
    email: String,
    password: String,
    town_id: Option<i64>,
    dates: String,
    role: String,
    verified: bool,
}

/// 저장된 역할 문자열 파싱. 알 수 없는 값은 저장소 에러입니다.
fn stored_role(role: &str, user_id: i64) -> Result<Role, StoreError> {
    role.parse::<Role>()
        .map_err(|e| StoreError::Backend(format!("{} (user_id={})", e, user_id)))
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = stored_role(&row.role, row.user_id)?;

        Ok(User {
            id: row.user_id,
            email: row.email,
            password_digest: row.password,
            role,
            town_id: row.town_id,
            verified: row.verified,
            dates: parse_dates(row.dates),
            registered_ip: row.user_ip,
        })
    }
}

#[derive(Debug, FromRow)]
struct UserSummaryRow {
    user_id: i64,
    email: String,
    town_id: Option<i64>,
    dates: String,
    verified: bool,
    role: String,
    town_name: Option<String>,
    town_image: Option<String>,
}

#[derive(Debug, FromRow)]
struct AuditRow {
    log_id: i64,
    user_id: Option<i64>,
    user_ip: String,
    log_date: i64,
    description: String,
    #[sqlx(rename = "type")]
    kind: String,
}

/// 저장된 JSON 텍스트를 파싱합니다. 깨진 값은 문자열 그대로 보존합니다.
fn parse_dates(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

// ================================================================================================
// Store
// ================================================================================================

/// PostgreSQL 기반 사용자/감사 로그 저장소.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// 설정으로 연결 풀을 생성합니다.
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self, StoreError> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .connect(url)
            .await?;

        info!("Database connection established");
        Ok(Self { pool })
    }

    /// 마이그레이션 실행.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        info!("Running database migrations...");

        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        info!("Migrations completed successfully");
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn user_exists(&self, email: &str) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM ad_users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT user_id, user_ip, email, password, town_id, dates, role, verified
            FROM ad_users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn fetch_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT user_id, user_ip, email, password, town_id, dates, role, verified
            FROM ad_users
            WHERE user_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO ad_users (user_id, user_ip, email, password, town_id, dates, role, verified)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.id)
        .bind(&user.registered_ip)
        .bind(&user.email)
        .bind(&user.password_digest)
        .bind(user.town_id)
        .bind(user.dates.to_string())
        .bind(user.role.as_str())
        .bind(user.verified)
        .execute(&self.pool)
        .await?;

        Ok(user.into_user())
    }

    async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<bool, StoreError> {
        if update.is_empty() {
            return Ok(self.fetch_user_by_id(id).await?.is_some());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE ad_users SET ");
        let mut fields = builder.separated(", ");
        if let Some(email) = &update.email {
            fields.push("email = ").push_bind_unseparated(email.clone());
        }
        if let Some(digest) = &update.password_digest {
            fields.push("password = ").push_bind_unseparated(digest.clone());
        }
        if let Some(role) = update.role {
            fields.push("role = ").push_bind_unseparated(role.as_str());
        }
        if let Some(town_id) = update.town_id {
            fields.push("town_id = ").push_bind_unseparated(town_id);
        }
        if let Some(verified) = update.verified {
            fields.push("verified = ").push_bind_unseparated(verified);
        }
        builder.push(" WHERE user_id = ").push_bind(id);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM ad_users WHERE user_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn next_id(&self) -> Result<i64, StoreError> {
        let next: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(user_id), 0) + 1 FROM ad_users")
            .fetch_one(&self.pool)
            .await?;
        Ok(next)
    }

    async fn list_users(&self) -> Result<Vec<UserSummary>, StoreError> {
        let rows = sqlx::query_as::<_, UserSummaryRow>(
            r#"
            SELECT
                u.user_id, u.email, u.town_id, u.dates, u.verified, u.role,
                t.town_name, t.town_image
            FROM ad_users u
            LEFT JOIN ad_towns t ON u.town_id = t.town_id
            ORDER BY u.user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let role = stored_role(&row.role, row.user_id)?;
                Ok(UserSummary {
                    id: row.user_id,
                    email: row.email,
                    town_id: row.town_id,
                    dates: parse_dates(row.dates),
                    verified: row.verified,
                    role,
                    town_name: row.town_name,
                    town_image: row.town_image,
                })
            })
            .collect()
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn append_audit_entry(&self, entry: NewAuditEntry) -> Result<i64, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO ad_logs (user_id, user_ip, log_date, description, type)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING log_id
            "#,
        )
        .bind(entry.user_id)
        .bind(&entry.user_ip)
        .bind(entry.log_date)
        .bind(&entry.description)
        .bind(entry.action.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn list_audit_entries(&self) -> Result<Vec<AuditEntry>, StoreError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT log_id, user_id, user_ip, log_date, description, type
            FROM ad_logs
            ORDER BY log_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| AuditEntry {
                id: row.log_id,
                user_id: row.user_id,
                user_ip: row.user_ip,
                log_date: row.log_date,
                description: row.description,
                action: row.kind,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_dates() {
        assert_eq!(
            parse_dates(r#"{"requested": 1700000000}"#.to_string()),
            json!({"requested": 1700000000})
        );
        assert_eq!(
            parse_dates("not json".to_string()),
            Value::String("not json".to_string())
        );
    }

    #[test]
    fn test_row_with_unknown_role_is_rejected() {
        let row = UserRow {
            user_id: 1,
            user_ip: None,
            email: "a@b.com".to_string(),
            password: "digest".to_string(),
            town_id: None,
            dates: "{}".to_string(),
            role: "superuser".to_string(),
            verified: true,
        };
        assert!(matches!(User::try_from(row), Err(StoreError::Backend(_))));
    }

    #[test]
    fn test_row_conversion() {
        let row = UserRow {
            user_id: 3,
            user_ip: Some("10.0.0.1".to_string()),
            email: "a@b.com".to_string(),
            password: "digest".to_string(),
            town_id: Some(7),
            dates: r#"{"requested": 1}"#.to_string(),
            role: "admin".to_string(),
            verified: true,
        };
        let user = User::try_from(row).unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.town_id, Some(7));
        assert_eq!(user.dates["requested"], 1);
    }
}
