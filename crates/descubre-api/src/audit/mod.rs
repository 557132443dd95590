//! 감사 로그 서비스.
//!
//! 보안 관련 작업마다 항목 하나를 추가합니다. 기록 실패는 경고 로그만 남기고
//! 버리며, 호출자의 주 작업 결과를 바꾸지 않습니다.

use std::sync::Arc;

use descubre_core::{AuditAction, AuditEntry, NewAuditEntry};

use crate::repository::{AuditStore, StoreError};

/// 최선 노력(best-effort) 감사 로그.
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn AuditStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// 항목을 기록합니다. 실패해도 에러를 반환하지 않습니다.
    pub async fn record(
        &self,
        user_id: Option<i64>,
        source_ip: &str,
        description: impl Into<String>,
        action: AuditAction,
    ) {
        let entry = NewAuditEntry::now(user_id, source_ip, description, action);

        if let Err(e) = self.store.append_audit_entry(entry).await {
            tracing::warn!(
                user_id = ?user_id,
                client_ip = %source_ip,
                action = %action,
                error = %e,
                "Failed to append audit entry"
            );
        }
    }

    /// 내부 에러를 진단 정보와 함께 기록합니다.
    ///
    /// 엔드포인트, 사용자, IP, 원본 에러를 `error` 레벨로 남기고
    /// 감사 로그에는 요약만 추가합니다.
    pub async fn record_failure(
        &self,
        endpoint: &str,
        user_id: Option<i64>,
        source_ip: &str,
        error: &(dyn std::error::Error + Send + Sync),
        action: AuditAction,
    ) {
        tracing::error!(
            endpoint = endpoint,
            user_id = ?user_id,
            client_ip = %source_ip,
            timestamp = chrono::Utc::now().timestamp(),
            error = %error,
            "Request failed with internal error"
        );

        let description = format!("Error in {}: {}", endpoint, error);
        self.record(user_id, source_ip, description, action).await;
    }

    /// 전체 감사 로그 조회.
    pub async fn entries(&self) -> Result<Vec<AuditEntry>, StoreError> {
        self.store.list_audit_entries().await
    }
}
