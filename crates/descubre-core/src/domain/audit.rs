//! 감사 로그 레코드.
//!
//! 감사 로그는 추가 전용입니다. 한번 기록된 항목은 수정되거나 삭제되지 않습니다.

use serde::{Deserialize, Serialize};

/// 감사 대상 작업 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// 회원 가입
    Register,
    /// 로그인 성공
    Login,
    /// 로그인 실패 (비밀번호 불일치, 미인증 계정)
    LoginFailed,
    /// 관리자 로그인 성공
    AdminLogin,
    /// 관리자에 의한 사용자 수정
    UpdateUser,
    /// 관리자에 의한 사용자 삭제
    DeleteUser,
    /// 파싱할 수 없는 요청 본문
    InvalidRequest,
    /// 저장소 에러
    StorageError,
}

impl AuditAction {
    /// 저장소에 기록되는 태그.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Register => "register",
            AuditAction::Login => "login",
            AuditAction::LoginFailed => "login_failed",
            AuditAction::AdminLogin => "admin_login",
            AuditAction::UpdateUser => "update_user",
            AuditAction::DeleteUser => "delete_user",
            AuditAction::InvalidRequest => "invalid_request",
            AuditAction::StorageError => "storage_error",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 새로 추가할 감사 로그 항목.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub user_id: Option<i64>,
    pub user_ip: String,
    /// Unix timestamp (초)
    pub log_date: i64,
    pub description: String,
    pub action: AuditAction,
}

impl NewAuditEntry {
    /// 현재 시각으로 새 항목을 생성합니다.
    pub fn now(
        user_id: Option<i64>,
        user_ip: impl Into<String>,
        description: impl Into<String>,
        action: AuditAction,
    ) -> Self {
        Self {
            user_id,
            user_ip: user_ip.into(),
            log_date: chrono::Utc::now().timestamp(),
            description: description.into(),
            action,
        }
    }
}

/// 저장된 감사 로그 항목.
///
/// `action`은 저장소에 기록된 태그 문자열을 그대로 보존합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(rename = "logID")]
    pub id: i64,
    #[serde(rename = "userID")]
    pub user_id: Option<i64>,
    #[serde(rename = "userIP")]
    pub user_ip: String,
    #[serde(rename = "logDate")]
    pub log_date: i64,
    pub description: String,
    #[serde(rename = "type")]
    pub action: String,
}

impl AuditEntry {
    /// 새 항목에 저장소가 부여한 ID를 붙여 레코드를 만듭니다.
    pub fn from_new(id: i64, entry: NewAuditEntry) -> Self {
        Self {
            id,
            user_id: entry.user_id,
            user_ip: entry.user_ip,
            log_date: entry.log_date,
            description: entry.description,
            action: entry.action.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_tags() {
        assert_eq!(AuditAction::Register.as_str(), "register");
        assert_eq!(AuditAction::AdminLogin.to_string(), "admin_login");
        assert_eq!(
            serde_json::to_string(&AuditAction::LoginFailed).unwrap(),
            "\"login_failed\""
        );
    }

    #[test]
    fn test_new_entry_uses_current_time() {
        let before = chrono::Utc::now().timestamp();
        let entry = NewAuditEntry::now(None, "127.0.0.1", "User registered", AuditAction::Register);
        assert!(entry.log_date >= before);
        assert_eq!(entry.user_id, None);
    }

    #[test]
    fn test_entry_wire_names() {
        let entry = AuditEntry::from_new(
            1,
            NewAuditEntry {
                user_id: Some(4),
                user_ip: "10.0.0.1".to_string(),
                log_date: 1_700_000_000,
                description: "User logged in".to_string(),
                action: AuditAction::Login,
            },
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["logID"], 1);
        assert_eq!(json["userID"], 4);
        assert_eq!(json["type"], "login");
    }
}
