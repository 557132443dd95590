//! 역할 기반 권한 정책.
//!
//! 보호된 작업마다 요구 역할을 하나씩 정의하고, 검증된 Claims의 역할과
//! 단순 비교합니다. 역할 간 상하 관계는 없습니다.

use descubre_core::Role;

use super::jwt::Claims;

/// 역할 검사가 필요한 작업.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// 관리자 로그인
    AdminLogin,
    /// 사용자 목록 조회
    ListUsers,
    /// 사용자 수정
    UpdateUser,
    /// 사용자 삭제
    DeleteUser,
    /// 감사 로그 조회
    ViewAuditLog,
}

impl Action {
    /// 작업에 필요한 역할.
    pub fn required_role(&self) -> Role {
        match self {
            Action::AdminLogin
            | Action::ListUsers
            | Action::UpdateUser
            | Action::DeleteUser
            | Action::ViewAuditLog => Role::Admin,
        }
    }

    /// 작업 설명 반환.
    pub fn description(&self) -> &'static str {
        match self {
            Action::AdminLogin => "관리자 로그인",
            Action::ListUsers => "사용자 목록 조회",
            Action::UpdateUser => "사용자 수정",
            Action::DeleteUser => "사용자 삭제",
            Action::ViewAuditLog => "감사 로그 조회",
        }
    }
}

/// 권한 검사 실패.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// 유효한 토큰이 없음
    #[error("인증이 필요합니다")]
    Unauthenticated,
    /// 역할 불일치
    #[error("권한이 부족합니다")]
    Forbidden,
}

/// 권한 정책.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationPolicy;

impl AuthorizationPolicy {
    pub fn new() -> Self {
        Self
    }

    /// 역할이 작업을 수행할 수 있는지 확인.
    pub fn permits(&self, role: Role, action: Action) -> bool {
        role == action.required_role()
    }

    /// 검증된 Claims로 작업 권한을 판단합니다.
    ///
    /// Claims가 없으면 항상 `Unauthenticated`입니다.
    pub fn authorize(&self, claims: Option<&Claims>, action: Action) -> Result<(), AuthzError> {
        let claims = claims.ok_or(AuthzError::Unauthenticated)?;
        self.authorize_role(claims.role, action)
    }

    /// 저장된 사용자 역할로 작업 권한을 판단합니다.
    ///
    /// 관리자 로그인처럼 토큰 발급 전에 역할을 확인할 때 사용합니다.
    pub fn authorize_role(&self, role: Role, action: Action) -> Result<(), AuthzError> {
        if self.permits(role, action) {
            Ok(())
        } else {
            tracing::debug!(
                role = %role,
                action = action.description(),
                required = %action.required_role(),
                "Authorization denied"
            );
            Err(AuthzError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: Role) -> Claims {
        Claims {
            email: "a@b.com".to_string(),
            role,
            town_id: None,
            iat: 0,
            exp: i64::MAX,
        }
    }

    const ALL_ACTIONS: [Action; 5] = [
        Action::AdminLogin,
        Action::ListUsers,
        Action::UpdateUser,
        Action::DeleteUser,
        Action::ViewAuditLog,
    ];

    #[test]
    fn test_admin_permitted_everywhere() {
        let policy = AuthorizationPolicy::new();
        for action in ALL_ACTIONS {
            assert!(policy.authorize(Some(&claims(Role::Admin)), action).is_ok());
        }
    }

    #[test]
    fn test_user_is_forbidden_not_unauthenticated() {
        let policy = AuthorizationPolicy::new();
        for action in ALL_ACTIONS {
            assert_eq!(
                policy.authorize(Some(&claims(Role::User)), action),
                Err(AuthzError::Forbidden)
            );
        }
    }

    #[test]
    fn test_missing_claims_is_unauthenticated() {
        let policy = AuthorizationPolicy::new();
        assert_eq!(
            policy.authorize(None, Action::ListUsers),
            Err(AuthzError::Unauthenticated)
        );
    }

    #[test]
    fn test_flat_role_model() {
        let policy = AuthorizationPolicy::new();
        assert!(!policy.permits(Role::User, Action::ViewAuditLog));
        assert!(policy.permits(Role::Admin, Action::ViewAuditLog));
        assert_eq!(Action::DeleteUser.description(), "사용자 삭제");
    }
}
