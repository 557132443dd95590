//! 인증 및 권한 부여.
//!
//! # 구성 요소
//!
//! - [`TokenService`]: HS256 Access Token 발급/검증
//! - [`CredentialStore`]: 이메일/비밀번호 규칙과 다이제스트
//! - [`AuthorizationPolicy`]: 작업별 역할 검사
//! - [`JwtAuth`]: Axum 핸들러용 JWT 검증 추출기
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! async fn list_users(
//!     State(state): State<Arc<AppState>>,
//!     JwtAuth(claims): JwtAuth,
//! ) -> ApiResult<Json<Vec<UserSummary>>> {
//!     state.policy.authorize(Some(&claims), Action::ListUsers)?;
//!     // ...
//! }
//! ```

mod credentials;
mod jwt;
mod middleware;
mod password;
mod policy;

pub use credentials::{
    validate_email_syntax, validate_password_syntax, CredentialStore, PASSWORD_PADDING_LIMIT,
};
pub use jwt::{generate_secret, Claims, JwtError, TokenService, TokenSubject};
pub use middleware::{bearer_token, JwtAuth};
pub use password::{hash_password, hash_password_with, verify_password, PasswordError};
pub use policy::{Action, AuthorizationPolicy, AuthzError};
