//! 인증 및 사용자 관리 endpoint.
//!
//! # 엔드포인트
//!
//! - `POST /auth/register` - 회원 가입
//! - `POST /auth/login` - 로그인
//! - `POST /auth/admin/login` - 관리자 로그인
//! - `GET /auth/user-info` - 토큰 소유자 정보
//! - `GET /auth/users` - 사용자 목록 (관리자)
//! - `PUT /auth/user/{id}` - 사용자 수정 (관리자)
//! - `DELETE /auth/user/{id}` - 사용자 삭제 (관리자)
//! - `GET /auth/logs` - 감사 로그 조회 (관리자)

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Deserializer, Serialize};

use descubre_core::{AuditAction, AuditEntry, NewUser, Role, User, UserSummary, UserUpdate};

use crate::access::ClientIp;
use crate::auth::{
    validate_email_syntax, validate_password_syntax, Action, JwtAuth, TokenSubject,
};
use crate::error::{ApiResult, AuthApiError};
use crate::metrics::record_auth_attempt;
use crate::repository::StoreError;
use crate::state::AppState;

/// 사용자 ID 충돌 시 재시도 횟수.
const MAX_INSERT_ATTEMPTS: usize = 3;

// ================================================================================================
// Request / Response
// ================================================================================================

/// 회원 가입 요청.
///
/// 역할은 요청으로 지정할 수 없으며 항상 `user`로 가입됩니다.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(rename = "townID", default)]
    pub town_id: Option<i64>,
}

/// 로그인 요청.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// 관리자 사용자 수정 요청.
///
/// `townID: null`은 소속 마을을 비우고, 필드 자체가 없으면 변경하지 않습니다.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(rename = "townID", default, deserialize_with = "present")]
    pub town_id: Option<Option<i64>>,
    #[serde(default)]
    pub verified: Option<bool>,
}

/// 필드가 존재하면 `null`이어도 `Some`으로 감쌉니다.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// 토큰 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// 토큰 소유자 정보 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserInfoResponse {
    pub user_info: String,
}

/// 처리 결과 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }
}

// ================================================================================================
// Helpers
// ================================================================================================

/// 요청 본문 파싱. 실패하면 `invalid_request` 감사 로그를 남깁니다.
async fn parse_body<T>(
    state: &AppState,
    endpoint: &str,
    ip: &str,
    payload: Result<Json<T>, JsonRejection>,
) -> ApiResult<T> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            tracing::debug!(endpoint, error = %rejection, "Rejected malformed request body");
            state
                .audit
                .record(
                    None,
                    ip,
                    format!("Invalid JSON in {}: {}", endpoint, rejection.body_text()),
                    AuditAction::InvalidRequest,
                )
                .await;
            Err(AuthApiError::InvalidJson)
        }
    }
}

/// 이메일/비밀번호 형식 검증.
fn validate_credentials(email: Option<String>, password: Option<String>) -> ApiResult<(String, String)> {
    let email = email
        .filter(|e| validate_email_syntax(e))
        .ok_or(AuthApiError::InvalidEmail)?;
    let password = password
        .filter(|p| validate_password_syntax(p))
        .ok_or(AuthApiError::InvalidPassword)?;
    Ok((email, password))
}

/// 저장소 에러를 응답 에러로 변환합니다. 내부 에러는 진단 로그와 감사 로그를 남깁니다.
async fn store_failure(
    state: &AppState,
    endpoint: &str,
    user_id: Option<i64>,
    ip: &str,
    err: StoreError,
) -> AuthApiError {
    if let StoreError::Backend(_) = &err {
        state
            .audit
            .record_failure(endpoint, user_id, ip, &err, AuditAction::StorageError)
            .await;
    }
    AuthApiError::from(err)
}

/// 경로의 사용자 ID 파싱. 정수가 아니면 JSON 에러로 응답합니다.
fn parse_user_id(path: Result<Path<i64>, PathRejection>) -> ApiResult<i64> {
    path.map(|Path(id)| id).map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected user id path segment");
        AuthApiError::InvalidUserId
    })
}

fn subject_of(user: &User) -> TokenSubject {
    TokenSubject {
        email: user.email.clone(),
        role: user.role,
        town_id: user.town_id,
    }
}

fn issue_token(state: &AppState, endpoint: &str, user: &User) -> ApiResult<TokenResponse> {
    state
        .tokens
        .issue(&subject_of(user))
        .map(|access_token| TokenResponse { access_token })
        .map_err(|e| {
            tracing::error!(endpoint, user_id = user.id, error = %e, "Failed to issue token");
            AuthApiError::Internal
        })
}

// ================================================================================================
// Handlers
// ================================================================================================

/// 회원 가입.
///
/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<Json<TokenResponse>> {
    const ENDPOINT: &str = "/auth/register";
    let ip = ip.to_string();

    let request = parse_body(&state, ENDPOINT, &ip, payload).await.inspect_err(|_| {
        record_auth_attempt("register", "invalid_input");
    })?;
    let (email, password) = validate_credentials(request.email, request.password).inspect_err(|_| {
        record_auth_attempt("register", "invalid_input");
    })?;

    let exists = match state.credentials.email_exists(&email).await {
        Ok(exists) => exists,
        Err(e) => return Err(store_failure(&state, ENDPOINT, None, &ip, e).await),
    };
    if exists {
        record_auth_attempt("register", "conflict");
        return Err(AuthApiError::EmailTaken);
    }

    let password_digest = state.credentials.hash_password(&password).map_err(|e| {
        tracing::error!(endpoint = ENDPOINT, error = %e, "Failed to hash password");
        AuthApiError::Internal
    })?;

    let mut attempt = 0;
    let user = loop {
        attempt += 1;
        let id = match state.users.next_id().await {
            Ok(id) => id,
            Err(e) => return Err(store_failure(&state, ENDPOINT, None, &ip, e).await),
        };

        let new_user = NewUser {
            id,
            email: email.clone(),
            password_digest: password_digest.clone(),
            role: Role::User,
            town_id: request.town_id,
            verified: false,
            dates: serde_json::json!({ "requested": chrono::Utc::now().timestamp() }),
            registered_ip: Some(ip.clone()),
        };

        match state.users.insert_user(new_user).await {
            Ok(user) => break user,
            // 동시 가입으로 ID가 겹친 경우 새 ID로 재시도
            Err(StoreError::Duplicate(field)) if field != "email" && attempt < MAX_INSERT_ATTEMPTS => {
                tracing::debug!(user_id = id, attempt, "User id collision, retrying");
            }
            Err(StoreError::Duplicate(field)) if field == "email" => {
                record_auth_attempt("register", "conflict");
                return Err(AuthApiError::EmailTaken);
            }
            Err(StoreError::Duplicate(field)) => {
                let err = StoreError::Backend(format!("사용자 ID 충돌: {}", field));
                return Err(store_failure(&state, ENDPOINT, None, &ip, err).await);
            }
            Err(e) => return Err(store_failure(&state, ENDPOINT, None, &ip, e).await),
        }
    };

    let token = issue_token(&state, ENDPOINT, &user)?;

    state
        .audit
        .record(Some(user.id), &ip, "User registered", AuditAction::Register)
        .await;
    record_auth_attempt("register", "success");
    tracing::info!(user_id = user.id, client_ip = %ip, "User registered");

    Ok(Json(token))
}

/// 로그인.
///
/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<TokenResponse>> {
    const ENDPOINT: &str = "/auth/login";
    let ip = ip.to_string();

    let request = parse_body(&state, ENDPOINT, &ip, payload).await.inspect_err(|_| {
        record_auth_attempt("login", "invalid_input");
    })?;
    let (email, password) = validate_credentials(request.email, request.password).inspect_err(|_| {
        record_auth_attempt("login", "invalid_input");
    })?;

    let user = match state.users.fetch_user_by_email(&email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            state
                .audit
                .record(None, &ip, "Login attempt for unknown account", AuditAction::LoginFailed)
                .await;
            record_auth_attempt("login", "not_found");
            return Err(AuthApiError::AccountNotFound);
        }
        Err(e) => return Err(store_failure(&state, ENDPOINT, None, &ip, e).await),
    };

    // 미인증 계정은 비밀번호와 관계없이 거부
    if !user.verified {
        state
            .audit
            .record(Some(user.id), &ip, "Account not verified", AuditAction::LoginFailed)
            .await;
        record_auth_attempt("login", "unverified");
        return Err(AuthApiError::AccountNotVerified);
    }

    if !state.credentials.verify_password(&password, &user.password_digest) {
        state
            .audit
            .record(Some(user.id), &ip, "Invalid password", AuditAction::LoginFailed)
            .await;
        record_auth_attempt("login", "wrong_password");
        return Err(AuthApiError::WrongPassword);
    }

    let token = issue_token(&state, ENDPOINT, &user)?;

    state
        .audit
        .record(Some(user.id), &ip, "User logged in", AuditAction::Login)
        .await;
    record_auth_attempt("login", "success");

    Ok(Json(token))
}

/// 관리자 로그인.
///
/// POST /auth/admin/login
pub async fn admin_login(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<TokenResponse>> {
    const ENDPOINT: &str = "/auth/admin/login";
    let ip = ip.to_string();

    let request = parse_body(&state, ENDPOINT, &ip, payload).await.inspect_err(|_| {
        record_auth_attempt("admin_login", "invalid_input");
    })?;
    let (email, password) = validate_credentials(request.email, request.password).inspect_err(|_| {
        record_auth_attempt("admin_login", "invalid_input");
    })?;

    let user = match state.users.fetch_user_by_email(&email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            state
                .audit
                .record(None, &ip, "Admin login attempt for unknown account", AuditAction::LoginFailed)
                .await;
            record_auth_attempt("admin_login", "not_found");
            return Err(AuthApiError::AccountNotFound);
        }
        Err(e) => return Err(store_failure(&state, ENDPOINT, None, &ip, e).await),
    };

    if !state.credentials.verify_password(&password, &user.password_digest) {
        state
            .audit
            .record(Some(user.id), &ip, "Invalid admin password", AuditAction::LoginFailed)
            .await;
        record_auth_attempt("admin_login", "wrong_password");
        return Err(AuthApiError::WrongPassword);
    }

    if let Err(e) = state.policy.authorize_role(user.role, Action::AdminLogin) {
        state
            .audit
            .record(Some(user.id), &ip, "Admin login by non-admin account", AuditAction::LoginFailed)
            .await;
        record_auth_attempt("admin_login", "forbidden");
        return Err(e.into());
    }

    let token = issue_token(&state, ENDPOINT, &user)?;

    state
        .audit
        .record(Some(user.id), &ip, "Admin logged in", AuditAction::AdminLogin)
        .await;
    record_auth_attempt("admin_login", "success");

    Ok(Json(token))
}

/// 토큰 소유자 정보.
///
/// GET /auth/user-info
pub async fn user_info(JwtAuth(claims): JwtAuth) -> Json<UserInfoResponse> {
    Json(UserInfoResponse {
        user_info: claims.email,
    })
}

/// 사용자 목록 (마을 정보 포함).
///
/// GET /auth/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    JwtAuth(claims): JwtAuth,
) -> ApiResult<Json<Vec<UserSummary>>> {
    state.policy.authorize(Some(&claims), Action::ListUsers)?;

    match state.users.list_users().await {
        Ok(users) => Ok(Json(users)),
        Err(e) => Err(store_failure(&state, "/auth/users", None, &ip.to_string(), e).await),
    }
}

/// 사용자 수정.
///
/// PUT /auth/user/{id}
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
    ClientIp(ip): ClientIp,
    JwtAuth(claims): JwtAuth,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<Json<StatusResponse>> {
    const ENDPOINT: &str = "/auth/user/update";
    state.policy.authorize(Some(&claims), Action::UpdateUser)?;
    let user_id = parse_user_id(path)?;
    let ip = ip.to_string();

    let Json(request) = payload.map_err(|_| AuthApiError::InvalidJson)?;
    let update = build_update(&state, request)?;
    if update.is_empty() {
        return Err(AuthApiError::NoFields);
    }

    match state.users.update_user(user_id, &update).await {
        Ok(true) => {}
        Ok(false) => return Err(AuthApiError::UserNotFound),
        Err(e) => return Err(store_failure(&state, ENDPOINT, Some(user_id), &ip, e).await),
    }

    state
        .audit
        .record(
            Some(user_id),
            &ip,
            format!("User updated by {}", claims.email),
            AuditAction::UpdateUser,
        )
        .await;

    Ok(Json(StatusResponse::success("User updated successfully")))
}

/// 수정 요청을 검증하고 저장 형식으로 변환합니다.
fn build_update(state: &AppState, request: UpdateUserRequest) -> ApiResult<UserUpdate> {
    let email = match request.email {
        Some(email) if validate_email_syntax(&email) => Some(email),
        Some(_) => return Err(AuthApiError::InvalidEmail),
        None => None,
    };

    let password_digest = match request.password {
        Some(password) if validate_password_syntax(&password) => {
            Some(state.credentials.hash_password(&password).map_err(|e| {
                tracing::error!(error = %e, "Failed to hash password");
                AuthApiError::Internal
            })?)
        }
        Some(_) => return Err(AuthApiError::InvalidPassword),
        None => None,
    };

    let role = match request.role {
        Some(role) => Some(Role::parse(&role).ok_or(AuthApiError::InvalidRole)?),
        None => None,
    };

    Ok(UserUpdate {
        email,
        password_digest,
        role,
        town_id: request.town_id,
        verified: request.verified,
    })
}

/// 사용자 삭제.
///
/// DELETE /auth/user/{id}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
    ClientIp(ip): ClientIp,
    JwtAuth(claims): JwtAuth,
) -> ApiResult<Json<StatusResponse>> {
    const ENDPOINT: &str = "/auth/user/delete";
    state.policy.authorize(Some(&claims), Action::DeleteUser)?;
    let user_id = parse_user_id(path)?;
    let ip = ip.to_string();

    match state.users.delete_user(user_id).await {
        Ok(true) => {}
        Ok(false) => return Err(AuthApiError::UserNotFound),
        Err(e) => return Err(store_failure(&state, ENDPOINT, Some(user_id), &ip, e).await),
    }

    state
        .audit
        .record(
            Some(user_id),
            &ip,
            format!("User deleted by {}", claims.email),
            AuditAction::DeleteUser,
        )
        .await;

    Ok(Json(StatusResponse::success("User deleted successfully")))
}

/// 감사 로그 조회.
///
/// GET /auth/logs
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    JwtAuth(claims): JwtAuth,
) -> ApiResult<Json<Vec<AuditEntry>>> {
    state.policy.authorize(Some(&claims), Action::ViewAuditLog)?;

    match state.audit.entries().await {
        Ok(entries) => Ok(Json(entries)),
        Err(e) => Err(store_failure(&state, "/auth/logs", None, &ip.to_string(), e).await),
    }
}

/// 인증 라우터 생성.
pub fn auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/admin/login", post(admin_login))
        .route("/user-info", get(user_info))
        .route("/users", get(list_users))
        .route("/user/{id}", put(update_user).delete(delete_user))
        .route("/logs", get(list_logs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_town_presence() {
        let absent: UpdateUserRequest = serde_json::from_str(r#"{"verified": true}"#).unwrap();
        assert_eq!(absent.town_id, None);

        let cleared: UpdateUserRequest = serde_json::from_str(r#"{"townID": null}"#).unwrap();
        assert_eq!(cleared.town_id, Some(None));

        let set: UpdateUserRequest = serde_json::from_str(r#"{"townID": 4}"#).unwrap();
        assert_eq!(set.town_id, Some(Some(4)));
    }

    #[test]
    fn test_register_request_ignores_role() {
        let request: RegisterRequest =
            serde_json::from_str(r#"{"email": "a@b.com", "password": "Abcdef12", "role": "admin"}"#)
                .unwrap();
        assert_eq!(request.email.as_deref(), Some("a@b.com"));
        assert_eq!(request.town_id, None);
    }

    #[test]
    fn test_validate_credentials() {
        assert!(validate_credentials(Some("a@b.com".into()), Some("Abcdef12".into())).is_ok());
        assert!(matches!(
            validate_credentials(None, Some("Abcdef12".into())),
            Err(AuthApiError::InvalidEmail)
        ));
        assert!(matches!(
            validate_credentials(Some("a@b.com".into()), Some("short".into())),
            Err(AuthApiError::InvalidPassword)
        ));
    }
}
