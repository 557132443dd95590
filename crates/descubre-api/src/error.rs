//! 통합 API 에러 응답 타입.
//!
//! 모든 엔드포인트와 미들웨어는 `AuthApiError`로 실패를 표현하며,
//! 응답 본문은 항상 `ApiErrorResponse` 형식입니다.
//!
//! ```json
//! {
//!   "code": "EMAIL_ALREADY_REGISTERED",
//!   "message": "이미 등록된 이메일입니다",
//!   "timestamp": 1738300800
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::access::DenyReason;
use crate::auth::{AuthzError, JwtError};
use crate::repository::StoreError;

/// API 에러 응답 본문.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "INVALID_EMAIL", "FORBIDDEN")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 에러 발생 타임스탬프 (Unix timestamp)
    pub timestamp: i64,
}

impl ApiErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// 요청 경계에서 사용하는 에러.
///
/// 검증, 인증, 권한, 충돌, 내부 에러를 구분합니다. 내부 에러는 상세 내용을
/// 응답에 포함하지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum AuthApiError {
    // ===== 검증 (400) =====
    #[error("요청 본문이 올바른 JSON이 아닙니다")]
    InvalidJson,
    #[error("이메일 형식이 올바르지 않습니다")]
    InvalidEmail,
    #[error("비밀번호 형식이 올바르지 않습니다")]
    InvalidPassword,
    #[error("알 수 없는 역할입니다")]
    InvalidRole,
    #[error("수정할 필드가 없습니다")]
    NoFields,
    #[error("사용자 ID는 정수여야 합니다")]
    InvalidUserId,

    // ===== 인증 (401/403/404) =====
    #[error("인증 토큰이 필요합니다")]
    MissingToken,
    #[error("잘못된 Authorization 헤더 형식")]
    InvalidAuthHeader,
    #[error("유효하지 않은 토큰")]
    InvalidToken,
    #[error("토큰이 만료되었습니다")]
    TokenExpired,
    #[error("비밀번호가 일치하지 않습니다")]
    WrongPassword,
    #[error("인증되지 않은 계정입니다")]
    AccountNotVerified,
    #[error("등록되지 않은 계정입니다")]
    AccountNotFound,

    // ===== 권한 (403) =====
    #[error("권한이 부족합니다")]
    Forbidden,

    // ===== 충돌/대상 없음 =====
    #[error("이미 등록된 이메일입니다")]
    EmailTaken,
    #[error("사용자를 찾을 수 없습니다")]
    UserNotFound,

    // ===== 접근 게이트 =====
    #[error("{}", .0.message())]
    Gate(DenyReason),

    // ===== 라우팅 =====
    #[error("요청한 경로를 찾을 수 없습니다")]
    RouteNotFound,
    #[error("허용되지 않은 메서드입니다")]
    MethodNotAllowed,

    // ===== 내부 (500) =====
    #[error("내부 서버 에러가 발생했습니다")]
    Internal,
}

impl AuthApiError {
    /// HTTP 상태 코드.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthApiError::InvalidJson
            | AuthApiError::InvalidEmail
            | AuthApiError::InvalidPassword
            | AuthApiError::InvalidRole
            | AuthApiError::NoFields
            | AuthApiError::InvalidUserId => StatusCode::BAD_REQUEST,
            AuthApiError::MissingToken
            | AuthApiError::InvalidAuthHeader
            | AuthApiError::InvalidToken
            | AuthApiError::TokenExpired
            | AuthApiError::WrongPassword => StatusCode::UNAUTHORIZED,
            AuthApiError::AccountNotVerified | AuthApiError::Forbidden => StatusCode::FORBIDDEN,
            AuthApiError::AccountNotFound
            | AuthApiError::UserNotFound
            | AuthApiError::RouteNotFound => StatusCode::NOT_FOUND,
            AuthApiError::EmailTaken => StatusCode::CONFLICT,
            AuthApiError::Gate(reason) => reason.status(),
            AuthApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AuthApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 응답 에러 코드.
    pub fn code(&self) -> &'static str {
        match self {
            AuthApiError::InvalidJson => "INVALID_JSON",
            AuthApiError::InvalidEmail => "INVALID_EMAIL",
            AuthApiError::InvalidPassword | AuthApiError::WrongPassword => "INVALID_PASSWORD",
            AuthApiError::InvalidRole => "INVALID_ROLE",
            AuthApiError::NoFields => "NO_FIELDS",
            AuthApiError::InvalidUserId => "INVALID_USER_ID",
            AuthApiError::MissingToken => "MISSING_TOKEN",
            AuthApiError::InvalidAuthHeader => "INVALID_AUTH_HEADER",
            AuthApiError::InvalidToken => "INVALID_TOKEN",
            AuthApiError::TokenExpired => "TOKEN_EXPIRED",
            AuthApiError::AccountNotVerified => "ACCOUNT_NOT_VERIFIED",
            AuthApiError::AccountNotFound => "ACCOUNT_NOT_FOUND",
            AuthApiError::Forbidden => "FORBIDDEN",
            AuthApiError::EmailTaken => "EMAIL_ALREADY_REGISTERED",
            AuthApiError::UserNotFound => "USER_NOT_FOUND",
            AuthApiError::Gate(reason) => reason.code(),
            AuthApiError::RouteNotFound => "NOT_FOUND",
            AuthApiError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            AuthApiError::Internal => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse::new(self.code(), self.to_string());
        (self.status(), Json(body)).into_response()
    }
}

impl From<JwtError> for AuthApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthApiError::TokenExpired,
            JwtError::Malformed => AuthApiError::InvalidToken,
            JwtError::EncodingError(_) | JwtError::InvalidTtl(_) => AuthApiError::Internal,
        }
    }
}

impl From<AuthzError> for AuthApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated => AuthApiError::MissingToken,
            AuthzError::Forbidden => AuthApiError::Forbidden,
        }
    }
}

impl From<StoreError> for AuthApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(_) => AuthApiError::EmailTaken,
            StoreError::Backend(_) => AuthApiError::Internal,
        }
    }
}

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, AuthApiError>;
