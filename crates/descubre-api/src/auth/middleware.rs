//! Axum용 JWT 인증 추출기.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use super::jwt::{Claims, JwtError};
use crate::error::AuthApiError;
use crate::state::AppState;

/// JWT 인증 추출기.
///
/// `Authorization: Bearer <token>` 헤더를 검증하고 Claims를 제공합니다.
///
/// # 사용 예시
///
/// ```rust,ignore
/// async fn protected_handler(
///     JwtAuth(claims): JwtAuth,
/// ) -> impl IntoResponse {
///     format!("Authenticated user: {}", claims.email)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct JwtAuth(pub Claims);

/// Authorization 헤더에서 Bearer 토큰을 꺼냅니다.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthApiError::MissingToken)?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthApiError::InvalidAuthHeader)
}

impl FromRequestParts<Arc<AppState>> for JwtAuth {
    type Rejection = AuthApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;

        let claims = state.tokens.verify(token).map_err(|e| {
            if matches!(e, JwtError::Expired) {
                tracing::debug!("Rejected expired token");
            } else {
                tracing::debug!(error = %e, "Rejected invalid token");
            }
            AuthApiError::from(e)
        })?;

        Ok(JwtAuth(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthApiError::MissingToken)
        ));
    }

    #[test]
    fn test_wrong_scheme() {
        assert!(matches!(
            bearer_token(&headers("Basic dXNlcjpwYXNz")),
            Err(AuthApiError::InvalidAuthHeader)
        ));
        assert!(matches!(
            bearer_token(&headers("Bearer ")),
            Err(AuthApiError::InvalidAuthHeader)
        ));
    }
}
