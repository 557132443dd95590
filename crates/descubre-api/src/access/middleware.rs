//! 접근 게이트 미들웨어.
//!
//! 라우트 단위 레이어(`route_layer`)로 적용되어 매칭된 경로 템플릿을
//! 라우트 키로 사용합니다. 규칙을 읽지 못하면 요청을 거부합니다.

use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::header::HOST,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::client_ip::client_ip;
use super::gate::{GateDecision, GateRequest};
use crate::error::AuthApiError;
use crate::metrics::record_gate_decision;
use crate::state::AppState;

/// 요청의 전체 URL을 재구성합니다 (`scheme://host/path?query`).
///
/// 스킴은 `X-Forwarded-Proto`, URI, `http` 순으로 결정합니다.
pub fn request_url(request: &Request) -> String {
    let uri = request.uri();
    let scheme = request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.scheme_str())
        .unwrap_or("http");
    let host = request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or("localhost");
    let path = uri.path_and_query().map_or("/", |pq| pq.as_str());

    format!("{}://{}{}", scheme, host, path)
}

/// 접근 게이트 미들웨어 함수.
pub async fn access_gate_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(request.headers(), request.extensions()).to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let url = request_url(&request);

    let gate_request = GateRequest {
        route: &route,
        url: &url,
        ip: &ip,
    };

    match state.gate.evaluate(&gate_request).await {
        Ok(GateDecision::Allow) => {
            record_gate_decision(GateDecision::Allow.label());
            next.run(request).await
        }
        Ok(decision @ GateDecision::Deny(reason)) => {
            record_gate_decision(decision.label());
            tracing::warn!(
                route = %route,
                client_ip = %ip,
                reason = reason.code(),
                "Request denied by access gate"
            );
            AuthApiError::Gate(reason).into_response()
        }
        Err(e) => {
            record_gate_decision("rules_unavailable");
            tracing::error!(route = %route, error = %e, "Failed to load access rules");
            AuthApiError::Internal.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_request_url_from_host_header() {
        let request = Request::builder()
            .uri("/auth/login?x=1")
            .header(HOST, "api.example.es")
            .header("x-forwarded-proto", "https")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_url(&request), "https://api.example.es/auth/login?x=1");
    }

    #[test]
    fn test_request_url_defaults() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(request_url(&request), "http://localhost/");
    }

    #[test]
    fn test_request_url_absolute_uri() {
        let request = Request::builder()
            .uri("http://localhost:44444/health")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_url(&request), "http://localhost:44444/health");
    }
}
