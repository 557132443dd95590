//! 헬스 체크 및 호출자 IP 확인 endpoint.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::access::ClientIp;
use crate::state::AppState;

/// 호출자 IP 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct IpResponse {
    pub your_ip: String,
}

/// 서버 정보 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: i64,
}

/// 호출자 IP 확인.
///
/// GET /
pub async fn whoami(ClientIp(ip): ClientIp) -> Json<IpResponse> {
    Json(IpResponse {
        your_ip: ip.to_string(),
    })
}

/// 간단한 헬스 체크 (liveness 확인용).
///
/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// 버전과 업타임.
///
/// GET /health/info
pub async fn health_info(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
    })
}

/// 헬스 체크 라우터 생성.
pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/info", get(health_info))
}
