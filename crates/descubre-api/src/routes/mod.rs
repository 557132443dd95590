//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/` - 호출자 IP 확인
//! - `/health` - 헬스 체크 (liveness)
//! - `/metrics` - Prometheus 메트릭
//! - `/auth/*` - 인증 및 사용자 관리
//!
//! 모든 API 라우트는 접근 게이트를 거친 뒤 핸들러에 도달합니다.
//! 레이어 순서(바깥부터): CORS → 타임아웃 → Trace → HTTP 메트릭 →
//! Rate Limiter → 접근 게이트 → 핸들러.

pub mod auth;
pub mod health;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use descubre_core::{CorsConfig, RateLimitSettings};

use crate::access::access_gate_middleware;
use crate::error::AuthApiError;
use crate::middleware::{metrics_layer, rate_limit_middleware, RateLimitConfig, RateLimitState};
use crate::state::AppState;

pub use auth::{auth_router, StatusResponse, TokenResponse, UpdateUserRequest, UserInfoResponse};
pub use health::{health_router, HealthResponse, IpResponse};

/// 요청 처리 타임아웃.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 접근 게이트가 적용된 API 라우터 생성.
pub fn create_api_router(state: Arc<AppState>) -> Router {
    gated_router(state, None)
}

/// `/metrics`를 포함해 모든 라우트에 접근 게이트를 적용합니다.
fn gated_router(state: Arc<AppState>, metrics_handle: Option<PrometheusHandle>) -> Router {
    let mut router = Router::new()
        .route("/", get(health::whoami))
        .nest("/health", health_router())
        .nest("/auth", auth_router());

    if let Some(handle) = metrics_handle {
        router = router.route("/metrics", get(move || metrics_handler(handle.clone())));
    }

    router
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            access_gate_middleware,
        ))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state)
}

async fn not_found() -> AuthApiError {
    AuthApiError::RouteNotFound
}

async fn method_not_allowed() -> AuthApiError {
    AuthApiError::MethodNotAllowed
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(handle: PrometheusHandle) -> impl IntoResponse {
    (StatusCode::OK, handle.render())
}

/// CORS 레이어 생성.
///
/// 허용 origin이 설정되지 않으면 모든 origin을 허용합니다 (개발 모드).
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .origins
        .iter()
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let (allow_origin, credentials) = if origins.is_empty() {
        if config.origins.is_empty() {
            warn!("CORS origins not set, allowing any origin (development mode)");
        } else {
            warn!("CORS origins contain no valid values, allowing any");
        }
        (AllowOrigin::any(), false)
    } else {
        info!("CORS configured with {} allowed origins", origins.len());
        (AllowOrigin::list(origins), true)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(credentials)
        .max_age(Duration::from_secs(3600))
}

/// 전체 애플리케이션 라우터 생성.
///
/// `rate_limit`이 `None`이면 Rate Limiter를 적용하지 않습니다.
pub fn create_app(
    state: Arc<AppState>,
    cors: &CorsConfig,
    rate_limit: Option<&RateLimitSettings>,
    metrics_handle: Option<PrometheusHandle>,
) -> Router {
    let api_router = gated_router(state, metrics_handle);

    let router = match rate_limit {
        Some(settings) => {
            let config = RateLimitConfig::from(settings);
            info!(
                requests_per_minute = config.requests_per_minute,
                burst_size = config.burst_size,
                "Rate limiting configured"
            );
            let rate_limit_state = RateLimitState::new(config);
            rate_limit_state.limiter().spawn_cleanup();
            api_router.layer(middleware::from_fn_with_state(
                rate_limit_state,
                rate_limit_middleware,
            ))
        }
        None => {
            info!("Rate limiting disabled");
            api_router
        }
    };

    router
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(cors_layer(cors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::StaticRuleSource;
    use crate::auth::TokenService;
    use crate::repository::MemoryStore;
    use axum::{body::Body, http::Request};
    use descubre_core::PasswordScheme;
    use secrecy::SecretString;
    use tower::ServiceExt;

    fn state() -> Arc<AppState> {
        let tokens = TokenService::new(&SecretString::from("routes-test-secret".to_string()), 30).unwrap();
        Arc::new(AppState::new(
            Arc::new(MemoryStore::new()),
            tokens,
            PasswordScheme::Sha512,
            Arc::new(StaticRuleSource::allow_all()),
        ))
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let response = create_api_router(state())
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_method_is_405() {
        let response = create_api_router(state())
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/auth/login")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_health_through_full_app() {
        let app = create_app(state(), &CorsConfig::default(), None, None);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_cors_layer_with_origins() {
        let _ = cors_layer(&CorsConfig {
            origins: vec!["https://andaluciadescubre.es".to_string()],
        });
        let _ = cors_layer(&CorsConfig::default());
    }
}
