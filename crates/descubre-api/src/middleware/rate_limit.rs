//! 호출자 IP별 요청 빈도 제한.
//!
//! IP마다 요청 예산(budget)을 두고, 예산은 분당 허용량에 비례해 계속
//! 채워집니다. 예산 상한은 초당 허용량에 버스트 허용량을 더한 값입니다.
//! 호출자 식별은 접근 게이트와 같은 IP 추출 규칙을 따릅니다.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use tokio::sync::Mutex;

use descubre_core::RateLimitSettings;

use crate::access::client_ip;
use crate::error::ApiErrorResponse;

/// 유휴 예산을 정리하는 주기.
const IDLE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Rate Limiter 설정.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// 분당 허용 요청 수
    pub requests_per_minute: u32,
    /// 순간적으로 추가 허용되는 요청 수
    pub burst_size: u32,
    /// 이 시간 동안 요청이 없던 IP의 예산은 정리됩니다
    pub idle_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::from(&RateLimitSettings::default())
    }
}

impl From<&RateLimitSettings> for RateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            requests_per_minute: settings.requests_per_minute,
            burst_size: settings.burst_size,
            idle_timeout: IDLE_SWEEP_INTERVAL,
        }
    }
}

/// 한 IP의 남은 예산.
#[derive(Debug, Clone, Copy)]
struct CallerBudget {
    available: f64,
    updated_at: Instant,
}

/// Rate Limit 확인 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitResult {
    /// 요청 허용됨
    Allowed,
    /// 예산 소진. 재시도까지 대기 시간 (초)
    Limited { retry_after: u64 },
}

/// IP 주소별 Rate Limiter.
#[derive(Clone)]
pub struct RateLimiter {
    /// 초당 충전량
    refill_per_sec: f64,
    /// 예산 상한
    capacity: f64,
    idle_timeout: Duration,
    budgets: Arc<Mutex<HashMap<IpAddr, CallerBudget>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let refill_per_sec = f64::from(config.requests_per_minute) / 60.0;
        Self {
            refill_per_sec,
            capacity: refill_per_sec + f64::from(config.burst_size),
            idle_timeout: config.idle_timeout,
            budgets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 현재 시각 기준으로 요청 하나를 차감합니다.
    pub async fn check(&self, ip: IpAddr) -> RateLimitResult {
        self.check_at(ip, Instant::now()).await
    }

    /// 주어진 시각 기준으로 요청 하나를 차감합니다.
    pub async fn check_at(&self, ip: IpAddr, now: Instant) -> RateLimitResult {
        let mut budgets = self.budgets.lock().await;
        let budget = budgets.entry(ip).or_insert(CallerBudget {
            available: self.capacity,
            updated_at: now,
        });

        let elapsed = now.saturating_duration_since(budget.updated_at).as_secs_f64();
        budget.available = (budget.available + elapsed * self.refill_per_sec).min(self.capacity);
        budget.updated_at = now;

        if budget.available >= 1.0 {
            budget.available -= 1.0;
            return RateLimitResult::Allowed;
        }

        let retry_after = if self.refill_per_sec > 0.0 {
            ((1.0 - budget.available) / self.refill_per_sec).ceil() as u64
        } else {
            u64::MAX
        };
        RateLimitResult::Limited { retry_after }
    }

    /// `now` 기준으로 유휴 시간이 지난 예산을 제거합니다.
    pub async fn sweep_idle(&self, now: Instant) {
        let idle_timeout = self.idle_timeout;
        self.budgets
            .lock()
            .await
            .retain(|_, budget| now.saturating_duration_since(budget.updated_at) < idle_timeout);
    }

    /// 주기적으로 유휴 예산을 정리하는 백그라운드 태스크를 시작합니다.
    pub fn spawn_cleanup(&self) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(IDLE_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                limiter.sweep_idle(Instant::now()).await;
            }
        })
    }

    /// 예산을 추적 중인 IP 수.
    pub async fn tracked_ips(&self) -> usize {
        self.budgets.lock().await.len()
    }
}

/// Rate Limit 미들웨어 상태.
#[derive(Clone)]
pub struct RateLimitState {
    limiter: RateLimiter,
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            limiter: RateLimiter::new(config),
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

/// Rate Limiting 미들웨어 함수.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(request.headers(), request.extensions());

    let RateLimitResult::Limited { retry_after } = state.limiter.check(ip).await else {
        counter!("rate_limit_requests_total", "status" => "allowed").increment(1);
        return next.run(request).await;
    };

    counter!("rate_limit_requests_total", "status" => "limited").increment(1);
    tracing::warn!(client_ip = %ip, retry_after, "Rate limit exceeded");

    let body = ApiErrorResponse::new(
        "RATE_LIMITED",
        "요청이 너무 많습니다. 잠시 후 다시 시도하세요",
    );
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn limiter(requests_per_minute: u32, burst_size: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            requests_per_minute,
            burst_size,
            idle_timeout: Duration::from_secs(60),
        })
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_burst_then_limited() {
        let limiter = limiter(60, 5);
        let now = Instant::now();

        // 초당 1 + 버스트 5
        for _ in 0..6 {
            assert_eq!(limiter.check_at(ip("192.168.1.1"), now).await, RateLimitResult::Allowed);
        }
        assert_eq!(
            limiter.check_at(ip("192.168.1.1"), now).await,
            RateLimitResult::Limited { retry_after: 1 }
        );
    }

    #[tokio::test]
    async fn test_budget_refills_over_time() {
        let limiter = limiter(60, 0);
        let start = Instant::now();
        let caller = ip("10.0.0.1");

        assert_eq!(limiter.check_at(caller, start).await, RateLimitResult::Allowed);
        assert!(matches!(
            limiter.check_at(caller, start).await,
            RateLimitResult::Limited { .. }
        ));
        assert_eq!(
            limiter.check_at(caller, start + Duration::from_secs(1)).await,
            RateLimitResult::Allowed
        );
    }

    #[tokio::test]
    async fn test_callers_have_separate_budgets() {
        let limiter = limiter(60, 0);
        let now = Instant::now();

        assert_eq!(limiter.check_at(ip("192.168.1.1"), now).await, RateLimitResult::Allowed);
        assert!(matches!(
            limiter.check_at(ip("192.168.1.1"), now).await,
            RateLimitResult::Limited { .. }
        ));
        assert_eq!(limiter.check_at(ip("192.168.1.2"), now).await, RateLimitResult::Allowed);
    }

    #[tokio::test]
    async fn test_sweep_drops_idle_callers_only() {
        let limiter = limiter(60, 0);
        let start = Instant::now();

        limiter.check_at(ip("10.0.0.1"), start).await;
        limiter.check_at(ip("10.0.0.2"), start + Duration::from_secs(50)).await;
        assert_eq!(limiter.tracked_ips().await, 2);

        limiter.sweep_idle(start + Duration::from_secs(70)).await;
        assert_eq!(limiter.tracked_ips().await, 1);
    }

    #[test]
    fn test_config_from_settings() {
        let config = RateLimitConfig::from(&RateLimitSettings {
            enabled: true,
            requests_per_minute: 600,
            burst_size: 60,
        });
        assert_eq!(config.requests_per_minute, 600);
        assert_eq!(config.burst_size, 60);
    }

    #[tokio::test]
    async fn test_middleware_returns_429_with_retry_after() {
        let state = RateLimitState::new(RateLimitConfig {
            requests_per_minute: 60,
            burst_size: 0,
            idle_timeout: Duration::from_secs(60),
        });
        let app = Router::new()
            .route("/", get(|| async { "OK" }))
            .layer(middleware::from_fn_with_state(state, rate_limit_middleware));

        let request = || {
            Request::builder()
                .uri("/")
                .header("cf-connecting-ip", "198.51.100.4")
                .body(Body::empty())
                .unwrap()
        };

        let first = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key(RETRY_AFTER));
    }
}
