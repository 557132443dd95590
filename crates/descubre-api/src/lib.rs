//! Andalucia Descubre 인증 및 접근 제어 API.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 자격증명 검증 및 비밀번호 다이제스트
//! - JWT 발급/검증
//! - 역할 기반 권한 정책
//! - 라우트 접근 게이트 (IP blacklist/whitelist, 도메인 제한)
//! - 감사 로그
//! - Axum 기반 REST API와 Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`auth`]: 토큰, 자격증명, 권한 정책
//! - [`access`]: 접근 게이트
//! - [`audit`]: 감사 로그
//! - [`repository`]: 사용자/감사 로그 저장소
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어

pub mod access;
pub mod audit;
pub mod auth;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod repository;
pub mod routes;
pub mod state;

pub use access::{
    AccessGate, AccessRules, DenyReason, EndpointScope, FileRuleSource, GateDecision,
    StaticRuleSource,
};
pub use audit::AuditLog;
pub use auth::{
    hash_password, verify_password, Action, AuthorizationPolicy, AuthzError, Claims,
    CredentialStore, JwtAuth, JwtError, TokenService,
};
pub use error::{ApiErrorResponse, ApiResult, AuthApiError};
pub use metrics::setup_metrics_recorder;
pub use middleware::metrics_layer;
pub use repository::{AuditStore, MemoryStore, PgStore, StoreError, UserStore};
pub use routes::*;
pub use state::AppState;
