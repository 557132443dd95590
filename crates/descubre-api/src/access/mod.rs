//! 라우트 단위 IP 접근 제어.
//!
//! - `rules`: 규칙 문서와 공급자
//! - `gate`: 판단 로직
//! - `client_ip`: 호출자 IP 추출
//! - `middleware`: axum 미들웨어

pub mod client_ip;
pub mod gate;
pub mod middleware;
pub mod rules;

pub use client_ip::{client_ip, ClientIp};
pub use gate::{evaluate, AccessGate, DenyReason, GateDecision, GateRequest};
pub use middleware::access_gate_middleware;
pub use rules::{
    AccessRules, EndpointScope, FileRuleSource, RuleSource, RuleSourceError, StaticRuleSource, WILDCARD_ROUTE,
};
