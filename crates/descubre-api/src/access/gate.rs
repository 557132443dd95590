//! 접근 게이트.
//!
//! 핸들러 실행 전에 라우트와 호출자 IP를 규칙과 대조합니다. 판단 순서는
//! 고정되어 있습니다.
//!
//! 1. 전역(`*`) 차단 목록
//! 2. 라우트 차단 목록
//! 3. 허용 URL 접두사
//! 4. 라우트 허용 목록이 없으면 허용
//! 5. 라우트 또는 전역 허용 목록에 있으면 허용, 아니면 거부
//!
//! 차단과 도메인 검사는 허용 목록보다 항상 먼저 평가됩니다.

use std::sync::Arc;

use axum::http::StatusCode;

use super::rules::{AccessRules, RuleSource, RuleSourceError, WILDCARD_ROUTE};

/// 게이트 평가 입력.
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    /// 라우트 키 (예: `/auth/login`)
    pub route: &'a str,
    /// 요청 전체 URL (스킴, 호스트 포함)
    pub url: &'a str,
    /// 호출자 IP
    pub ip: &'a str,
}

/// 거부 사유.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Blacklisted,
    BadDomain,
    NotWhitelisted,
}

impl DenyReason {
    /// 응답 상태 코드.
    pub fn status(&self) -> StatusCode {
        match self {
            DenyReason::Blacklisted => StatusCode::UNAUTHORIZED,
            DenyReason::BadDomain | DenyReason::NotWhitelisted => StatusCode::FORBIDDEN,
        }
    }

    /// 응답 에러 코드.
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::Blacklisted => "BLACKLISTED",
            DenyReason::BadDomain => "BAD_DOMAIN",
            DenyReason::NotWhitelisted => "NOT_WHITELISTED",
        }
    }

    /// 응답 메시지.
    pub fn message(&self) -> &'static str {
        match self {
            DenyReason::Blacklisted => "차단된 IP입니다",
            DenyReason::BadDomain => "허용되지 않은 도메인입니다",
            DenyReason::NotWhitelisted => "허용 목록에 없는 IP입니다",
        }
    }
}

/// 게이트 판단 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Deny(DenyReason),
}

impl GateDecision {
    /// 메트릭 라벨.
    pub fn label(&self) -> &'static str {
        match self {
            GateDecision::Allow => "allow",
            GateDecision::Deny(DenyReason::Blacklisted) => "blacklisted",
            GateDecision::Deny(DenyReason::BadDomain) => "bad_domain",
            GateDecision::Deny(DenyReason::NotWhitelisted) => "not_whitelisted",
        }
    }
}

/// 규칙만으로 요청을 평가합니다. I/O가 없습니다.
pub fn evaluate(rules: &AccessRules, request: &GateRequest<'_>) -> GateDecision {
    let GateRequest { route, url, ip } = *request;

    if rules.is_blacklisted(WILDCARD_ROUTE, ip) || rules.is_blacklisted(route, ip) {
        return GateDecision::Deny(DenyReason::Blacklisted);
    }

    if !rules.is_permitted_url(url) {
        return GateDecision::Deny(DenyReason::BadDomain);
    }

    if !rules.has_whitelist(route) {
        return GateDecision::Allow;
    }

    if rules.is_whitelisted(route, ip) || rules.is_whitelisted(WILDCARD_ROUTE, ip) {
        GateDecision::Allow
    } else {
        GateDecision::Deny(DenyReason::NotWhitelisted)
    }
}

/// 규칙 공급자와 연결된 접근 게이트.
#[derive(Clone)]
pub struct AccessGate {
    source: Arc<dyn RuleSource>,
}

impl AccessGate {
    pub fn new(source: Arc<dyn RuleSource>) -> Self {
        Self { source }
    }

    /// 최신 규칙을 읽어 요청을 평가합니다.
    pub async fn evaluate(&self, request: &GateRequest<'_>) -> Result<GateDecision, RuleSourceError> {
        let rules = self.source.load().await?;
        Ok(evaluate(&rules, request))
    }
}
