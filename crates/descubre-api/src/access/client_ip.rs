//! 호출자 IP 추출.
//!
//! 우선순위는 다음과 같습니다. 접근 게이트, 감사 로그, Rate Limiter가 모두 같은
//! 규칙을 사용합니다.
//!
//! 1. `CF-Connecting-IP` 헤더 (리버스 프록시가 설정, 파싱 가능한 경우)
//! 2. 전송 계층 피어 주소 (`ConnectInfo<SocketAddr>`)
//! 3. `127.0.0.1`

use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{request::Parts, Extensions, HeaderMap};

/// 신뢰하는 리버스 프록시 헤더.
pub const PROXY_IP_HEADER: &str = "cf-connecting-ip";

/// 주소를 알 수 없을 때 사용하는 값.
pub const FALLBACK_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// 헤더와 연결 정보에서 호출자 IP를 결정합니다.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> IpAddr {
    if let Some(ip) = headers
        .get(PROXY_IP_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<IpAddr>().ok())
    {
        return ip;
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(FALLBACK_IP)
}

/// 호출자 IP 추출기. 실패하지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(&parts.headers, &parts.extensions)))
    }
}
