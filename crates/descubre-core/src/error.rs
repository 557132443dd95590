//! 서비스 공통 에러 타입.
//!
//! 이 모듈은 크레이트 경계를 넘어 전달되는 에러 타입을 정의합니다.

use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Error)]
pub enum DescubreError {
    /// 입력 검증 에러
    #[error("잘못된 입력: {0}")]
    Validation(String),
}
