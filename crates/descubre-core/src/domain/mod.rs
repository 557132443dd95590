//! 도메인 모델.
//!
//! - [`user`]: 사용자 계정과 역할
//! - [`audit`]: 감사 로그 레코드

pub mod audit;
pub mod user;

pub use audit::{AuditAction, AuditEntry, NewAuditEntry};
pub use user::{NewUser, Role, User, UserSummary, UserUpdate};
