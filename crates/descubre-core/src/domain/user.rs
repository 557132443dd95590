//! 사용자 계정 및 역할.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DescubreError;

/// 사용자 역할.
///
/// 두 역할은 평면 구조입니다. `Admin`이 `User`의 상위 역할로 취급되지 않습니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 일반 사용자
    #[default]
    User,
    /// 관리자
    Admin,
}

impl Role {
    /// 저장 및 토큰에 사용되는 문자열 표현.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// 문자열에서 역할 파싱.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::str::FromStr for Role {
    type Err = DescubreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s).ok_or_else(|| DescubreError::Validation(format!("알 수 없는 역할: {}", s)))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 저장된 사용자 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// 단조 증가하는 사용자 ID
    pub id: i64,
    /// 고유 이메일
    pub email: String,
    /// 비밀번호 다이제스트 (평문은 저장하지 않음)
    #[serde(skip_serializing)]
    pub password_digest: String,
    /// 역할
    pub role: Role,
    /// 소속 마을 ID (선택적)
    pub town_id: Option<i64>,
    /// 계정 인증 여부
    pub verified: bool,
    /// 가입 메타데이터 (예: `{"requested": 1717000000}`)
    pub dates: Value,
    /// 가입 요청 IP
    pub registered_ip: Option<String>,
}

/// 신규 사용자 입력.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: i64,
    pub email: String,
    pub password_digest: String,
    pub role: Role,
    pub town_id: Option<i64>,
    pub verified: bool,
    pub dates: Value,
    pub registered_ip: Option<String>,
}

impl NewUser {
    /// `NewUser`를 저장된 레코드로 변환합니다.
    pub fn into_user(self) -> User {
        User {
            id: self.id,
            email: self.email,
            password_digest: self.password_digest,
            role: self.role,
            town_id: self.town_id,
            verified: self.verified,
            dates: self.dates,
            registered_ip: self.registered_ip,
        }
    }
}

/// 관리자에 의한 사용자 부분 수정.
///
/// `None` 필드는 변경하지 않습니다. `town_id`는 값을 비우는 경우를 표현하기 위해
/// 이중 `Option`을 사용합니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub password_digest: Option<String>,
    pub role: Option<Role>,
    pub town_id: Option<Option<i64>>,
    pub verified: Option<bool>,
}

impl UserUpdate {
    /// 변경할 필드가 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password_digest.is_none()
            && self.role.is_none()
            && self.town_id.is_none()
            && self.verified.is_none()
    }

    /// 기존 레코드에 변경 사항을 적용합니다.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(digest) = &self.password_digest {
            user.password_digest = digest.clone();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(town_id) = self.town_id {
            user.town_id = town_id;
        }
        if let Some(verified) = self.verified {
            user.verified = verified;
        }
    }
}

/// 관리자 사용자 목록 항목 (마을 정보 포함).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(rename = "userID")]
    pub id: i64,
    pub email: String,
    #[serde(rename = "townID")]
    pub town_id: Option<i64>,
    pub dates: Value,
    pub verified: bool,
    pub role: Role,
    #[serde(rename = "townName")]
    pub town_name: Option<String>,
    #[serde(rename = "townImage")]
    pub town_image: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            town_id: user.town_id,
            dates: user.dates.clone(),
            verified: user.verified,
            role: user.role,
            town_name: None,
            town_image: None,
        }
    }
}
