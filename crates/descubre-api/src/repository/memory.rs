//! 인메모리 저장소.
//!
//! 개발 모드와 테스트에서 사용합니다. 고유성 검사는 쓰기 잠금 안에서
//! 수행되므로 동시 가입 요청에서도 이메일 중복이 생기지 않습니다.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use descubre_core::{AuditEntry, NewAuditEntry, NewUser, User, UserSummary, UserUpdate};

use super::{AuditStore, StoreError, UserStore};

/// 마을 표시 정보 (이름, 이미지).
#[derive(Debug, Clone)]
struct Town {
    name: String,
    image: Option<String>,
}

/// 인메모리 사용자/감사 로그 저장소.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<BTreeMap<i64, User>>,
    audit: RwLock<Vec<AuditEntry>>,
    towns: RwLock<HashMap<i64, Town>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 사용자 목록 조인에 사용할 마을 정보 등록.
    pub async fn insert_town(&self, id: i64, name: impl Into<String>, image: Option<String>) {
        self.towns.write().await.insert(
            id,
            Town {
                name: name.into(),
                image,
            },
        );
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn user_exists(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.users.read().await.values().any(|u| u.email == email))
    }

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn fetch_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("email".to_string()));
        }
        if users.contains_key(&user.id) {
            return Err(StoreError::Duplicate("userID".to_string()));
        }

        let user = user.into_user();
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        if let Some(email) = &update.email {
            if users.values().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::Duplicate("email".to_string()));
            }
        }

        match users.get_mut(&id) {
            Some(user) => {
                update.apply_to(user);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }

    async fn next_id(&self) -> Result<i64, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .keys()
            .next_back()
            .map_or(1, |max| max + 1))
    }

    async fn list_users(&self) -> Result<Vec<UserSummary>, StoreError> {
        let users = self.users.read().await;
        let towns = self.towns.read().await;

        Ok(users
            .values()
            .map(|user| {
                let mut summary = UserSummary::from(user);
                if let Some(town) = user.town_id.and_then(|id| towns.get(&id)) {
                    summary.town_name = Some(town.name.clone());
                    summary.town_image = town.image.clone();
                }
                summary
            })
            .collect())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append_audit_entry(&self, entry: NewAuditEntry) -> Result<i64, StoreError> {
        let mut audit = self.audit.write().await;
        let id = audit.last().map_or(1, |last| last.id + 1);
        audit.push(AuditEntry::from_new(id, entry));
        Ok(id)
    }

    async fn list_audit_entries(&self) -> Result<Vec<AuditEntry>, StoreError> {
        Ok(self.audit.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use descubre_core::{AuditAction, Role};
    use serde_json::json;

    fn new_user(id: i64, email: &str) -> NewUser {
        NewUser {
            id,
            email: email.to_string(),
            password_digest: "digest".to_string(),
            role: Role::User,
            town_id: Some(2),
            verified: false,
            dates: json!({"requested": 1}),
            registered_ip: Some("127.0.0.1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let store = MemoryStore::new();
        assert_eq!(store.next_id().await.unwrap(), 1);

        store.insert_user(new_user(1, "a@b.com")).await.unwrap();

        assert!(store.user_exists("a@b.com").await.unwrap());
        assert_eq!(store.next_id().await.unwrap(), 2);
        let user = store.fetch_user_by_email("a@b.com").await.unwrap().unwrap();
        assert_eq!(user.id, 1);
        assert!(store.fetch_user_by_id(9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        store.insert_user(new_user(1, "a@b.com")).await.unwrap();

        let err = store.insert_user(new_user(2, "a@b.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(ref f) if f == "email"));
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_rejects_taken_email() {
        let store = MemoryStore::new();
        store.insert_user(new_user(1, "a@b.com")).await.unwrap();
        store.insert_user(new_user(2, "c@d.com")).await.unwrap();

        let update = UserUpdate {
            email: Some("a@b.com".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            store.update_user(2, &update).await,
            Err(StoreError::Duplicate(_))
        ));

        // 자기 자신의 이메일로 수정하는 것은 허용
        assert!(store.update_user(1, &update).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_user() {
        let store = MemoryStore::new();
        let update = UserUpdate {
            verified: Some(true),
            ..Default::default()
        };
        assert!(!store.update_user(5, &update).await.unwrap());
        assert!(!store.delete_user(5).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_users_joins_towns() {
        let store = MemoryStore::new();
        store
            .insert_town(2, "Ronda", Some("ronda.jpg".to_string()))
            .await;
        store.insert_user(new_user(1, "a@b.com")).await.unwrap();

        let users = store.list_users().await.unwrap();
        assert_eq!(users[0].town_name.as_deref(), Some("Ronda"));
        assert_eq!(users[0].town_image.as_deref(), Some("ronda.jpg"));
    }

    #[tokio::test]
    async fn test_audit_append_assigns_ids() {
        let store = MemoryStore::new();
        let first = store
            .append_audit_entry(NewAuditEntry::now(
                Some(1),
                "127.0.0.1",
                "User registered",
                AuditAction::Register,
            ))
            .await
            .unwrap();
        let second = store
            .append_audit_entry(NewAuditEntry::now(
                None,
                "127.0.0.1",
                "Invalid JSON",
                AuditAction::InvalidRequest,
            ))
            .await
            .unwrap();

        assert_eq!((first, second), (1, 2));
        let entries = store.list_audit_entries().await.unwrap();
        assert_eq!(entries[1].action, "invalid_request");
    }
}
