/// In-memory store backend
///
/// Every operation runs under one write (or read) lock, which gives the same
/// atomicity the SQLite backend gets from single statements.
use super::{
    Item, ItemChange, ItemCondition, ItemFilter, ItemId, ItemStore, NewItem, NewUser, StoreError,
    StoreResult, User, UserCondition, UserFilter, UserId, UserPatch, UserStore,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug)]
struct Table<T> {
    next_id: i64,
    rows: BTreeMap<i64, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Users and items held in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<Table<User>>,
    items: RwLock<Table<Item>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, filter: &UserFilter) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        let found = users.rows.values().find(|user| match filter {
            UserFilter::Id(id) => user.id == *id,
            UserFilter::Username(username) => user.username == *username,
            UserFilter::Email(email) => user.email == *email,
            UserFilter::ResetToken(token) => user
                .reset
                .as_ref()
                .map(|reset| reset.token == *token)
                .unwrap_or(false),
        });
        Ok(found.cloned())
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut users = self.users.write().await;

        if users.rows.values().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate { field: "username" });
        }
        if users.rows.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate { field: "email" });
        }

        let id = users.allocate_id();
        let now = Utc::now();
        let record = User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            password_reset: false,
            reset: None,
            created_at: now,
            updated_at: now,
        };
        users.rows.insert(id, record.clone());

        Ok(record)
    }

    async fn update_user_if(
        &self,
        id: UserId,
        expected: UserCondition,
        patch: UserPatch,
    ) -> StoreResult<u64> {
        let mut users = self.users.write().await;
        let Some(user) = users.rows.get_mut(&id).filter(|user| user.matches(&expected)) else {
            return Ok(0);
        };

        if let Some(hash) = patch.password_hash {
            user.password_hash = hash;
        }
        if let Some(flag) = patch.password_reset {
            user.password_reset = flag;
        }
        if let Some(reset) = patch.reset {
            user.reset = reset;
        }
        user.updated_at = Utc::now();

        Ok(1)
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn find_items(&self, filter: ItemFilter) -> StoreResult<Vec<Item>> {
        let items = self.items.read().await;
        let mut selected: Vec<Item> = items
            .rows
            .values()
            .filter(|item| item.selected_by(filter))
            .cloned()
            .collect();
        selected.sort_by(Item::listing_order);
        Ok(selected)
    }

    async fn find_item(&self, id: ItemId) -> StoreResult<Option<Item>> {
        Ok(self.items.read().await.rows.get(&id).cloned())
    }

    async fn create_item(&self, item: NewItem) -> StoreResult<Item> {
        let mut items = self.items.write().await;
        let id = items.allocate_id();
        let now = Utc::now();
        let record = Item {
            id,
            name: item.name,
            url: item.url,
            rank: item.rank,
            reserved_by: None,
            created_at: now,
            updated_at: now,
        };
        items.rows.insert(id, record.clone());
        Ok(record)
    }

    async fn update_item_if(
        &self,
        id: ItemId,
        expected: ItemCondition,
        change: ItemChange,
    ) -> StoreResult<u64> {
        let mut items = self.items.write().await;
        match items.rows.get_mut(&id) {
            Some(item) if item.matches(expected) => {
                change.apply(item);
                item.updated_at = Utc::now();
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn delete_item(&self, id: ItemId) -> StoreResult<u64> {
        let mut items = self.items.write().await;
        Ok(items.rows.remove(&id).map(|_| 1).unwrap_or(0))
    }
}

/// A backend whose every call fails
#[cfg(test)]
#[derive(Debug, Default)]
pub struct UnavailableStore;

#[cfg(test)]
impl UnavailableStore {
    fn down<T>() -> StoreResult<T> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
}

#[cfg(test)]
#[async_trait]
impl UserStore for UnavailableStore {
    async fn find_user(&self, _filter: &UserFilter) -> StoreResult<Option<User>> {
        Self::down()
    }

    async fn create_user(&self, _user: NewUser) -> StoreResult<User> {
        Self::down()
    }

    async fn update_user_if(
        &self,
        _id: UserId,
        _expected: UserCondition,
        _patch: UserPatch,
    ) -> StoreResult<u64> {
        Self::down()
    }
}

#[cfg(test)]
#[async_trait]
impl ItemStore for UnavailableStore {
    async fn find_items(&self, _filter: ItemFilter) -> StoreResult<Vec<Item>> {
        Self::down()
    }

    async fn find_item(&self, _id: ItemId) -> StoreResult<Option<Item>> {
        Self::down()
    }

    async fn create_item(&self, _item: NewItem) -> StoreResult<Item> {
        Self::down()
    }

    async fn update_item_if(
        &self,
        _id: ItemId,
        _expected: ItemCondition,
        _change: ItemChange,
    ) -> StoreResult<u64> {
        Self::down()
    }

    async fn delete_item(&self, _id: ItemId) -> StoreResult<u64> {
        Self::down()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
            email: email.to_string(),
            first_name: "First".to_string(),
            last_name: "Last".to_string(),
        }
    }

    #[tokio::test]
    async fn test_new_store_starts_empty() {
        let store = MemoryStore::new();
        assert!(store.find_items(ItemFilter::All).await.unwrap().is_empty());
        assert!(store
            .find_user(&UserFilter::Username("alice".to_string()))
            .await
            .unwrap()
            .is_none());

        let user = store.create_user(new_user("alice", "a@x.com")).await.unwrap();
        assert_eq!(user.id, 1);
    }

    #[tokio::test]
    async fn test_conditional_user_update_checks_reset_token() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("alice", "a@x.com")).await.unwrap();
        let now = Utc::now();
        let token = "ab".repeat(20);

        let expected = UserCondition::HoldsResetToken {
            token: token.clone(),
            now,
        };
        let clear = UserPatch {
            reset: Some(None),
            ..Default::default()
        };

        // nothing issued yet
        let rows = store
            .update_user_if(user.id, expected.clone(), clear.clone())
            .await
            .unwrap();
        assert_eq!(rows, 0);

        store
            .update_user(
                user.id,
                UserPatch {
                    reset: Some(Some(crate::store::ResetToken {
                        token,
                        expires_at: now + chrono::Duration::hours(1),
                    })),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(
            store.update_user_if(user.id, expected.clone(), clear.clone()).await.unwrap(),
            1
        );
        assert_eq!(store.update_user_if(user.id, expected, clear).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unique_username_and_email() {
        let store = MemoryStore::new();
        store.create_user(new_user("alice", "a@x.com")).await.unwrap();

        let err = store.create_user(new_user("alice", "b@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { field: "username" }));

        let err = store.create_user(new_user("bob", "a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { field: "email" }));
    }

    #[tokio::test]
    async fn test_conditional_update_reports_rows() {
        let store = MemoryStore::new();
        let item = store
            .create_item(NewItem {
                name: "Kettle".to_string(),
                url: "https://example.com/kettle".to_string(),
                rank: 1,
            })
            .await
            .unwrap();

        let first = store
            .update_item_if(item.id, ItemCondition::Available, ItemChange::Reserve(1))
            .await
            .unwrap();
        let second = store
            .update_item_if(item.id, ItemCondition::Available, ItemChange::Reserve(2))
            .await
            .unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 0);

        let stored = store.find_item(item.id).await.unwrap().unwrap();
        assert_eq!(stored.reserved_by, Some(1));

        let missing = store
            .update_item_if(999, ItemCondition::Exists, ItemChange::Rank(3))
            .await
            .unwrap();
        assert_eq!(missing, 0);
    }
}
