/// Storage collaborators
///
/// The workflows only see these traits. Backends live in `db` (SQLite) and
/// `memory`; both must honour the same guarantees:
///
/// - `create_user` rejects a second user with the same username or email
///   with [`StoreError::Duplicate`], whatever checks ran before it.
/// - `update_user_if` and `update_item_if` check the condition and write in
///   one atomic step and report how many rows they changed (0 or 1).
/// - Listings come back ordered by rank ascending, then id descending.

pub mod memory;
pub mod models;

pub use models::*;

use async_trait::async_trait;
use thiserror::Error;

/// Failures raised by a store backend
#[derive(Error, Debug)]
pub enum StoreError {
    /// Unique constraint violation on `field`
    #[error("Duplicate value for unique field {field}")]
    Duplicate { field: &'static str },

    /// Backend errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row that cannot be mapped to a record
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Credential store
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find the single user matching `filter`
    async fn find_user(&self, filter: &UserFilter) -> StoreResult<Option<User>>;

    /// Insert a user and return it with its assigned id
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;

    /// Apply `patch` only if the user exists and satisfies `expected`
    async fn update_user_if(
        &self,
        id: UserId,
        expected: UserCondition,
        patch: UserPatch,
    ) -> StoreResult<u64>;

    /// Apply a partial update; returns the number of rows changed
    async fn update_user(&self, id: UserId, patch: UserPatch) -> StoreResult<u64> {
        self.update_user_if(id, UserCondition::Exists, patch).await
    }
}

/// Item store
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Items selected by `filter`, in listing order
    async fn find_items(&self, filter: ItemFilter) -> StoreResult<Vec<Item>>;

    async fn find_item(&self, id: ItemId) -> StoreResult<Option<Item>>;

    /// Insert an available item and return it with its assigned id
    async fn create_item(&self, item: NewItem) -> StoreResult<Item>;

    /// Apply `change` only if the item exists and satisfies `expected`
    async fn update_item_if(
        &self,
        id: ItemId,
        expected: ItemCondition,
        change: ItemChange,
    ) -> StoreResult<u64>;

    /// Remove an item; returns the number of rows removed
    async fn delete_item(&self, id: ItemId) -> StoreResult<u64>;
}
