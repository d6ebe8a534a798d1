/// Records owned by the credential and item stores
use crate::auth::Role;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

pub type UserId = i64;
pub type ItemId = i64;

/// Outstanding password reset credential
///
/// Token and expiry only exist together, so they live in one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl ResetToken {
    /// Length of a well-formed token (20 random bytes, hex encoded)
    pub const LEN: usize = 40;

    /// True when `candidate` matches this token and `now` is inside the window
    pub fn accepts(&self, candidate: &str, now: DateTime<Utc>) -> bool {
        self.token.len() == Self::LEN && self.token == candidate && now < self.expires_at
    }
}

/// User record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    /// Always lowercase
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    /// Always lowercase
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Set when the account must choose a new password on next login
    pub password_reset: bool,
    pub reset: Option<ResetToken>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when registering a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Exact-match lookup keys for users
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserFilter {
    Id(UserId),
    Username(String),
    Email(String),
    ResetToken(String),
}

/// State a user must be in for a conditional update to apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCondition {
    Exists,
    /// Holds exactly `token` and it is still live at `now`
    HoldsResetToken { token: String, now: DateTime<Utc> },
}

impl User {
    /// Whether the user currently satisfies `condition`
    pub fn matches(&self, condition: &UserCondition) -> bool {
        match condition {
            UserCondition::Exists => true,
            UserCondition::HoldsResetToken { token, now } => self
                .reset
                .as_ref()
                .map(|reset| reset.accepts(token, *now))
                .unwrap_or(false),
        }
    }
}

/// Partial update of a user
///
/// `None` leaves a field alone. For `reset`, `Some(None)` clears the token
/// and its expiry, `Some(Some(_))` replaces them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub password_hash: Option<String>,
    pub password_reset: Option<bool>,
    pub reset: Option<Option<ResetToken>>,
}

/// Wishlist item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub url: String,
    /// Sort key, lower first
    pub rank: i64,
    /// `Some` exactly when the item is reserved
    pub reserved_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn is_reserved(&self) -> bool {
        self.reserved_by.is_some()
    }

    /// Listing order: rank ascending, then id descending
    pub fn listing_order(a: &Item, b: &Item) -> Ordering {
        a.rank.cmp(&b.rank).then_with(|| b.id.cmp(&a.id))
    }

    /// Whether the item currently satisfies `condition`
    pub fn matches(&self, condition: ItemCondition) -> bool {
        match condition {
            ItemCondition::Exists => true,
            ItemCondition::Available => self.reserved_by.is_none(),
            ItemCondition::ReservedBy(user) => self.reserved_by == Some(user),
        }
    }

    /// Whether the item belongs in a listing selected by `filter`
    pub fn selected_by(&self, filter: ItemFilter) -> bool {
        match filter {
            ItemFilter::All => true,
            ItemFilter::Wanted => self.reserved_by.is_none(),
            ItemFilter::ReservedBy(user) => self.reserved_by == Some(user),
        }
    }
}

/// Fields supplied when adding an item; new items are always available
#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub url: String,
    pub rank: i64,
}

/// Listing selections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemFilter {
    All,
    Wanted,
    ReservedBy(UserId),
}

/// State an item must be in for a conditional update to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemCondition {
    Exists,
    Available,
    ReservedBy(UserId),
}

/// Changes a conditional update can make
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemChange {
    Reserve(UserId),
    Unreserve,
    Rank(i64),
}

impl ItemChange {
    /// Apply this change to an in-memory record
    pub fn apply(self, item: &mut Item) {
        match self {
            ItemChange::Reserve(user) => item.reserved_by = Some(user),
            ItemChange::Unreserve => item.reserved_by = None,
            ItemChange::Rank(rank) => item.rank = rank,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(id: ItemId, rank: i64, reserved_by: Option<UserId>) -> Item {
        let now = Utc::now();
        Item {
            id,
            name: format!("item-{}", id),
            url: "https://example.com".to_string(),
            rank,
            reserved_by,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_listing_order_rank_then_id_desc() {
        let mut items = vec![item(1, 2, None), item(2, 1, None), item(3, 2, None), item(4, 1, None)];
        items.sort_by(Item::listing_order);
        let ids: Vec<ItemId> = items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![4, 2, 3, 1]);
    }

    #[test]
    fn test_conditions() {
        let free = item(1, 1, None);
        let taken = item(2, 1, Some(7));

        assert!(free.matches(ItemCondition::Available));
        assert!(!taken.matches(ItemCondition::Available));
        assert!(taken.matches(ItemCondition::ReservedBy(7)));
        assert!(!taken.matches(ItemCondition::ReservedBy(8)));
        assert!(!free.matches(ItemCondition::ReservedBy(7)));
        assert!(free.matches(ItemCondition::Exists));
    }

    #[test]
    fn test_reset_token_window() {
        let now = Utc::now();
        let reset = ResetToken {
            token: "a".repeat(40),
            expires_at: now + Duration::hours(1),
        };

        assert!(reset.accepts(&"a".repeat(40), now));
        assert!(!reset.accepts(&"b".repeat(40), now));
        assert!(!reset.accepts(&"a".repeat(40), reset.expires_at));

        let short = ResetToken {
            token: "abc".to_string(),
            expires_at: now + Duration::hours(1),
        };
        assert!(!short.accepts("abc", now));
    }
}
