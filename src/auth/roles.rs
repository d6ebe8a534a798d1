/// Role levels and what they allow
use serde::{Deserialize, Serialize};

/// Role level carried by every user and session token
///
/// Serialized as the numeric level so tokens keep the `userlevel` claim shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Role {
    /// Default level granted on registration
    #[default]
    User,
    /// Manages the wishlist itself
    Admin,
}

/// Actions gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Reserve and unreserve items, list own reservations
    ReserveItems,
    /// Add, delete and re-rank items
    ManageItems,
    /// See every item including who reserved it
    ViewAllItems,
}

impl Role {
    pub const fn level(self) -> u8 {
        match self {
            Role::User => 1,
            Role::Admin => 9,
        }
    }

    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            1 => Some(Role::User),
            9 => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Whether this role grants `capability`
    pub fn allows(self, capability: Capability) -> bool {
        match capability {
            Capability::ReserveItems => true,
            Capability::ManageItems | Capability::ViewAllItems => self == Role::Admin,
        }
    }
}

impl TryFrom<u8> for Role {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Role::from_level(i64::from(level)).ok_or_else(|| format!("Unknown role level: {}", level))
    }
}

impl From<Role> for u8 {
    fn from(role: Role) -> Self {
        role.level()
    }
}
