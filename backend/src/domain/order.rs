//! Order entity and its mutation shapes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::{User, UserId};

/// Stable order identifier backed by a serial primary key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OrderId(i32);

impl OrderId {
    /// Wrap a raw database identifier.
    #[must_use]
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    /// Raw identifier value.
    #[must_use]
    pub fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for OrderId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// Customer order. The user relation is weak: deleting a user detaches the
/// order rather than deleting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Stable identifier.
    pub id: OrderId,
    /// Referencing user, populated when the adapter joined the users table.
    pub user: Option<User>,
    /// Required delivery address.
    pub delivery_address: String,
    /// Required order timestamp.
    pub order_date: DateTime<Utc>,
    /// Required status label, e.g. `"CREATED"`.
    pub status: String,
    /// Optional free-form note.
    pub note: Option<String>,
}

/// Fields required to create an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    /// Optional owning user; unknown ids are stored as detached.
    pub user_id: Option<UserId>,
    /// Required delivery address.
    pub delivery_address: String,
    /// Required order timestamp.
    pub order_date: DateTime<Utc>,
    /// Required status label.
    pub status: String,
    /// Optional free-form note.
    pub note: Option<String>,
}

/// Partial update for an existing order; absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderUpdate {
    /// Replacement owning user.
    pub user_id: Option<UserId>,
    /// Replacement delivery address.
    pub delivery_address: Option<String>,
    /// Replacement order timestamp.
    pub order_date: Option<DateTime<Utc>>,
    /// Replacement status label.
    pub status: Option<String>,
    /// Replacement note.
    pub note: Option<String>,
}

/// Filters applied to the paginated order listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    /// Restrict to orders owned by this user.
    pub user_id: Option<UserId>,
    /// Restrict to orders with exactly this status.
    pub status: Option<String>,
}
