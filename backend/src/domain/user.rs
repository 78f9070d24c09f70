//! User entity and the verification tri-state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable user identifier backed by a serial primary key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(i32);

impl UserId {
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

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for UserId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// Outcome of the asynchronous verification workflow for a user.
///
/// Persisted as a nullable boolean column: `NULL` means no verification
/// attempt has completed, `true` that the notification was sent, and `false`
/// that the last attempt failed. The state only moves along
/// `Unverified -> Verified` or `Unverified -> Failed -> Verified`; the
/// reconciler never demotes a verified user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerificationState {
    /// No verification attempt has completed.
    #[default]
    Unverified,
    /// The creation notification was sent successfully.
    Verified,
    /// The last notification attempt failed; eligible for retry.
    Failed,
}

impl VerificationState {
    /// Decode the persisted nullable-boolean representation.
    #[must_use]
    pub fn from_column(value: Option<bool>) -> Self {
        match value {
            None => Self::Unverified,
            Some(true) => Self::Verified,
            Some(false) => Self::Failed,
        }
    }

    /// Encode into the persisted nullable-boolean representation.
    #[must_use]
    pub fn as_column(self) -> Option<bool> {
        match self {
            Self::Unverified => None,
            Self::Verified => Some(true),
            Self::Failed => Some(false),
        }
    }

    /// Whether the notification has already been delivered.
    #[must_use]
    pub fn is_verified(self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// Application user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Stable identifier.
    pub id: UserId,
    /// Unique contact address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Verification workflow state.
    pub verified: VerificationState,
}

/// Fields required to create a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Unique contact address.
    pub email: String,
    /// Display name.
    pub name: String,
}

/// Partial update for an existing user; absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    /// Replacement email, validated for uniqueness by the store.
    pub email: Option<String>,
    /// Replacement display name.
    pub name: Option<String>,
}

/// Aggregate row for the top-users-by-order-count query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopUser {
    /// User identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Number of orders referencing the user.
    pub count: i64,
}
