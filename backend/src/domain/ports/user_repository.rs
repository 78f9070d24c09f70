//! Port abstraction for user persistence adapters and their errors.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::user::{NewUser, TopUser, User, UserId, UserUpdate, VerificationState};

/// Persistence errors raised by user repository adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserPersistenceError {
    /// Repository connection could not be established.
    #[error("user repository connection failed: {message}")]
    Connection {
        /// Adapter-provided diagnostic.
        message: String,
    },
    /// Query or mutation failed during execution.
    #[error("user repository query failed: {message}")]
    Query {
        /// Adapter-provided diagnostic.
        message: String,
    },
    /// The email column's unique constraint rejected the write.
    #[error("email is already in use")]
    DuplicateEmail,
}

impl UserPersistenceError {
    /// Build a connection error from an adapter diagnostic.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Build a query error from an adapter diagnostic.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

/// Persistence port for user records.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user and return the stored record.
    async fn create(&self, user: &NewUser) -> Result<User, UserPersistenceError>;

    /// Fetch a user by identifier.
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserPersistenceError>;

    /// List every user, ordered by ascending id.
    async fn list_all(&self) -> Result<Vec<User>, UserPersistenceError>;

    /// Apply a partial update; `None` when the user does not exist.
    async fn update(
        &self,
        id: UserId,
        update: &UserUpdate,
    ) -> Result<Option<User>, UserPersistenceError>;

    /// Delete a user, detaching referencing orders; returns the deleted
    /// record, or `None` when it did not exist.
    async fn delete(&self, id: UserId) -> Result<Option<User>, UserPersistenceError>;

    /// Persist the verification state for a user.
    async fn set_verification(
        &self,
        id: UserId,
        state: VerificationState,
    ) -> Result<(), UserPersistenceError>;

    /// Top `limit` users by order count, descending.
    async fn top_by_order_count(&self, limit: i64) -> Result<Vec<TopUser>, UserPersistenceError>;
}
