//! Port abstraction for order persistence adapters and their errors.

use async_trait::async_trait;
use pagination::PageRequest;
use thiserror::Error;

use crate::domain::order::{NewOrder, Order, OrderFilter, OrderId, OrderUpdate};

/// Persistence errors raised by order repository adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderPersistenceError {
    /// Repository connection could not be established.
    #[error("order repository connection failed: {message}")]
    Connection {
        /// Adapter-provided diagnostic.
        message: String,
    },
    /// Query or mutation failed during execution.
    #[error("order repository query failed: {message}")]
    Query {
        /// Adapter-provided diagnostic.
        message: String,
    },
}

impl OrderPersistenceError {
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

/// Persistence port for order records.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert a new order and return the stored record.
    async fn create(&self, order: &NewOrder) -> Result<Order, OrderPersistenceError>;

    /// Fetch an order by identifier with its user populated.
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, OrderPersistenceError>;

    /// Apply a partial update; `None` when the order does not exist.
    async fn update(
        &self,
        id: OrderId,
        update: &OrderUpdate,
    ) -> Result<Option<Order>, OrderPersistenceError>;

    /// Delete an order; returns the deleted record, or `None` when it did
    /// not exist.
    async fn delete(&self, id: OrderId) -> Result<Option<Order>, OrderPersistenceError>;

    /// Load a page of orders matching `filter`, ordered by ascending id,
    /// together with the filtered row count.
    async fn list(
        &self,
        filter: &OrderFilter,
        page: PageRequest,
    ) -> Result<(Vec<Order>, i64), OrderPersistenceError>;

    /// Insert every order in one transaction; any failure rolls the whole
    /// batch back. Returns the number of inserted rows.
    async fn import(&self, orders: &[NewOrder]) -> Result<usize, OrderPersistenceError>;
}
