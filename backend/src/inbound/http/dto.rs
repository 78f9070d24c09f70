//! Response DTOs shared by the user and order handlers.
//!
//! The wire shapes stay camelCase and keep the verification tri-state as a
//! nullable boolean, matching the persisted column and the original JSON
//! contract.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Order, TopUser, User};

/// Wire representation of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    /// Stable identifier.
    pub id: i32,
    /// Unique contact address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Verification tri-state as nullable boolean.
    pub verified: Option<bool>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.value(),
            email: user.email,
            name: user.name,
            verified: user.verified.as_column(),
        }
    }
}

/// Wire representation of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    /// Stable identifier.
    pub id: i32,
    /// Owning user, when populated by the adapter.
    pub user: Option<UserResponse>,
    /// Delivery address.
    pub delivery_address: String,
    /// Order timestamp.
    pub order_date: DateTime<Utc>,
    /// Status label.
    pub status: String,
    /// Optional note.
    pub note: Option<String>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.value(),
            user: order.user.map(UserResponse::from),
            delivery_address: order.delivery_address,
            order_date: order.order_date,
            status: order.status,
            note: order.note,
        }
    }
}

/// Wire representation of one top-users aggregate row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUserResponse {
    /// User identifier.
    pub id: i32,
    /// Display name.
    pub name: String,
    /// Number of orders referencing the user.
    pub count: i64,
}

impl From<TopUser> for TopUserResponse {
    fn from(row: TopUser) -> Self {
        Self {
            id: row.id.value(),
            name: row.name,
            count: row.count,
        }
    }
}
