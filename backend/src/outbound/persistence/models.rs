//! Row types bridging the Diesel schema and domain entities.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::domain::{Order, OrderId, User, UserId, VerificationState};

use super::schema::{orders, users};

/// One row of the `users` table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRow {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub verified: Option<bool>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::new(row.id),
            email: row.email,
            name: row.name,
            verified: VerificationState::from_column(row.verified),
        }
    }
}

/// Insertable `users` row; `verified` stays `NULL` until the reconciler runs.
#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUserRow<'a> {
    pub email: &'a str,
    pub name: &'a str,
}

/// Partial `users` update; `None` fields are left untouched.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = users)]
pub struct UserChangeset<'a> {
    pub email: Option<&'a str>,
    pub name: Option<&'a str>,
}

/// One row of the `orders` table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub id: i32,
    pub user_id: Option<i32>,
    pub delivery_address: String,
    pub order_date: DateTime<Utc>,
    pub status: String,
    pub note: Option<String>,
}

/// Assemble a domain order from its row and the joined user row.
pub fn order_from_rows(order: OrderRow, user: Option<UserRow>) -> Order {
    Order {
        id: OrderId::new(order.id),
        user: user.map(User::from),
        delivery_address: order.delivery_address,
        order_date: order.order_date,
        status: order.status,
        note: order.note,
    }
}

/// Insertable `orders` row.
#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrderRow<'a> {
    pub user_id: Option<i32>,
    pub delivery_address: &'a str,
    pub order_date: DateTime<Utc>,
    pub status: &'a str,
    pub note: Option<&'a str>,
}

/// Partial `orders` update; `None` fields are left untouched.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = orders)]
pub struct OrderChangeset<'a> {
    pub user_id: Option<i32>,
    pub delivery_address: Option<&'a str>,
    pub order_date: Option<DateTime<Utc>>,
    pub status: Option<&'a str>,
    pub note: Option<&'a str>,
}
