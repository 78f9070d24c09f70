//! PostgreSQL-backed `OrderRepository` implementation using Diesel.

use std::collections::HashSet;

use async_trait::async_trait;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use pagination::PageRequest;
use tracing::debug;

use crate::domain::ports::{OrderPersistenceError, OrderRepository};
use crate::domain::{NewOrder, Order, OrderFilter, OrderId, OrderUpdate, UserId};

use super::models::{NewOrderRow, OrderChangeset, OrderRow, UserRow, order_from_rows};
use super::pool::{DbPool, PoolError};
use super::schema::{orders, users};

/// Diesel-backed implementation of the `OrderRepository` port.
#[derive(Clone)]
pub struct DieselOrderRepository {
    pool: DbPool,
}

impl DieselOrderRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> OrderPersistenceError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            OrderPersistenceError::connection(message)
        }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> OrderPersistenceError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    if let DieselError::DatabaseError(kind, info) = &error {
        debug!(?kind, message = info.message(), "diesel operation failed");
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            OrderPersistenceError::connection("database connection error")
        }
        other => OrderPersistenceError::query(other.to_string()),
    }
}

fn detach_unknown(user_id: Option<i32>, known: &HashSet<i32>) -> Option<i32> {
    user_id.filter(|id| known.contains(id))
}

fn new_order_row(order: &NewOrder) -> NewOrderRow<'_> {
    NewOrderRow {
        user_id: order.user_id.map(|id| id.value()),
        delivery_address: &order.delivery_address,
        order_date: order.order_date,
        status: &order.status,
        note: order.note.as_deref(),
    }
}

#[async_trait]
impl OrderRepository for DieselOrderRepository {
    async fn create(&self, order: &NewOrder) -> Result<Order, OrderPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: OrderRow = diesel::insert_into(orders::table)
            .values(new_order_row(order))
            .returning(OrderRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        let user: Option<UserRow> = match row.user_id {
            Some(user_id) => users::table
                .find(user_id)
                .select(UserRow::as_select())
                .first(&mut conn)
                .await
                .optional()
                .map_err(map_diesel_error)?,
            None => None,
        };
        Ok(order_from_rows(row, user))
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, OrderPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let joined: Option<(OrderRow, Option<UserRow>)> = orders::table
            .left_join(users::table)
            .filter(orders::id.eq(id.value()))
            .select((OrderRow::as_select(), Option::<UserRow>::as_select()))
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(joined.map(|(order, user)| order_from_rows(order, user)))
    }

    async fn update(
        &self,
        id: OrderId,
        update: &OrderUpdate,
    ) -> Result<Option<Order>, OrderPersistenceError> {
        if update.user_id.is_none()
            && update.delivery_address.is_none()
            && update.order_date.is_none()
            && update.status.is_none()
            && update.note.is_none()
        {
            // Diesel rejects an empty changeset; an empty update is a no-op.
            return self.find_by_id(id).await;
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<OrderRow> = diesel::update(orders::table.find(id.value()))
            .set(OrderChangeset {
                user_id: update.user_id.map(|id| id.value()),
                delivery_address: update.delivery_address.as_deref(),
                order_date: update.order_date,
                status: update.status.as_deref(),
                note: update.note.as_deref(),
            })
            .returning(OrderRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let user: Option<UserRow> = match row.user_id {
            Some(user_id) => users::table
                .find(user_id)
                .select(UserRow::as_select())
                .first(&mut conn)
                .await
                .optional()
                .map_err(map_diesel_error)?,
            None => None,
        };
        Ok(Some(order_from_rows(row, user)))
    }

    async fn delete(&self, id: OrderId) -> Result<Option<Order>, OrderPersistenceError> {
        // Load the joined record first so the response still carries the user.
        let Some(order) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let affected = diesel::delete(orders::table.find(id.value()))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        if affected == 0 {
            return Ok(None);
        }
        Ok(Some(order))
    }

    async fn list(
        &self,
        filter: &OrderFilter,
        page: PageRequest,
    ) -> Result<(Vec<Order>, i64), OrderPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let mut query = orders::table
            .left_join(users::table)
            .select((OrderRow::as_select(), Option::<UserRow>::as_select()))
            .into_boxed();
        let mut count_query = orders::table.select(count_star()).into_boxed();
        if let Some(user_id) = filter.user_id {
            query = query.filter(orders::user_id.eq(user_id.value()));
            count_query = count_query.filter(orders::user_id.eq(user_id.value()));
        }
        if let Some(status) = &filter.status {
            query = query.filter(orders::status.eq(status.clone()));
            count_query = count_query.filter(orders::status.eq(status.clone()));
        }

        let total: i64 = count_query
            .first(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let rows: Vec<(OrderRow, Option<UserRow>)> = query
            .order(orders::id.asc())
            .offset(page.offset())
            .limit(page.limit())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok((
            rows.into_iter()
                .map(|(order, user)| order_from_rows(order, user))
                .collect(),
            total,
        ))
    }

    async fn import(&self, orders_in: &[NewOrder]) -> Result<usize, OrderPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        // Unknown user ids are detached rather than failing the batch, the
        // same policy single-order creation applies.
        let referenced: Vec<i32> = orders_in
            .iter()
            .filter_map(|order| order.user_id.map(|id| id.value()))
            .collect();
        let known: HashSet<i32> = if referenced.is_empty() {
            HashSet::new()
        } else {
            users::table
                .filter(users::id.eq_any(&referenced))
                .select(users::id)
                .load::<i32>(&mut conn)
                .await
                .map_err(map_diesel_error)?
                .into_iter()
                .collect()
        };

        let rows: Vec<NewOrderRow<'_>> = orders_in
            .iter()
            .map(|order| {
                let mut row = new_order_row(order);
                row.user_id = detach_unknown(row.user_id, &known);
                row
            })
            .collect();
        let inserted = conn
            .transaction::<usize, diesel::result::Error, _>(|conn| {
                async move {
                    diesel::insert_into(orders::table)
                        .values(&rows)
                        .execute(conn)
                        .await
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;
        Ok(inserted)
    }
}
