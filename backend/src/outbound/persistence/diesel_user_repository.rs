//! PostgreSQL-backed `UserRepository` implementation using Diesel.

use async_trait::async_trait;
use diesel::dsl::count;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::ports::{UserPersistenceError, UserRepository};
use crate::domain::{NewUser, TopUser, User, UserId, UserUpdate, VerificationState};

use super::models::{NewUserRow, UserChangeset, UserRow};
use super::pool::{DbPool, PoolError};
use super::schema::{orders, users};

/// Diesel-backed implementation of the `UserRepository` port.
#[derive(Clone)]
pub struct DieselUserRepository {
    pool: DbPool,
}

impl DieselUserRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> UserPersistenceError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            UserPersistenceError::connection(message)
        }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> UserPersistenceError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    if let DieselError::DatabaseError(kind, info) = &error {
        debug!(?kind, message = info.message(), "diesel operation failed");
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            UserPersistenceError::DuplicateEmail
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            UserPersistenceError::connection("database connection error")
        }
        other => UserPersistenceError::query(other.to_string()),
    }
}

#[async_trait]
impl UserRepository for DieselUserRepository {
    async fn create(&self, user: &NewUser) -> Result<User, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: UserRow = diesel::insert_into(users::table)
            .values(NewUserRow {
                email: &user.email,
                name: &user.name,
            })
            .returning(UserRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(row.into())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<UserRow> = users::table
            .find(id.value())
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(User::from))
    }

    async fn list_all(&self) -> Result<Vec<User>, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<UserRow> = users::table
            .order(users::id.asc())
            .select(UserRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn update(
        &self,
        id: UserId,
        update: &UserUpdate,
    ) -> Result<Option<User>, UserPersistenceError> {
        if update.email.is_none() && update.name.is_none() {
            // Diesel rejects an empty changeset; an empty update is a no-op.
            return self.find_by_id(id).await;
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<UserRow> = diesel::update(users::table.find(id.value()))
            .set(UserChangeset {
                email: update.email.as_deref(),
                name: update.name.as_deref(),
            })
            .returning(UserRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(User::from))
    }

    async fn delete(&self, id: UserId) -> Result<Option<User>, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        // Orders survive their user: detach them in the same transaction as
        // the delete so no order ever references a missing row.
        let row = conn
            .transaction::<Option<UserRow>, diesel::result::Error, _>(|conn| {
                async move {
                    diesel::update(orders::table.filter(orders::user_id.eq(id.value())))
                        .set(orders::user_id.eq(None::<i32>))
                        .execute(conn)
                        .await?;
                    diesel::delete(users::table.find(id.value()))
                        .returning(UserRow::as_returning())
                        .get_result(conn)
                        .await
                        .optional()
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;
        Ok(row.map(User::from))
    }

    async fn set_verification(
        &self,
        id: UserId,
        state: VerificationState,
    ) -> Result<(), UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        // A verified flag never reverts: a slow failing delivery racing a
        // successful one must not overwrite `true` with `false`.
        let affected = if state == VerificationState::Failed {
            diesel::update(users::table.find(id.value()))
                .filter(users::verified.is_distinct_from(true))
                .set(users::verified.eq(state.as_column()))
                .execute(&mut conn)
                .await
                .map_err(map_diesel_error)?
        } else {
            diesel::update(users::table.find(id.value()))
                .set(users::verified.eq(state.as_column()))
                .execute(&mut conn)
                .await
                .map_err(map_diesel_error)?
        };
        if affected == 0 {
            let present: i64 = users::table
                .find(id.value())
                .count()
                .get_result(&mut conn)
                .await
                .map_err(map_diesel_error)?;
            if present == 0 {
                return Err(UserPersistenceError::query("user not found"));
            }
            // Row exists but was already verified; the write is a no-op.
        }
        Ok(())
    }

    async fn top_by_order_count(&self, limit: i64) -> Result<Vec<TopUser>, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<(i32, String, i64)> = users::table
            .left_join(orders::table)
            .group_by((users::id, users::name))
            .select((users::id, users::name, count(orders::id.nullable())))
            .order((count(orders::id.nullable()).desc(), users::id.asc()))
            .limit(limit)
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows
            .into_iter()
            .map(|(id, name, count)| TopUser {
                id: UserId::new(id),
                name,
                count,
            })
            .collect())
    }
}
