//! PostgreSQL persistence adapters using Diesel.
//!
//! Repositories here are thin translators between Diesel rows and domain
//! types; no business logic lives in this layer. Row structs (`models`) and
//! the table definitions (`schema`) stay internal to the outbound side, and
//! connections come from a `bb8` pool over `diesel-async`.

mod diesel_order_repository;
mod diesel_user_repository;
pub(crate) mod models;
mod pool;
pub(crate) mod schema;

pub use diesel_order_repository::DieselOrderRepository;
pub use diesel_user_repository::DieselUserRepository;
pub use pool::{DbPool, PoolConfig, PoolError};
