//! Verification channel adapters.

mod pg;

pub use pg::PgChannel;
