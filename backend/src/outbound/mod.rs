//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL repositories via Diesel
//! - **channel**: PostgreSQL-backed verification channel
//! - **email**: SMTP notifier via lettre
//!
//! Adapters translate between domain types and infrastructure
//! representations; they contain no business logic.

pub mod channel;
pub mod email;
pub mod persistence;
