//! Order management backend.
//!
//! The crate follows a hexagonal layout: `domain` holds entities, ports, and
//! the verification workflow; `inbound` carries the HTTP adapter; `outbound`
//! the PostgreSQL, channel, and SMTP adapters; `server` the wiring that turns
//! them into a running process.

pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod server;

pub use middleware::Trace;
