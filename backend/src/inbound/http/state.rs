//! Shared HTTP adapter state.
//!
//! Handlers accept this state via `actix_web::web::Data` so they only depend
//! on domain ports and remain testable without I/O.

use std::sync::Arc;

use crate::domain::VerificationPublisher;
use crate::domain::ports::{OrderRepository, UserRepository};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// User persistence port.
    pub users: Arc<dyn UserRepository>,
    /// Order persistence port.
    pub orders: Arc<dyn OrderRepository>,
    /// Verification event publisher invoked after user creation.
    pub publisher: VerificationPublisher,
}

impl HttpState {
    /// Bundle the ports handlers depend on.
    pub fn new(
        users: Arc<dyn UserRepository>,
        orders: Arc<dyn OrderRepository>,
        publisher: VerificationPublisher,
    ) -> Self {
        Self {
            users,
            orders,
            publisher,
        }
    }
}
