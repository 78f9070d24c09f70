//! Domain layer: entities, ports, and the verification workflow.

mod error;
mod order;
pub mod ports;
mod user;
mod verification;

pub use self::error::{Error, ErrorCode};
pub use self::order::{NewOrder, Order, OrderFilter, OrderId, OrderUpdate};
pub use self::user::{NewUser, TopUser, User, UserId, UserUpdate, VerificationState};
pub use self::verification::{
    ConsumerConfig, PollError, ReconcileError, ReconcileOutcome, VerificationConsumer,
    VerificationEvent, VerificationPublisher,
};
