//! Domain ports and supporting types for the hexagonal boundary.

mod channel;
mod email_notifier;
mod order_repository;
mod user_repository;

pub use channel::{
    ChannelError, Delivery, DeliveryId, InMemoryChannel, NoopChannel, VerificationChannel,
};
pub use email_notifier::{EmailNotifier, NoopNotifier, NotifyError};
pub use order_repository::{OrderPersistenceError, OrderRepository};
pub use user_repository::{UserPersistenceError, UserRepository};
