//! Port describing the outbound email notifier.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::user::UserId;

/// Errors surfaced by notifier adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// The notifier is misconfigured.
    #[error("email notifier misconfigured: {message}")]
    Config {
        /// Adapter-provided diagnostic.
        message: String,
    },
    /// The transport refused or failed to send the message.
    #[error("email send failed: {message}")]
    Send {
        /// Adapter-provided diagnostic.
        message: String,
    },
}

impl NotifyError {
    /// Build a configuration error from an adapter diagnostic.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Build a send error from an adapter diagnostic.
    pub fn send(message: impl Into<String>) -> Self {
        Self::Send {
            message: message.into(),
        }
    }
}

/// One-shot notification port for new-user announcements.
#[async_trait]
pub trait EmailNotifier: Send + Sync {
    /// Send the operator a notification that `user_id` joined.
    async fn user_created(&self, user_id: UserId) -> Result<(), NotifyError>;
}

/// Notifier variant used when the integration is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl EmailNotifier for NoopNotifier {
    async fn user_created(&self, user_id: UserId) -> Result<(), NotifyError> {
        tracing::debug!(%user_id, "email notifier disabled; notification skipped");
        Ok(())
    }
}
