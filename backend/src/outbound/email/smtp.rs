//! SMTP notifier built on lettre's async transport.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::domain::UserId;
use crate::domain::ports::{EmailNotifier, NotifyError};

/// Connection and addressing settings for the SMTP notifier.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    /// SMTP relay host name.
    pub relay: String,
    /// Relay account user name.
    pub username: String,
    /// Relay account password.
    pub password: String,
    /// Sender mailbox, e.g. `"Orders <orders@example.com>"`.
    pub from: String,
    /// Operator mailbox receiving new-user notifications.
    pub to: String,
}

/// Notifier that emails the operator about each newly verified user.
#[derive(Clone)]
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpNotifier {
    /// Build a notifier from settings.
    ///
    /// # Errors
    /// Returns [`NotifyError::Config`] when the relay host or a mailbox
    /// address does not parse.
    pub fn new(settings: &SmtpSettings) -> Result<Self, NotifyError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.relay)
            .map_err(|err| NotifyError::config(err.to_string()))?
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();
        let from = settings
            .from
            .parse::<Mailbox>()
            .map_err(|err| NotifyError::config(format!("invalid from address: {err}")))?;
        let to = settings
            .to
            .parse::<Mailbox>()
            .map_err(|err| NotifyError::config(format!("invalid to address: {err}")))?;
        Ok(Self {
            transport,
            from,
            to,
        })
    }
}

#[async_trait]
impl EmailNotifier for SmtpNotifier {
    async fn user_created(&self, user_id: UserId) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject("New user in the system")
            .header(ContentType::TEXT_HTML)
            .body(format!(
                "<p>A new user with id <strong>{user_id}</strong> has registered.</p>"
            ))
            .map_err(|err| NotifyError::config(err.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|err| NotifyError::send(err.to_string()))?;
        Ok(())
    }
}
