//! Email notifier adapters.

mod smtp;

pub use smtp::{SmtpNotifier, SmtpSettings};
