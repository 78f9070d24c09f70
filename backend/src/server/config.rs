//! Process configuration read from the environment.

use std::env;
use std::net::SocketAddr;

use thiserror::Error;

use crate::outbound::email::SmtpSettings;

/// Default bind address when `BIND_ADDR` is not set.
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Configuration errors raised during startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing required environment variable {name}")]
    Missing {
        /// Variable name.
        name: &'static str,
    },
    /// An environment variable is set but does not parse.
    #[error("invalid value for {name}: {message}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// Parse diagnostic.
        message: String,
    },
}

/// Settings assembled from the process environment.
///
/// The verification channel and the SMTP notifier are both optional
/// integrations: `ENABLE_CHANNEL` switches the channel on, and the notifier
/// activates only when the full set of `SMTP_*`/`NOTIFY_*` variables is
/// present.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Whether the verification channel integration is enabled.
    pub channel_enabled: bool,
    /// SMTP notifier settings, when fully configured.
    pub smtp: Option<SmtpSettings>,
}

impl AppConfig {
    /// Read configuration from the environment.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when `DATABASE_URL` is absent or `BIND_ADDR`
    /// does not parse as a socket address.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::Missing {
                name: "DATABASE_URL",
            })?;
        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_owned())
            .parse::<SocketAddr>()
            .map_err(|err| ConfigError::Invalid {
                name: "BIND_ADDR",
                message: err.to_string(),
            })?;
        let channel_enabled = flag_set("ENABLE_CHANNEL");

        Ok(Self {
            database_url,
            bind_addr,
            channel_enabled,
            smtp: smtp_from_env(),
        })
    }
}

fn flag_set(name: &str) -> bool {
    matches!(
        env::var(name).ok().as_deref(),
        Some("1") | Some("true") | Some("TRUE")
    )
}

fn smtp_from_env() -> Option<SmtpSettings> {
    let relay = env::var("SMTP_RELAY").ok()?;
    let username = env::var("SMTP_USERNAME").ok()?;
    let password = env::var("SMTP_PASSWORD").ok()?;
    let from = env::var("NOTIFY_FROM").ok()?;
    let to = env::var("NOTIFY_TO").ok()?;
    Some(SmtpSettings {
        relay,
        username,
        password,
        from,
        to,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    // Environment-variable tests are process-global; the parse helpers are
    // exercised directly instead.

    #[rstest]
    fn default_bind_address_parses() {
        let addr = DEFAULT_BIND_ADDR.parse::<SocketAddr>().expect("default addr");
        assert_eq!(addr.port(), 3000);
    }

    #[rstest]
    fn missing_variable_error_names_the_variable() {
        let error = ConfigError::Missing {
            name: "DATABASE_URL",
        };
        assert!(error.to_string().contains("DATABASE_URL"));
    }
}
