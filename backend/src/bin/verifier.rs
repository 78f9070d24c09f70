//! Standalone verification consumer.
//!
//! Runs the same reconcile loop the API process can host, as its own process
//! so the channel can be drained independently of the web workers. Reads the
//! same environment variables as the server.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use orders_backend::domain::ports::{EmailNotifier, NoopNotifier};
use orders_backend::domain::{ConsumerConfig, VerificationConsumer};
use orders_backend::outbound::channel::PgChannel;
use orders_backend::outbound::email::SmtpNotifier;
use orders_backend::outbound::persistence::{DbPool, DieselUserRepository, PoolConfig};
use orders_backend::server::AppConfig;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let config = AppConfig::from_env().map_err(std::io::Error::other)?;
    let pool = DbPool::new(PoolConfig::new(config.database_url.clone()))
        .await
        .map_err(std::io::Error::other)?;

    let notifier: Arc<dyn EmailNotifier> = match &config.smtp {
        Some(settings) => match SmtpNotifier::new(settings) {
            Ok(notifier) => Arc::new(notifier),
            Err(err) => {
                error!(error = %err, "smtp notifier misconfigured; notifications disabled");
                Arc::new(NoopNotifier)
            }
        },
        None => {
            info!("smtp notifier not configured; notifications disabled");
            Arc::new(NoopNotifier)
        }
    };

    let consumer = VerificationConsumer::new(
        Arc::new(PgChannel::new(pool.clone())),
        Arc::new(DieselUserRepository::new(pool)),
        notifier,
        ConsumerConfig::default(),
    );
    info!("verification consumer started");
    consumer.run().await;
    Ok(())
}
