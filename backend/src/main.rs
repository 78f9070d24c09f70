//! Backend entry-point: wires configuration, adapters, the verification
//! consumer, and the HTTP server.

use std::sync::Arc;

use actix_web::web;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use orders_backend::domain::ports::{
    EmailNotifier, NoopChannel, NoopNotifier, OrderRepository, UserRepository, VerificationChannel,
};
use orders_backend::domain::{ConsumerConfig, VerificationConsumer, VerificationPublisher};
use orders_backend::inbound::http::HttpState;
use orders_backend::inbound::http::health::HealthState;
use orders_backend::outbound::channel::PgChannel;
use orders_backend::outbound::email::SmtpNotifier;
use orders_backend::outbound::persistence::{
    DbPool, DieselOrderRepository, DieselUserRepository, PoolConfig,
};
use orders_backend::server::{AppConfig, create_server};

/// Application bootstrap.
#[actix_web::main]
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

    let users: Arc<dyn UserRepository> = Arc::new(DieselUserRepository::new(pool.clone()));
    let orders: Arc<dyn OrderRepository> = Arc::new(DieselOrderRepository::new(pool.clone()));

    let channel: Arc<dyn VerificationChannel> = if config.channel_enabled {
        Arc::new(PgChannel::new(pool.clone()))
    } else {
        info!("verification channel disabled; events will be dropped");
        Arc::new(NoopChannel)
    };

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

    if config.channel_enabled {
        let consumer = VerificationConsumer::new(
            channel.clone(),
            users.clone(),
            notifier,
            ConsumerConfig::default(),
        );
        tokio::spawn(async move { consumer.run().await });
    }

    let publisher = VerificationPublisher::new(channel);
    let http_state = web::Data::new(HttpState::new(users, orders, publisher));
    let health_state = web::Data::new(HealthState::new());

    let server = create_server(&config, health_state.clone(), http_state)?;
    health_state.mark_ready();
    info!(addr = %config.bind_addr, "listening");
    server.await
}
