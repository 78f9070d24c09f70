//! Server construction and middleware wiring.

mod config;

pub use config::{AppConfig, ConfigError};

use actix_web::body::BoxBody;
use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};

use crate::inbound::http::health::{HealthState, live, ready};
use crate::inbound::http::{HttpState, api_scope};
use crate::middleware::Trace;

/// Assemble one application instance: trace middleware, health probes, and
/// the `/api` tree.
pub fn build_app(
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<BoxBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(health_state)
        .app_data(http_state)
        .wrap(Trace)
        .service(ready)
        .service(live)
        .service(api_scope())
}

/// Bind the HTTP server on `config.bind_addr` and return the run handle.
///
/// # Errors
/// Returns [`std::io::Error`] when the address cannot be bound.
pub fn create_server(
    config: &AppConfig,
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
) -> std::io::Result<Server> {
    let server = HttpServer::new(move || build_app(health_state.clone(), http_state.clone()))
        .bind(config.bind_addr)?
        .run();
    Ok(server)
}
