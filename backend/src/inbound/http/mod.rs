//! HTTP inbound adapter: routing, request DTOs, and error mapping.

pub mod dto;
mod error;
pub mod health;
mod orders;
mod state;
#[cfg(test)]
pub(crate) mod test_utils;
mod users;

use actix_web::{Scope, web};

pub use error::ApiResult;
pub use state::HttpState;

/// The `/api` routing tree. Literal segments are registered ahead of the
/// `{id}` captures so `/user/top` never resolves as a user id.
pub fn api_scope() -> Scope {
    web::scope("/api")
        .service(
            web::scope("/user")
                .service(users::list_users)
                .service(users::top_users)
                .service(users::create_user)
                .service(users::get_user)
                .service(users::update_user)
                .service(users::delete_user),
        )
        .service(
            web::scope("/order")
                .service(orders::list_orders)
                .service(orders::upload_orders)
                .service(orders::create_order)
                .service(orders::get_order)
                .service(orders::update_order)
                .service(orders::delete_order),
        )
}
