//! User API handlers.
//!
//! ```text
//! GET    /api/user
//! GET    /api/user/top?n=3
//! GET    /api/user/42
//! POST   /api/user      {"email":"will@smith.com","name":"Will Smith"}
//! PUT    /api/user/42   {"name":"Willard Smith"}
//! DELETE /api/user/42
//! ```

use actix_web::{HttpResponse, delete, get, post, put, web};
use serde::Deserialize;

use crate::domain::ports::UserPersistenceError;
use crate::domain::{Error, NewUser, UserId, UserUpdate};
use crate::inbound::http::ApiResult;
use crate::inbound::http::dto::{TopUserResponse, UserResponse};
use crate::inbound::http::state::HttpState;

/// Request body for `POST /api/user`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    email: Option<String>,
    name: Option<String>,
}

/// Request body for `PUT /api/user/{id}`; absent fields keep their value.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    email: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    n: Option<i64>,
}

fn map_user_error(error: UserPersistenceError) -> Error {
    match error {
        UserPersistenceError::DuplicateEmail => Error::conflict("Email already in use!"),
        UserPersistenceError::Connection { .. } | UserPersistenceError::Query { .. } => {
            Error::internal("Internal server error")
        }
    }
}

fn parse_user_id(raw: &str) -> Result<UserId, Error> {
    raw.parse::<i32>()
        .map(UserId::new)
        .map_err(|_| Error::invalid_request("User id is required!"))
}

/// List every user.
#[get("")]
pub async fn list_users(state: web::Data<HttpState>) -> ApiResult<web::Json<Vec<UserResponse>>> {
    let users = state.users.list_all().await.map_err(map_user_error)?;
    Ok(web::Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Top N users by order count, descending.
#[get("/top")]
pub async fn top_users(
    state: web::Data<HttpState>,
    query: web::Query<TopQuery>,
) -> ApiResult<web::Json<Vec<TopUserResponse>>> {
    let n = query
        .n
        .ok_or_else(|| Error::invalid_request("\"n\" query parameter is required!"))?;
    if n < 1 {
        return Err(Error::invalid_request("\"n\" must be a positive number"));
    }
    let rows = state
        .users
        .top_by_order_count(n)
        .await
        .map_err(map_user_error)?;
    Ok(web::Json(rows.into_iter().map(TopUserResponse::from).collect()))
}

/// Fetch one user by id.
#[get("/{id}")]
pub async fn get_user(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<UserResponse>> {
    let id = parse_user_id(&path)?;
    let user = state
        .users
        .find_by_id(id)
        .await
        .map_err(map_user_error)?
        .ok_or_else(|| Error::not_found("No user with such id!"))?;
    Ok(web::Json(user.into()))
}

/// Create a user and trigger the asynchronous verification workflow.
///
/// The verification event publish runs off the request path: its failure is
/// logged and never fails or delays the creation response.
#[post("")]
pub async fn create_user(
    state: web::Data<HttpState>,
    payload: web::Json<CreateUserRequest>,
) -> ApiResult<HttpResponse> {
    let CreateUserRequest { email, name } = payload.into_inner();
    let (Some(email), Some(name)) = (email, name) else {
        return Err(Error::invalid_request("\"email\" and \"name\" are required!"));
    };
    if email.trim().is_empty() || name.trim().is_empty() {
        return Err(Error::invalid_request("\"email\" and \"name\" are required!"));
    }

    let user = state
        .users
        .create(&NewUser { email, name })
        .await
        .map_err(map_user_error)?;

    state.publisher.announce_detached(user.id);

    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

/// Update a user.
#[put("/{id}")]
pub async fn update_user(
    state: web::Data<HttpState>,
    path: web::Path<String>,
    payload: web::Json<UpdateUserRequest>,
) -> ApiResult<web::Json<UserResponse>> {
    let id = parse_user_id(&path)?;
    let UpdateUserRequest { email, name } = payload.into_inner();

    let updated = state
        .users
        .update(id, &UserUpdate { email, name })
        .await
        .map_err(map_user_error)?
        .ok_or_else(|| Error::not_found("No user with such id!"))?;
    Ok(web::Json(updated.into()))
}

/// Delete a user; referencing orders are detached, not deleted.
#[delete("/{id}")]
pub async fn delete_user(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<UserResponse>> {
    let id = parse_user_id(&path)?;
    let deleted = state
        .users
        .delete(id)
        .await
        .map_err(map_user_error)?
        .ok_or_else(|| Error::not_found("No user with such id!"))?;
    Ok(web::Json(deleted.into()))
}
