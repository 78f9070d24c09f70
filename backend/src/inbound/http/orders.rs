//! Order API handlers.
//!
//! Listing is a `POST /_list` taking pagination and filters in the body, and
//! `POST /upload` bulk-imports orders from an uploaded JSON file.

use actix_multipart::Multipart;
use actix_web::{HttpResponse, delete, get, post, put, web};
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use pagination::{Page, PageRequest};
use serde::Deserialize;

use crate::domain::ports::OrderPersistenceError;
use crate::domain::{Error, NewOrder, OrderFilter, OrderId, OrderUpdate, UserId};
use crate::inbound::http::ApiResult;
use crate::inbound::http::dto::OrderResponse;
use crate::inbound::http::state::HttpState;

/// Request body for `POST /api/order`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    user_id: Option<i32>,
    delivery_address: Option<String>,
    order_date: Option<DateTime<Utc>>,
    status: Option<String>,
    note: Option<String>,
}

/// Request body for `PUT /api/order/{id}`; absent fields keep their value.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    user_id: Option<i32>,
    delivery_address: Option<String>,
    order_date: Option<DateTime<Utc>>,
    status: Option<String>,
    note: Option<String>,
}

/// Request body for `POST /api/order/_list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersRequest {
    page: Option<i64>,
    size: Option<i64>,
    user_id: Option<i32>,
    status: Option<String>,
}

/// One record in an uploaded import file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportRecord {
    user_id: Option<i32>,
    delivery_address: String,
    order_date: DateTime<Utc>,
    status: String,
    note: Option<String>,
}

impl From<ImportRecord> for NewOrder {
    fn from(record: ImportRecord) -> Self {
        Self {
            user_id: record.user_id.map(UserId::new),
            delivery_address: record.delivery_address,
            order_date: record.order_date,
            status: record.status,
            note: record.note,
        }
    }
}

fn map_order_error(error: OrderPersistenceError) -> Error {
    match error {
        OrderPersistenceError::Connection { .. } | OrderPersistenceError::Query { .. } => {
            Error::internal("Internal server error")
        }
    }
}

fn parse_order_id(raw: &str) -> Result<OrderId, Error> {
    raw.parse::<i32>()
        .map(OrderId::new)
        .map_err(|_| Error::invalid_request("Order id is required!"))
}

/// Fetch one order, with its user populated when one is attached.
#[get("/{id}")]
pub async fn get_order(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<OrderResponse>> {
    let id = parse_order_id(&path)?;
    let order = state
        .orders
        .find_by_id(id)
        .await
        .map_err(map_order_error)?
        .ok_or_else(|| Error::not_found("No order with such id!"))?;
    Ok(web::Json(order.into()))
}

/// Create an order.
///
/// An unknown `userId` does not fail the request; the order is simply stored
/// without a user.
#[post("")]
pub async fn create_order(
    state: web::Data<HttpState>,
    payload: web::Json<CreateOrderRequest>,
) -> ApiResult<HttpResponse> {
    let body = payload.into_inner();
    let (Some(delivery_address), Some(order_date), Some(status)) =
        (body.delivery_address, body.order_date, body.status)
    else {
        return Err(Error::invalid_request(
            "\"deliveryAddress\", \"orderDate\" and \"status\" are required!",
        ));
    };

    let mut user_id = None;
    if let Some(raw) = body.user_id {
        let candidate = UserId::new(raw);
        let found = state
            .users
            .find_by_id(candidate)
            .await
            .map_err(|_| Error::internal("Internal server error"))?;
        user_id = found.map(|user| user.id);
    }

    let order = state
        .orders
        .create(&NewOrder {
            user_id,
            delivery_address,
            order_date,
            status,
            note: body.note,
        })
        .await
        .map_err(map_order_error)?;

    Ok(HttpResponse::Created().json(OrderResponse::from(order)))
}

/// Update an order. Unlike creation, naming an unknown `userId` here is an
/// error rather than a silent detach.
#[put("/{id}")]
pub async fn update_order(
    state: web::Data<HttpState>,
    path: web::Path<String>,
    payload: web::Json<UpdateOrderRequest>,
) -> ApiResult<web::Json<OrderResponse>> {
    let id = parse_order_id(&path)?;
    let body = payload.into_inner();

    let mut user_id = None;
    if let Some(raw) = body.user_id {
        let candidate = UserId::new(raw);
        state
            .users
            .find_by_id(candidate)
            .await
            .map_err(|_| Error::internal("Internal server error"))?
            .ok_or_else(|| Error::not_found("No user with such id!"))?;
        user_id = Some(candidate);
    }

    let updated = state
        .orders
        .update(
            id,
            &OrderUpdate {
                user_id,
                delivery_address: body.delivery_address,
                order_date: body.order_date,
                status: body.status,
                note: body.note,
            },
        )
        .await
        .map_err(map_order_error)?
        .ok_or_else(|| Error::not_found("No order with such id!"))?;
    Ok(web::Json(updated.into()))
}

/// Delete an order.
#[delete("/{id}")]
pub async fn delete_order(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<OrderResponse>> {
    let id = parse_order_id(&path)?;
    let deleted = state
        .orders
        .delete(id)
        .await
        .map_err(map_order_error)?
        .ok_or_else(|| Error::not_found("No order with such id!"))?;
    Ok(web::Json(deleted.into()))
}

/// Paginated, filterable order listing, ordered by id ascending.
#[post("/_list")]
pub async fn list_orders(
    state: web::Data<HttpState>,
    payload: web::Json<ListOrdersRequest>,
) -> ApiResult<web::Json<Page<OrderResponse>>> {
    let body = payload.into_inner();
    let (Some(page), Some(size)) = (body.page, body.size) else {
        return Err(Error::invalid_request(
            "Both \"page\" and \"size\" parameters are required!",
        ));
    };
    let request = PageRequest::new(page, size)
        .map_err(|error| Error::invalid_request(error.to_string()))?;

    let filter = OrderFilter {
        user_id: body.user_id.map(UserId::new),
        status: body.status,
    };
    let (orders, total) = state
        .orders
        .list(&filter, request)
        .await
        .map_err(map_order_error)?;

    Ok(web::Json(Page::new(
        orders.into_iter().map(OrderResponse::from).collect(),
        request,
        total,
    )))
}

/// Bulk import from an uploaded JSON file containing an array of orders.
///
/// The whole file is validated before any row is stored; the import itself is
/// a single transaction, so a bad file imports nothing.
#[post("/upload")]
pub async fn upload_orders(
    state: web::Data<HttpState>,
    mut multipart: Multipart,
) -> ApiResult<HttpResponse> {
    let mut file: Option<web::BytesMut> = None;

    while let Some(field) = multipart.try_next().await.map_err(|error| {
        tracing::debug!(%error, "rejecting malformed multipart request");
        Error::invalid_request("No file uploaded")
    })? {
        if field.name() != Some("file") {
            // Unrelated form fields are drained and skipped, not rejected.
            let mut skipped = field;
            while let Ok(Some(_)) = skipped.try_next().await {}
            continue;
        }
        let is_json = field
            .content_type()
            .is_some_and(|mime| mime.essence_str() == "application/json");
        if !is_json {
            return Err(Error::invalid_request("Only JSON files are allowed"));
        }

        let mut buffer = web::BytesMut::new();
        let mut chunks = field;
        while let Some(chunk) = chunks.try_next().await.map_err(|error| {
            tracing::warn!(%error, "failed reading uploaded file");
            Error::internal("Error processing the uploaded file")
        })? {
            buffer.extend_from_slice(&chunk);
        }
        file = Some(buffer);
        break;
    }

    let Some(file) = file else {
        return Err(Error::invalid_request("No file uploaded"));
    };

    let records: Vec<ImportRecord> = serde_json::from_slice(&file).map_err(|error| {
        tracing::warn!(%error, "uploaded file is not a valid order array");
        Error::internal("Error processing the uploaded file")
    })?;
    let new_orders: Vec<NewOrder> = records.into_iter().map(NewOrder::from).collect();

    let imported = state.orders.import(&new_orders).await.map_err(|error| {
        tracing::error!(%error, "bulk order import failed");
        Error::internal("Error processing the uploaded file")
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "importedRecords": imported })))
}
