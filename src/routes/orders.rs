use std::collections::HashMap;

use anyhow::Context;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    error::{AppError, DieselError, StdResponse},
    models::{
        CreateOrderEntity, CreateOrderItemEntity, OrderEntity, OrderItemEntity, OrderStatus,
    },
    schema::{order_items, orders},
    state::AppState,
};

/// Defines order intake and back-office routes with OpenAPI specs.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_orders))
            .routes(utoipa_axum::routes!(get_order))
            .routes(utoipa_axum::routes!(create_order))
            .routes(utoipa_axum::routes!(update_order_status)),
    )
}

#[derive(Serialize, ToSchema)]
struct GetOrderRes {
    pub order: OrderEntity,
    pub order_items: Vec<OrderItemEntity>,
}

/// Fetch all orders, newest first, with their items.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    responses(
        (status = 200, description = "List all orders", body = StdResponse<Vec<GetOrderRes>, String>)
    )
)]
async fn get_orders(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let orders: Vec<OrderEntity> = orders::table
        .order_by(orders::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get orders")?;

    let order_ids: Vec<Uuid> = orders.iter().map(|order| order.id).collect();
    let items: Vec<OrderItemEntity> = order_items::table
        .filter(order_items::order_id.eq_any(&order_ids))
        .get_results(conn)
        .await
        .context("Failed to get order items")?;

    let mut group: HashMap<Uuid, Vec<OrderItemEntity>> = HashMap::new();
    for item in items {
        group.entry(item.order_id).or_default().push(item);
    }

    let orders_with_items: Vec<GetOrderRes> = orders
        .into_iter()
        .map(|order| {
            let order_items = group.remove(&order.id).unwrap_or_default();
            GetOrderRes { order, order_items }
        })
        .collect();

    Ok(StdResponse {
        data: Some(orders_with_items),
        message: Some("Get orders successfully"),
    })
}

/// Fetch a specific order with its items.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Orders"],
    params(
        ("id" = Uuid, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<GetOrderRes, String>),
        (status = 404, description = "Order not found")
    )
)]
async fn get_order(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order: OrderEntity = orders::table
        .find(id)
        .get_result(conn)
        .await
        .map_err(lookup_error)?;

    let order_items: Vec<OrderItemEntity> = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .get_results(conn)
        .await
        .context("Failed to get order items")?;

    Ok(StdResponse {
        data: Some(GetOrderRes { order, order_items }),
        message: Some("Get order successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct CreateOrderReq {
    customer_name: String,
    customer_phone: String,
    customer_email: Option<String>,
    notes: Option<String>,
    items: Vec<CreateOrderReqItem>,
}

#[derive(Deserialize, ToSchema)]
struct CreateOrderReqItem {
    product_id: String,
    product_name: String,
    product_price: f64,
    quantity: i32,
}

#[derive(Serialize, ToSchema)]
struct CreateOrderRes {
    pub order: OrderEntity,
    pub order_items: Vec<OrderItemEntity>,
}

/// Create an order from a submitted cart. The order and its items are
/// inserted in one transaction; the order id doubles as the gateway
/// `external_reference` later in checkout.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Orders"],
    request_body = CreateOrderReq,
    responses(
        (status = 200, description = "Created order successfully", body = StdResponse<CreateOrderRes, String>),
        (status = 400, description = "Invalid cart")
    )
)]
async fn create_order(
    State(state): State<AppState>,
    Json(body): Json<CreateOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.items.is_empty() {
        return Err(AppError::BadRequest("Order must contain items".into()));
    }
    if body
        .items
        .iter()
        .any(|item| item.quantity <= 0 || item.product_price < 0.0)
    {
        return Err(AppError::BadRequest(
            "Item quantities must be positive and prices non-negative".into(),
        ));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let total_amount: f64 = body
        .items
        .iter()
        .map(|item| item.product_price * item.quantity as f64)
        .sum();

    let (order, order_items) = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let order: OrderEntity = diesel::insert_into(orders::table)
                    .values(CreateOrderEntity {
                        customer_name: body.customer_name,
                        customer_phone: body.customer_phone,
                        customer_email: body.customer_email,
                        status: OrderStatus::Pending.as_str().into(),
                        total_amount,
                        notes: body.notes,
                    })
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to create order")?;

                let order_items: Vec<CreateOrderItemEntity> = body
                    .items
                    .into_iter()
                    .map(|item| CreateOrderItemEntity {
                        order_id: order.id,
                        subtotal: item.product_price * item.quantity as f64,
                        product_id: item.product_id,
                        product_name: item.product_name,
                        product_price: item.product_price,
                        quantity: item.quantity,
                    })
                    .collect();

                let order_items = diesel::insert_into(order_items::table)
                    .values(order_items)
                    .returning(OrderItemEntity::as_returning())
                    .get_results(conn)
                    .await
                    .context("Failed to create order items")?;

                Ok::<(OrderEntity, Vec<OrderItemEntity>), anyhow::Error>((order, order_items))
            })
        })
        .await
        .context("Transaction failed")?;

    Ok(StdResponse {
        data: Some(CreateOrderRes { order, order_items }),
        message: Some("Created order successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateOrderStatusReq {
    status: OrderStatus,
}

/// Move an order through its lifecycle from the back office. Transitions
/// are validated against the status state machine; `paid` is normally set
/// by the payment reconciler but may be forced here for offline payments.
#[utoipa::path(
    patch,
    path = "/{id}/status",
    tags = ["Orders"],
    params(
        ("id" = Uuid, Path, description = "Order ID to update")
    ),
    request_body = UpdateOrderStatusReq,
    responses(
        (status = 200, description = "Updated order status", body = StdResponse<OrderEntity, String>),
        (status = 400, description = "Illegal status transition"),
        (status = 404, description = "Order not found")
    )
)]
async fn update_order_status(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<UpdateOrderStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order: OrderEntity = orders::table
        .find(id)
        .get_result(conn)
        .await
        .map_err(lookup_error)?;

    let current = OrderStatus::parse(&order.status)
        .with_context(|| format!("Order {id} has unknown status {}", order.status))?;

    if !current.can_become(body.status) {
        return Err(AppError::BadRequest(format!(
            "Cannot move order from {} to {}",
            current.as_str(),
            body.status.as_str()
        )));
    }

    let updated_order = diesel::update(orders::table.find(id))
        .set((
            orders::status.eq(body.status.as_str()),
            orders::updated_at.eq(diesel::dsl::now),
        ))
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to update order status")?;

    Ok(StdResponse {
        data: Some(updated_order),
        message: Some("Updated order status successfully"),
    })
}

/// Only a missing row is the client's fault; anything else the database
/// reports here is a server-side failure.
fn lookup_error(err: DieselError) -> AppError {
    match err {
        DieselError::NotFound => AppError::NotFound,
        err => AppError::Other(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_row_maps_to_not_found() {
        let response = lookup_error(DieselError::NotFound).into_response();
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn connection_failure_is_not_a_not_found() {
        let err = lookup_error(DieselError::BrokenTransactionManager);
        let response = err.into_response();
        assert_eq!(
            response.status(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
