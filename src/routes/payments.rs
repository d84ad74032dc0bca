use anyhow::Context;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    error::{AppError, DieselError, StdResponse},
    models::PaymentEntity,
    schema::payments,
    state::AppState,
};

/// Defines routes with OpenAPI specs over the payments recorded by the
/// webhook reconciler. Read-only; rows are only ever written by the
/// reconciliation flow.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/payments",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_payments))
            .routes(utoipa_axum::routes!(get_payment)),
    )
}

/// List recorded gateway payments, most recently updated first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Payments"],
    responses(
        (status = 200, description = "List payments", body = StdResponse<Vec<PaymentEntity>, String>)
    )
)]
async fn get_payments(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let payments: Vec<PaymentEntity> = payments::table
        .order_by(payments::updated_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get payments")?;

    Ok(StdResponse {
        data: Some(payments),
        message: Some("Get payments successfully"),
    })
}

/// Fetch a recorded payment by its gateway payment id.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Payments"],
    params(
        ("id" = i64, Path, description = "Mercado Pago payment ID")
    ),
    responses(
        (status = 200, description = "Get payment successfully", body = StdResponse<PaymentEntity, String>),
        (status = 404, description = "Payment not found")
    )
)]
async fn get_payment(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let payment = match payments::table.find(id).get_result(conn).await {
        Ok(payment) => payment,
        Err(DieselError::NotFound) => return Err(AppError::NotFound),
        Err(err) => return Err(AppError::Other(err.into())),
    };

    Ok(StdResponse {
        data: Some::<PaymentEntity>(payment),
        message: Some("Get payment successfully"),
    })
}
