use axum::{Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    error::{AppError, StdResponse},
    mercadopago::preference::{
        BackUrls, CheckoutItem, PreferenceOptions, PreferenceResponse, build_preference,
    },
    state::AppState,
};

/// Defines the checkout-preference route with OpenAPI specs.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/mercadopago/create-preference",
        OpenApiRouter::new().routes(utoipa_axum::routes!(create_preference)),
    )
}

#[derive(Deserialize, ToSchema)]
struct CreatePreferenceReq {
    items: Vec<CheckoutItem>,
    #[serde(default)]
    payer: Option<Value>,
    #[serde(default)]
    metadata: Option<Value>,
    #[serde(default)]
    back_urls: Option<BackUrls>,
    #[serde(default)]
    notification_url: Option<String>,
    #[serde(default)]
    external_reference: Option<String>,
    #[serde(default)]
    shipments: Option<Value>,
    #[serde(default)]
    payment_methods: Option<Value>,
}

/// Create a gateway checkout session for the given cart and return its
/// redirect URLs. The storefront sends the order id as
/// `external_reference` so the payment webhook can find its way back.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Checkout"],
    request_body = CreatePreferenceReq,
    responses(
        (status = 200, description = "Preference created", body = StdResponse<PreferenceResponse, String>),
        (status = 400, description = "Invalid cart"),
        (status = 500, description = "Gateway error")
    )
)]
async fn create_preference(
    State(state): State<AppState>,
    Json(body): Json<CreatePreferenceReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.items.is_empty() {
        return Err(AppError::BadRequest(
            "Preference must contain at least one item".into(),
        ));
    }
    if body
        .items
        .iter()
        .any(|item| item.quantity <= 0 || item.unit_price < 0.0)
    {
        return Err(AppError::BadRequest(
            "Item quantities must be positive and prices non-negative".into(),
        ));
    }

    let request = build_preference(
        &body.items,
        PreferenceOptions {
            payer: body.payer,
            metadata: body.metadata,
            back_urls: body.back_urls,
            notification_url: body.notification_url,
            external_reference: body.external_reference.clone(),
            shipments: body.shipments,
            payment_methods: body.payment_methods,
        },
        &state.config.mercadopago.currency_id,
        &state.config.server.public_base_url,
    );

    let preference = state.mercadopago.create_preference(&request).await?;

    info!(
        preference_id = %preference.id,
        external_reference = ?body.external_reference,
        "Created checkout preference"
    );

    Ok(StdResponse {
        data: Some(preference),
        message: Some("Created preference successfully"),
    })
}
