use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Per-line budget for consolidated titles. The gateway truncates long item
/// titles on its hosted page, so multi-item carts are collapsed into one
/// line-wrapped synthetic item instead.
const TITLE_WRAP_WIDTH: usize = 50;

/// A cart line as submitted by the storefront.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct CheckoutItem {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub unit_price: f64,
    pub quantity: i32,
    #[serde(default)]
    pub picture_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

/// Line item as sent to the gateway.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PreferenceItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub unit_price: f64,
    pub quantity: i32,
    pub currency_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct PreferenceRequest {
    pub items: Vec<PreferenceItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<Value>,
    pub back_urls: BackUrls,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_return: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipments: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_methods: Option<Value>,
    pub metadata: Value,
}

#[derive(Deserialize, Serialize, Debug, ToSchema)]
pub struct PreferenceResponse {
    pub id: String,
    pub init_point: String,
    #[serde(default)]
    pub sandbox_init_point: Option<String>,
}

/// Caller-supplied knobs; anything absent falls back to environment-derived
/// defaults.
#[derive(Default, Debug)]
pub struct PreferenceOptions {
    pub payer: Option<Value>,
    pub metadata: Option<Value>,
    pub back_urls: Option<BackUrls>,
    pub notification_url: Option<String>,
    pub external_reference: Option<String>,
    /// Forwarded to the gateway untouched.
    pub shipments: Option<Value>,
    pub payment_methods: Option<Value>,
}

/// Assemble a gateway preference from cart items. A single-item cart passes
/// through untouched; larger carts collapse into one synthetic line whose
/// price is the exact cart total, with the original lines preserved under
/// `metadata.items` for reconciliation.
pub fn build_preference(
    items: &[CheckoutItem],
    options: PreferenceOptions,
    currency_id: &str,
    public_base_url: &str,
) -> PreferenceRequest {
    let preference_items = if items.len() == 1 {
        let item = &items[0];
        vec![PreferenceItem {
            id: item.id.clone(),
            title: item.title.clone(),
            unit_price: item.unit_price,
            quantity: item.quantity,
            currency_id: currency_id.to_string(),
            picture_url: item.picture_url.clone(),
        }]
    } else {
        vec![PreferenceItem {
            id: None,
            title: consolidated_title(items),
            unit_price: cart_total(items),
            quantity: 1,
            currency_id: currency_id.to_string(),
            picture_url: None,
        }]
    };

    let base = public_base_url.trim_end_matches('/');
    let back_urls = options.back_urls.unwrap_or_else(|| BackUrls {
        success: format!("{base}/checkout/success"),
        failure: format!("{base}/checkout/failure"),
        pending: format!("{base}/checkout/pending"),
    });

    // The gateway rejects auto_return for plain-http or loopback redirects.
    let auto_return = auto_return_eligible(&back_urls.success).then(|| "approved".to_string());

    let notification_url = options
        .notification_url
        .or_else(|| Some(format!("{base}/mercadopago/webhook")));

    let mut metadata = match options.metadata {
        Some(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    metadata.insert(
        "items".to_string(),
        serde_json::to_value(items).unwrap_or(Value::Null),
    );

    PreferenceRequest {
        items: preference_items,
        payer: options.payer,
        back_urls,
        auto_return,
        notification_url,
        external_reference: options.external_reference,
        shipments: options.shipments,
        payment_methods: options.payment_methods,
        metadata: Value::Object(metadata),
    }
}

pub fn cart_total(items: &[CheckoutItem]) -> f64 {
    items
        .iter()
        .map(|item| item.unit_price * item.quantity as f64)
        .sum()
}

/// "name (×qty)" fragments joined with commas, greedily wrapped so no line
/// exceeds `TITLE_WRAP_WIDTH`. A single fragment longer than the budget is
/// truncated with an ellipsis.
fn consolidated_title(items: &[CheckoutItem]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for item in items {
        let mut fragment = format!("{} (×{})", item.title, item.quantity);
        if fragment.chars().count() > TITLE_WRAP_WIDTH {
            fragment = fragment
                .chars()
                .take(TITLE_WRAP_WIDTH - 1)
                .collect::<String>()
                + "…";
        }

        if current.is_empty() {
            current = fragment;
        } else if current.chars().count() + 2 + fragment.chars().count() <= TITLE_WRAP_WIDTH {
            current.push_str(", ");
            current.push_str(&fragment);
        } else {
            lines.push(current);
            current = fragment;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines.join("\n")
}

fn auto_return_eligible(success_url: &str) -> bool {
    let Some(rest) = success_url.strip_prefix("https://") else {
        return false;
    };
    let authority = rest
        .split(['/', '?'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if authority.starts_with("[::1]") {
        return false;
    }
    let host = authority.split(':').next().unwrap_or_default();
    !matches!(host, "localhost" | "127.0.0.1" | "")
}
