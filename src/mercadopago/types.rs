use serde::Deserialize;
use serde_json::Value;

/// Raw webhook notification body as the gateway sends it.
#[derive(Deserialize, Debug)]
pub struct WebhookBody {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Option<WebhookData>,
    #[serde(default)]
    pub live_mode: Option<bool>,
    #[serde(default)]
    pub user_id: Option<Value>,
}

#[derive(Deserialize, Debug)]
pub struct WebhookData {
    /// The gateway sends this as a string for payments and as a number for
    /// merchant orders.
    #[serde(default)]
    pub id: Option<Value>,
}

/// The `type`/`action` pair lifted into a closed set so dispatch is a match
/// instead of nested string comparisons.
#[derive(Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    PaymentCreated { id: String },
    PaymentUpdated { id: String },
    MerchantOrderCreated { id: String },
    MerchantOrderUpdated { id: String },
    Unhandled { kind: String, action: String },
}

impl WebhookBody {
    pub fn event(&self) -> WebhookEvent {
        let kind = self.kind.as_deref().unwrap_or("");
        let action = self.action.as_deref().unwrap_or("");

        let unhandled = || WebhookEvent::Unhandled {
            kind: kind.to_string(),
            action: action.to_string(),
        };

        let Some(id) = self.data_id() else {
            return unhandled();
        };

        match (kind, action) {
            ("payment", "payment.created") => WebhookEvent::PaymentCreated { id },
            ("payment", "payment.updated") => WebhookEvent::PaymentUpdated { id },
            ("merchant_order", "merchant_order.created") => {
                WebhookEvent::MerchantOrderCreated { id }
            }
            ("merchant_order", "merchant_order.updated") => {
                WebhookEvent::MerchantOrderUpdated { id }
            }
            _ => unhandled(),
        }
    }

    /// `data.id` normalized to a string regardless of its JSON type.
    pub fn data_id(&self) -> Option<String> {
        match self.data.as_ref()?.id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: &str) -> WebhookBody {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn dispatches_payment_events() {
        let created = body(r#"{"type":"payment","action":"payment.created","data":{"id":"123"}}"#);
        assert_eq!(
            created.event(),
            WebhookEvent::PaymentCreated { id: "123".into() }
        );

        let updated = body(r#"{"type":"payment","action":"payment.updated","data":{"id":"123"}}"#);
        assert_eq!(
            updated.event(),
            WebhookEvent::PaymentUpdated { id: "123".into() }
        );
    }

    #[test]
    fn dispatches_merchant_order_events_with_numeric_ids() {
        let event = body(
            r#"{"type":"merchant_order","action":"merchant_order.updated","data":{"id":987654}}"#,
        );
        assert_eq!(
            event.event(),
            WebhookEvent::MerchantOrderUpdated {
                id: "987654".into()
            }
        );
    }

    #[test]
    fn unknown_combinations_are_unhandled() {
        let event = body(r#"{"type":"plan","action":"plan.created","data":{"id":"1"}}"#);
        assert_eq!(
            event.event(),
            WebhookEvent::Unhandled {
                kind: "plan".into(),
                action: "plan.created".into()
            }
        );
    }

    #[test]
    fn payment_event_without_data_id_is_unhandled() {
        let event = body(r#"{"type":"payment","action":"payment.updated"}"#);
        assert!(matches!(event.event(), WebhookEvent::Unhandled { .. }));
    }
}
