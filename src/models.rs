use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// Orders

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEntity {
    pub id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub status: String,
    pub total_amount: f64,
    pub payment_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateOrderEntity {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub status: String,
    pub total_amount: f64,
    pub notes: Option<String>,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(belongs_to(OrderEntity, foreign_key = order_id))]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemEntity {
    pub id: i32,
    pub order_id: Uuid,
    pub product_id: String,
    pub product_name: String,
    pub product_price: f64,
    pub quantity: i32,
    pub subtotal: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Deserialize, Debug)]
#[diesel(table_name = crate::schema::order_items)]
pub struct CreateOrderItemEntity {
    pub order_id: Uuid,
    pub product_id: String,
    pub product_name: String,
    pub product_price: f64,
    pub quantity: i32,
    pub subtotal: f64,
}

// Payments

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::payments)]
#[diesel(primary_key(mercadopago_payment_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PaymentEntity {
    pub mercadopago_payment_id: i64,
    pub status: String,
    pub status_detail: Option<String>,
    pub payment_type: Option<String>,
    pub amount: f64,
    pub external_reference: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_approved: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Serialize, Deserialize, Debug)]
#[diesel(table_name = crate::schema::payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UpsertPaymentEntity {
    pub mercadopago_payment_id: i64,
    pub status: String,
    pub status_detail: Option<String>,
    pub payment_type: Option<String>,
    pub amount: f64,
    pub external_reference: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_approved: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

/// Order lifecycle states. `paid` is only ever set by the payment
/// reconciler or an explicit admin transition; nothing moves out of
/// `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Paid,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Paid => "paid",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "paid" => Some(OrderStatus::Paid),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether `next` is a legal transition. Re-asserting the current
    /// status is allowed and treated as a no-op by callers, which is what
    /// makes replayed approval webhooks harmless.
    pub fn can_become(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        if self == next {
            return true;
        }
        match self {
            Pending => matches!(next, Confirmed | Paid | Cancelled),
            Confirmed => matches!(next, Paid | Cancelled),
            Paid => matches!(next, Delivered),
            Delivered | Cancelled => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OrderStatus::*;

    #[test]
    fn paid_is_reachable_from_any_open_state() {
        assert!(Pending.can_become(Paid));
        assert!(Confirmed.can_become(Paid));
    }

    #[test]
    fn replayed_approval_is_a_noop_transition() {
        assert!(Paid.can_become(Paid));
    }

    #[test]
    fn terminal_states_do_not_reopen() {
        assert!(!Cancelled.can_become(Pending));
        assert!(!Cancelled.can_become(Paid));
        assert!(!Delivered.can_become(Paid));
        assert!(!Paid.can_become(Pending));
        assert!(!Paid.can_become(Cancelled));
    }

    #[test]
    fn round_trips_through_strings() {
        for status in [Pending, Confirmed, Paid, Delivered, Cancelled] {
            assert_eq!(super::OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(super::OrderStatus::parse("shipped"), None);
    }
}
