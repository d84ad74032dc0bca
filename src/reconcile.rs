use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper, upsert::excluded};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    mercadopago::client::PaymentDetails,
    models::{OrderStatus, PaymentEntity, UpsertPaymentEntity},
    schema::{orders, payments},
};

/// Record a gateway payment and, when approved, move the referenced order
/// to `paid`.
///
/// The upsert is keyed by the gateway's payment id, so replayed webhook
/// deliveries converge on the same row. The order update is best-effort: a
/// failure there is logged and swallowed so the payment stays durably
/// recorded for manual reconciliation.
pub async fn reconcile_payment(
    conn: &mut AsyncPgConnection,
    details: &PaymentDetails,
) -> Result<PaymentEntity> {
    let payment = record_payment(conn, details).await?;

    if let Some(order_id) = paid_order_id(details) {
        if let Err(err) = mark_order_paid(conn, order_id, details.date_approved).await {
            error!(
                payment_id = details.id,
                order_id = %order_id,
                "Failed to mark order as paid: {err:#}"
            );
        }
    }

    Ok(payment)
}

/// Idempotent upsert into `payments` keyed by `mercadopago_payment_id`.
/// A failure here aborts reconciliation.
pub async fn record_payment(
    conn: &mut AsyncPgConnection,
    details: &PaymentDetails,
) -> Result<PaymentEntity> {
    let row = UpsertPaymentEntity {
        mercadopago_payment_id: details.id,
        status: details.status.clone(),
        status_detail: details.status_detail.clone(),
        payment_type: details.payment_type_id.clone(),
        amount: details.transaction_amount,
        external_reference: details.external_reference.clone(),
        date_created: details.date_created,
        date_approved: details.date_approved,
        description: details.description.clone(),
    };

    let payment = diesel::insert_into(payments::table)
        .values(&row)
        .on_conflict(payments::mercadopago_payment_id)
        .do_update()
        .set((
            payments::status.eq(excluded(payments::status)),
            payments::status_detail.eq(excluded(payments::status_detail)),
            payments::payment_type.eq(excluded(payments::payment_type)),
            payments::amount.eq(excluded(payments::amount)),
            payments::external_reference.eq(excluded(payments::external_reference)),
            payments::date_created.eq(excluded(payments::date_created)),
            payments::date_approved.eq(excluded(payments::date_approved)),
            payments::description.eq(excluded(payments::description)),
            payments::updated_at.eq(diesel::dsl::now),
        ))
        .returning(PaymentEntity::as_returning())
        .get_result(conn)
        .await
        .with_context(|| format!("Failed to upsert payment {}", details.id))?;

    info!(
        payment_id = details.id,
        status = %details.status,
        "Recorded gateway payment"
    );

    Ok(payment)
}

/// The order to mark paid, if this payment warrants it: the payment must be
/// approved and its external reference must be a valid order id. A
/// reference that does not parse is logged and treated as absent.
pub fn paid_order_id(details: &PaymentDetails) -> Option<Uuid> {
    if !details.is_approved() {
        return None;
    }
    let reference = details.external_reference.as_deref()?;
    if reference.is_empty() {
        return None;
    }
    match reference.parse() {
        Ok(order_id) => Some(order_id),
        Err(_) => {
            warn!(
                payment_id = details.id,
                external_reference = reference,
                "External reference is not an order id; skipping order update"
            );
            None
        }
    }
}

async fn mark_order_paid(
    conn: &mut AsyncPgConnection,
    order_id: Uuid,
    date_approved: Option<DateTime<Utc>>,
) -> Result<()> {
    let updated = diesel::update(orders::table.find(order_id))
        .set((
            orders::status.eq(OrderStatus::Paid.as_str()),
            orders::payment_date.eq(date_approved),
            orders::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
        .await
        .context("Failed to update order status")?;

    if updated == 0 {
        anyhow::bail!("No order with id {order_id}");
    }

    info!(order_id = %order_id, "Order has been marked as paid");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(status: &str, external_reference: Option<&str>) -> PaymentDetails {
        PaymentDetails {
            id: 119144160837,
            status: status.to_string(),
            status_detail: Some("accredited".to_string()),
            payment_type_id: Some("credit_card".to_string()),
            transaction_amount: 24990.0,
            external_reference: external_reference.map(str::to_string),
            date_created: None,
            date_approved: None,
            description: Some("Anillo de plata".to_string()),
        }
    }

    #[test]
    fn approved_payment_with_order_reference_targets_that_order() {
        let order_id = Uuid::new_v4();
        let details = details("approved", Some(&order_id.to_string()));
        assert_eq!(paid_order_id(&details), Some(order_id));
    }

    #[test]
    fn non_approved_payment_never_touches_the_order() {
        let order_id = Uuid::new_v4().to_string();
        for status in ["pending", "in_process", "rejected", "refunded"] {
            assert_eq!(paid_order_id(&details(status, Some(&order_id))), None);
        }
    }

    #[test]
    fn missing_or_empty_reference_is_skipped() {
        assert_eq!(paid_order_id(&details("approved", None)), None);
        assert_eq!(paid_order_id(&details("approved", Some(""))), None);
    }

    #[test]
    fn malformed_reference_is_skipped_not_fatal() {
        assert_eq!(paid_order_id(&details("approved", Some("legacy-42"))), None);
    }
}
