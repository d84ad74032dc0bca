//! Reconciliation tests against a live Postgres instance.
//!
//! Ignored by default; run with `DATABASE_URL=... cargo test -- --ignored`
//! against a throwaway database. Migrations are applied on connect.

use chrono::Utc;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use lumina_orderservice::{
    db,
    mercadopago::client::PaymentDetails,
    models::{CreateOrderEntity, OrderEntity, OrderStatus, PaymentEntity},
    reconcile,
    schema::{orders, payments},
};
use uuid::Uuid;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

async fn connect() -> AsyncPgConnection {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
    db::run_migrations_blocking(MIGRATIONS, &url)
        .await
        .expect("migrations");
    AsyncPgConnection::establish(&url).await.expect("connect")
}

fn fresh_payment_id() -> i64 {
    Utc::now().timestamp_nanos_opt().expect("in range")
}

fn approved_details(payment_id: i64, external_reference: Option<String>) -> PaymentDetails {
    PaymentDetails {
        id: payment_id,
        status: "approved".to_string(),
        status_detail: Some("accredited".to_string()),
        payment_type_id: Some("credit_card".to_string()),
        transaction_amount: 24990.0,
        external_reference,
        date_created: Some(Utc::now()),
        date_approved: Some(Utc::now()),
        description: Some("Anillo de plata".to_string()),
    }
}

async fn insert_pending_order(conn: &mut AsyncPgConnection) -> OrderEntity {
    diesel::insert_into(orders::table)
        .values(&CreateOrderEntity {
            customer_name: "Test Customer".to_string(),
            customer_phone: "+54 11 5555-0000".to_string(),
            customer_email: None,
            status: OrderStatus::Pending.as_str().to_string(),
            total_amount: 24990.0,
            notes: None,
        })
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await
        .expect("insert order")
}

#[tokio::test]
#[ignore = "needs a Postgres instance"]
async fn replayed_delivery_converges_on_one_payment_row() {
    let conn = &mut connect().await;
    let order = insert_pending_order(conn).await;
    let payment_id = fresh_payment_id();

    let details = approved_details(payment_id, Some(order.id.to_string()));
    reconcile::reconcile_payment(conn, &details).await.expect("first delivery");
    reconcile::reconcile_payment(conn, &details).await.expect("replayed delivery");

    let rows: Vec<PaymentEntity> = payments::table
        .filter(payments::mercadopago_payment_id.eq(payment_id))
        .get_results(conn)
        .await
        .expect("query payments");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, "approved");

    let order: OrderEntity = orders::table
        .find(order.id)
        .get_result(conn)
        .await
        .expect("query order");
    assert_eq!(order.status, OrderStatus::Paid.as_str());
    assert!(order.payment_date.is_some());
}

#[tokio::test]
#[ignore = "needs a Postgres instance"]
async fn payment_is_recorded_even_when_the_order_is_missing() {
    let conn = &mut connect().await;
    let payment_id = fresh_payment_id();

    // References an order that does not exist; the order update fails
    // internally but the payment must still land for manual reconciliation.
    let details = approved_details(payment_id, Some(Uuid::new_v4().to_string()));
    let payment = reconcile::reconcile_payment(conn, &details)
        .await
        .expect("reconciliation must not propagate the order failure");
    assert_eq!(payment.mercadopago_payment_id, payment_id);

    let stored: PaymentEntity = payments::table
        .find(payment_id)
        .get_result(conn)
        .await
        .expect("payment row exists");
    assert_eq!(stored.status, "approved");
}

#[tokio::test]
#[ignore = "needs a Postgres instance"]
async fn non_approved_payment_leaves_the_order_pending() {
    let conn = &mut connect().await;
    let order = insert_pending_order(conn).await;

    let mut details = approved_details(fresh_payment_id(), Some(order.id.to_string()));
    details.status = "in_process".to_string();
    details.date_approved = None;
    reconcile::reconcile_payment(conn, &details).await.expect("reconcile");

    let order: OrderEntity = orders::table
        .find(order.id)
        .get_result(conn)
        .await
        .expect("query order");
    assert_eq!(order.status, OrderStatus::Pending.as_str());
}
