use std::sync::Arc;

use crate::{config::Config, db::DbPool, mercadopago::client::MercadoPagoClient};

/// Shared per-request state. Everything here is clone-cheap; the Mercado
/// Pago client is constructed once and injected rather than instantiated at
/// module load, so tests can point it at a fake gateway.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub http_client: reqwest::Client,
    pub mercadopago: Arc<MercadoPagoClient>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db_pool: DbPool, config: Config) -> Self {
        let http_client = reqwest::Client::new();
        let mercadopago = Arc::new(MercadoPagoClient::new(
            http_client.clone(),
            &config.mercadopago,
        ));
        Self {
            db_pool,
            http_client,
            mercadopago,
            config: Arc::new(config),
        }
    }
}
