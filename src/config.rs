use anyhow::{Context, Result};

use crate::mercadopago::signature::VerificationMode;

/// Service configuration, read once at startup from the environment
/// (`.env` is loaded first via dotenvy).
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub mercadopago: MercadoPagoConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Public origin of this deployment, e.g. `https://shop.example.com`.
    /// Used to derive checkout back-urls and the webhook notification URL.
    pub public_base_url: String,
}

#[derive(Debug, Clone)]
pub struct MercadoPagoConfig {
    pub access_token: String,
    pub webhook_secret: Option<String>,
    pub currency_id: String,
    /// Overridable for tests; defaults to the production API origin.
    pub api_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database = DatabaseConfig {
            url: require("DATABASE_URL")?,
        };

        let server = ServerConfig {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a valid port number")?,
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        };

        let mercadopago = MercadoPagoConfig {
            access_token: require("MERCADOPAGO_ACCESS_TOKEN")?,
            webhook_secret: std::env::var("MERCADOPAGO_WEBHOOK_SECRET").ok(),
            currency_id: std::env::var("MERCADOPAGO_CURRENCY_ID")
                .unwrap_or_else(|_| "ARS".to_string()),
            api_base_url: std::env::var("MERCADOPAGO_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.mercadopago.com".to_string()),
        };

        Ok(Self {
            database,
            server,
            mercadopago,
        })
    }
}

impl MercadoPagoConfig {
    /// Webhook signature policy. No configured secret means webhooks are
    /// accepted unauthenticated; see `VerificationMode::Disabled`.
    pub fn verification_mode(&self) -> VerificationMode {
        match &self.webhook_secret {
            Some(secret) => VerificationMode::Secret(secret.clone()),
            None => VerificationMode::Disabled,
        }
    }
}

fn require(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} must be set"))
}
