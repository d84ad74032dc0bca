pub mod config;
pub mod db;
pub mod error;
pub mod mercadopago;
pub mod models;
pub mod reconcile;
pub mod routes;
pub mod schema;
pub mod state;
