use anyhow::Result;
use axum::Router;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use lumina_orderservice::{config::Config, db, routes, state::AppState};
use tower_http::trace::TraceLayer;
use utoipa_swagger_ui::SwaggerUi;

/// Migrations embedded into the binary which helps with streamlining image building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!("Running migrations...");
    let migrations_count = db::run_migrations_blocking(MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    if config.mercadopago.webhook_secret.is_none() {
        tracing::warn!(
            "MERCADOPAGO_WEBHOOK_SECRET is not set; webhook signature verification is disabled"
        );
    }

    let db_pool = db::create_pool(&config.database.url).await?;
    let port = config.server.port;
    let state = AppState::new(db_pool, config);

    let routes = routes::orders::routes_with_openapi()
        .merge(routes::payments::routes_with_openapi())
        .merge(routes::checkout::routes_with_openapi())
        .merge(routes::webhooks::routes_with_openapi());

    let mut openapi = routes.get_openapi().clone();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("Lumina OrderService API")
        .version("1.0.0")
        .build();
    let swagger_ui = SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi);

    let app = Router::new()
        .merge(routes)
        .merge(swagger_ui)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
