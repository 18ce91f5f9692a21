use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Router};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use dotenvy::dotenv;
use log::info;
use tower_http::cors::CorsLayer;

use deskserver::config::AppConfig;
use deskserver::email::configure_email_routes;
use deskserver::shared::state::AppState;
use deskserver::shared::utils::create_pool;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

async fn health() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env()?;
    let pool = create_pool(&config.database_url).context("Failed to create database pool")?;

    {
        let mut conn = pool.get().context("Failed to get database connection")?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow::anyhow!("Failed to run migrations: {e}"))?;
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, pool));

    let app = Router::new()
        .route("/health", get(health))
        .merge(configure_email_routes())
        .layer(CorsLayer::permissive())
        .with_state(state);

    info!("deskserver listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
