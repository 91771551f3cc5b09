//! Shopfront server binary.

use std::sync::Arc;

use anyhow::Result;
use shopfront::api;
use shopfront::store::{CartPolicy, PgStore};
use sqlx::postgres::PgPoolOptions;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&std::env::var("DATABASE_URL")?)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let policy = CartPolicy {
        max_quantity: std::env::var("CART_MAX_QUANTITY").ok().and_then(|v| v.parse().ok()),
    };
    let store: api::SharedStore = Arc::new(PgStore::new(db, policy));

    let app = api::router(store)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!("shopfront listening on 0.0.0.0:{port}");
    axum::serve(listener, app).await?;
    Ok(())
}
