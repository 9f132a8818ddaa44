use std::env;

use anyhow::Result;
use mirage_api::build_app;
use mirage_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("mirage_api");

    let bind = env::var("MIRAGE_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let app = build_app().await?;

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(bind = %bind, "mirage honeypot api started");

    axum::serve(listener, app).await?;
    Ok(())
}
