//! This project is split in 2 main modules:
//!
//! - [processor] (payment processor integration and postback handling)
//! - [cart] (receipts and purchase forms served to the learning platform)
#![doc = include_str!("../README.md")]

use std::net::{Ipv4Addr, SocketAddrV4};

use anyhow::Context;
use axum::Router;
use tracing_subscriber::EnvFilter;

/// Receipt and purchase form endpoints
///
/// This module defines the surface the learning platform front end talks to.
mod cart;
mod config;
mod db;
mod order;
/// Payment processor integration
///
/// This module verifies and applies postbacks from the external processor. In this case it is LiqPay
mod processor;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(false)
        .init();

    match dotenvy::dotenv() {
        Ok(p) => tracing::info!(path = %p.display(), "Loaded environment variables from .env file"),
        Err(e) => tracing::warn!("Failed to load environment variables from .env: {e}"),
    };
    let server = config::ServerConfig::from_env()?;
    let liqpay = processor::LiqPay::new(config::ProcessorConfig::from_env());
    let db = db::Db::connect(&server.database_url)
        .await
        .context("database is not available")?;
    let state = state::AppState::new(db, liqpay);

    let app = Router::new()
        .merge(processor::api::router())
        .merge(cart::api::router())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state);

    let listener =
        tokio::net::TcpListener::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, server.port))
            .await
            .with_context(|| format!("failed to bind port {}", server.port))?;

    tracing::info!("Serving on port {}", server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
