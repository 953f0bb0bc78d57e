mod config;
mod credentials;
mod errors;
mod extraction;
mod insight;
mod llm_client;
mod models;
mod routes;
mod screening;
mod state;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::credentials::sources::{EnvSource, SecretsFile, KEY_PREFIX};
use crate::credentials::CredentialRotator;
use crate::extraction::TextExtractor;
use crate::insight::LlmInsightEngine;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Screener API v{}", env!("CARGO_PKG_VERSION"));

    // Secrets file first, then the process environment
    let secrets = SecretsFile::load(&config.secrets_path);
    let rotator = Arc::new(CredentialRotator::discover(&secrets, &EnvSource, KEY_PREFIX));
    rotator
        .ensure_configured()
        .context("refusing to start without API keys")?;

    let llm = LlmClient::new(&config.llm_base_url, &config.llm_model, config.llm_timeout)
        .context("failed to build LLM HTTP client")?;
    info!(
        "LLM client initialized (model: {}, timeout: {:?})",
        llm.model(),
        config.llm_timeout
    );

    let state = AppState {
        config: config.clone(),
        extractor: Arc::new(TextExtractor::default()),
        rotator,
        engine: Arc::new(LlmInsightEngine::new(llm)),
    };

    let app = build_router(state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict allowed origins once the UI host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
