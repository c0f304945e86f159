use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use latency_lab::clock::SystemClock;
use latency_lab::config::ServerConfig;
use latency_lab::{server, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = ServerConfig::parse();

    println!();
    println!("╔══════════════════════════════════════════════════╗");
    println!("║   ⏱   REQUEST TIMING LAB                         ║");
    println!("╚══════════════════════════════════════════════════╝");
    println!();

    // ── 1. Build shared state ────────────────────────────────────
    let state = Arc::new(AppState::new(SystemClock::shared(), cfg.max_users));

    // ── 2. Build Axum router ─────────────────────────────────────
    let app = server::create_router(state);

    // ── 3. Bind & serve ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(cfg.listen)
        .await
        .with_context(|| format!("failed to bind {} (is it already in use?)", cfg.listen))?;

    tracing::info!(listen = %cfg.listen, max_users = ?cfg.max_users, "latency-lab starting");
    println!("Create user     → POST http://{}/api/users", cfg.listen);
    println!("Metrics JSON    → GET  http://{}/api/metrics", cfg.listen);
    println!("Metrics SSE     → GET  http://{}/api/metrics/stream", cfg.listen);
    println!();

    axum::serve(listener, app)
        .await
        .context("server exited with error")?;
    Ok(())
}
