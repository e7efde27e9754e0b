//! pact-daemon entry point.
//!
//! Loads config, connects and migrates Postgres, builds the shared state,
//! wires middleware and starts the HTTP server. Route handlers live in
//! `routes.rs`; shared state types live in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use pact_config::{DaemonConfig, UnusedKeyPolicy, DAEMON_CONSUMED_POINTERS};
use pact_daemon::{routes, state};
use pact_db::PgStore;
use pact_service::ContractService;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

const ENV_CONFIG_PATHS: &str = "PACT_DAEMON_CONFIG";
const ENV_ADDR: &str = "PACT_DAEMON_ADDR";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let (cfg, config_hash) = load_config()?;

    let pool = pact_db::connect_from_env_var(&cfg.database_url_env, cfg.max_connections).await?;
    pact_db::migrate(&pool).await?;
    let service = ContractService::new(Arc::new(PgStore::new(pool)));

    let shared = Arc::new(state::AppState::new(service).with_config_hash(config_hash));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(cfg.heartbeat_secs));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_from_config(&cfg.cors_origins));

    let addr = bind_addr_from_env().unwrap_or(cfg.bind_addr);
    info!("pact-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Defaults when `PACT_DAEMON_CONFIG` is unset; otherwise the comma-separated
/// YAML layers, merged in order.
fn load_config() -> anyhow::Result<(DaemonConfig, Option<String>)> {
    let Ok(raw) = std::env::var(ENV_CONFIG_PATHS) else {
        info!("{ENV_CONFIG_PATHS} unset; using default daemon config");
        return Ok((DaemonConfig::default(), None));
    };

    let paths: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let loaded = pact_config::load_layered_yaml(&paths)
        .with_context(|| format!("load {ENV_CONFIG_PATHS}={raw}"))?;

    let report = pact_config::report_unused_keys(
        DAEMON_CONSUMED_POINTERS,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )?;
    if !report.is_clean() {
        warn!(unused = ?report.unused_leaf_pointers, "config has keys the daemon does not read");
    }

    let cfg = DaemonConfig::from_config_json(&loaded.config_json)?;
    info!(config_hash = %loaded.config_hash, layers = paths.len(), "config loaded");
    Ok((cfg, Some(loaded.config_hash)))
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var(ENV_ADDR).ok()?.parse().ok()
}

fn cors_from_config(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(tower_http::cors::Any)
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("ctrl-c handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
