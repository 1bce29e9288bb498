//! tug-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, loads configuration,
//! connects storage (the one fatal dependency), wires the engine and
//! scheduler, and starts the HTTP server. All route handlers live in
//! `routes.rs`; all shared state types live in `state.rs`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};
use tug_audit::RetirementLedger;
use tug_config::Config;
use tug_daemon::{routes, scheduler::Scheduler, state::AppState};
use tug_db::{HistoryStore, PgHistoryStore, PgRequestStore, RequestStore};
use tug_oracle::{DatasourceOracle, LocationOracle};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file does
    // not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cfg = Config::from_env().context("loading configuration")?;

    // Storage init is fatal: connect and migrate before serving anything.
    let pool = tug_db::connect(&cfg.db).await.context("database connect")?;
    tug_db::migrate(&pool).await.context("database migrate")?;

    let requests: Arc<dyn RequestStore> = Arc::new(PgRequestStore::new(pool.clone()));
    let history: Arc<dyn HistoryStore> = Arc::new(PgHistoryStore::new(pool));
    let ledger = RetirementLedger::new(history);
    let oracle: Arc<dyn LocationOracle> =
        Arc::new(DatasourceOracle::new(&cfg.oracle).context("oracle client")?);

    let shared = Arc::new(AppState::new(requests, ledger, oracle, cfg.cleanup));
    let scheduler = Scheduler::start(Arc::clone(&shared));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr: SocketAddr = cfg
        .bind_addr
        .parse()
        .with_context(|| format!("invalid TUG_DAEMON_ADDR {:?}", cfg.bind_addr))?;
    info!("tug-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    // Drain any in-flight pass before exit.
    scheduler.stop().await;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}
