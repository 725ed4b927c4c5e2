//! Intake REST gateway
//!
//! ```text
//! GET  /health
//! POST /withdrawals
//! GET  /withdrawals?status=&limit=
//! GET  /withdrawals/{id}
//! ```

pub mod handlers;
pub mod state;
pub mod types;

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::GatewayConfig;
use crate::withdrawal::WithdrawalManager;
use state::AppState;

pub fn router(manager: Arc<WithdrawalManager>) -> Router {
    let state = Arc::new(AppState::new(manager));
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/withdrawals",
            post(handlers::create_withdrawal).get(handlers::list_withdrawals),
        )
        .route("/withdrawals/{id}", get(handlers::get_withdrawal))
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves
///
/// In-flight requests finish before this returns.
pub async fn serve(
    listener: TcpListener,
    manager: Arc<WithdrawalManager>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = router(manager);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Gateway server error")
}

/// Bind `host:port` and serve
pub async fn run_server(
    config: &GatewayConfig,
    manager: Arc<WithdrawalManager>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {} (port already in use?)", addr))?;
    info!(addr = %addr, "Gateway listening");

    serve(listener, manager, shutdown).await?;
    info!("Gateway stopped");
    Ok(())
}
