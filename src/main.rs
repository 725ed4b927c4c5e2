//! Withdrawal Bridge server
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │  Plugin  │───▶│ Gateway  │───▶│ Manager  │───▶│  Payout  │
//! │  (HTTP)  │    │  (axum)  │    │ (SQLite) │    │ Executor │
//! └──────────┘    └──────────┘    └──────────┘    └──────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use withdrawal_bridge::config::AppConfig;
use withdrawal_bridge::gateway;
use withdrawal_bridge::logging::init_logging;
use withdrawal_bridge::payout::build_executor;
use withdrawal_bridge::withdrawal::{TracingObserver, WithdrawalManager, WithdrawalStore};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Resolves on SIGINT, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env).with_context(|| format!("Loading config for {}", env))?;
    let _log_guard = init_logging(&app_config);

    info!(
        env = %env,
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        "Starting Withdrawal Bridge"
    );

    let store = Arc::new(
        WithdrawalStore::open(&app_config.database_path)
            .await
            .with_context(|| format!("Opening database {}", app_config.database_path))?,
    );
    let executor = build_executor(&app_config.payout).context("Building payout executor")?;
    info!(
        provider = app_config.payout.provider(),
        database = %app_config.database_path,
        "Withdrawal store ready"
    );

    let manager = Arc::new(WithdrawalManager::new(store.clone(), executor));
    manager.register_observer(Arc::new(TracingObserver));

    let served = gateway::run_server(&app_config.gateway, manager, shutdown_signal()).await;

    if let Err(e) = store.close().await {
        error!(error = %e, "Failed to close withdrawal store");
    }
    served
}
