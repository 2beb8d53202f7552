#![forbid(unsafe_code)]

//! `facility-presence` server binary.
//!
//! Loads configuration, opens the database, starts the scheduled checkout
//! task and serves the HTTP API until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use facility_presence::api::{self, AppState};
use facility_presence::config::GlobalConfig;
use facility_presence::engine::checkout_task;
use facility_presence::persistence::db;
use facility_presence::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "facility-presence", about = "Facility presence and attendance server", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the configured HTTP port.
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("facility-presence server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    if let Some(port) = args.port {
        config.http_port = port;
    }
    info!(database = %config.database_path.display(), "configuration loaded");

    let db = Arc::new(db::connect(&config.database_path).await?);
    info!("database connected");

    let ct = CancellationToken::new();
    let task_handle = (config.scheduler.enabled || config.retention.days > 0).then(|| {
        info!(
            interval_seconds = config.scheduler.interval_seconds,
            retention_days = config.retention.days,
            "checkout task started"
        );
        checkout_task::spawn_checkout_task(Arc::clone(&db), &config, ct.clone())
    });

    let listener = TcpListener::bind(config.listen_addr())
        .await
        .map_err(|err| AppError::Io(format!("failed to bind {}: {err}", config.listen_addr())))?;
    let state = AppState::new(&db, config.scheduler.exit_time_policy);

    let server_ct = ct.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(err) = api::serve(listener, state, server_ct).await {
            error!(%err, "http server failed");
        }
    });

    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    let _ = server_handle.await;
    if let Some(handle) = task_handle {
        let _ = handle.await;
    }
    db.close().await;
    info!("facility-presence shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
