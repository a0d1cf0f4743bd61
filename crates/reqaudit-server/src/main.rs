//! reqaudit server - Main entry point

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use reqaudit_common::logging::{init_logging, LogConfig};
use tokio::{signal, sync::broadcast};
use tracing::{info, warn};

use reqaudit_server::{
    api::{create_router, AppState},
    audit::RetentionSweeper,
    config::{Config, StoreBackend},
    store::{DocumentStore, MemoryStore, PgStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with configuration from environment
    let log_config = LogConfig::builder()
        .log_file_prefix("reqaudit-server")
        .filter_directives("reqaudit_server=debug,tower_http=debug,axum=info,sqlx=warn")
        .build();

    // Merge with environment variables (they take precedence)
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);
    init_logging(&log_config)?;

    info!("Starting reqaudit server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let store = build_store(&config).await?;
    let state = AppState::new(store);

    // A failed first load leaves auditing off until the next refresh
    match state.matcher.refresh().await {
        Ok(rules) => info!(
            includes = rules.includes().count(),
            excludes = rules.excludes().count(),
            "Match rules loaded"
        ),
        Err(e) => warn!(error = %e, "Initial match rule load failed"),
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let sweeper_handle = if config.retention.enabled {
        let sweeper = Arc::new(RetentionSweeper::new(state.client.clone(), config.retention.schedule()?));
        Some(sweeper.start(shutdown_tx.subscribe()))
    } else {
        info!("Retention sweeper is disabled (RETENTION_ENABLED=false)");
        None
    };

    let app = create_router(state, &config)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // ConnectInfo gives the audit layer the client address
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(());
    if let Some(handle) = sweeper_handle {
        let timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
        if tokio::time::timeout(timeout, handle).await.is_err() {
            warn!("Retention sweeper did not stop within {:?}", timeout);
        }
    }

    info!("Server shut down gracefully");
    Ok(())
}

async fn build_store(config: &Config) -> Result<Arc<dyn DocumentStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            warn!("Using the in-memory store; records are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        },
        StoreBackend::Postgres => {
            let store = PgStore::connect(&config.store.database).await?;
            store
                .migrate()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
            Ok(Arc::new(store))
        },
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Starting graceful shutdown");
}
