use std::sync::Arc;

use axum::http::Method;
use clap::Parser;
use sparkbooks_admin::config::{Cli, Config, default_config_dir, default_config_path};
use sparkbooks_admin::db::Database;
use sparkbooks_admin::handler::{AppState, router};
use sparkbooks_admin::s3::ObjectStorage;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    let _ = dotenvy::dotenv();

    // With --config, data (the database file) lives next to the config file;
    // otherwise both live in ~/.sparkbooks-admin/
    let (config_path, data_dir) = match args.config_path {
        Some(path) => {
            let path = std::path::PathBuf::from(path);
            let dir = path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::path::PathBuf::from("."));
            (path, dir)
        }
        None => (default_config_path(), default_config_dir()),
    };

    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        eprintln!("failed to create data directory {:?}: {}", data_dir, e);
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("sparkbooks-admin.svc starting");

    let cfg = Config::new(&config_path.to_string_lossy()).unwrap_or_else(|e| {
        tracing::error!(error = %e, path = ?config_path, "failed to load config file");
        std::process::exit(1);
    });
    let db = Arc::new(Database::new(&cfg, &data_dir).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup database");
        std::process::exit(1);
    }));
    if let Err(e) = db.sync().await {
        tracing::warn!(error = %e, "initial replica sync failed, serving local state");
    }
    let s3 = Arc::new(ObjectStorage::new(&cfg).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup object storage");
        std::process::exit(1);
    }));

    let address = format!("0.0.0.0:{}", cfg.app.get_port());
    let cancellation_token = CancellationToken::new();

    let signal_token = cancellation_token.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl+c signal received, preparing to shutdown");
            signal_token.cancel();
        }
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    let state = AppState {
        store: db,
        blobs: s3,
        merge_strategy: cfg.app.merge_strategy,
    };
    let app = router(cfg.app.max_upload_mb * 1024 * 1024).layer(cors).with_state(state);

    let listener = tokio::net::TcpListener::bind(&address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup tcp listener");
        std::process::exit(1);
    });

    tracing::info!(merge_strategy = ?cfg.app.merge_strategy, "sparkbooks-admin.svc running on {}", &address);
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(cancellation_token.cancelled_owned())
        .await;
    if let Err(err) = result {
        tracing::error!(error = %err, "server exited with error");
        std::process::exit(1);
    }

    tracing::info!("sparkbooks-admin.svc going off, graceful shutdown complete");
}
