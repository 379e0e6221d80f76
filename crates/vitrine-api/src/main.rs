//! vitrine-api server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vitrine_core::defaults;
use vitrine_db::{Database, HttpMediaFetcher, PoolConfig};
use vitrine_engine::{Collaborators, MigrationConfig, MigrationEngine};

use vitrine_api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let _file_guard = init_tracing();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/vitrine".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let file_storage_path = std::env::var("FILE_STORAGE_PATH")
        .unwrap_or_else(|_| "/var/lib/vitrine/files".to_string());
    let max_body_bytes: usize = std::env::var("MAX_BODY_BYTES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::MAX_BODY_BYTES);
    let remote_fetch = std::env::var("REMOTE_FETCH")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    let config = MigrationConfig::load()?;
    info!(
        subsystem = "api",
        inline_tag = %config.inline_tag,
        canonical_tag = %config.canonical_tag,
        legacy_gallery_block = %config.legacy_gallery_block,
        "Migration configuration loaded"
    );

    info!("Connecting to database...");
    let mut db =
        Database::connect_with_config(&database_url, &file_storage_path, PoolConfig::from_env())
            .await?;
    info!("Database connected");

    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    vitrine_db::FilesystemBackend::new(&file_storage_path)
        .validate()
        .await
        .map_err(|e| anyhow::anyhow!("File storage at {} is unusable: {}", file_storage_path, e))?;
    info!(path = %file_storage_path, "File storage validated");

    if remote_fetch {
        db = db.with_remote_fetch(HttpMediaFetcher::with_defaults()?);
    }
    vitrine_db::log_pool_metrics(db.pool());

    let collaborators = Collaborators::new(
        Arc::new(db.documents.clone()),
        Arc::new(db.documents.clone()),
        Arc::new(db.catalog.clone()),
        Arc::new(db.media_source.clone()),
    );
    let engine = MigrationEngine::new(config, collaborators)?;
    let state = AppState::new(engine).with_max_body_bytes(max_body_bytes);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Initialize tracing.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables daily-rotated file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - standard env filter (default: "vitrine_api=debug,vitrine_engine=info,tower_http=debug")
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "vitrine_api=debug,vitrine_engine=info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("vitrine-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}
