use std::sync::Arc;

use whiteboard::config::{ServerConfig, StoreBackend};
use whiteboard::services::store::{MemoryWhiteboardStore, PgWhiteboardStore, WhiteboardStore};
use whiteboard::{db, routes, state};

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("database init failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to bind port {port}: {source}")]
    Bind { port: u16, source: std::io::Error },
    #[error("server failed: {0}")]
    Serve(#[source] std::io::Error),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = run(ServerConfig::from_env()).await {
        tracing::error!(error = %e, "whiteboard server exited");
        std::process::exit(1);
    }
}

async fn run(config: ServerConfig) -> Result<(), StartupError> {
    let store: Arc<dyn WhiteboardStore> = match &config.store {
        StoreBackend::Postgres { url, max_connections } => {
            let pool = db::init_pool(url, *max_connections).await?;
            tracing::info!(max_connections, "connected to postgres");
            Arc::new(PgWhiteboardStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("DATABASE_URL not set; whiteboards are kept in memory only");
            Arc::new(MemoryWhiteboardStore::new())
        }
    };

    let app = routes::app(state::AppState::new(store));
    let port = config.port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|source| StartupError::Bind { port, source })?;

    tracing::info!(%port, "whiteboard listening");
    axum::serve(listener, app).await.map_err(StartupError::Serve)
}
