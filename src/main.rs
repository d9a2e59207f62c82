use fillcast::api;
use fillcast::cache::{FileModelCache, MemoryModelCache, ModelCache};
use fillcast::config::{self, Config};
use fillcast::error::AppError;
use fillcast::state::AppState;
use fillcast::store::memory::InMemoryStore;
use std::net::SocketAddr;
use std::sync::Arc;

fn init_tracing(level: tracing::Level) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = config::load_default()?;
    init_tracing(config.log_level());
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        app = %config.app.name,
        "fillcast starting"
    );

    let fleet = load_fleet(&config);
    let cache = build_model_cache(&config);
    let state = Arc::new(AppState::new(fleet.clone(), cache, fleet));

    let app = api::router(state);
    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn load_fleet(config: &Config) -> Arc<InMemoryStore> {
    let path = config.fleet_path();
    match InMemoryStore::load_from_path(path) {
        Ok(fleet) => {
            tracing::info!(path = %path.display(), "Fleet snapshot loaded");
            Arc::new(fleet)
        }
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "Failed to load fleet snapshot, serving an empty fleet"
            );
            Arc::new(InMemoryStore::new())
        }
    }
}

fn build_model_cache(config: &Config) -> Arc<dyn ModelCache> {
    match config.model_cache_dir() {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "Using file-backed model cache");
            Arc::new(FileModelCache::new(dir))
        }
        None => {
            tracing::info!("No model cache directory configured, caching in memory");
            Arc::new(MemoryModelCache::new())
        }
    }
}
