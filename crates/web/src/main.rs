use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use puzzle_bridge_core::engine::{
    EngineLauncher, LiveMoveService, MoveRequestCoordinator, ProcessLauncher, SessionPool,
};
use puzzle_bridge_core::puzzles::{read_dataset, PuzzleCatalog};
use puzzle_bridge_core::EngineError;

mod config;
mod error;
mod routes;

use config::Config;

/// Shared, read-only after startup.
pub struct AppState<L> {
    /// Live move services keyed by the engine name used in the URL
    pub engines: HashMap<String, LiveMoveService<L>>,
    /// Engines with no usable build on this host, with the reason
    pub unavailable: HashMap<String, String>,
    pub catalog: Option<PuzzleCatalog>,
}

impl<L: EngineLauncher> AppState<L> {
    pub fn new(catalog: Option<PuzzleCatalog>) -> Self {
        Self {
            engines: HashMap::new(),
            unavailable: HashMap::new(),
            catalog,
        }
    }

    pub fn with_engine(mut self, service: LiveMoveService<L>) -> Self {
        self.engines.insert(service.engine_name().to_string(), service);
        self
    }

    pub fn with_unavailable_engine(mut self, name: &str, reason: impl Into<String>) -> Self {
        self.unavailable.insert(name.to_string(), reason.into());
        self
    }

    pub async fn shutdown(&self) {
        for service in self.engines.values() {
            service.pool().shutdown().await;
        }
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();

    let catalog = match &config.puzzles_path {
        Some(path) => match read_dataset(path) {
            Ok(dataset) => Some(PuzzleCatalog::new(dataset)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "puzzle dataset not loaded");
                None
            }
        },
        None => None,
    };

    let state = AppState::<ProcessLauncher>::new(catalog);
    let state = match config.engine() {
        Ok(engine) => {
            info!(engine = %engine.name, path = %engine.executable.display(), "engine resolved");
            let pool = SessionPool::new(
                ProcessLauncher::new(engine),
                MoveRequestCoordinator::default(),
                config.pool(),
            );
            let service = LiveMoveService::new(pool)
                .with_move_time(config.move_time)
                .with_default_elo(config.default_elo);
            state.with_engine(service)
        }
        Err(e) => {
            error!(engine = %config.engine_name, error = %e, "move requests will fail");
            let reason = match e {
                EngineError::Unavailable(reason) => reason,
                other => other.to_string(),
            };
            state.with_unavailable_engine(&config.engine_name, reason)
        }
    };
    let state = Arc::new(state);
    let app = routes::router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(config.addr())
        .await
        .expect("Failed to bind address");

    info!("Server running at http://{}", config.addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .expect("Server error");

    state.shutdown().await;
}
