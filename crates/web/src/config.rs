use std::env;
use std::path::PathBuf;
use std::time::Duration;

use puzzle_bridge_core::engine::{EngineConfig, PoolConfig};
use puzzle_bridge_core::EngineError;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub engine_name: String,
    /// Explicit executable; overrides the per-platform lookup below `engine_dir`
    pub engine_path: Option<PathBuf>,
    pub engine_dir: PathBuf,
    pub engine_binary: String,
    pub move_time: Duration,
    pub default_elo: u32,
    pub pool_size: usize,
    /// Warm sessions kept between requests; 0 spawns one engine per request
    pub pool_idle: usize,
    pub puzzles_path: Option<PathBuf>,
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let engine_name = env::var("ENGINE_NAME").unwrap_or_else(|_| "komodo".to_string());
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parsed("PORT", 5001),
            engine_path: env::var("ENGINE_PATH").ok().map(PathBuf::from),
            engine_dir: env::var("ENGINE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("engines").join(&engine_name)),
            engine_binary: env::var("ENGINE_BINARY")
                .unwrap_or_else(|_| "komodo-14.1-64bit".to_string()),
            move_time: Duration::from_millis(parsed("MOVE_TIME_MS", 2000)),
            default_elo: parsed("DEFAULT_ELO", 1500),
            pool_size: parsed("POOL_SIZE", 4),
            pool_idle: parsed("POOL_IDLE", 0),
            puzzles_path: env::var("PUZZLES_PATH").ok().map(PathBuf::from),
            engine_name,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn engine(&self) -> Result<EngineConfig, EngineError> {
        match &self.engine_path {
            Some(path) => Ok(EngineConfig::new(&self.engine_name, path)),
            None => {
                EngineConfig::for_host(&self.engine_name, &self.engine_dir, &self.engine_binary)
            }
        }
    }

    pub fn pool(&self) -> PoolConfig {
        PoolConfig {
            size: self.pool_size,
            max_idle: self.pool_idle,
        }
    }
}
