//! Best-move service for live client requests

use std::time::Duration;

use tracing::{info, warn};

use super::pool::SessionPool;
use super::process::{EngineLauncher, EngineOptions};
use super::EngineError;

pub const DEFAULT_ELO: u32 = 1500;
pub const DEFAULT_MOVE_TIME: Duration = Duration::from_millis(2000);

/// Answers one `{fen, elo}` request with one engine session.
///
/// The session comes from the pool and always goes back to it (which kills
/// it unless the pool keeps warm sessions), whatever the outcome.
pub struct LiveMoveService<L> {
    pool: SessionPool<L>,
    move_time: Duration,
    default_elo: u32,
}

impl<L: EngineLauncher> LiveMoveService<L> {
    pub fn new(pool: SessionPool<L>) -> Self {
        Self {
            pool,
            move_time: DEFAULT_MOVE_TIME,
            default_elo: DEFAULT_ELO,
        }
    }

    pub fn with_move_time(mut self, move_time: Duration) -> Self {
        self.move_time = move_time;
        self
    }

    pub fn with_default_elo(mut self, elo: u32) -> Self {
        self.default_elo = elo;
        self
    }

    pub fn engine_name(&self) -> &str {
        self.pool.launcher().engine_name()
    }

    pub fn pool(&self) -> &SessionPool<L> {
        &self.pool
    }

    pub async fn best_move(&self, fen: &str, elo: Option<u32>) -> Result<String, EngineError> {
        let elo = elo.unwrap_or(self.default_elo);
        let mut lease = self.pool.checkout(&EngineOptions::with_elo(elo)).await?;

        let result = self
            .pool
            .coordinator()
            .request_best_move(lease.session_mut(), fen, self.move_time)
            .await;
        self.pool.checkin(lease).await;

        match &result {
            Ok(mv) => info!(engine = self.engine_name(), elo, best_move = %mv, "live move served"),
            Err(e) => warn!(engine = self.engine_name(), elo, error = %e, "live move failed"),
        }
        result
    }
}
