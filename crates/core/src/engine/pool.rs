//! Bounded pool of handshaken engine sessions
//!
//! `size` bounds how many sessions are checked out at once; `max_idle`
//! bounds how many are kept warm between requests. With
//! `max_idle == 0` every checkout spawns a fresh process and every checkin
//! kills it.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use super::coordinator::MoveRequestCoordinator;
use super::process::{EngineLauncher, EngineOptions, EngineSession};
use super::EngineError;

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Maximum number of concurrent checkouts
    pub size: usize,
    /// Sessions kept alive after checkin
    pub max_idle: usize,
}

impl PoolConfig {
    /// One fresh process per checkout, at most `size` at a time.
    pub fn spawn_per_request(size: usize) -> Self {
        Self { size, max_idle: 0 }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::spawn_per_request(4)
    }
}

pub struct SessionPool<L> {
    launcher: L,
    coordinator: MoveRequestCoordinator,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<EngineSession>>,
    max_idle: usize,
}

/// A session checked out of the pool. Dropping it without
/// [`SessionPool::checkin`] kills the session.
pub struct PooledSession {
    session: EngineSession,
    _permit: OwnedSemaphorePermit,
}

impl PooledSession {
    pub fn session(&self) -> &EngineSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut EngineSession {
        &mut self.session
    }
}

impl<L: EngineLauncher> SessionPool<L> {
    pub fn new(launcher: L, coordinator: MoveRequestCoordinator, config: PoolConfig) -> Self {
        Self {
            launcher,
            coordinator,
            permits: Arc::new(Semaphore::new(config.size.max(1))),
            idle: Mutex::new(Vec::new()),
            max_idle: config.max_idle,
        }
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn coordinator(&self) -> &MoveRequestCoordinator {
        &self.coordinator
    }

    pub async fn idle_count(&self) -> usize {
        self.idle.lock().await.len()
    }

    /// Waits for capacity, then hands out a `Ready` session configured with `options`.
    pub async fn checkout(&self, options: &EngineOptions) -> Result<PooledSession, EngineError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| EngineError::PoolClosed)?;

        while let Some(mut session) = self.take_idle().await {
            match session.apply_options(options).await {
                Ok(()) => {
                    debug!(engine = session.name(), "reusing pooled session");
                    return Ok(PooledSession {
                        session,
                        _permit: permit,
                    });
                }
                Err(e) => {
                    warn!(engine = session.name(), error = %e, "dropping broken pooled session");
                    session.terminate();
                }
            }
        }

        let session = self.launcher.launch(options).await?;
        Ok(PooledSession {
            session,
            _permit: permit,
        })
    }

    async fn take_idle(&self) -> Option<EngineSession> {
        self.idle.lock().await.pop()
    }

    /// Returns a session. Healthy sessions are reset to `Ready` and kept if
    /// there is idle room; everything else is terminated.
    pub async fn checkin(&self, pooled: PooledSession) {
        let PooledSession { mut session, _permit } = pooled;

        if self.max_idle == 0 || !session.is_reusable() {
            session.terminate();
            return;
        }

        if let Err(e) = self.coordinator.reset(&mut session).await {
            warn!(engine = session.name(), error = %e, "session reset failed");
            session.terminate();
            return;
        }

        let mut idle = self.idle.lock().await;
        if idle.len() < self.max_idle {
            idle.push(session);
        } else {
            drop(idle);
            session.terminate();
        }
    }

    /// Terminates every idle session and refuses further checkouts.
    pub async fn shutdown(&self) {
        self.permits.close();
        let mut idle = self.idle.lock().await;
        for session in idle.iter_mut() {
            session.terminate();
        }
        idle.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{Reply, StubLauncher};
    use crate::engine::SessionState;
    use std::time::Duration;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    fn pool(launcher: StubLauncher, config: PoolConfig) -> SessionPool<StubLauncher> {
        SessionPool::new(launcher, MoveRequestCoordinator::default(), config)
    }

    #[tokio::test]
    async fn test_spawn_per_request_always_kills() {
        let launcher = StubLauncher::new(|_, _| Reply::Move("e2e4".into()));
        let pool = pool(launcher.clone(), PoolConfig::spawn_per_request(2));

        for _ in 0..3 {
            let mut lease = pool.checkout(&EngineOptions::default()).await.unwrap();
            pool.coordinator()
                .request_best_move(lease.session_mut(), START_FEN, Duration::from_millis(10))
                .await
                .unwrap();
            pool.checkin(lease).await;
        }

        assert_eq!(launcher.launches(), 3);
        assert_eq!(launcher.kills(), 3);
        assert_eq!(pool.idle_count().await, 0);
    }

    #[tokio::test]
    async fn test_warm_sessions_are_reset_and_reused() {
        let launcher = StubLauncher::new(|_, _| Reply::Move("e2e4".into()));
        let pool = pool(launcher.clone(), PoolConfig { size: 2, max_idle: 1 });

        for _ in 0..3 {
            let mut lease = pool.checkout(&EngineOptions::with_elo(1500)).await.unwrap();
            assert_eq!(lease.session().state(), SessionState::Ready);
            pool.coordinator()
                .request_best_move(lease.session_mut(), START_FEN, Duration::from_millis(10))
                .await
                .unwrap();
            pool.checkin(lease).await;
        }

        assert_eq!(launcher.launches(), 1);
        assert_eq!(launcher.kills(), 0);
        assert_eq!(pool.idle_count().await, 1);

        pool.shutdown().await;
        assert_eq!(launcher.kills(), 1);
    }

    #[tokio::test]
    async fn test_elo_change_reconfigures_idle_session() {
        let launcher = StubLauncher::new(|_, _| Reply::Move("e2e4".into()));
        let pool = pool(launcher.clone(), PoolConfig { size: 1, max_idle: 1 });

        let lease = pool.checkout(&EngineOptions::with_elo(1200)).await.unwrap();
        pool.checkin(lease).await;
        let lease = pool.checkout(&EngineOptions::with_elo(2000)).await.unwrap();

        assert_eq!(lease.session().elo(), Some(2000));
        assert!(launcher
            .commands()
            .contains(&"setoption name UCI_Elo value 2000".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_session_is_not_returned_to_pool() {
        let launcher = StubLauncher::new(|_, _| Reply::Silent);
        let pool = pool(launcher.clone(), PoolConfig { size: 1, max_idle: 1 });

        let mut lease = pool.checkout(&EngineOptions::default()).await.unwrap();
        let _ = pool
            .coordinator()
            .request_best_move(lease.session_mut(), START_FEN, Duration::from_millis(10))
            .await;
        pool.checkin(lease).await;

        assert_eq!(pool.idle_count().await, 0);
        assert_eq!(launcher.kills(), 1);
    }

    #[tokio::test]
    async fn test_dropped_lease_releases_capacity() {
        let launcher = StubLauncher::new(|_, _| Reply::Move("e2e4".into()));
        let pool = pool(launcher.clone(), PoolConfig::spawn_per_request(1));

        let lease = pool.checkout(&EngineOptions::default()).await.unwrap();
        drop(lease);
        let lease = tokio::time::timeout(
            Duration::from_secs(1),
            pool.checkout(&EngineOptions::default()),
        )
        .await
        .expect("capacity was not released")
        .unwrap();

        assert_eq!(launcher.kills(), 1);
        drop(lease);
    }
}
