//! Best-move requests against a single engine session
//!
//! One request is one `position`/`go` pair. The reply is scanned from a
//! buffer that starts empty for every request, and is raced against a
//! deadline of `movetime + slack`; whichever finishes first resolves the call
//! and the other branch is dropped on the spot.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use super::process::EngineSession;
use super::scanner::{is_null_move, scan_best_move};
use super::{EngineError, SessionState};

/// Grace period on top of `movetime` before a request is abandoned
pub const DEFAULT_SLACK: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy)]
pub struct MoveRequestCoordinator {
    slack: Duration,
}

impl Default for MoveRequestCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_SLACK)
    }
}

impl MoveRequestCoordinator {
    pub fn new(slack: Duration) -> Self {
        Self { slack }
    }

    pub fn slack(&self) -> Duration {
        self.slack
    }

    /// Total time a request may take before it fails with `Timeout`.
    pub fn deadline_for(&self, move_time: Duration) -> Duration {
        move_time + self.slack
    }

    /// Asks the engine for its best move in `fen`.
    ///
    /// The session must be `Ready`. On success it is left `Responded`; after a
    /// timeout it is `TimedOut`, after a crash `Terminated`. Neither of the
    /// latter two may be reused.
    pub async fn request_best_move(
        &self,
        session: &mut EngineSession,
        fen: &str,
        move_time: Duration,
    ) -> Result<String, EngineError> {
        if session.state() != SessionState::Ready {
            return Err(EngineError::NotReady(session.state()));
        }

        let stale = session.discard_pending();
        if stale > 0 {
            debug!(engine = session.name(), stale, "discarded stale engine output");
        }
        if session.is_closed() {
            session.set_state(SessionState::Terminated);
            return Err(EngineError::Exited);
        }

        let budget = self.deadline_for(move_time);
        if let Err(e) = self.issue(session, fen, move_time).await {
            session.set_state(SessionState::Terminated);
            return Err(e);
        }

        let deadline = sleep_until(Instant::now() + budget);
        tokio::pin!(deadline);

        let mut transcript = String::new();
        let outcome = loop {
            tokio::select! {
                chunk = session.next_output() => match chunk {
                    Some(chunk) => {
                        transcript.push_str(&chunk);
                        if let Some(mv) = scan_best_move(&transcript) {
                            break Ok(mv.to_string());
                        }
                    }
                    None => break Err(EngineError::Exited),
                },
                _ = &mut deadline => break Err(EngineError::Timeout(budget)),
            }
        };

        match outcome {
            Ok(mv) => {
                session.set_state(SessionState::Responded);
                if is_null_move(&mv) {
                    return Err(EngineError::NoLegalMove);
                }
                debug!(engine = session.name(), fen, best_move = %mv, "engine answered");
                Ok(mv)
            }
            Err(EngineError::Timeout(budget)) => {
                warn!(
                    engine = session.name(),
                    fen,
                    budget_ms = budget.as_millis() as u64,
                    "engine timed out"
                );
                session.set_state(SessionState::TimedOut);
                Err(EngineError::Timeout(budget))
            }
            Err(e) => {
                warn!(engine = session.name(), fen, error = %e, "engine failed before answering");
                session.set_state(SessionState::Terminated);
                Err(e)
            }
        }
    }

    async fn issue(
        &self,
        session: &mut EngineSession,
        fen: &str,
        move_time: Duration,
    ) -> Result<(), EngineError> {
        session.send(&format!("position fen {fen}")).await?;
        session
            .send(&format!("go movetime {}", move_time.as_millis()))
            .await?;
        session.set_state(SessionState::AwaitingBestMove);
        Ok(())
    }

    /// Brings a `Responded` session back to `Ready` with an `isready` round trip.
    pub async fn reset(&self, session: &mut EngineSession) -> Result<(), EngineError> {
        match session.state() {
            SessionState::Ready => Ok(()),
            SessionState::Responded => {
                session.discard_pending();
                session.send("isready").await?;
                session.wait_for_line("readyok").await?;
                session.set_state(SessionState::Ready);
                Ok(())
            }
            other => Err(EngineError::NotReady(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::process::{EngineLauncher, EngineOptions};
    use crate::engine::testing::{Reply, StubLauncher};

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    const MOVE_TIME: Duration = Duration::from_millis(2000);

    #[tokio::test]
    async fn test_resolves_with_engine_move() {
        let launcher = StubLauncher::new(|_, _| Reply::Move("e2e4".into()));
        let mut session = launcher.launch(&EngineOptions::default()).await.unwrap();
        let coordinator = MoveRequestCoordinator::default();

        let mv = coordinator
            .request_best_move(&mut session, START_FEN, MOVE_TIME)
            .await
            .unwrap();

        assert_eq!(mv, "e2e4");
        assert_eq!(session.state(), SessionState::Responded);
    }

    #[tokio::test]
    async fn test_move_token_split_across_chunks() {
        let launcher = StubLauncher::new(|_, _| Reply::Split("g1f3".into()));
        let mut session = launcher.launch(&EngineOptions::default()).await.unwrap();

        let mv = MoveRequestCoordinator::default()
            .request_best_move(&mut session, START_FEN, MOVE_TIME)
            .await
            .unwrap();

        assert_eq!(mv, "g1f3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_at_movetime_plus_slack() {
        let launcher = StubLauncher::new(|_, _| Reply::Silent);
        let mut session = launcher.launch(&EngineOptions::default()).await.unwrap();
        let coordinator = MoveRequestCoordinator::default();

        let started = Instant::now();
        let err = coordinator
            .request_best_move(&mut session, START_FEN, MOVE_TIME)
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, EngineError::Timeout(_)), "got {err:?}");
        assert!(elapsed >= MOVE_TIME + DEFAULT_SLACK, "resolved early: {elapsed:?}");
        assert!(elapsed < MOVE_TIME + DEFAULT_SLACK + Duration::from_millis(50));
        assert_eq!(session.state(), SessionState::TimedOut);
    }

    #[tokio::test]
    async fn test_process_exit_is_distinct_from_timeout() {
        let launcher = StubLauncher::new(|_, _| Reply::Exit);
        let mut session = launcher.launch(&EngineOptions::default()).await.unwrap();

        let err = MoveRequestCoordinator::default()
            .request_best_move(&mut session, START_FEN, MOVE_TIME)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Exited), "got {err:?}");
        assert_eq!(session.state(), SessionState::Terminated);
    }

    #[tokio::test]
    async fn test_null_move_reported_as_no_legal_move() {
        let launcher = StubLauncher::new(|_, _| Reply::Move("(none)".into()));
        let mut session = launcher.launch(&EngineOptions::default()).await.unwrap();

        let err = MoveRequestCoordinator::default()
            .request_best_move(&mut session, "7k/6Q1/6K1/8/8/8/8/8 b - - 0 1", MOVE_TIME)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::NoLegalMove));
    }

    #[tokio::test]
    async fn test_second_request_requires_reset() {
        let launcher = StubLauncher::new(|_, i| {
            Reply::Move(if i == 0 { "e2e4" } else { "d2d4" }.into())
        });
        let mut session = launcher.launch(&EngineOptions::default()).await.unwrap();
        let coordinator = MoveRequestCoordinator::default();

        coordinator
            .request_best_move(&mut session, START_FEN, MOVE_TIME)
            .await
            .unwrap();
        let err = coordinator
            .request_best_move(&mut session, START_FEN, MOVE_TIME)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotReady(SessionState::Responded)));

        coordinator.reset(&mut session).await.unwrap();
        let mv = coordinator
            .request_best_move(&mut session, START_FEN, MOVE_TIME)
            .await
            .unwrap();
        assert_eq!(mv, "d2d4");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_session_rejects_further_commands() {
        let launcher = StubLauncher::new(|_, _| Reply::Silent);
        let mut session = launcher.launch(&EngineOptions::default()).await.unwrap();
        let coordinator = MoveRequestCoordinator::new(Duration::from_millis(100));

        let _ = coordinator
            .request_best_move(&mut session, START_FEN, Duration::from_millis(100))
            .await;
        let err = coordinator.reset(&mut session).await.unwrap_err();

        assert!(matches!(err, EngineError::NotReady(SessionState::TimedOut)));
    }

    #[tokio::test]
    async fn test_go_commands_are_serialized() {
        let launcher = StubLauncher::new(|_, _| Reply::Move("e2e4".into()));
        let mut session = launcher.launch(&EngineOptions::default()).await.unwrap();
        let coordinator = MoveRequestCoordinator::default();

        for _ in 0..3 {
            coordinator
                .request_best_move(&mut session, START_FEN, Duration::from_millis(10))
                .await
                .unwrap();
            coordinator.reset(&mut session).await.unwrap();
        }

        let exchange: Vec<String> = launcher
            .commands()
            .into_iter()
            .skip_while(|c| c != "isready")
            .skip(1)
            .collect();
        let expected: Vec<String> = (0..3)
            .flat_map(|_| {
                [
                    format!("position fen {START_FEN}"),
                    "go movetime 10".to_string(),
                    "isready".to_string(),
                ]
            })
            .collect();
        assert_eq!(exchange, expected);
    }
}
