//! Chess engine integration
//!
//! Drives UCI engines (Komodo, Stockfish, ...) as subprocesses. A session is
//! owned by exactly one caller at a time; the coordinator serializes the
//! `position`/`go` exchange on it and races the reply against a deadline.

pub mod coordinator;
pub mod live;
pub mod pool;
pub mod process;
pub mod scanner;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

use std::fmt;
use std::time::Duration;

use thiserror::Error;

// Re-export main types for convenience
pub use coordinator::{MoveRequestCoordinator, DEFAULT_SLACK};
pub use live::LiveMoveService;
pub use pool::{PoolConfig, PooledSession, SessionPool};
pub use process::{
    spawn, EngineConfig, EngineLauncher, EngineOptions, EngineSession, ProcessHandle,
    ProcessLauncher,
};

/// Protocol state of one engine session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Process started, `uci` not yet acknowledged
    Spawned,
    /// `uciok` received
    UciInitialized,
    /// `readyok` received, a command may be issued
    Ready,
    /// `go` sent, waiting for `bestmove`
    AwaitingBestMove,
    /// Last command answered; needs a reset before the next one
    Responded,
    /// Last command missed its deadline; the session is not reusable
    TimedOut,
    /// Process killed or exited
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Spawned => "spawned",
            SessionState::UciInitialized => "uci-initialized",
            SessionState::Ready => "ready",
            SessionState::AwaitingBestMove => "awaiting-bestmove",
            SessionState::Responded => "responded",
            SessionState::TimedOut => "timed-out",
            SessionState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// The executable does not resolve on this host
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    /// The process could not be started
    #[error("Failed to start engine: {0}")]
    Spawn(String),

    /// The process did not complete the `uci`/`isready` exchange
    #[error("Engine handshake failed: {0}")]
    Handshake(String),

    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No `bestmove` within `movetime + slack`
    #[error("Engine did not respond within {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The process went away before answering
    #[error("Engine process exited unexpectedly")]
    Exited,

    /// The engine answered with a null move
    #[error("Engine found no legal move")]
    NoLegalMove,

    /// A command was issued on a session that cannot accept one
    #[error("Engine session is not ready (state: {0})")]
    NotReady(SessionState),

    #[error("Engine pool is closed")]
    PoolClosed,
}

impl EngineError {
    /// True when the session that produced this error must not be reused.
    pub fn poisons_session(&self) -> bool {
        !matches!(self, EngineError::NoLegalMove | EngineError::NotReady(_))
    }
}
