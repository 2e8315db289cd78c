//! Puzzle Bridge Core Library
//!
//! Drives UCI engines as subprocesses and turns the Lichess puzzle CSV into a
//! validated JSON dataset.

pub mod engine;
pub mod error;
pub mod lichess;
pub mod puzzles;
pub mod validation;

pub use engine::{EngineConfig, EngineError, EngineOptions, LiveMoveService, SessionPool};
pub use error::{Error, Result};
pub use lichess::PuzzleDownloader;
pub use puzzles::{PuzzleCatalog, PuzzleDataset, PuzzleRecord};
pub use validation::{BatchPuzzleValidator, ValidationOutcome};
