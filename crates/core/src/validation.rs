//! Replays a puzzle dataset against an engine and rewrites every solution to
//! the engine's moves.
//!
//! Puzzles are processed strictly one after another on a single long-lived
//! session. Each claimed move is compared with the engine's choice for the
//! same position, and the engine's move is what gets played and recorded, so
//! a line that diverges keeps following the engine. Replay of a puzzle stops
//! when the engine fails or returns a move that is not legal on the board.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shakmaty::uci::UciMove;
use shakmaty::{Chess, Move, Position};
use tracing::{debug, error, info, warn};

use crate::engine::{
    EngineError, EngineLauncher, EngineOptions, EngineSession, MoveRequestCoordinator,
    SessionState,
};
use crate::error::Result;
use crate::puzzles::convert::{parse_position, position_fen, resolve_move, uci_string};
use crate::puzzles::dataset::write_dataset;
use crate::puzzles::model::{PuzzleDataset, PuzzleRecord};

pub const DEFAULT_PROGRESS_EVERY: usize = 10;

/// Periodic snapshot of the partially validated dataset
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub path: PathBuf,
    pub every: usize,
}

#[derive(Debug, Clone)]
pub struct ValidatorOptions {
    pub move_time: Duration,
    pub engine: EngineOptions,
    pub progress_every: usize,
    pub checkpoint: Option<Checkpoint>,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            move_time: Duration::from_millis(2000),
            engine: EngineOptions::default(),
            progress_every: DEFAULT_PROGRESS_EVERY,
            checkpoint: None,
        }
    }
}

/// Why replay of a puzzle stopped early
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayFailure {
    IllegalPosition { reason: String },
    IllegalEngineMove { engine_move: String },
    NoLegalMove,
    Engine { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub puzzle_id: String,
    /// Engine moves in UCI, one per replayed claimed move
    pub corrected_moves: Vec<String>,
    pub valid: bool,
    pub failure_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ReplayFailure>,
}

impl ValidationOutcome {
    fn new(puzzle_id: &str) -> Self {
        Self {
            puzzle_id: puzzle_id.to_string(),
            corrected_moves: Vec::new(),
            valid: true,
            failure_index: None,
            failure: None,
        }
    }

    /// Marks the puzzle invalid at `index` unless an earlier index is already recorded.
    fn invalidate(&mut self, index: usize) {
        self.valid = false;
        self.failure_index.get_or_insert(index);
    }

    fn stop(&mut self, index: usize, failure: ReplayFailure) {
        self.invalidate(index);
        self.failure = Some(failure);
    }
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub dataset: PuzzleDataset,
    pub outcomes: Vec<ValidationOutcome>,
}

impl ValidationReport {
    pub fn valid_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.valid).count()
    }
}

pub struct BatchPuzzleValidator<L> {
    launcher: L,
    coordinator: MoveRequestCoordinator,
    options: ValidatorOptions,
    session: Option<EngineSession>,
}

impl<L: EngineLauncher> BatchPuzzleValidator<L> {
    pub fn new(
        launcher: L,
        coordinator: MoveRequestCoordinator,
        options: ValidatorOptions,
    ) -> Self {
        Self {
            launcher,
            coordinator,
            options,
            session: None,
        }
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Validates every puzzle and returns the dataset with corrected moves.
    ///
    /// Puzzles left without a single engine move are reported in the outcomes
    /// but dropped from the dataset, and the metadata is then recomputed.
    /// Otherwise metadata is carried over untouched. Only an engine that
    /// cannot be found on this host aborts the batch.
    pub async fn validate_dataset(&mut self, dataset: PuzzleDataset) -> Result<ValidationReport> {
        let total = dataset.puzzles.len();
        let PuzzleDataset { metadata, puzzles } = dataset;
        let mut validated = Vec::with_capacity(total);
        let mut outcomes = Vec::with_capacity(total);

        info!(engine = self.launcher.engine_name(), total, "validating puzzles");

        for (i, mut puzzle) in puzzles.into_iter().enumerate() {
            let outcome = match self.validate_puzzle(&puzzle).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(puzzle = %puzzle.id, error = %e, "engine unavailable, aborting");
                    self.shutdown();
                    if let Some(checkpoint) = &self.options.checkpoint {
                        if !validated.is_empty() {
                            let snapshot = PuzzleDataset::new(metadata.source, validated);
                            write_dataset(&checkpoint.path, &snapshot)?;
                        }
                    }
                    return Err(e.into());
                }
            };
            if !outcome.valid {
                warn!(
                    puzzle = %puzzle.id,
                    failure_index = ?outcome.failure_index,
                    failure = ?outcome.failure,
                    "solution differs from engine"
                );
            }
            if outcome.corrected_moves.is_empty() {
                debug!(puzzle = %puzzle.id, "no engine moves, dropping puzzle");
            } else {
                puzzle.moves = outcome.corrected_moves.clone();
                validated.push(puzzle);
            }
            outcomes.push(outcome);

            let done = i + 1;
            if self.options.progress_every > 0 && done % self.options.progress_every == 0 {
                info!(done, total, "validation progress");
            }
            if let Some(checkpoint) = &self.options.checkpoint {
                if checkpoint.every > 0 && done % checkpoint.every == 0 && done < total {
                    let snapshot =
                        PuzzleDataset::new(metadata.source.clone(), validated.clone());
                    write_dataset(&checkpoint.path, &snapshot)?;
                    debug!(done, path = %checkpoint.path.display(), "checkpoint written");
                }
            }
        }

        self.shutdown();
        let dataset = if validated.len() == total {
            PuzzleDataset {
                metadata,
                puzzles: validated,
            }
        } else {
            PuzzleDataset::new(metadata.source, validated)
        };
        let report = ValidationReport { dataset, outcomes };
        info!(
            total,
            valid = report.valid_count(),
            kept = report.dataset.len(),
            "validation finished"
        );
        Ok(report)
    }

    /// Replays one puzzle. Returns `Err` only when the engine is unavailable
    /// on this host; any other launch failure stops just this puzzle.
    pub async fn validate_puzzle(
        &mut self,
        puzzle: &PuzzleRecord,
    ) -> std::result::Result<ValidationOutcome, EngineError> {
        let mut outcome = ValidationOutcome::new(&puzzle.id);

        let mut position = match parse_position(&puzzle.fen) {
            Ok(position) => position,
            Err(e) => {
                outcome.stop(0, ReplayFailure::IllegalPosition { reason: e.to_string() });
                return Ok(outcome);
            }
        };

        let coordinator = self.coordinator;
        let move_time = self.options.move_time;

        for (index, claimed) in puzzle.moves.iter().enumerate() {
            let fen = position_fen(&position);
            let reply = match self.ready_session().await {
                Ok(session) => coordinator.request_best_move(session, &fen, move_time).await,
                Err(e @ EngineError::Unavailable(_)) => return Err(e),
                Err(e) => Err(e),
            };

            let engine_move = match reply {
                Ok(reply) => reply,
                Err(EngineError::NoLegalMove) => {
                    outcome.stop(index, ReplayFailure::NoLegalMove);
                    break;
                }
                Err(e) => {
                    error!(puzzle = %puzzle.id, index, error = %e, "engine failed during replay");
                    if e.poisons_session() {
                        self.discard_session();
                    }
                    outcome.stop(index, ReplayFailure::Engine { message: e.to_string() });
                    break;
                }
            };

            let Some(mv) = legal_engine_move(&position, &engine_move) else {
                outcome.stop(index, ReplayFailure::IllegalEngineMove { engine_move });
                break;
            };

            if resolve_move(&position, claimed).as_ref() != Some(&mv) {
                debug!(
                    puzzle = %puzzle.id,
                    index,
                    claimed = %claimed,
                    engine = %engine_move,
                    "claimed move differs"
                );
                outcome.invalidate(index);
            }

            outcome.corrected_moves.push(uci_string(&mv));
            position.play_unchecked(mv);
        }

        Ok(outcome)
    }

    /// A `Ready` session, resetting the current one or spawning a new one.
    async fn ready_session(&mut self) -> std::result::Result<&mut EngineSession, EngineError> {
        if let Some(mut session) = self.session.take() {
            if session.state() == SessionState::Responded {
                if let Err(e) = self.coordinator.reset(&mut session).await {
                    warn!(engine = session.name(), error = %e, "reset failed, respawning engine");
                    session.terminate();
                }
            }
            if session.state() == SessionState::Ready {
                self.session = Some(session);
            } else {
                session.terminate();
            }
        }

        if self.session.is_none() {
            let session = self.launcher.launch(&self.options.engine).await?;
            self.session = Some(session);
        }

        match self.session.as_mut() {
            Some(session) => Ok(session),
            None => Err(EngineError::NotReady(SessionState::Terminated)),
        }
    }

    fn discard_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.terminate();
        }
    }

    /// Terminates the engine. The next puzzle spawns a fresh one.
    pub fn shutdown(&mut self) {
        self.discard_session();
    }
}

/// Parses an engine move; `None` unless it is legal on the board.
fn legal_engine_move(position: &Chess, engine_move: &str) -> Option<Move> {
    let uci: UciMove = engine_move.parse().ok()?;
    uci.to_move(position).ok()
}
