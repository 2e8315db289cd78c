//! Puzzle dataset tooling
//!
//! ```bash
//! # 1. Fetch the Lichess puzzle database (bz2-compressed CSV)
//! puzzle-tool download --out data/lichess_db_puzzle.csv.bz2
//!
//! # 2. Build the JSON dataset from the decompressed CSV
//! puzzle-tool ingest --input data/lichess_db_puzzle.csv --output data/puzzles.json
//!
//! # 3. Rewrite every solution to the engine's moves
//! puzzle-tool validate --input data/puzzles.json --output data/puzzles.validated.json \
//!     --engine engines/stockfish/stockfish
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use puzzle_bridge_core::engine::{
    EngineConfig, EngineOptions, MoveRequestCoordinator, ProcessLauncher,
};
use puzzle_bridge_core::lichess::{PuzzleDownloader, LICHESS_PUZZLE_URL};
use puzzle_bridge_core::puzzles::{
    read_dataset, write_dataset, CurationFilter, IngestOptions, IngestionPipeline, MoveNotation,
    PartialSolution,
};
use puzzle_bridge_core::validation::{BatchPuzzleValidator, Checkpoint, ValidatorOptions};
use puzzle_bridge_core::Result;

#[derive(Parser)]
#[command(
    name = "puzzle-tool",
    version,
    about = "Lichess puzzle CSV → validated JSON dataset"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Convert the puzzle CSV into a JSON dataset
    Ingest {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "puzzles.json")]
        output: PathBuf,
        /// Maximum number of accepted puzzles (0 = no limit)
        #[arg(long, default_value_t = 4000)]
        limit: usize,
        /// Keep every well-formed row, popular or not
        #[arg(long)]
        no_filter: bool,
        #[arg(long, value_enum, default_value_t = Notation::San)]
        notation: Notation,
        /// Drop puzzles whose solution hits an illegal move instead of truncating
        #[arg(long)]
        exclude_partial: bool,
    },
    /// Replay a JSON dataset against a UCI engine and write the corrected dataset
    Validate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Path to the engine executable
        #[arg(long)]
        engine: PathBuf,
        #[arg(long, default_value_t = 2000)]
        move_time_ms: u64,
        #[arg(long)]
        elo: Option<u32>,
        /// Write a partial dataset here while validating
        #[arg(long)]
        checkpoint: Option<PathBuf>,
        #[arg(long, default_value_t = 100)]
        checkpoint_every: usize,
        /// Write per-puzzle outcomes as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Download the Lichess puzzle database
    Download {
        #[arg(long, default_value = LICHESS_PUZZLE_URL)]
        url: String,
        #[arg(long, default_value = "lichess_db_puzzle.csv.bz2")]
        out: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Notation {
    San,
    Uci,
}

impl From<Notation> for MoveNotation {
    fn from(notation: Notation) -> Self {
        match notation {
            Notation::San => MoveNotation::San,
            Notation::Uci => MoveNotation::Uci,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Ingest {
            input,
            output,
            limit,
            no_filter,
            notation,
            exclude_partial,
        } => {
            let options = IngestOptions {
                filter: (!no_filter).then(CurationFilter::default),
                notation: notation.into(),
                partial: if exclude_partial {
                    PartialSolution::Exclude
                } else {
                    PartialSolution::KeepTruncated
                },
                limit: (limit > 0).then_some(limit),
                ..IngestOptions::default()
            };
            let report = IngestionPipeline::new(options).ingest_path(&input)?;
            write_dataset(&output, &report.dataset)?;
            info!(
                puzzles = report.dataset.len(),
                skipped = report.stats.rows - report.stats.accepted,
                "dataset ready"
            );
        }
        Cmd::Validate {
            input,
            output,
            engine,
            move_time_ms,
            elo,
            checkpoint,
            checkpoint_every,
            report,
        } => {
            let dataset = read_dataset(&input)?;
            let config = EngineConfig::new("validator", engine);
            let options = ValidatorOptions {
                move_time: Duration::from_millis(move_time_ms),
                engine: EngineOptions { elo },
                checkpoint: checkpoint.map(|path| Checkpoint {
                    path,
                    every: checkpoint_every,
                }),
                ..ValidatorOptions::default()
            };
            let mut validator = BatchPuzzleValidator::new(
                ProcessLauncher::new(config),
                MoveRequestCoordinator::default(),
                options,
            );

            let result = validator.validate_dataset(dataset).await?;
            write_dataset(&output, &result.dataset)?;
            if let Some(path) = report {
                std::fs::write(&path, serde_json::to_vec_pretty(&result.outcomes)?)?;
            }
            info!(
                total = result.outcomes.len(),
                valid = result.valid_count(),
                "validated dataset written"
            );
        }
        Cmd::Download { url, out } => {
            let summary = PuzzleDownloader::with_url(url)?.download_to(&out).await?;
            info!(bytes = summary.bytes, path = %summary.path.display(), "saved");
        }
    }

    Ok(())
}
