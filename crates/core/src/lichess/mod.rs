//! Lichess puzzle database download

mod client;

pub use client::{DownloadSummary, PuzzleDownloader, LICHESS_PUZZLE_URL};
