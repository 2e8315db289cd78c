//! Streaming CSV to dataset ingestion

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, info, warn};

use super::convert::{convert_line, MoveNotation};
use super::csv::{int_or, CsvRow};
use super::filter::CurationFilter;
use super::model::{Difficulty, PuzzleDataset, PuzzleRecord, DEFAULT_RATING, DEFAULT_THEME};
use crate::error::Result;

pub const LICHESS_SOURCE: &str = "Lichess Puzzle Database";

/// What to do with a solution that stops at an illegal move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialSolution {
    /// Keep the legal prefix
    #[default]
    KeepTruncated,
    /// Drop the puzzle
    Exclude,
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// `None` disables curation
    pub filter: Option<CurationFilter>,
    pub notation: MoveNotation,
    pub partial: PartialSolution,
    /// Stop after this many accepted puzzles
    pub limit: Option<usize>,
    pub source: String,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            filter: Some(CurationFilter::default()),
            notation: MoveNotation::San,
            partial: PartialSolution::KeepTruncated,
            limit: None,
            source: LICHESS_SOURCE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub rows: usize,
    pub malformed: usize,
    pub filtered: usize,
    pub illegal_positions: usize,
    pub truncated: usize,
    pub excluded: usize,
    pub accepted: usize,
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub dataset: PuzzleDataset,
    pub stats: IngestStats,
}

pub struct IngestionPipeline {
    options: IngestOptions,
}

impl IngestionPipeline {
    pub fn new(options: IngestOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    pub fn ingest_path(&self, path: &Path) -> Result<IngestReport> {
        info!(path = %path.display(), "ingesting puzzle CSV");
        let file = File::open(path)?;
        self.ingest_reader(BufReader::new(file))
    }

    /// Reads rows one line at a time; the whole file is never held in memory.
    pub fn ingest_reader<R: BufRead>(&self, reader: R) -> Result<IngestReport> {
        let mut stats = IngestStats::default();
        let mut puzzles = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            if self.options.limit.is_some_and(|limit| puzzles.len() >= limit) {
                break;
            }
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            stats.rows += 1;
            let row_number = index + 1;

            let row = match CsvRow::parse(&line) {
                Ok(row) => row,
                Err(e) => {
                    warn!(row = row_number, error = %e, "skipping malformed row");
                    stats.malformed += 1;
                    continue;
                }
            };

            if let Some(record) = self.promote(row, row_number, &mut stats) {
                puzzles.push(record);
            }
        }

        stats.accepted = puzzles.len();
        info!(
            rows = stats.rows,
            accepted = stats.accepted,
            malformed = stats.malformed,
            filtered = stats.filtered,
            illegal = stats.illegal_positions,
            "ingestion finished"
        );

        Ok(IngestReport {
            dataset: PuzzleDataset::new(self.options.source.clone(), puzzles),
            stats,
        })
    }

    fn promote(
        &self,
        row: CsvRow,
        row_number: usize,
        stats: &mut IngestStats,
    ) -> Option<PuzzleRecord> {
        let tokens = row.move_tokens();
        let popularity = int_or(&row.popularity, 0);
        let nb_plays = int_or(&row.nb_plays, 0);
        let mut themes = row.theme_list();

        let conversion = match convert_line(&row.fen, &tokens, self.options.notation) {
            Ok(conversion) => conversion,
            Err(e) => {
                warn!(row = row_number, error = %e, "dropping puzzle");
                stats.illegal_positions += 1;
                return None;
            }
        };

        // Quiet puzzles are judged by the solution that survives conversion.
        if let Some(filter) = &self.options.filter {
            if !filter.accepts(popularity, nb_plays, &themes, conversion.moves.len()) {
                stats.filtered += 1;
                return None;
            }
        }

        if let Some(at) = conversion.truncated_at {
            stats.truncated += 1;
            debug!(row = row_number, at, "solution truncated at illegal move");
            if self.options.partial == PartialSolution::Exclude || conversion.moves.is_empty() {
                stats.excluded += 1;
                return None;
            }
        }

        if themes.is_empty() {
            themes.push(DEFAULT_THEME.to_string());
        }
        let id = if row.puzzle_id.is_empty() {
            format!("puzzle_{row_number}")
        } else {
            row.puzzle_id
        };
        let rating = int_or(&row.rating, DEFAULT_RATING);
        let opening = Some(row.opening).filter(|o| !o.is_empty());

        Some(PuzzleRecord {
            id,
            fen: row.fen,
            moves: conversion.moves,
            rating,
            rating_deviation: int_or(&row.rating_deviation, 0),
            themes,
            popularity,
            nb_plays,
            game_url: row.game_url,
            opening,
            difficulty: Difficulty::from_rating(rating),
        })
    }
}
