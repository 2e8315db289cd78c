//! Read-only queries over a loaded dataset

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use super::model::{DatasetMetadata, Difficulty, PuzzleDataset, PuzzleRecord};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Filter and paging parameters. `"all"` for difficulty or theme means no filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PuzzleQuery {
    pub difficulty: Option<String>,
    pub theme: Option<String>,
    pub min_rating: Option<i32>,
    pub max_rating: Option<i32>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

fn active(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

impl PuzzleQuery {
    /// Parsed difficulty filter; an unknown name is an error.
    pub fn difficulty(&self) -> Result<Option<Difficulty>, String> {
        active(&self.difficulty).map(str::parse).transpose()
    }

    fn matches(&self, difficulty: Option<Difficulty>, puzzle: &PuzzleRecord) -> bool {
        difficulty.map_or(true, |d| puzzle.difficulty == d)
            && active(&self.theme).map_or(true, |t| puzzle.has_theme(t))
            && self.min_rating.map_or(true, |min| puzzle.rating >= min)
            && self.max_rating.map_or(true, |max| puzzle.rating <= max)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PuzzlePage {
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub puzzles: Vec<PuzzleRecord>,
}

pub struct PuzzleCatalog {
    dataset: PuzzleDataset,
}

impl PuzzleCatalog {
    pub fn new(dataset: PuzzleDataset) -> Self {
        Self { dataset }
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.dataset.metadata
    }

    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&PuzzleRecord> {
        self.dataset.puzzles.iter().find(|p| p.id == id)
    }

    fn filtered(&self, query: &PuzzleQuery) -> Result<Vec<&PuzzleRecord>, String> {
        let difficulty = query.difficulty()?;
        Ok(self
            .dataset
            .puzzles
            .iter()
            .filter(|p| query.matches(difficulty, p))
            .collect())
    }

    /// One page of matching puzzles. Pages are 1-based.
    pub fn search(&self, query: &PuzzleQuery) -> Result<PuzzlePage, String> {
        let page = query.page.unwrap_or(1).max(1);
        let page_size = query
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let matching = self.filtered(query)?;
        // An offset past the end, or one that overflows, is an empty page.
        let offset = (page - 1).checked_mul(page_size).unwrap_or(usize::MAX);
        let puzzles = matching
            .iter()
            .skip(offset)
            .take(page_size)
            .map(|p| (*p).clone())
            .collect();

        Ok(PuzzlePage {
            page,
            page_size,
            total: matching.len(),
            puzzles,
        })
    }

    /// A uniformly random puzzle among the matches, if any.
    pub fn random(&self, query: &PuzzleQuery) -> Result<Option<&PuzzleRecord>, String> {
        let matching = self.filtered(query)?;
        Ok(matching.choose(&mut rand::rng()).copied())
    }
}
