//! Puzzle dataset models

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Rating used when the CSV value is missing or unparsable
pub const DEFAULT_RATING: i32 = 1500;

/// Theme assigned to rows with an empty `Themes` column
pub const DEFAULT_THEME: &str = "puzzle";

/// Difficulty bucket derived from the puzzle rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Difficulty {
    pub fn from_rating(rating: i32) -> Self {
        if rating < 1200 {
            Difficulty::Beginner
        } else if rating < 1600 {
            Difficulty::Intermediate
        } else if rating < 2000 {
            Difficulty::Advanced
        } else {
            Difficulty::Expert
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
            Difficulty::Expert => "expert",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            "expert" => Ok(Difficulty::Expert),
            other => Err(format!("unknown difficulty '{other}'")),
        }
    }
}

/// A single puzzle as stored in the JSON dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleRecord {
    pub id: String,
    pub fen: String,
    /// Half-moves in UCI or SAN
    pub moves: Vec<String>,
    pub rating: i32,
    #[serde(default)]
    pub rating_deviation: i32,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub popularity: i32,
    #[serde(default)]
    pub nb_plays: i32,
    #[serde(default)]
    pub game_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening: Option<String>,
    pub difficulty: Difficulty,
}

impl PuzzleRecord {
    pub fn has_theme(&self, theme: &str) -> bool {
        self.themes.iter().any(|t| t.eq_ignore_ascii_case(theme))
    }

    pub fn solution_len(&self) -> usize {
        self.moves.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RatingRange {
    pub min: i32,
    pub max: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub source: String,
    pub processed_at: String,
    pub total_puzzles: usize,
    pub rating_range: RatingRange,
    pub themes: Vec<String>,
}

impl DatasetMetadata {
    /// Builds metadata for `puzzles`, stamped with the current time.
    ///
    /// An empty dataset gets a `0..0` rating range.
    pub fn summarize(source: impl Into<String>, puzzles: &[PuzzleRecord]) -> Self {
        let rating_range = RatingRange {
            min: puzzles.iter().map(|p| p.rating).min().unwrap_or(0),
            max: puzzles.iter().map(|p| p.rating).max().unwrap_or(0),
        };
        let themes: BTreeSet<&str> = puzzles
            .iter()
            .flat_map(|p| p.themes.iter().map(String::as_str))
            .collect();

        Self {
            source: source.into(),
            processed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            total_puzzles: puzzles.len(),
            rating_range,
            themes: themes.into_iter().map(String::from).collect(),
        }
    }
}

/// Top-level JSON document: `{metadata, puzzles}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PuzzleDataset {
    pub metadata: DatasetMetadata,
    pub puzzles: Vec<PuzzleRecord>,
}

impl PuzzleDataset {
    pub fn new(source: impl Into<String>, puzzles: Vec<PuzzleRecord>) -> Self {
        Self {
            metadata: DatasetMetadata::summarize(source, &puzzles),
            puzzles,
        }
    }

    pub fn len(&self) -> usize {
        self.puzzles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.puzzles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, rating: i32, themes: &[&str]) -> PuzzleRecord {
        PuzzleRecord {
            id: id.to_string(),
            fen: "8/8/8/8/8/8/8/8 w - - 0 1".to_string(),
            moves: vec!["e2e4".to_string()],
            rating,
            rating_deviation: 0,
            themes: themes.iter().map(|t| t.to_string()).collect(),
            popularity: 0,
            nb_plays: 0,
            game_url: String::new(),
            opening: None,
            difficulty: Difficulty::from_rating(rating),
        }
    }

    #[test]
    fn test_difficulty_boundaries() {
        assert_eq!(Difficulty::from_rating(1199), Difficulty::Beginner);
        assert_eq!(Difficulty::from_rating(1200), Difficulty::Intermediate);
        assert_eq!(Difficulty::from_rating(1599), Difficulty::Intermediate);
        assert_eq!(Difficulty::from_rating(1600), Difficulty::Advanced);
        assert_eq!(Difficulty::from_rating(1999), Difficulty::Advanced);
        assert_eq!(Difficulty::from_rating(2000), Difficulty::Expert);
    }

    #[test]
    fn test_difficulty_parse() {
        assert_eq!("Expert".parse::<Difficulty>(), Ok(Difficulty::Expert));
        assert!("hard".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_metadata_summary() {
        let puzzles = vec![
            record("a", 1350, &["fork", "short"]),
            record("b", 2210, &["mate", "fork"]),
        ];
        let meta = DatasetMetadata::summarize("Lichess Puzzle Database", &puzzles);

        assert_eq!(meta.total_puzzles, 2);
        assert_eq!(meta.rating_range, RatingRange { min: 1350, max: 2210 });
        assert_eq!(meta.themes, vec!["fork", "mate", "short"]);
    }

    #[test]
    fn test_record_json_field_names() {
        let json = serde_json::to_value(record("x", 1500, &["pin"])).unwrap();
        assert!(json.get("nbPlays").is_some());
        assert!(json.get("gameUrl").is_some());
        assert!(json.get("ratingDeviation").is_some());
        assert!(json.get("opening").is_none());
        assert_eq!(json["difficulty"], "intermediate");
    }
}
