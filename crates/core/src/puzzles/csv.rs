//! Header-less Lichess puzzle CSV rows
//!
//! Column order is fixed:
//! `PuzzleId, FEN, Moves, Rating, RatingDeviation, Popularity, NbPlays, Themes, GameUrl, Opening`.

use thiserror::Error;

pub const COLUMNS: [&str; 10] = [
    "PuzzleId",
    "FEN",
    "Moves",
    "Rating",
    "RatingDeviation",
    "Popularity",
    "NbPlays",
    "Themes",
    "GameUrl",
    "Opening",
];

/// Rows with fewer fields are rejected
pub const MIN_FIELDS: usize = 8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedRow {
    #[error("expected at least 8 fields, found {0}")]
    TooFewFields(usize),

    #[error("required field {0} is empty")]
    EmptyField(&'static str),
}

/// Splits one CSV line. A `"` toggles quoted mode, commas inside quotes are
/// data, and each field is trimmed.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());

    fields
}

/// Raw, still untyped puzzle row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvRow {
    pub puzzle_id: String,
    pub fen: String,
    pub moves: String,
    pub rating: String,
    pub rating_deviation: String,
    pub popularity: String,
    pub nb_plays: String,
    pub themes: String,
    pub game_url: String,
    pub opening: String,
}

impl CsvRow {
    pub fn parse(line: &str) -> Result<Self, MalformedRow> {
        let mut fields = split_csv_line(line);
        if fields.len() < MIN_FIELDS {
            return Err(MalformedRow::TooFewFields(fields.len()));
        }
        fields.resize(COLUMNS.len(), String::new());

        let mut fields = fields.into_iter();
        let mut next = || fields.next().unwrap_or_default();
        let row = CsvRow {
            puzzle_id: next(),
            fen: next(),
            moves: next(),
            rating: next(),
            rating_deviation: next(),
            popularity: next(),
            nb_plays: next(),
            themes: next(),
            game_url: next(),
            opening: next(),
        };

        if row.fen.is_empty() {
            return Err(MalformedRow::EmptyField("FEN"));
        }
        if row.moves.is_empty() {
            return Err(MalformedRow::EmptyField("Moves"));
        }
        Ok(row)
    }

    pub fn move_tokens(&self) -> Vec<&str> {
        self.moves.split_whitespace().collect()
    }

    pub fn theme_list(&self) -> Vec<String> {
        let mut themes: Vec<String> = Vec::new();
        for theme in self.themes.split_whitespace() {
            if !themes.iter().any(|t| t == theme) {
                themes.push(theme.to_string());
            }
        }
        themes
    }
}

/// Lenient integer parsing: blanks and garbage fall back to `default`.
pub fn int_or(value: &str, default: i32) -> i32 {
    value.trim().parse().unwrap_or(default)
}
