//! Replaying puzzle lines on a board

use shakmaty::fen::Fen;
use shakmaty::san::{San, SanPlus};
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Move, Position};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("illegal position '{fen}': {reason}")]
    IllegalPosition { fen: String, reason: String },
}

/// Notation used for the moves written to the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveNotation {
    #[default]
    San,
    Uci,
}

/// Result of converting one move line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub moves: Vec<String>,
    /// Index of the first move that could not be played, if any
    pub truncated_at: Option<usize>,
}

impl Conversion {
    pub fn is_complete(&self) -> bool {
        self.truncated_at.is_none()
    }
}

pub fn parse_position(fen: &str) -> Result<Chess, ConversionError> {
    let illegal = |reason: String| ConversionError::IllegalPosition {
        fen: fen.to_string(),
        reason,
    };
    let parsed: Fen = fen.parse().map_err(|e| illegal(format!("{e}")))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|e| illegal(format!("{e}")))
}

pub fn position_fen(position: &Chess) -> String {
    Fen::from_position(position, EnPassantMode::Legal).to_string()
}

/// Resolves a UCI or SAN token to a legal move in `position`.
pub fn resolve_move(position: &Chess, token: &str) -> Option<Move> {
    if let Ok(uci) = token.parse::<UciMove>() {
        if let Ok(mv) = uci.to_move(position) {
            return Some(mv);
        }
    }
    let san: San = token.parse::<SanPlus>().ok()?.san;
    san.to_move(position).ok()
}

pub fn uci_string(mv: &Move) -> String {
    mv.to_uci(CastlingMode::Standard).to_string()
}

/// Replays `tokens` from `fen`, rendering each move in `notation`.
///
/// Stops at the first move that is not legal; everything before it is kept.
pub fn convert_line(
    fen: &str,
    tokens: &[&str],
    notation: MoveNotation,
) -> Result<Conversion, ConversionError> {
    let mut position = parse_position(fen)?;
    let mut moves = Vec::with_capacity(tokens.len());

    for (index, token) in tokens.iter().enumerate() {
        let Some(mv) = resolve_move(&position, token) else {
            return Ok(Conversion {
                moves,
                truncated_at: Some(index),
            });
        };
        match notation {
            MoveNotation::San => {
                let san = SanPlus::from_move_and_play_unchecked(&mut position, mv);
                moves.push(san.to_string());
            }
            MoveNotation::Uci => {
                moves.push(uci_string(&mv));
                position.play_unchecked(mv);
            }
        }
    }

    Ok(Conversion {
        moves,
        truncated_at: None,
    })
}

/// UCI to SAN, the default ingestion conversion.
pub fn convert_uci_line(fen: &str, tokens: &[&str]) -> Result<Conversion, ConversionError> {
    convert_line(fen, tokens, MoveNotation::San)
}

#[cfg(test)]
mod tests {
    use super::*;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn test_uci_to_san() {
        let conversion = convert_uci_line(START_FEN, &["e2e4", "e7e5", "g1f3"]).unwrap();
        assert_eq!(conversion.moves, vec!["e4", "e5", "Nf3"]);
        assert!(conversion.is_complete());
    }

    #[test]
    fn test_check_and_mate_suffixes() {
        let fen = "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1";
        let conversion = convert_uci_line(fen, &["a1a8"]).unwrap();
        assert_eq!(conversion.moves, vec!["Ra8#"]);
    }

    #[test]
    fn test_stops_at_first_illegal_move() {
        let conversion = convert_uci_line(START_FEN, &["e2e4", "e2e4", "g1f3"]).unwrap();
        assert_eq!(conversion.moves, vec!["e4"]);
        assert_eq!(conversion.truncated_at, Some(1));
    }

    #[test]
    fn test_illegal_position() {
        let err = convert_uci_line("not a fen", &["e2e4"]).unwrap_err();
        assert!(matches!(err, ConversionError::IllegalPosition { .. }));
    }

    #[test]
    fn test_uci_output_keeps_coordinates() {
        let conversion = convert_line(START_FEN, &["e4", "e7e5"], MoveNotation::Uci).unwrap();
        assert_eq!(conversion.moves, vec!["e2e4", "e7e5"]);
    }

    #[test]
    fn test_castling_uses_king_destination() {
        let fen = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1";
        let position = parse_position(fen).unwrap();
        let mv = resolve_move(&position, "O-O").unwrap();
        assert_eq!(uci_string(&mv), "e1g1");
        assert_eq!(resolve_move(&position, "e1g1"), Some(mv));
    }

    #[test]
    fn test_position_round_trip() {
        let position = parse_position(START_FEN).unwrap();
        assert_eq!(position_fen(&position), START_FEN);
    }
}
