//! Curation filter for ingested puzzles

/// Motif table: Lichess theme tags that mark a puzzle as tactical.
pub const TACTICAL_MOTIFS: &[(&str, &str)] = &[
    ("mate", "Mate"),
    ("mateIn1", "Mate in 1"),
    ("mateIn2", "Mate in 2"),
    ("mateIn3", "Mate in 3"),
    ("mateIn4", "Mate in 4"),
    ("mateIn5", "Mate in 5"),
    ("pin", "Pin"),
    ("fork", "Fork"),
    ("skewer", "Skewer"),
    ("sacrifice", "Sacrifice"),
    ("deflection", "Deflection"),
    ("discovery", "Discovery"),
    ("discoveredAttack", "Discovery"),
    ("clearance", "Clearance"),
    ("intermezzo", "Zwischenzug"),
];

/// Display name of a tactical tag, or `None` for non-tactical tags.
pub fn motif_name(tag: &str) -> Option<&'static str> {
    TACTICAL_MOTIFS
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(tag))
        .map(|(_, name)| *name)
}

pub fn is_tactical(themes: &[String]) -> bool {
    themes.iter().any(|t| motif_name(t).is_some())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurationFilter {
    pub min_popularity: i32,
    pub min_plays: i32,
    /// Non-tactical puzzles need a solution longer than this
    pub min_quiet_length: usize,
}

impl Default for CurationFilter {
    fn default() -> Self {
        Self {
            min_popularity: 50,
            min_plays: 50,
            min_quiet_length: 4,
        }
    }
}

impl CurationFilter {
    /// A puzzle is kept when it is popular or often played, and is either
    /// tactical or has a long enough solution.
    pub fn accepts(
        &self,
        popularity: i32,
        nb_plays: i32,
        themes: &[String],
        solution_len: usize,
    ) -> bool {
        let engaged = popularity >= self.min_popularity || nb_plays >= self.min_plays;
        let interesting = is_tactical(themes) || solution_len > self.min_quiet_length;
        engaged && interesting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_motif_names() {
        assert_eq!(motif_name("discoveredAttack"), Some("Discovery"));
        assert_eq!(motif_name("intermezzo"), Some("Zwischenzug"));
        assert_eq!(motif_name("endgame"), None);
    }

    #[test]
    fn test_long_mates_and_discovery_are_tactical() {
        assert!(is_tactical(&tags(&["mateIn4"])));
        assert!(is_tactical(&tags(&["endgame", "mateIn5"])));
        assert_eq!(motif_name("discovery"), Some("Discovery"));
    }

    #[test]
    fn test_unpopular_and_unplayed_is_rejected() {
        let filter = CurationFilter::default();
        assert!(!filter.accepts(10, 10, &tags(&["fork"]), 6));
    }

    #[test]
    fn test_popular_with_tactical_tag_is_kept() {
        let filter = CurationFilter::default();
        assert!(filter.accepts(60, 0, &tags(&["endgame", "fork"]), 2));
        assert!(filter.accepts(0, 75, &tags(&["mateIn2"]), 3));
    }

    #[test]
    fn test_short_quiet_puzzle_is_rejected() {
        let filter = CurationFilter::default();
        assert!(!filter.accepts(60, 60, &tags(&["endgame"]), 4));
        assert!(filter.accepts(60, 0, &tags(&["endgame"]), 5));
    }
}
