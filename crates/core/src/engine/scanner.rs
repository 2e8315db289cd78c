//! Transcript scanning for UCI engine output
//!
//! Engine output arrives as arbitrary chunks, so everything here works on an
//! accumulated buffer and only reports tokens that are complete (followed by
//! whitespace). A token still being streamed counts as "not yet found".

const BEST_MOVE: &str = "bestmove";

/// Tokens an engine sends instead of a move when it has nothing to play.
const NULL_MOVES: [&str; 2] = ["0000", "(none)"];

/// Whitespace-delimited words of a buffer, each tagged with whether the
/// word is terminated (i.e. cannot grow with the next chunk).
struct Words<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Words<'a> {
    type Item = (&'a str, bool);

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.rest.find(|c: char| !c.is_ascii_whitespace())?;
        let tail = &self.rest[start..];
        match tail.find(|c: char| c.is_ascii_whitespace()) {
            Some(end) => {
                self.rest = &tail[end..];
                Some((&tail[..end], true))
            }
            None => {
                self.rest = "";
                Some((tail, false))
            }
        }
    }
}

fn words(buffer: &str) -> Words<'_> {
    Words { rest: buffer }
}

/// Returns the move following the first standalone `bestmove` keyword.
///
/// The keyword may sit anywhere in a line, but must be a word of its own:
/// `nobestmove e2e4` or `bestmoves e2e4` never match. Only well-formed UCI
/// moves and null moves are reported; anything else after the keyword is
/// skipped.
pub fn scan_best_move(buffer: &str) -> Option<&str> {
    let mut tokens = words(buffer);
    while let Some((word, _)) = tokens.next() {
        if word != BEST_MOVE {
            continue;
        }
        let (candidate, terminated) = tokens.next()?;
        if !terminated {
            return None;
        }
        if is_uci_move(candidate) || is_null_move(candidate) {
            return Some(candidate);
        }
    }
    None
}

/// True when `buffer` holds a complete line equal to `keyword` (after trimming).
///
/// Used for handshake acknowledgements such as `uciok` and `readyok`.
pub fn contains_line(buffer: &str, keyword: &str) -> bool {
    let Some(end) = buffer.rfind('\n') else {
        return false;
    };
    buffer[..end].lines().any(|line| line.trim() == keyword)
}

/// Checks the shape of a UCI coordinate move: `e2e4`, `e7e8q`.
pub fn is_uci_move(token: &str) -> bool {
    let bytes = token.as_bytes();
    let square =
        |file: u8, rank: u8| (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank);

    match bytes.len() {
        4 => square(bytes[0], bytes[1]) && square(bytes[2], bytes[3]),
        5 => {
            square(bytes[0], bytes[1])
                && square(bytes[2], bytes[3])
                && matches!(bytes[4], b'q' | b'r' | b'b' | b'n')
        }
        _ => false,
    }
}

/// True for the placeholders engines emit when no legal move exists.
pub fn is_null_move(token: &str) -> bool {
    NULL_MOVES.contains(&token)
}
