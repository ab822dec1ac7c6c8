//! Position ordering tokens for change streams.
//!
//! A position establishes where a change sits in the source's ordering and
//! is what checkpoints persist for resumption. Positions are only comparable
//! within one source: a polling cursor compares against polling cursors,
//! never against a resume token.

use serde::{Deserialize, Serialize};

/// An ordering token for a change observed at the source.
///
/// Variants:
/// - `Beginning` is the sentinel for "nothing processed yet" and precedes
///   every other position.
/// - `Sequence` is a plain monotonic counter (in-memory sources, tests).
/// - `DocId` is a document id rendered as a string, normally a Mongo
///   ObjectId in hex. ObjectIds are assigned in insertion order and all
///   render to 24 hex characters, so lexicographic comparison matches
///   insertion order. Plain-string ids compare lexicographically too,
///   matching the source's `_id` sort.
/// - `Token` is an opaque change stream resume token. Tokens carry no usable
///   order; delivery order of the stream is the only ordering authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum Position {
    Beginning,
    Sequence(u64),
    DocId(String),
    Token(String),
}

impl Position {
    /// Whether this is the beginning sentinel.
    pub fn is_beginning(&self) -> bool {
        matches!(self, Position::Beginning)
    }

    /// Compare two positions where an order is defined.
    ///
    /// Returns `None` for cross-variant comparisons (other than against
    /// `Beginning`) and for distinct opaque tokens.
    pub fn try_cmp(&self, other: &Position) -> Option<std::cmp::Ordering> {
        use std::cmp::Ordering;
        match (self, other) {
            (Position::Beginning, Position::Beginning) => Some(Ordering::Equal),
            (Position::Beginning, _) => Some(Ordering::Less),
            (_, Position::Beginning) => Some(Ordering::Greater),
            (Position::Sequence(a), Position::Sequence(b)) => Some(a.cmp(b)),
            (Position::DocId(a), Position::DocId(b)) => Some(a.cmp(b)),
            (Position::Token(a), Position::Token(b)) if a == b => Some(Ordering::Equal),
            _ => None,
        }
    }

    /// Whether a checkpoint at `self` should move forward to `candidate`.
    ///
    /// Ordered positions advance strictly; opaque tokens advance whenever the
    /// token differs, because the stream already delivered it in order.
    pub fn should_advance_to(&self, candidate: &Position) -> bool {
        match self.try_cmp(candidate) {
            Some(std::cmp::Ordering::Less) => true,
            Some(_) => false,
            // Incomparable: distinct resume tokens, or a source switched
            // strategy. Trust the source's delivery order.
            None => true,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Position::Beginning => write!(f, "beginning"),
            Position::Sequence(n) => write!(f, "seq:{}", n),
            Position::DocId(id) => write!(f, "id:{}", id),
            Position::Token(t) => write!(f, "token:{}", t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_beginning_precedes_everything() {
        let b = Position::Beginning;
        assert_eq!(b.try_cmp(&Position::Sequence(0)), Some(Ordering::Less));
        assert_eq!(
            b.try_cmp(&Position::DocId("aaa".into())),
            Some(Ordering::Less)
        );
        assert_eq!(
            b.try_cmp(&Position::Token("t".into())),
            Some(Ordering::Less)
        );
        assert_eq!(b.try_cmp(&Position::Beginning), Some(Ordering::Equal));
    }

    #[test]
    fn test_sequence_ordering() {
        let a = Position::Sequence(1);
        let b = Position::Sequence(2);
        assert_eq!(a.try_cmp(&b), Some(Ordering::Less));
        assert_eq!(b.try_cmp(&a), Some(Ordering::Greater));
        assert!(a.should_advance_to(&b));
        assert!(!b.should_advance_to(&a));
        assert!(!a.should_advance_to(&a));
    }

    #[test]
    fn test_doc_id_lexicographic() {
        let a = Position::DocId("65a000000000000000000001".into());
        let b = Position::DocId("65a000000000000000000002".into());
        assert_eq!(a.try_cmp(&b), Some(Ordering::Less));
    }

    #[test]
    fn test_tokens_are_opaque() {
        let a = Position::Token("abc".into());
        let b = Position::Token("xyz".into());
        assert_eq!(a.try_cmp(&b), None);
        assert!(a.should_advance_to(&b));
        assert!(!a.should_advance_to(&a));
    }

    #[test]
    fn test_cross_variant_advances() {
        // A source that switched from polling to streaming replaces the
        // cursor with the first token it sees.
        let cursor = Position::DocId("65a000000000000000000001".into());
        let token = Position::Token("resume".into());
        assert!(cursor.should_advance_to(&token));
    }

    #[test]
    fn test_serialization_roundtrip() {
        for pos in [
            Position::Beginning,
            Position::Sequence(42),
            Position::DocId("65a000000000000000000001".into()),
            Position::Token("opaque".into()),
        ] {
            let json = serde_json::to_string(&pos).unwrap();
            let decoded: Position = serde_json::from_str(&json).unwrap();
            assert_eq!(pos, decoded);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Position::Beginning.to_string(), "beginning");
        assert_eq!(Position::Sequence(7).to_string(), "seq:7");
    }
}
