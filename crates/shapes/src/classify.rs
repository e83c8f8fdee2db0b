//! Mapping from shape geometry to instructions.
//!
//! A shape is identified by its own [`Fingerprint`] together with the sorted
//! fingerprints of its holes. Lookups go through a fixed sequence of
//! progressively looser keys against [`TABLE`]:
//!
//! 1. the exact list of hole fingerprints
//! 2. "no holes", when the shape has none
//! 3. the number of holes, then "has holes", when it has some
//! 4. the bare shape fingerprint
//!
//! Anything left over is [`Opcode::Any`].

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

#[derive(
    Debug, Clone, Copy,
    PartialEq, Eq, Hash,
    Serialize, Deserialize,
    Display, EnumString, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Opcode {
    Any,
    Start,
    End,

    Junction,
    Number,
    Pop,
    Dupe,
    Container,
    Control,
    NumberCheck,
    Length,
    Oper,
    Stack,

    ToNumber,
    ToString,
    ToChar,
    ChrToNum,

    And,
    Or,
    Not,

    Equals,
    Larger,
    Smaller,

    In,
    Read,
    Out,
    OutNoLf,
}

/// Side count (1 when round) and convexity of a polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub sides: usize,
    pub convex: bool,
}

impl Fingerprint {
    pub const fn new(sides: usize, convex: bool) -> Self {
        Self { sides, convex }
    }
}

/// How an entry constrains the holes of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoleKey {
    /// Exactly these hole fingerprints, sorted
    Exact(&'static [Fingerprint]),
    /// No holes at all
    Empty,
    /// This many holes of any kind
    Count(usize),
    /// At least one hole
    Some,
    /// Holes are ignored
    Bare,
}

const fn fp(sides: usize, convex: bool) -> Fingerprint {
    Fingerprint::new(sides, convex)
}

pub static TABLE: &[(Fingerprint, HoleKey, Opcode)] = &[
    (fp(1, true), HoleKey::Exact(&[fp(3, true)]), Opcode::Start),
    (fp(1, true), HoleKey::Exact(&[fp(4, true)]), Opcode::End),
    (fp(4, true), HoleKey::Empty, Opcode::Junction),
    (fp(5, true), HoleKey::Bare, Opcode::Number),
    (fp(6, false), HoleKey::Empty, Opcode::Pop),
    (fp(6, false), HoleKey::Some, Opcode::Oper),
    (fp(3, true), HoleKey::Count(3), Opcode::Dupe),
    (fp(5, false), HoleKey::Empty, Opcode::Container),
    (fp(3, true), HoleKey::Empty, Opcode::Control),
    (fp(5, false), HoleKey::Some, Opcode::Stack),
    (fp(4, true), HoleKey::Exact(&[fp(5, true)]), Opcode::NumberCheck),
    (fp(4, false), HoleKey::Count(1), Opcode::ToNumber),
    (fp(4, false), HoleKey::Count(2), Opcode::ToChar),
    (fp(4, false), HoleKey::Count(3), Opcode::ChrToNum),
    (fp(8, false), HoleKey::Exact(&[fp(1, true)]), Opcode::Or),
    (fp(8, false), HoleKey::Exact(&[fp(3, true)]), Opcode::Not),
    (fp(8, false), HoleKey::Exact(&[fp(4, true)]), Opcode::And),
    (fp(8, false), HoleKey::Exact(&[fp(1, false)]), Opcode::Or),
    (fp(8, false), HoleKey::Exact(&[fp(3, false)]), Opcode::Not),
    (fp(8, false), HoleKey::Exact(&[fp(4, false)]), Opcode::And),
    (fp(8, false), HoleKey::Count(2), Opcode::Smaller),
    (fp(8, false), HoleKey::Count(3), Opcode::Equals),
    (fp(8, false), HoleKey::Count(4), Opcode::Larger),
    (fp(4, false), HoleKey::Empty, Opcode::ToString),
    (fp(2, false), HoleKey::Empty, Opcode::Length),
    (fp(7, false), HoleKey::Empty, Opcode::In),
    (fp(6, true), HoleKey::Empty, Opcode::Out),
    (fp(6, true), HoleKey::Count(1), Opcode::OutNoLf),
    (fp(7, false), HoleKey::Exact(&[fp(1, true)]), Opcode::Read),
    (fp(7, false), HoleKey::Exact(&[fp(1, false)]), Opcode::Read),
];

fn lookup(own: Fingerprint, matches: impl Fn(&HoleKey) -> bool) -> Option<Opcode> {
    TABLE
        .iter()
        .find(|(fingerprint, key, _)| *fingerprint == own && matches(key))
        .map(|&(_, _, opcode)| opcode)
}

/// Classify a shape from its own fingerprint and those of its holes.
///
/// Hole order does not matter.
pub fn classify(own: Fingerprint, holes: &[Fingerprint]) -> Opcode {
    let mut holes = holes.to_vec();
    holes.sort_unstable();

    let exact = lookup(own, |key| matches!(key, HoleKey::Exact(h) if *h == holes.as_slice()));
    let relaxed = if holes.is_empty() {
        lookup(own, |key| *key == HoleKey::Empty)
    } else {
        lookup(own, |key| *key == HoleKey::Count(holes.len()))
            // a single-hole entry also answers the has-holes lookup
            .or_else(|| lookup(own, |key| matches!(key, HoleKey::Some | HoleKey::Count(1))))
    };

    exact
        .or(relaxed)
        .or_else(|| lookup(own, |key| *key == HoleKey::Bare))
        .unwrap_or(Opcode::Any)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_matches() {
        assert_eq!(classify(fp(1, true), &[fp(3, true)]), Opcode::Start);
        assert_eq!(classify(fp(1, true), &[fp(4, true)]), Opcode::End);
        assert_eq!(classify(fp(4, true), &[fp(5, true)]), Opcode::NumberCheck);
        assert_eq!(classify(fp(8, false), &[fp(4, false)]), Opcode::And);
        assert_eq!(classify(fp(7, false), &[fp(1, true)]), Opcode::Read);
    }

    #[test]
    fn test_no_hole_entries() {
        assert_eq!(classify(fp(4, true), &[]), Opcode::Junction);
        assert_eq!(classify(fp(3, true), &[]), Opcode::Control);
        assert_eq!(classify(fp(6, true), &[]), Opcode::Out);
        assert_eq!(classify(fp(2, false), &[]), Opcode::Length);
    }

    #[test]
    fn test_hole_count_and_has_holes() {
        assert_eq!(classify(fp(4, false), &[fp(4, true)]), Opcode::ToNumber);
        assert_eq!(classify(fp(4, false), &[fp(3, true), fp(9, false)]), Opcode::ToChar);
        assert_eq!(classify(fp(3, true), &[fp(4, true); 3]), Opcode::Dupe);
        assert_eq!(classify(fp(8, false), &[fp(1, true); 4]), Opcode::Larger);
        assert_eq!(classify(fp(6, false), &[fp(4, true); 5]), Opcode::Oper);
        assert_eq!(classify(fp(5, false), &[fp(3, true)]), Opcode::Stack);
    }

    #[test]
    fn test_single_hole_entry_answers_has_holes() {
        assert_eq!(classify(fp(6, true), &[fp(4, true); 2]), Opcode::OutNoLf);
        assert_eq!(classify(fp(4, false), &[fp(4, true); 6]), Opcode::ToNumber);
    }

    #[test]
    fn test_bare_and_default() {
        assert_eq!(classify(fp(5, true), &[]), Opcode::Number);
        assert_eq!(classify(fp(5, true), &[fp(3, true); 7]), Opcode::Number);
        assert_eq!(classify(fp(11, false), &[]), Opcode::Any);
        assert_eq!(classify(fp(4, true), &[fp(9, true)]), Opcode::Any);
    }

    #[test]
    fn test_hole_order_irrelevant() {
        let a = [fp(3, true), fp(8, false), fp(1, true)];
        let b = [fp(1, true), fp(3, true), fp(8, false)];
        for own in [fp(6, false), fp(8, false), fp(1, true), fp(4, false)] {
            assert_eq!(classify(own, &a), classify(own, &b));
        }
    }

    #[test]
    fn test_opcode_names() {
        assert_eq!(Opcode::OutNoLf.to_string(), "OUT_NO_LF");
        assert_eq!(Opcode::ChrToNum.to_string(), "CHR_TO_NUM");
        assert_eq!("NUMBER_CHECK".parse::<Opcode>().unwrap(), Opcode::NumberCheck);
    }
}
