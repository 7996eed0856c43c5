//! Dotted version parsing and total ordering.
//!
//! A [`Version`] is an ordered sequence of segments split on `.` and `-`.
//! Fully-numeric tokens become integer segments; everything else becomes a
//! lower-cased literal token kept verbatim. Comparison is segment-wise, with
//! the shorter sequence padded with numeric zeros, so `1.2` == `1.2.0` and
//! `1.2.0` < `1.2.1`.
//!
//! Mixed integer/literal comparison uses a fixed precedence: an integer
//! segment always sorts below a literal token. That rule is a design choice,
//! not a universal truth, and is pinned down by explicit tests here.

pub mod expr;

pub use expr::{CmpOp, VersionExpr};

use crate::error::{CairnError, Result};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// One segment of a version: an integer or a literal token.
///
/// The derive order matters: `Number` is declared first, so the derived
/// ordering places any integer segment below any literal token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    /// A fully-numeric token, e.g. `12`.
    Number(u64),
    /// Anything else, lower-cased, e.g. `rc1`.
    Literal(String),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Number(n) => write!(f, "{}", n),
            Segment::Literal(s) => write!(f, "{}", s),
        }
    }
}

/// A parsed dotted version string.
///
/// The original spelling is retained for display; equality, ordering, and
/// hashing consider only the segment sequence (with trailing zeros ignored).
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    segments: Vec<Segment>,
}

impl Version {
    /// Parse a version string, splitting on `.` and `-`.
    ///
    /// Fails with a parse error naming the offending token when the text is
    /// empty or contains an empty segment (e.g. `1..2`).
    pub fn parse(text: &str) -> Result<Self> {
        let raw = text.trim();
        if raw.is_empty() {
            return Err(CairnError::parse(text, "empty version"));
        }

        let mut segments = Vec::new();
        for token in raw.split(['.', '-']) {
            if token.is_empty() {
                return Err(CairnError::parse(raw, "empty version segment"));
            }
            match token.parse::<u64>() {
                Ok(n) => segments.push(Segment::Number(n)),
                Err(_) => segments.push(Segment::Literal(token.to_lowercase())),
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The parsed segment sequence.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The segments with trailing numeric zeros removed.
    ///
    /// This is the canonical form used for equality and hashing, making
    /// `1.2` and `1.2.0` interchangeable.
    fn significant(&self) -> &[Segment] {
        let mut len = self.segments.len();
        while len > 0 && self.segments[len - 1] == Segment::Number(0) {
            len -= 1;
        }
        &self.segments[..len]
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        let zero = Segment::Number(0);
        for i in 0..len {
            let a = self.segments.get(i).unwrap_or(&zero);
            let b = other.segments.get(i).unwrap_or(&zero);
            match a.cmp(b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = CairnError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl serde::Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> serde::Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Version::parse(&text).map_err(serde::de::Error::custom)
    }
}
