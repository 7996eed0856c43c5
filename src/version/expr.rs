//! Comparator constraints over versions.
//!
//! A [`VersionExpr`] is a comma-separated list of comparator clauses
//! (`>=1.0,<2.0`); evaluation is the logical AND of all clauses.

use crate::error::{CairnError, Result};
use crate::version::Version;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A comparison operator in a constraint clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Ge,
    Le,
    Gt,
    Lt,
    Eq,
    Ne,
}

impl CmpOp {
    /// The source spelling of this operator.
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Ge => ">=",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Lt => "<",
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
        }
    }

    fn eval(self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Ge => ordering != Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
        }
    }
}

/// One comparator clause: an operator and its operand version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub op: CmpOp,
    pub version: Version,
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.symbol(), self.version)
    }
}

/// A conjunction of comparator clauses over a [`Version`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionExpr {
    clauses: Vec<Clause>,
}

impl VersionExpr {
    /// Parse a comma-separated clause list, e.g. `>=1.0,<2.0`.
    ///
    /// Every clause must start with one of `>=`, `<=`, `>`, `<`, `==`, `!=`
    /// followed by a version; anything else fails with a parse error naming
    /// the offending clause.
    pub fn parse(text: &str) -> Result<Self> {
        let mut clauses = Vec::new();
        for chunk in text.split(',') {
            let chunk = chunk.trim();
            if chunk.is_empty() {
                return Err(CairnError::parse(text, "empty constraint clause"));
            }

            let (op, rest) = if let Some(rest) = chunk.strip_prefix(">=") {
                (CmpOp::Ge, rest)
            } else if let Some(rest) = chunk.strip_prefix("<=") {
                (CmpOp::Le, rest)
            } else if let Some(rest) = chunk.strip_prefix("==") {
                (CmpOp::Eq, rest)
            } else if let Some(rest) = chunk.strip_prefix("!=") {
                (CmpOp::Ne, rest)
            } else if let Some(rest) = chunk.strip_prefix('>') {
                (CmpOp::Gt, rest)
            } else if let Some(rest) = chunk.strip_prefix('<') {
                (CmpOp::Lt, rest)
            } else {
                return Err(CairnError::parse(chunk, "expected a comparator"));
            };

            let version = Version::parse(rest.trim())
                .map_err(|_| CairnError::parse(chunk, "expected a version after comparator"))?;
            clauses.push(Clause { op, version });
        }

        if clauses.is_empty() {
            return Err(CairnError::parse(text, "empty constraint"));
        }
        Ok(Self { clauses })
    }

    /// Evaluate all clauses against a version; true only if every clause holds.
    pub fn eval(&self, version: &Version) -> bool {
        self.clauses
            .iter()
            .all(|clause| clause.op.eval(version.cmp(&clause.version)))
    }

    /// The parsed clauses.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }
}

impl fmt::Display for VersionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", clause)?;
        }
        Ok(())
    }
}

impl FromStr for VersionExpr {
    type Err = CairnError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
