//! Capability provisions: what an installed unit declares it satisfies.
//!
//! A [`Provision`] maps capability names to either a concrete [`Version`] or
//! a "present, versionless" marker. Satisfaction is closed-world: every
//! constraint key must exist in the provision, and a versionless entry can
//! never satisfy a version-bearing constraint.

use crate::error::{CairnError, Result};
use crate::version::{Version, VersionExpr};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static BARE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\w+$").unwrap());
static NAME_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)\s*=\s*(.+)$").unwrap());

/// Capability name → version, or presence-only marker (`None`).
///
/// Equality is set-of-pairs equality, independent of iteration order; the
/// canonical string form is comma-joined `name` / `name=version` entries in
/// name order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Provision {
    entries: BTreeMap<String, Option<Version>>,
}

impl Provision {
    /// An empty provision.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the comma-separated string form.
    ///
    /// A bare identifier becomes a presence-only entry; `name=value` becomes
    /// a version entry; anything else, including an empty chunk, fails with
    /// a parse error naming the offending chunk. An existing presence-only
    /// entry is not downgraded by a repeated bare mention.
    ///
    /// A wholly-empty string parses as the empty provision; it is the
    /// serialized form of one.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut provision = Self::new();
        if raw.trim().is_empty() {
            return Ok(provision);
        }
        for chunk in raw.split(',') {
            let chunk = chunk.trim();
            if chunk.is_empty() {
                return Err(CairnError::parse(raw, "empty provision entry"));
            }

            if BARE_NAME_RE.is_match(chunk) {
                provision
                    .entries
                    .entry(chunk.to_string())
                    .or_insert(None);
                continue;
            }

            if let Some(caps) = NAME_VALUE_RE.captures(chunk) {
                let name = caps[1].to_string();
                let version = Version::parse(caps[2].trim())?;
                provision.entries.insert(name, Some(version));
                continue;
            }

            return Err(CairnError::parse(chunk, "expected `name` or `name=version`"));
        }
        Ok(provision)
    }

    /// Build a provision from name → optional raw version value pairs.
    ///
    /// Non-empty values are parsed as [`Version`]s; `None` values become
    /// presence-only entries.
    pub fn from_values<I, K, V>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut provision = Self::new();
        for (name, value) in values {
            let version = match value {
                Some(raw) => Some(Version::parse(raw.as_ref())?),
                None => None,
            };
            provision.entries.insert(name.into(), version);
        }
        Ok(provision)
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, name: impl Into<String>, version: Option<Version>) {
        self.entries.insert(name.into(), version);
    }

    /// Look up an entry: `None` if absent, `Some(None)` if presence-only.
    pub fn get(&self, name: &str) -> Option<Option<&Version>> {
        self.entries.get(name).map(Option::as_ref)
    }

    /// Whether a capability is present at all.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Version>)> {
        self.entries
            .iter()
            .map(|(name, version)| (name.as_str(), version.as_ref()))
    }

    /// True only if every constraint key exists here and its expression
    /// evaluates true against the stored value.
    ///
    /// A missing key always fails (closed world), and a presence-only entry
    /// can never satisfy a version-bearing constraint.
    pub fn satisfies(&self, constraints: &BTreeMap<String, VersionExpr>) -> bool {
        constraints.iter().all(|(name, expr)| {
            match self.entries.get(name) {
                Some(Some(version)) => expr.eval(version),
                Some(None) | None => false,
            }
        })
    }
}

impl fmt::Display for Provision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, version)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match version {
                Some(version) => write!(f, "{}={}", name, version)?,
                None => f.write_str(name)?,
            }
        }
        Ok(())
    }
}

impl FromStr for Provision {
    type Err = CairnError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl serde::Serialize for Provision {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Provision {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Provision::parse(&text).map_err(serde::de::Error::custom)
    }
}
