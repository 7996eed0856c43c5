//! Requirements: one desired install unit, and the requirement-line grammar.
//!
//! A requirement line is whitespace-separated tokens:
//!
//! ```text
//! [name] locator[constraint] [VAR=value ...]
//! ```
//!
//! - an optional leading bare word is the explicit name,
//! - the locator may carry an inline comparator expression
//!   (`scheme:somepkg>=1.0,<2.0`), keyed by the locator's derived
//!   capability name,
//! - trailing `VAR=value` tokens are explicit environment overrides,
//!   kept in written order.
//!
//! Environment assignments earlier in a requirement document are inherited
//! into each requirement; explicit overrides always win.

pub mod document;

pub use document::{Element, EnvVar, Header, Payload, RequirementDocument};

use crate::error::{CairnError, Result};
use crate::version::{Version, VersionExpr};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static NAME_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._+-]*$").unwrap());
static ENV_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_]\w*)=(\S*)$").unwrap());
static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*$").unwrap());

/// A concrete resolved locator/version snapshot, recorded after a successful
/// install and substituted for the constraint expression when freezing.
#[derive(Debug, Clone, PartialEq)]
pub struct Pin {
    pub locator: String,
    pub version: Version,
}

/// One desired install unit: source locator plus constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    name: String,
    locator: String,
    constraint_raw: String,
    constraints: BTreeMap<String, VersionExpr>,
    explicit_env: Vec<(String, String)>,
    inherited_env: BTreeMap<String, String>,
    pinned: Option<Pin>,
}

impl Requirement {
    /// Parse a requirement line (already stripped of surrounding whitespace
    /// and trailing comment).
    pub fn parse(text: &str) -> Result<Self> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(CairnError::parse(text, "empty requirement"));
        }

        let mut index = 0;
        let mut name = String::new();

        // A leading bare word followed by a locator token is the explicit
        // name; a lone token, or one followed by VAR=value, is the locator.
        if tokens.len() >= 2
            && NAME_TOKEN_RE.is_match(tokens[0])
            && !ENV_TOKEN_RE.is_match(tokens[1])
        {
            name = tokens[0].to_string();
            index = 1;
        }

        let locator_token = tokens[index];
        index += 1;

        let split_at = locator_token
            .find(['<', '>', '=', '!'])
            .unwrap_or(locator_token.len());
        let locator = &locator_token[..split_at];
        let constraint_raw = &locator_token[split_at..];
        if locator.is_empty() {
            return Err(CairnError::parse(locator_token, "missing locator"));
        }

        let mut constraints = BTreeMap::new();
        if !constraint_raw.is_empty() {
            let key = guess_name(locator);
            if key.is_empty() {
                return Err(CairnError::parse(
                    locator_token,
                    "cannot derive a capability name for the inline constraint",
                ));
            }
            constraints.insert(key, VersionExpr::parse(constraint_raw)?);
        }

        let mut explicit_env = Vec::new();
        for token in &tokens[index..] {
            match ENV_TOKEN_RE.captures(token) {
                Some(caps) => explicit_env.push((caps[1].to_string(), caps[2].to_string())),
                None => {
                    return Err(CairnError::parse(
                        *token,
                        "expected a VAR=value environment override",
                    ))
                }
            }
        }

        Ok(Self {
            name,
            locator: locator.to_string(),
            constraint_raw: constraint_raw.to_string(),
            constraints,
            explicit_env,
            inherited_env: BTreeMap::new(),
            pinned: None,
        })
    }

    /// The requirement's name; empty until set explicitly or inferred.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The source locator, without any inline constraint.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// The inline constraint expression exactly as written (may be empty).
    pub fn constraint_raw(&self) -> &str {
        &self.constraint_raw
    }

    /// Required constraints, capability name → expression.
    pub fn constraints(&self) -> &BTreeMap<String, VersionExpr> {
        &self.constraints
    }

    /// Explicit environment overrides, in written order.
    pub fn explicit_env(&self) -> &[(String, String)] {
        &self.explicit_env
    }

    /// Set (or replace) an explicit environment override.
    pub fn set_env(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.explicit_env.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.explicit_env.push((name, value)),
        }
    }

    /// Inherit an environment assignment from earlier in the document.
    ///
    /// Explicit overrides win; an already-inherited value is not replaced.
    pub fn inherit_env(&mut self, name: &str, value: &str) {
        if self.explicit_env.iter().any(|(n, _)| n == name) {
            return;
        }
        self.inherited_env
            .entry(name.to_string())
            .or_insert_with(|| value.to_string());
    }

    /// The effective environment: inherited assignments with explicit
    /// overrides applied on top.
    pub fn environ(&self) -> BTreeMap<String, String> {
        let mut environ = self.inherited_env.clone();
        for (name, value) in &self.explicit_env {
            environ.insert(name.clone(), value.clone());
        }
        environ
    }

    /// Record the resolved locator/version snapshot used by freezing.
    pub fn pin(&mut self, locator: impl Into<String>, version: Version) {
        self.pinned = Some(Pin {
            locator: locator.into(),
            version,
        });
    }

    pub fn pinned(&self) -> Option<&Pin> {
        self.pinned.as_ref()
    }

    /// Render the requirement-line form, emitting the given explicit
    /// environment overrides and, when present, a pinned snapshot in place
    /// of the original constraint expression.
    pub(crate) fn render(&self, env: &[(String, String)], pin: Option<&Pin>) -> String {
        let mut parts = Vec::new();
        if !self.name.is_empty() {
            parts.push(self.name.clone());
        }
        match pin {
            Some(pin) => parts.push(format!("{}=={}", pin.locator, pin.version)),
            None => parts.push(format!("{}{}", self.locator, self.constraint_raw)),
        }
        for (name, value) in env {
            parts.push(format!("{}={}", name, value));
        }
        parts.join(" ")
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&self.explicit_env, None))
    }
}

impl FromStr for Requirement {
    type Err = CairnError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Derive a candidate name from a source locator.
///
/// Strips a leading scheme, takes the last path segment, drops query or
/// fragment tails, common archive extensions, and a trailing dashed version
/// suffix: `https://host/pkgs/libfoo-1.2.3.tar.gz` becomes `libfoo`.
pub fn guess_name(locator: &str) -> String {
    let mut rest = locator.trim();
    if let Some(idx) = rest.find(':') {
        if SCHEME_RE.is_match(&rest[..idx]) {
            rest = &rest[idx + 1..];
        }
    }
    let rest = rest.trim_start_matches('/');
    let segment = rest.rsplit('/').find(|s| !s.is_empty()).unwrap_or(rest);
    let segment = segment.split(['?', '#']).next().unwrap_or(segment);

    let mut name = segment.to_string();
    let lower = name.to_lowercase();
    for ext in [".tar.gz", ".tar.bz2", ".tar.xz", ".tgz", ".tbz2", ".zip", ".git"] {
        if lower.ends_with(ext) {
            name.truncate(name.len() - ext.len());
            break;
        }
    }

    // Trailing dashed chunks that start with a digit are version-ish.
    while let Some(idx) = name.rfind('-') {
        let tail = &name[idx + 1..];
        if !tail.is_empty() && tail.starts_with(|c: char| c.is_ascii_digit()) {
            name.truncate(idx);
        } else {
            break;
        }
    }

    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_locator() {
        let req = Requirement::parse("rpm:somepkg").unwrap();
        assert_eq!(req.name(), "");
        assert_eq!(req.locator(), "rpm:somepkg");
        assert!(req.constraints().is_empty());
    }

    #[test]
    fn parses_named_requirement_with_constraint() {
        let req = Requirement::parse("mypkg scheme:somepkg>=1.0").unwrap();
        assert_eq!(req.name(), "mypkg");
        assert_eq!(req.locator(), "scheme:somepkg");
        assert_eq!(req.constraint_raw(), ">=1.0");
        let expr = req.constraints().get("somepkg").unwrap();
        assert!(expr.eval(&Version::parse("1.0").unwrap()));
    }

    #[test]
    fn parses_multi_clause_inline_constraint() {
        let req = Requirement::parse("rpm:somepkg>=1.0,<2.0").unwrap();
        let expr = req.constraints().get("somepkg").unwrap();
        assert!(expr.eval(&Version::parse("1.5").unwrap()));
        assert!(!expr.eval(&Version::parse("2.0").unwrap()));
    }

    #[test]
    fn parses_explicit_env_overrides_in_order() {
        let req = Requirement::parse("rpm:somepkg B=2 A=1").unwrap();
        assert_eq!(
            req.explicit_env(),
            &[("B".to_string(), "2".to_string()), ("A".to_string(), "1".to_string())]
        );
    }

    #[test]
    fn lone_bare_word_is_a_locator_not_a_name() {
        let req = Requirement::parse("somepkg").unwrap();
        assert_eq!(req.name(), "");
        assert_eq!(req.locator(), "somepkg");
    }

    #[test]
    fn bare_word_before_env_token_is_the_locator() {
        let req = Requirement::parse("somepkg FOO=bar").unwrap();
        assert_eq!(req.name(), "");
        assert_eq!(req.locator(), "somepkg");
        assert_eq!(req.explicit_env().len(), 1);
    }

    #[test]
    fn junk_trailing_token_names_the_token() {
        let err = Requirement::parse("rpm:somepkg !!!").unwrap_err();
        assert!(err.to_string().contains("!!!"));
    }

    #[test]
    fn empty_line_is_rejected() {
        assert!(Requirement::parse("   ").is_err());
    }

    #[test]
    fn explicit_env_wins_over_inherited() {
        let mut req = Requirement::parse("rpm:somepkg FOO=explicit").unwrap();
        req.inherit_env("FOO", "inherited");
        req.inherit_env("BAR", "baz");
        let environ = req.environ();
        assert_eq!(environ.get("FOO"), Some(&"explicit".to_string()));
        assert_eq!(environ.get("BAR"), Some(&"baz".to_string()));
    }

    #[test]
    fn first_inherited_value_sticks() {
        let mut req = Requirement::parse("rpm:somepkg").unwrap();
        req.inherit_env("FOO", "first");
        req.inherit_env("FOO", "second");
        assert_eq!(req.environ().get("FOO"), Some(&"first".to_string()));
    }

    #[test]
    fn display_round_trips_canonical_form() {
        let req = Requirement::parse("mypkg scheme:somepkg>=1.0 FOO=bar").unwrap();
        assert_eq!(req.to_string(), "mypkg scheme:somepkg>=1.0 FOO=bar");
    }

    #[test]
    fn pinned_render_replaces_constraint() {
        let mut req = Requirement::parse("mypkg scheme:somepkg>=1.0").unwrap();
        req.pin("scheme:somepkg", Version::parse("1.4.2").unwrap());
        let rendered = req.render(req.explicit_env(), req.pinned());
        assert_eq!(rendered, "mypkg scheme:somepkg==1.4.2");
    }

    #[test]
    fn guess_name_strips_scheme() {
        assert_eq!(guess_name("rpm:somepkg"), "somepkg");
    }

    #[test]
    fn guess_name_takes_last_path_segment() {
        assert_eq!(guess_name("https://example.com/pkgs/libfoo.tar.gz"), "libfoo");
        assert_eq!(guess_name("git+https://example.com/team/widget.git"), "widget");
    }

    #[test]
    fn guess_name_drops_version_suffix() {
        assert_eq!(guess_name("https://example.com/libfoo-1.2.3.tar.gz"), "libfoo");
    }

    #[test]
    fn guess_name_keeps_embedded_digits() {
        assert_eq!(guess_name("rpm:libxml2"), "libxml2");
    }
}
