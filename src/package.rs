//! Per-run package record.
//!
//! A [`Package`] is created fresh from a [`Requirement`] at the start of a
//! pipeline run, accumulates what handlers resolve along the way, and is
//! discarded at the end of the run. No identity persists across runs.

use crate::provision::Provision;
use crate::requirement::Requirement;
use crate::version::{Version, VersionExpr};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Mutable state carried through one pipeline run.
#[derive(Debug, Clone)]
pub struct Package {
    /// Resolved name; starts as the requirement's (possibly empty) name.
    pub name: String,

    /// Source locator from the requirement.
    pub locator: String,

    /// Effective environment overrides for this run.
    pub environ: BTreeMap<String, String>,

    /// Required constraints, capability name → expression.
    pub constraints: BTreeMap<String, VersionExpr>,

    /// Concrete version, once a handler resolves one.
    pub version: Option<Version>,

    /// Capabilities this package provides, filled in by handlers.
    pub provisions: Provision,

    /// Where the fetched source landed.
    pub fetch_path: Option<PathBuf>,

    /// Where the build ran.
    pub build_path: Option<PathBuf>,

    /// Where the artifact was installed.
    pub install_path: Option<PathBuf>,

    /// Set by a handler when this run must not be persisted
    /// (e.g. a presence check rather than a real install).
    pub is_virtual: bool,
}

impl Package {
    /// Start a fresh run record from a requirement.
    pub fn new(requirement: &Requirement) -> Self {
        Self {
            name: requirement.name().to_string(),
            locator: requirement.locator().to_string(),
            environ: requirement.environ(),
            constraints: requirement.constraints().clone(),
            version: None,
            provisions: Provision::new(),
            fetch_path: None,
            build_path: None,
            install_path: None,
            is_virtual: false,
        }
    }

    /// The name used for display and store keys; falls back to the locator
    /// while the name is still unresolved.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.locator
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_copies_requirement_fields() {
        let req = Requirement::parse("mypkg rpm:somepkg>=1.0 FOO=bar").unwrap();
        let pkg = Package::new(&req);

        assert_eq!(pkg.name, "mypkg");
        assert_eq!(pkg.locator, "rpm:somepkg");
        assert_eq!(pkg.environ.get("FOO"), Some(&"bar".to_string()));
        assert!(pkg.constraints.contains_key("somepkg"));
        assert!(!pkg.is_virtual);
        assert!(pkg.provisions.is_empty());
    }

    #[test]
    fn display_name_falls_back_to_locator() {
        let req = Requirement::parse("rpm:somepkg").unwrap();
        let pkg = Package::new(&req);
        assert_eq!(pkg.display_name(), "rpm:somepkg");
    }

    #[test]
    fn fresh_package_per_run() {
        let req = Requirement::parse("mypkg rpm:somepkg").unwrap();
        let mut first = Package::new(&req);
        first.is_virtual = true;
        first.version = Some(Version::parse("1.0").unwrap());

        let second = Package::new(&req);
        assert!(!second.is_virtual);
        assert!(second.version.is_none());
    }
}
