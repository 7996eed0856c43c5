//! Presence checks against the system's native package manager.
//!
//! The [`NativeChecker`] claims `rpm:` locators and never installs anything.
//! It answers one question: is the named package already present on the
//! host? The answer comes from a [`NativeIndex`], a lazily built snapshot of
//! the installed-package listing that is shared across a batch so the
//! listing command runs at most once.

use crate::error::{CairnError, Result};
use crate::package::Package;
use crate::pipeline::step::{PipelineStep, StepRegistry};
use crate::pipeline::{Stage, StepControl};
use crate::shell::{execute, CommandOptions};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

const LOCATOR_SCHEME: &str = "rpm:";
const QUERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Lazily built snapshot of installed native packages.
///
/// The index is built on first query and then shared. Construct one per
/// batch; a long-lived index goes stale as the host changes.
pub struct NativeIndex {
    query: String,
    names: Mutex<Option<Arc<HashSet<String>>>>,
}

impl NativeIndex {
    /// Index backed by `rpm -qa`.
    pub fn new() -> Self {
        Self::with_query("rpm -qa")
    }

    /// Index backed by an arbitrary listing command, one package per line.
    pub fn with_query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            names: Mutex::new(None),
        }
    }

    /// True if `name` appears in the installed listing, case-insensitively.
    pub fn contains(&self, name: &str) -> Result<bool> {
        let names = self.names_snapshot()?;
        Ok(names.contains(&name.to_lowercase()))
    }

    fn names_snapshot(&self) -> Result<Arc<HashSet<String>>> {
        let mut guard = self.names.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(names) = &*guard {
            return Ok(names.clone());
        }

        let mut options = CommandOptions::default();
        options.timeout = Some(QUERY_TIMEOUT);
        let result = execute(&self.query, &options)?;
        if !result.success {
            return Err(CairnError::Command {
                command: self.query.clone(),
                code: result.exit_code,
                output: result.stderr,
            });
        }

        let mut names = HashSet::new();
        for line in result.stdout.lines() {
            let identifier = line.trim();
            if identifier.is_empty() {
                continue;
            }
            register_identifier(&mut names, identifier);
        }
        debug!(packages = names.len(), query = %self.query, "native index built");

        let names = Arc::new(names);
        *guard = Some(names.clone());
        Ok(names)
    }
}

impl Default for NativeIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Index an installed-package identifier under every name a requirement
/// might plausibly use for it. An rpm identifier like
/// `somepkg-1.2.3-4.el9.x86_64` is findable as `somepkg`,
/// `somepkg-1.2.3` and so on, so each `-` and `.` prefix is registered.
fn register_identifier(names: &mut HashSet<String>, identifier: &str) {
    let identifier = identifier.to_lowercase();
    let mut boundaries: Vec<usize> = identifier
        .char_indices()
        .filter(|(_, c)| *c == '-' || *c == '.')
        .map(|(i, _)| i)
        .collect();
    boundaries.push(identifier.len());
    for end in boundaries {
        if end > 0 {
            names.insert(identifier[..end].to_string());
        }
    }
}

/// Handler for `rpm:` locators.
///
/// Claims the init stage at high priority, marks the package virtual so a
/// presence check never writes to the install store, and at fetch either
/// reports the package already installed or fails the run.
#[derive(Clone)]
pub struct NativeChecker {
    index: Arc<NativeIndex>,
}

impl NativeChecker {
    pub fn new(index: Arc<NativeIndex>) -> Self {
        Self { index }
    }

    /// Register the checker with a registry, sharing `index` across all
    /// packages resolved from it.
    pub fn register(registry: &mut StepRegistry, index: Arc<NativeIndex>) {
        registry.register("native", 1000, move |stage, pkg: &Package| {
            if stage == Stage::Init && pkg.locator.starts_with(LOCATOR_SCHEME) {
                Some(Box::new(NativeChecker::new(index.clone())) as Box<dyn PipelineStep>)
            } else {
                None
            }
        });
    }

    fn target(pkg: &Package) -> &str {
        pkg.locator
            .strip_prefix(LOCATOR_SCHEME)
            .unwrap_or(&pkg.locator)
    }
}

impl PipelineStep for NativeChecker {
    fn name(&self) -> &'static str {
        "native"
    }

    fn init(&mut self, pkg: &mut Package) -> Result<StepControl> {
        if pkg.name.is_empty() {
            pkg.name = Self::target(pkg).to_string();
        }
        pkg.is_virtual = true;
        Ok(StepControl::Proceed)
    }

    fn fetch(&mut self, pkg: &mut Package) -> Result<StepControl> {
        // The lookup key is the package's name, which init derives from the
        // locator only when no explicit name was given.
        let name = if pkg.name.is_empty() {
            Self::target(pkg).to_string()
        } else {
            pkg.name.clone()
        };
        if self.index.contains(&name)? {
            Ok(StepControl::AlreadyInstalled)
        } else {
            Err(CairnError::pipeline(format!(
                "native package {name:?} is not installed"
            )))
        }
    }

    fn next_handler(
        &self,
        _stage: Stage,
        _pkg: &Package,
        _registry: &StepRegistry,
    ) -> Option<Box<dyn PipelineStep>> {
        // Presence checks own the whole run; never hand off.
        Some(Box::new(self.clone()))
    }
}
