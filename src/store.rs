//! Persisted installed-package state.
//!
//! The [`InstallStore`] records what a successful pipeline run installed,
//! keyed by case-folded package name. The driver consults it to decide
//! whether a requirement is already satisfied, and skips it entirely for
//! virtual runs.

use crate::error::{CairnError, Result};
use crate::package::Package;
use crate::provision::Provision;
use crate::version::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One recorded install.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstalledRecord {
    /// Resolved package name.
    pub name: String,

    /// Source locator the install came from.
    pub locator: String,

    /// Concrete installed version, when one was resolved.
    pub version: Option<Version>,

    /// Capabilities the install provides.
    pub provisions: Provision,

    /// Where the artifact landed, when known.
    pub install_path: Option<PathBuf>,

    /// When the install was recorded.
    pub installed_at: DateTime<Utc>,
}

/// JSON-on-disk store of installed packages.
#[derive(Debug)]
pub struct InstallStore {
    path: PathBuf,
    records: HashMap<String, InstalledRecord>,
}

impl InstallStore {
    /// Load the store, or start empty when the file does not exist yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content).map_err(|e| CairnError::Parse {
                token: path.display().to_string(),
                reason: e.to_string(),
            })?
        } else {
            HashMap::new()
        };
        Ok(Self { path, records })
    }

    /// Save the store to disk using an atomic write.
    ///
    /// Writes to a temporary sibling, then renames, so a crash never leaves
    /// a half-written store.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.records)
            .map_err(|e| CairnError::Other(e.into()))?;

        let mut tmp_name = self.path.as_os_str().to_os_string();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a record by name, case-insensitively.
    pub fn lookup(&self, name: &str) -> Option<&InstalledRecord> {
        self.records.get(&name.to_lowercase())
    }

    /// Record a completed install and save immediately.
    pub fn record(&mut self, pkg: &Package) -> Result<()> {
        let record = InstalledRecord {
            name: pkg.name.clone(),
            locator: pkg.locator.clone(),
            version: pkg.version.clone(),
            provisions: pkg.provisions.clone(),
            install_path: pkg.install_path.clone(),
            installed_at: Utc::now(),
        };
        self.records.insert(pkg.name.to_lowercase(), record);
        self.save()
    }

    /// Remove a record by name; true if one existed. Saves immediately.
    pub fn remove(&mut self, name: &str) -> Result<bool> {
        let removed = self.records.remove(&name.to_lowercase()).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    /// Recorded names, unordered.
    pub fn names(&self) -> Vec<&str> {
        self.records.values().map(|r| r.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
