//! Thin wrapper around the `git` binary.
//!
//! Used by the environment repository to read and write requirement
//! documents at arbitrary revisions. Every operation shells out; failures
//! surface git's own stderr.

use crate::error::{CairnError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// One line of `git status --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Staged state, the first status column.
    pub index_state: char,

    /// Working-tree state, the second status column.
    pub tree_state: char,

    pub path: String,
}

/// A git work tree with a default remote and branch.
#[derive(Debug, Clone)]
pub struct GitRepo {
    work_tree: PathBuf,
    remote_name: String,
    branch_name: String,
}

impl GitRepo {
    pub fn new(work_tree: impl Into<PathBuf>) -> Self {
        Self {
            work_tree: work_tree.into(),
            remote_name: "origin".to_string(),
            branch_name: "master".to_string(),
        }
    }

    pub fn work_tree(&self) -> &Path {
        &self.work_tree
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    pub fn branch_name(&self) -> &str {
        &self.branch_name
    }

    pub fn set_branch(&mut self, branch: impl Into<String>) {
        self.branch_name = branch.into();
    }

    /// Create an empty repository at the work tree.
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.work_tree)?;
        self.git(&["init", "--quiet"])?;
        Ok(())
    }

    /// Set a repository-local config value.
    pub fn config(&self, key: &str, value: &str) -> Result<()> {
        self.git(&["config", key, value])?;
        Ok(())
    }

    pub fn fetch(&self, remote: &str, refspec: Option<&str>) -> Result<()> {
        let mut args = vec!["fetch", remote];
        if let Some(refspec) = refspec {
            args.push(refspec);
        }
        self.git(&args)?;
        Ok(())
    }

    /// Check out `revision`, discarding local changes when `force` is set.
    pub fn checkout(&self, revision: &str, force: bool) -> Result<()> {
        let mut args = vec!["checkout"];
        if force {
            args.push("--force");
        }
        args.push(revision);
        self.git(&args)?;
        Ok(())
    }

    /// Contents of `path` at `revision`, or None when the file does not
    /// exist there.
    pub fn show(&self, revision: &str, path: &str) -> Result<Option<Vec<u8>>> {
        let spec = format!("{revision}:{path}");
        let output = self.run(&["show", &spec])?;
        if output.status.success() {
            Ok(Some(output.stdout))
        } else {
            Ok(None)
        }
    }

    pub fn status(&self) -> Result<Vec<StatusEntry>> {
        let stdout = self.git(&["status", "--porcelain"])?;
        let mut entries = Vec::new();
        for line in stdout.lines() {
            let mut chars = line.chars();
            let index_state = match chars.next() {
                Some(c) => c,
                None => continue,
            };
            let tree_state = match chars.next() {
                Some(c) => c,
                None => continue,
            };
            // Skip the separating space.
            let path: String = chars.skip(1).collect();
            entries.push(StatusEntry {
                index_state,
                tree_state,
                path,
            });
        }
        Ok(entries)
    }

    /// True when the work tree has uncommitted changes to tracked files.
    pub fn is_dirty(&self) -> Result<bool> {
        Ok(self
            .status()?
            .iter()
            .any(|entry| entry.index_state != '?' && entry.tree_state != '?'))
    }

    pub fn add(&self, path: &str) -> Result<()> {
        self.git(&["add", path])?;
        Ok(())
    }

    pub fn commit(&self, message: &str) -> Result<()> {
        self.git(&["commit", "--quiet", "-m", message])?;
        Ok(())
    }

    /// Resolve `revision` to a full commit hash.
    pub fn rev_parse(&self, revision: &str) -> Result<String> {
        let stdout = self.git(&["rev-parse", "--verify", revision])?;
        Ok(stdout.trim().to_string())
    }

    /// Run git and fail with its stderr on a non-zero exit.
    fn git(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(CairnError::Command {
                command: format!("git {}", args.join(" ")),
                code: output.status.code(),
                output: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        debug!(work_tree = %self.work_tree.display(), ?args, "git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.work_tree)
            .output()?;
        Ok(output)
    }
}
