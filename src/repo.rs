//! Git-backed requirement documents.
//!
//! An [`EnvironmentRepo`] is a git work tree whose tracked
//! `requirements.txt` describes an environment. Documents can be loaded
//! from the work tree or from any committed revision, and committing
//! through the repo bumps the document's `Version` header and stamps the
//! tool revision that wrote it.

use crate::error::{CairnError, Result};
use crate::git::GitRepo;
use crate::requirement::RequirementDocument;
use anyhow::anyhow;
use std::path::{Path, PathBuf};
use tracing::info;

pub const REQUIREMENTS_FILE: &str = "requirements.txt";

#[derive(Debug)]
pub struct EnvironmentRepo {
    name: String,
    git: GitRepo,
}

impl EnvironmentRepo {
    pub fn new(name: impl Into<String>, work_tree: impl Into<PathBuf>) -> Self {
        let work_tree = work_tree.into();
        Self {
            name: name.into(),
            git: GitRepo::new(work_tree),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn git(&self) -> &GitRepo {
        &self.git
    }

    pub fn requirements_path(&self) -> PathBuf {
        self.git.work_tree().join(REQUIREMENTS_FILE)
    }

    /// Load the requirement document from the work tree, or from a
    /// committed revision when one is given.
    pub fn load_document(&self, revision: Option<&str>) -> Result<RequirementDocument> {
        match revision {
            Some(revision) => {
                let content = self
                    .git
                    .show(revision, REQUIREMENTS_FILE)?
                    .ok_or_else(|| CairnError::Parse {
                        token: format!("{revision}:{REQUIREMENTS_FILE}"),
                        reason: "no such file at revision".to_string(),
                    })?;
                let text = String::from_utf8_lossy(&content).into_owned();
                RequirementDocument::parse(&text)
            }
            None => RequirementDocument::load(&self.requirements_path()),
        }
    }

    /// Write the document back to the work tree.
    pub fn dump_document(&self, document: &RequirementDocument) -> Result<()> {
        document.dump(&self.requirements_path(), false)
    }

    /// Commit the work-tree document.
    ///
    /// Refuses to commit when tracked files besides the requirements file
    /// have uncommitted changes. When `bump_level` is given the document's
    /// `Version` header is bumped at that level (0 is the major position)
    /// before committing, and the header recording which tool revision
    /// wrote the file is refreshed.
    pub fn commit(&self, message: &str, bump_level: Option<usize>) -> Result<()> {
        self.check_clean_besides_requirements()?;

        let mut document = self.load_document(None)?;
        if let Some(level) = bump_level {
            let current = document
                .header("Version")
                .map(|header| header.value.clone())
                .unwrap_or_else(|| "0.0.0".to_string());
            let bumped = bump_version(&current, level)?;
            document.set_header("Version", &bumped);
            info!(repo = %self.name, version = %bumped, "bumping environment version");
        }
        document.set_header("Cairn-Revision", env!("CARGO_PKG_VERSION"));
        self.dump_document(&document)?;

        self.git.add(REQUIREMENTS_FILE)?;
        self.git.commit(message)?;
        Ok(())
    }

    fn check_clean_besides_requirements(&self) -> Result<()> {
        let dirty: Vec<String> = self
            .git
            .status()?
            .into_iter()
            .filter(|entry| entry.index_state != '?' && entry.tree_state != '?')
            .filter(|entry| Path::new(&entry.path) != Path::new(REQUIREMENTS_FILE))
            .map(|entry| entry.path)
            .collect();
        if !dirty.is_empty() {
            return Err(anyhow!(
                "work tree has uncommitted changes: {}",
                dirty.join(", ")
            )
            .into());
        }
        Ok(())
    }
}

/// Bump a dotted version string at `level`, zeroing everything after it.
/// Missing positions count as zero, so bumping `1.2` at level 2 yields
/// `1.2.1`.
fn bump_version(version: &str, level: usize) -> Result<String> {
    let mut parts: Vec<u64> = Vec::new();
    for part in version.split(['.', '-']) {
        let value = part.parse().map_err(|_| {
            CairnError::parse(version, format!("non-numeric version segment {part:?}"))
        })?;
        parts.push(value);
    }
    while parts.len() <= level {
        parts.push(0);
    }
    parts[level] += 1;
    for part in parts.iter_mut().skip(level + 1) {
        *part = 0;
    }
    let rendered: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
    Ok(rendered.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_repo() -> (tempfile::TempDir, EnvironmentRepo) {
        let dir = tempfile::TempDir::new().unwrap();
        let repo = EnvironmentRepo::new("scratch", dir.path());
        repo.git().init().unwrap();
        repo.git().config("user.email", "test@example.org").unwrap();
        repo.git().config("user.name", "Test").unwrap();
        (dir, repo)
    }

    #[test]
    fn bump_levels() {
        assert_eq!(bump_version("1.2.3", 0).unwrap(), "2.0.0");
        assert_eq!(bump_version("1.2.3", 1).unwrap(), "1.3.0");
        assert_eq!(bump_version("1.2.3", 2).unwrap(), "1.2.4");
        assert_eq!(bump_version("1.2", 2).unwrap(), "1.2.1");
        assert!(bump_version("1.2a", 0).is_err());
    }

    #[test]
    fn commit_bumps_version_header() {
        let (_dir, repo) = scratch_repo();
        fs::write(
            repo.requirements_path(),
            "Version: 1.0.0\n\nmypkg scheme:somepkg>=1.0\n",
        )
        .unwrap();
        repo.git().add(REQUIREMENTS_FILE).unwrap();
        repo.git().commit("initial").unwrap();

        fs::write(
            repo.requirements_path(),
            "Version: 1.0.0\n\nmypkg scheme:somepkg>=2.0\n",
        )
        .unwrap();
        repo.commit("tighten constraint", Some(1)).unwrap();

        let document = repo.load_document(None).unwrap();
        assert_eq!(document.header("Version").unwrap().value, "1.1.0");
        assert_eq!(
            document.header("Cairn-Revision").unwrap().value,
            env!("CARGO_PKG_VERSION")
        );
        assert!(!repo.git().is_dirty().unwrap());
    }

    #[test]
    fn commit_refuses_dirty_siblings() {
        let (dir, repo) = scratch_repo();
        fs::write(repo.requirements_path(), "mypkg scheme:somepkg\n").unwrap();
        fs::write(dir.path().join("other.txt"), "tracked\n").unwrap();
        repo.git().add(REQUIREMENTS_FILE).unwrap();
        repo.git().add("other.txt").unwrap();
        repo.git().commit("initial").unwrap();

        fs::write(dir.path().join("other.txt"), "changed\n").unwrap();
        assert!(repo.commit("should fail", None).is_err());
    }

    #[test]
    fn load_document_at_revision() {
        let (_dir, repo) = scratch_repo();
        fs::write(repo.requirements_path(), "mypkg scheme:somepkg>=1.0\n").unwrap();
        repo.git().add(REQUIREMENTS_FILE).unwrap();
        repo.git().commit("first").unwrap();
        let first = repo.git().rev_parse("HEAD").unwrap();

        fs::write(repo.requirements_path(), "mypkg scheme:somepkg>=2.0\n").unwrap();
        repo.git().add(REQUIREMENTS_FILE).unwrap();
        repo.git().commit("second").unwrap();

        let old = repo.load_document(Some(&first)).unwrap();
        assert_eq!(old.requirements().next().unwrap().constraint_raw(), ">=1.0");
        let new = repo.load_document(None).unwrap();
        assert_eq!(new.requirements().next().unwrap().constraint_raw(), ">=2.0");
    }
}
