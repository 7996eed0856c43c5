//! Cairn - Declarative package installation for managed environments.
//!
//! Cairn reads plain-text requirement documents, resolves each requirement
//! to a handler, and drives packages through a fixed install pipeline.
//! Documents survive parse, edit, and serialize cycles byte-for-byte, so
//! they can live under version control and be rewritten by tooling without
//! churning lines a human wrote.
//!
//! # Modules
//!
//! - [`error`] - Error types and result alias
//! - [`version`] - Version values and comparison expressions
//! - [`provision`] - Capability sets a package provides
//! - [`requirement`] - Requirement grammar and round-trippable documents
//! - [`package`] - Mutable per-run package records
//! - [`pipeline`] - Stage sequence, handler registry, and the driver
//! - [`shell`] - Shell command execution
//! - [`store`] - Persisted installed-package state
//! - [`git`] - Thin wrapper around the git binary
//! - [`repo`] - Git-backed requirement documents
//!
//! # Example
//!
//! ```
//! use cairn::requirement::RequirementDocument;
//!
//! let mut doc = RequirementDocument::parse(
//!     "CFLAGS=-O2\nhttps://example.org/mypkg-1.2.tar.gz  # pinned\n",
//! ).unwrap();
//! doc.infer_missing_names(true).unwrap();
//! assert_eq!(doc.requirements().next().unwrap().name(), "mypkg");
//! assert_eq!(
//!     doc.serialize(false),
//!     "CFLAGS=-O2\nmypkg https://example.org/mypkg-1.2.tar.gz  # pinned\n",
//! );
//! ```

pub mod error;
pub mod git;
pub mod package;
pub mod pipeline;
pub mod provision;
pub mod repo;
pub mod requirement;
pub mod shell;
pub mod store;
pub mod version;

pub use error::{CairnError, Result};
