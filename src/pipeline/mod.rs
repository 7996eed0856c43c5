//! The installation pipeline.
//!
//! Every run walks the same fixed stage sequence:
//!
//! ```text
//! init → fetch → inspect → extract → build → install → optlink → relocate
//! ```
//!
//! There is no persisted per-package "current stage": the [`Driver`] re-walks
//! the whole sequence on every run, resolving a [`PipelineStep`] handler per
//! stage through the [`StepRegistry`]. Handlers communicate through values,
//! not exceptions: a stage operation returns [`StepControl`] on success, and
//! the driver folds everything into a [`RunOutcome`].
//!
//! # Modules
//!
//! - [`step`] - The handler trait and the (priority, factory) registry
//! - [`driver`] - Stage walking, store consultation, batch runs
//! - [`native`] - Presence-only checker for OS-native (`rpm:`) packages

pub mod driver;
pub mod native;
pub mod step;

pub use driver::{Driver, RunOutcome, RunReport};
pub use native::{NativeChecker, NativeIndex};
pub use step::{PipelineStep, StepRegistry};

use std::fmt;

/// One of the eight fixed pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Init,
    Fetch,
    Inspect,
    Extract,
    Build,
    Install,
    Optlink,
    Relocate,
}

impl Stage {
    /// The full stage sequence, in execution order.
    pub const SEQUENCE: [Stage; 8] = [
        Stage::Init,
        Stage::Fetch,
        Stage::Inspect,
        Stage::Extract,
        Stage::Build,
        Stage::Install,
        Stage::Optlink,
        Stage::Relocate,
    ];

    /// The stage's name as used in logs and registry diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Fetch => "fetch",
            Stage::Inspect => "inspect",
            Stage::Extract => "extract",
            Stage::Build => "build",
            Stage::Install => "install",
            Stage::Optlink => "optlink",
            Stage::Relocate => "relocate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a stage operation tells the driver on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
    /// Stage completed; continue with the next stage.
    Proceed,

    /// The requirement is already satisfied: stop all remaining stages and
    /// report success-without-change. Not a failure.
    AlreadyInstalled,
}
