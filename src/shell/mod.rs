//! External command execution.
//!
//! Package queries and version-control operations both shell out; this
//! module is the single place that spawns those processes, captures their
//! output, and enforces a timeout (a hung query must fail the affected
//! pipeline run, not wedge the whole batch).

pub mod command;

pub use command::{execute, execute_quiet, CommandOptions, CommandResult};
