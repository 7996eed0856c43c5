//! Error types for cairn operations.
//!
//! This module defines [`CairnError`], the primary error type used throughout
//! the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Use `CairnError` for domain-specific errors that need distinct handling
//! - Use `anyhow::Error` (via `CairnError::Other`) for unexpected errors
//! - "Already installed" is deliberately *not* an error: it is reported as
//!   [`StepControl::AlreadyInstalled`](crate::pipeline::StepControl) and
//!   folded into a successful run outcome by the driver

use thiserror::Error;

/// Core error type for cairn operations.
#[derive(Debug, Error)]
pub enum CairnError {
    /// Malformed document, requirement, provision, or version text.
    #[error("could not parse {token:?}: {reason}")]
    Parse { token: String, reason: String },

    /// Two requirements resolve to the same case-insensitive name.
    #[error("name collision: {name:?} is claimed by more than one requirement")]
    NameCollision { name: String },

    /// A pipeline stage failed; aborts only the current package's run.
    #[error("pipeline error: {message}")]
    Pipeline { message: String },

    /// External command failed (non-zero exit, or killed on timeout).
    #[error("command failed with exit code {code:?}: {command}")]
    Command {
        command: String,
        code: Option<i32>,
        output: String,
    },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CairnError {
    /// Build a [`CairnError::Parse`] naming the offending token.
    pub fn parse(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            token: token.into(),
            reason: reason.into(),
        }
    }

    /// Build a [`CairnError::Pipeline`] with a message.
    pub fn pipeline(message: impl Into<String>) -> Self {
        Self::Pipeline {
            message: message.into(),
        }
    }
}

/// Result type alias for cairn operations.
pub type Result<T> = std::result::Result<T, CairnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_displays_token_and_reason() {
        let err = CairnError::parse(">=x.y", "bad comparator operand");
        let msg = err.to_string();
        assert!(msg.contains(">=x.y"));
        assert!(msg.contains("bad comparator operand"));
    }

    #[test]
    fn name_collision_displays_name() {
        let err = CairnError::NameCollision {
            name: "openssl".into(),
        };
        assert!(err.to_string().contains("openssl"));
    }

    #[test]
    fn pipeline_error_displays_message() {
        let err = CairnError::pipeline("fetch exploded");
        assert!(err.to_string().contains("fetch exploded"));
    }

    #[test]
    fn command_error_displays_command_and_code() {
        let err = CairnError::Command {
            command: "rpm -qa".into(),
            code: Some(127),
            output: String::new(),
        };
        let msg = err.to_string();
        assert!(msg.contains("rpm -qa"));
        assert!(msg.contains("127"));
    }

    #[test]
    fn io_error_converts_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: CairnError = io_err.into();
        assert!(matches!(err, CairnError::Io(_)));
    }

    #[test]
    fn result_type_alias_works() {
        fn returns_error() -> Result<()> {
            Err(CairnError::pipeline("test"))
        }
        assert!(returns_error().is_err());
    }
}
