//! Exit codes and structured error output.

use serde::Serialize;

/// Process exit codes.
///
/// - 0: completed, new links were made (or would be, in a dry run)
/// - 1: unexpected failure
/// - 2: completed, nothing to consolidate
/// - 3: completed, but some members failed
/// - 130: interrupted by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Run completed and duplicates were consolidated.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// Run completed with no duplicate groups to act on.
    NothingToDo = 2,
    /// Run completed but some files or members failed.
    PartialSuccess = 3,
    /// Run was interrupted (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Numeric exit code for `process::exit`.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code prefix for log and JSON output.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "RL000",
            Self::GeneralError => "RL001",
            Self::NothingToDo => "RL002",
            Self::PartialSuccess => "RL003",
            Self::Interrupted => "RL130",
        }
    }
}

/// Error details rendered as JSON when `--json-errors` is set.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g. "RL001")
    pub code: String,
    /// The numeric exit code
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the run was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Wrap an error with its exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: err.to_string(),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
