//! Structured error handling and exit codes.

use serde::Serialize;

/// Exit codes for the pathfingerprint binary.
///
/// Each failure class gets its own code so calling scripts can tell them
/// apart. Code 2 is left to `clap` for usage errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the digest was printed.
    Success = 0,
    /// General error: configuration or any unclassified failure.
    GeneralError = 1,
    /// The catalog directory could not be created.
    CatalogDirectory = 3,
    /// The catalog could not be opened.
    CatalogOpen = 4,
    /// The tree could not be hashed.
    HashFailed = 5,
    /// Stale records could not be pruned, or the catalog not closed.
    PruneFailed = 6,
    /// Recall found nothing for the requested path.
    NotFound = 7,
    /// The change report destination could not be opened.
    ReportFailed = 8,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "PF000",
            Self::GeneralError => "PF001",
            Self::CatalogDirectory => "PF003",
            Self::CatalogOpen => "PF004",
            Self::HashFailed => "PF005",
            Self::PruneFailed => "PF006",
            Self::NotFound => "PF007",
            Self::ReportFailed => "PF008",
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "PF004")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: err.to_string(),
        }
    }
}
