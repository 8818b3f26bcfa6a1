//! CLI-specific error types and exit code mapping

use cisin_core::error::CisinError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to standard Unix exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The trace API is not reachable.
    #[error("trace api not reachable: {0}")]
    TraceApiUnavailable(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from cisin-core.
    #[error("{0}")]
    Core(#[from] CisinError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning             |
    /// |------|---------------------|
    /// | 0    | Success             |
    /// | 1    | General error       |
    /// | 2    | Configuration error |
    /// | 3    | Trace API unreachable |
    /// | 10   | IO error            |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::TraceApiUnavailable(_) => 3,
            Self::Io(_) => 10,
            _ => 1,
        }
    }
}
