//! CLI-specific error types and exit code mapping

use u2post_core::error::U2PostError;
use u2post_ingest::IngestError;
use u2post_unified2::Unified2Error;

/// CLI-specific error type.
///
/// `exit_code()` maps each variant to a process exit code.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The unified2 input could not be framed or decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Rule index loading or lookup failure.
    #[error("rule error: {0}")]
    Rule(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from u2post-core.
    #[error("{0}")]
    Core(#[from] U2PostError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                  |
    /// |------|--------------------------|
    /// | 0    | Success                  |
    /// | 1    | General / command error  |
    /// | 2    | Configuration error      |
    /// | 3    | Malformed unified2 input |
    /// | 4    | Rule loading / lookup    |
    /// | 10   | IO error                 |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(U2PostError::Config(_)) => 2,
            Self::Decode(_) => 3,
            Self::Rule(_) => 4,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) => 1,
        }
    }
}

impl From<Unified2Error> for CliError {
    fn from(e: Unified2Error) -> Self {
        match e {
            Unified2Error::Io(io) => Self::Io(io),
            other => Self::Decode(other.to_string()),
        }
    }
}

impl From<IngestError> for CliError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Io(io) => Self::Io(io),
            IngestError::Unified2(u2) => u2.into(),
            IngestError::Config { .. } => Self::Config(e.to_string()),
            other => Self::Rule(other.to_string()),
        }
    }
}
