//! Error types for the analysis engine.
//!
//! Only caller-misuse conditions (bad or missing path, unsupported language)
//! leave `analyze` as an `Err`. Everything that goes wrong while analyzing an
//! accepted input is folded into a failed [`AnalysisResult`] instead.
//!
//! [`AnalysisResult`]: crate::analysis::AnalysisResult

use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors raised by the analysis engine.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The requested file does not exist.
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// The path escapes the project root or contains a traversal token.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// No plugin and no grammar is available for the language.
    #[error("unsupported language: {language}")]
    UnsupportedLanguage { language: String },

    /// The parser could not produce a tree.
    #[error("failed to parse {language} source: {message}")]
    ParseFailure { language: String, message: String },

    /// Configuration file could not be read or parsed.
    #[error("invalid configuration in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else that went wrong inside the pipeline.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// Shorthand for an [`AnalysisError::InvalidPath`].
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        AnalysisError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is raised to the caller rather than captured in a result.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            AnalysisError::FileNotFound { .. }
                | AnalysisError::InvalidPath { .. }
                | AnalysisError::UnsupportedLanguage { .. }
        )
    }
}

impl From<anyhow::Error> for AnalysisError {
    fn from(err: anyhow::Error) -> Self {
        AnalysisError::Internal(format!("{:#}", err))
    }
}
