use std::path::PathBuf;

use thiserror::Error;

/// Result alias for federation operations.
pub type Result<T> = core::result::Result<T, FederationError>;

/// Coarse classification of a [`FederationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Io,
    Backend,
    Encoding,
}

/// Every failure the federation engine can report.
///
/// The CLI treats all of these as plugin failures: they are printed without
/// usage text, unlike argument errors raised by the command parser.
#[derive(Debug, Error)]
pub enum FederationError {
    #[error("{0}")]
    Config(String),
    #[error("cannot read {what} at {}: {source}", path.display())]
    Io {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{operation}: {context}, error={message}")]
    Backend {
        operation: &'static str,
        context: String,
        message: String,
    },
    #[error("cannot decode ExecCredential: {0}")]
    Decode(String),
    #[error("cannot encode ExecCredential to JSON: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("cannot write ExecCredential: {0}")]
    Emit(#[source] std::io::Error),
}

impl FederationError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn backend(
        operation: &'static str,
        context: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Backend {
            operation,
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Io { .. } => ErrorKind::Io,
            Self::Backend { .. } => ErrorKind::Backend,
            Self::Decode(_) | Self::Encode(_) | Self::Emit(_) => ErrorKind::Encoding,
        }
    }
}
