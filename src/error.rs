// src/error.rs
use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::DatasetKind;
use crate::core::NetError;

/// Failure of a single source adapter. Never escapes the resolver raw.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{cause}")]
    Transport { source_id: String, cause: String },
    #[error("{cause}")]
    Parse { source_id: String, cause: String },
    #[error("{reason}")]
    Validation { source_id: String, reason: String },
    #[error("{message}")]
    Unexpected { source_id: String, message: String },
}

impl SourceError {
    pub fn transport(source_id: &str, cause: impl fmt::Display) -> Self {
        Self::Transport { source_id: s!(source_id), cause: cause.to_string() }
    }
    pub fn parse(source_id: &str, cause: impl fmt::Display) -> Self {
        Self::Parse { source_id: s!(source_id), cause: cause.to_string() }
    }
    pub fn validation(source_id: &str, reason: impl fmt::Display) -> Self {
        Self::Validation { source_id: s!(source_id), reason: reason.to_string() }
    }
    pub fn unexpected(source_id: &str, message: impl fmt::Display) -> Self {
        Self::Unexpected { source_id: s!(source_id), message: message.to_string() }
    }

    pub fn source_id(&self) -> &str {
        match self {
            Self::Transport { source_id, .. }
            | Self::Parse { source_id, .. }
            | Self::Validation { source_id, .. }
            | Self::Unexpected { source_id, .. } => source_id,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport { .. }  => FailureKind::Transport,
            Self::Parse { .. }      => FailureKind::Parse,
            Self::Validation { .. } => FailureKind::Validation,
            Self::Unexpected { .. } => FailureKind::Unexpected,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Parse,
    Validation,
    Unexpected,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport  => "TransportError",
            Self::Parse      => "ParseError",
            Self::Validation => "ValidationError",
            Self::Unexpected => "Unexpected",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed attempt within a source chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceAttempt {
    pub source: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Every failed attempt of one resolution, in the order tried.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttemptLog(Vec<SourceAttempt>);

impl AttemptLog {
    pub fn new() -> Self { Self(Vec::new()) }

    pub fn record(&mut self, source: &str, kind: FailureKind, message: impl Into<String>) {
        self.0.push(SourceAttempt { source: s!(source), kind, message: message.into() });
    }

    pub fn push_error(&mut self, err: &SourceError) {
        self.record(err.source_id(), err.kind(), err.to_string());
    }

    pub fn entries(&self) -> &[SourceAttempt] { &self.0 }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl fmt::Display for AttemptLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for a in &self.0 {
            writeln!(f, "  - {}: {}: {}", a.source, a.kind, a.message)?;
        }
        Ok(())
    }
}

/// Every source in a chain failed. Caught by the acquisition facade.
#[derive(Debug, Error)]
#[error("all {} sources failed for {kind}", .log.len())]
pub struct AllSourcesFailed {
    pub kind: DatasetKind,
    pub log: AttemptLog,
}

/// The only error that escapes acquisition: no source worked and no cache exists.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("could not acquire {kind} data and no cache exists; attempts:\n{log}")]
    AcquisitionFailed { kind: DatasetKind, log: AttemptLog },
}

impl AcquireError {
    pub fn kind(&self) -> DatasetKind {
        match self { Self::AcquisitionFailed { kind, .. } => *kind }
    }
    pub fn log(&self) -> &AttemptLog {
        match self { Self::AcquisitionFailed { log, .. } => log }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no cached {0} data")]
    NotFound(DatasetKind),
    #[error("cache I/O on {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("cache file {} is malformed: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },
}

/// Errors from a full run (acquire all + process + write outputs).
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Acquire(#[from] AcquireError),
    #[error(transparent)]
    Client(#[from] NetError),
    #[error("writing {}: {source}", .path.display())]
    Output { path: PathBuf, source: io::Error },
    #[error("serializing summary: {0}")]
    Summary(#[from] serde_json::Error),
}
