//! Error types for speechstore organized by access stage.

use std::path::PathBuf;
use thiserror::Error;

/// Feature store error variants organized by stage.
#[derive(Debug, Error)]
pub enum Error {
    /// Query key parsing and path resolution
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Artifact encoding and decoding
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Parser tree lookups and manifests
    #[error(transparent)]
    Parser(#[from] ParserError),

    /// Filesystem error outside of a codec call
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Query key and resolution errors.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Malformed query key
    #[error("invalid query key {key:?}: {reason}")]
    Invalid { key: String, reason: &'static str },

    /// No file matches the query
    #[error("no file for query {key} under {base:?}")]
    NotFound { key: String, base: PathBuf },
}

/// Codec errors raised while reading or writing one artifact.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Stored bytes do not match the codec's format
    #[error("corrupt data in {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Stored audio does not have the codec's sample rate
    #[error("sample rate mismatch in {path:?}: expected {expected}Hz, got {got}Hz")]
    SampleRateMismatch {
        path: PathBuf,
        expected: u32,
        got: u32,
    },

    /// Artifact variant cannot be written by this codec
    #[error("{codec} codec cannot encode {found} artifact")]
    ArtifactMismatch {
        codec: &'static str,
        found: &'static str,
    },

    /// IO error while accessing an artifact file
    #[error("failed to access {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Parser tree and manifest errors.
#[derive(Debug, Error)]
pub enum ParserError {
    /// Feature name not registered in the parser
    #[error("unknown feature: {0}")]
    UnknownFeature(String),

    /// SSL unit not registered in the parser
    #[error("unknown ssl unit: {0}")]
    UnknownUnit(String),

    /// Feature path with an unrecognized prefix
    #[error("unsupported feature path: {0}")]
    Unsupported(String),

    /// Feature name or directory registered twice
    #[error("duplicate {what}: {name}")]
    Duplicate { what: &'static str, name: String },

    /// Manifest file missing or malformed
    #[error("failed to load manifest {path:?}: {reason}")]
    Manifest { path: PathBuf, reason: String },
}

/// Coarse classification of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    CorruptData,
    Unsupported,
    InvalidQuery,
    Duplicate,
    Manifest,
    ArtifactMismatch,
    Io,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Query(QueryError::Invalid { .. }) => ErrorKind::InvalidQuery,
            Error::Query(QueryError::NotFound { .. }) => ErrorKind::NotFound,
            Error::Codec(CodecError::Corrupt { .. } | CodecError::SampleRateMismatch { .. }) => {
                ErrorKind::CorruptData
            }
            Error::Codec(CodecError::ArtifactMismatch { .. }) => ErrorKind::ArtifactMismatch,
            Error::Codec(CodecError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                ErrorKind::NotFound
            }
            Error::Codec(CodecError::Io { .. }) | Error::Io(_) => ErrorKind::Io,
            Error::Parser(ParserError::UnknownFeature(_) | ParserError::UnknownUnit(_)) => {
                ErrorKind::NotFound
            }
            Error::Parser(ParserError::Unsupported(_)) => ErrorKind::Unsupported,
            Error::Parser(ParserError::Duplicate { .. }) => ErrorKind::Duplicate,
            Error::Parser(ParserError::Manifest { .. }) => ErrorKind::Manifest,
        }
    }
}

/// Result type alias for speechstore operations.
pub type Result<T> = std::result::Result<T, Error>;

impl CodecError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        CodecError::Corrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CodecError::Io {
            path: path.into(),
            source,
        }
    }
}
