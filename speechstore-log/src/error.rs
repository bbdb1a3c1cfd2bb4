//! Error types for speechstore-log.

use ndarray_stats::errors::MinMaxError;
use thiserror::Error;

/// Training logger error variants.
#[derive(Debug, Error)]
pub enum Error {
    /// Log directory or file IO failure
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// CSV log write failure
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// Symbol table or text log (de)serialization failure
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Id to symbol decoding failure
    #[error(transparent)]
    Symbol(#[from] SymbolError),

    /// Prediction logits could not be decoded
    #[error("cannot decode prediction: {0}")]
    Shape(#[from] MinMaxError),
}

/// Symbol lookup errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SymbolError {
    /// No symbol list for the language
    #[error("unknown language id: {0}")]
    UnknownLanguage(u32),

    /// Id outside the language's symbol list (after re-id)
    #[error("symbol id {id} out of range for language {lang_id} ({len} symbols)")]
    UnknownSymbol { lang_id: u32, id: i64, len: usize },
}

/// Result type alias for training logger operations.
pub type Result<T> = std::result::Result<T, Error>;
