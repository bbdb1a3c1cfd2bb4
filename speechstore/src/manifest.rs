//! Dataset manifests: `data_info.json`, `speakers.json` and `stats.json`.

use crate::error::{ParserError, Result};
use crate::query::QueryKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DATA_INFO_FILE: &str = "data_info.json";
pub const SPEAKERS_FILE: &str = "speakers.json";
pub const STATS_FILE: &str = "stats.json";

/// One utterance entry of `data_info.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    #[serde(alias = "speaker")]
    pub spk: String,
    pub basename: String,
    /// Remaining per-utterance metadata (text, language id, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl QueryRecord {
    pub fn new(spk: impl Into<String>, basename: impl Into<String>) -> Self {
        Self {
            spk: spk.into(),
            basename: basename.into(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn key(&self) -> QueryKey {
        QueryKey::new(&self.spk, &self.basename)
    }
}

fn manifest_error(path: &Path, reason: impl ToString) -> ParserError {
    ParserError::Manifest {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Load a JSON manifest; a missing file is an error.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|e| manifest_error(path, e))?;
    let value = serde_json::from_str(&text).map_err(|e| manifest_error(path, e))?;
    Ok(value)
}

/// Write a JSON manifest with pretty formatting.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| manifest_error(path, e))?;
    std::fs::write(path, text)?;
    Ok(())
}
