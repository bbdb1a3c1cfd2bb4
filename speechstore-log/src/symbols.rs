//! Per-language symbol tables and id decoding.

use crate::error::{Result, SymbolError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Language id to ordered symbol list.
///
/// Stored as a JSON object keyed by the decimal language id:
/// `{"0": ["<pad>", "a", "b"], "1": ["<pad>", "x"]}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolTable {
    languages: BTreeMap<u32, Vec<String>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a table from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Add or replace the symbols of `lang_id`.
    pub fn insert<S: Into<String>>(
        &mut self,
        lang_id: u32,
        symbols: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        self.languages
            .insert(lang_id, symbols.into_iter().map(Into::into).collect());
        self
    }

    pub fn symbols(&self, lang_id: u32) -> Option<&[String]> {
        self.languages.get(&lang_id).map(Vec::as_slice)
    }

    pub fn languages(&self) -> impl Iterator<Item = u32> + '_ {
        self.languages.keys().copied()
    }

    /// Offset of each language in a shared id space.
    ///
    /// Languages are laid out back to back in ascending id order, so the
    /// offset of a language is the total symbol count of all smaller ids.
    pub fn offsets(&self) -> BTreeMap<u32, i64> {
        let mut increment = 0i64;
        self.languages
            .iter()
            .map(|(&lang_id, symbols)| {
                let offset = increment;
                increment += symbols.len() as i64;
                (lang_id, offset)
            })
            .collect()
    }

    /// Symbol for `id` in `lang_id`.
    pub fn lookup(&self, lang_id: u32, id: i64) -> std::result::Result<&str, SymbolError> {
        let symbols = self
            .symbols(lang_id)
            .ok_or(SymbolError::UnknownLanguage(lang_id))?;

        usize::try_from(id)
            .ok()
            .and_then(|i| symbols.get(i))
            .map(String::as_str)
            .ok_or(SymbolError::UnknownSymbol {
                lang_id,
                id,
                len: symbols.len(),
            })
    }
}

/// Decode paired ground-truth and predicted ids into symbol sequences.
///
/// Decoding stops at the first ground-truth padding id (0). When `offsets`
/// is given, ids are shifted back from the shared id space by the language's
/// offset before lookup.
pub fn recover_sentences(
    table: &SymbolTable,
    gt_ids: &[i64],
    pred_ids: &[i64],
    lang_id: u32,
    offsets: Option<&BTreeMap<u32, i64>>,
) -> Result<(Vec<String>, Vec<String>)> {
    let shift = match offsets {
        Some(offsets) => *offsets
            .get(&lang_id)
            .ok_or(SymbolError::UnknownLanguage(lang_id))?,
        None => 0,
    };

    let mut gt_sentence = Vec::new();
    let mut pred_sentence = Vec::new();

    for (&gt_id, &pred_id) in gt_ids.iter().zip(pred_ids) {
        if gt_id == 0 {
            break;
        }
        gt_sentence.push(table.lookup(lang_id, gt_id - shift)?.to_string());
        pred_sentence.push(table.lookup(lang_id, pred_id - shift)?.to_string());
    }

    Ok((gt_sentence, pred_sentence))
}
