//! Query keys and the parsers that map them to artifact paths.

use crate::error::{QueryError, Result};
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Separator between a basename and its sub-index in nested file names.
pub const INDEX_SEPARATOR: char = '-';

/// Logical identifier of one artifact: `speaker/basename[/index]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    pub speaker: String,
    pub basename: String,
    /// Sub-index for nested features (layer, slice)
    pub index: Option<String>,
}

impl QueryKey {
    pub fn new(speaker: impl Into<String>, basename: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            basename: basename.into(),
            index: None,
        }
    }

    /// Address one slice of a nested artifact.
    pub fn with_index(mut self, index: impl ToString) -> Self {
        self.index = Some(index.to_string());
        self
    }

    /// The same key without its sub-index.
    pub fn without_index(&self) -> Self {
        Self::new(self.speaker.clone(), self.basename.clone())
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.speaker, self.basename)?;
        if let Some(index) = &self.index {
            write!(f, "/{index}")?;
        }
        Ok(())
    }
}

impl FromStr for QueryKey {
    type Err = QueryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = |reason| QueryError::Invalid {
            key: s.to_string(),
            reason,
        };

        let parts: Vec<&str> = s.split('/').collect();

        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid("empty segment"));
        }

        match parts.as_slice() {
            [speaker, basename] => Ok(Self::new(*speaker, *basename)),
            [speaker, basename, index] => Ok(Self::new(*speaker, *basename).with_index(index)),
            _ => Err(invalid("expected speaker/basename or speaker/basename/index")),
        }
    }
}

/// Strategy mapping query keys to files under a feature's base directory.
#[derive(Clone, Debug)]
pub enum QueryParser {
    /// One key, one file: `base/<speaker>/<basename>.<ext>`
    Flat(FlatQueryParser),
    /// One key, a listing: `base/<speaker>/<basename>[-<index>].<ext>`
    Nested(NestedQueryParser),
}

impl QueryParser {
    pub fn flat(base: impl Into<PathBuf>) -> Self {
        QueryParser::Flat(FlatQueryParser { base: base.into() })
    }

    pub fn nested(base: impl Into<PathBuf>) -> Self {
        QueryParser::Nested(NestedQueryParser { base: base.into() })
    }

    pub fn base(&self) -> &Path {
        match self {
            QueryParser::Flat(p) => &p.base,
            QueryParser::Nested(p) => &p.base,
        }
    }

    /// Path an artifact for `key` is written to.
    pub fn path(&self, key: &QueryKey, ext: &str) -> Result<PathBuf> {
        match self {
            QueryParser::Flat(p) => p.path(key, ext),
            QueryParser::Nested(p) => Ok(p.path(key, ext)),
        }
    }

    /// Existing paths for `key`, in a deterministic order.
    pub fn resolve(&self, key: &QueryKey, ext: &str) -> Result<Vec<PathBuf>> {
        match self {
            QueryParser::Flat(p) => p.resolve(key, ext).map(|path| vec![path]),
            QueryParser::Nested(p) => p.resolve(key, ext),
        }
    }
}

/// Single-file query parser.
#[derive(Clone, Debug)]
pub struct FlatQueryParser {
    base: PathBuf,
}

impl FlatQueryParser {
    fn path(&self, key: &QueryKey, ext: &str) -> Result<PathBuf> {
        if key.index.is_some() {
            return Err(QueryError::Invalid {
                key: key.to_string(),
                reason: "flat features take no sub-index",
            }
            .into());
        }

        Ok(self
            .base
            .join(&key.speaker)
            .join(format!("{}.{ext}", key.basename)))
    }

    /// Resolve `key` to its file, failing when it does not exist.
    fn resolve(&self, key: &QueryKey, ext: &str) -> Result<PathBuf> {
        let path = self.path(key, ext)?;

        if !path.is_file() {
            return Err(QueryError::NotFound {
                key: key.to_string(),
                base: self.base.clone(),
            }
            .into());
        }

        Ok(path)
    }
}

/// Multi-file query parser for per-layer or per-slice artifacts.
#[derive(Clone, Debug)]
pub struct NestedQueryParser {
    base: PathBuf,
}

impl NestedQueryParser {
    fn path(&self, key: &QueryKey, ext: &str) -> PathBuf {
        let file_name = match &key.index {
            Some(index) => format!("{}{INDEX_SEPARATOR}{index}.{ext}", key.basename),
            None => format!("{}.{ext}", key.basename),
        };

        self.base.join(&key.speaker).join(file_name)
    }

    /// List matching files; an empty result is not an error.
    fn resolve(&self, key: &QueryKey, ext: &str) -> Result<Vec<PathBuf>> {
        if key.index.is_some() {
            let path = self.path(key, ext);
            return Ok(if path.is_file() { vec![path] } else { vec![] });
        }

        let dir = self.base.join(&key.speaker);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut matches = Vec::new();

        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };

            if let Some(order) = slice_order(file_name, &key.basename, ext) {
                matches.push((order, entry.path()));
            }
        }

        matches.sort_by(|(a, _), (b, _)| a.cmp(b));

        tracing::trace!(key = %key, count = matches.len(), "resolved nested query");

        Ok(matches.into_iter().map(|(_, path)| path).collect())
    }
}

/// Position of a nested file within its listing.
#[derive(Debug, PartialEq, Eq)]
enum SliceOrder {
    Bare,
    Numeric(u64, String),
    Named(String),
}

impl SliceOrder {
    fn rank(&self) -> u8 {
        match self {
            SliceOrder::Bare => 0,
            SliceOrder::Numeric(..) => 1,
            SliceOrder::Named(_) => 2,
        }
    }
}

impl Ord for SliceOrder {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SliceOrder::Numeric(a, sa), SliceOrder::Numeric(b, sb)) => a.cmp(b).then(sa.cmp(sb)),
            (SliceOrder::Named(a), SliceOrder::Named(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for SliceOrder {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Match `file_name` against `<basename>[-<index>].<ext>`.
fn slice_order(file_name: &str, basename: &str, ext: &str) -> Option<SliceOrder> {
    let stem = file_name.strip_suffix(ext)?.strip_suffix('.')?;
    let rest = stem.strip_prefix(basename)?;

    if rest.is_empty() {
        return Some(SliceOrder::Bare);
    }

    let index = rest.strip_prefix(INDEX_SEPARATOR)?;
    if index.is_empty() {
        return None;
    }

    Some(match index.parse::<u64>() {
        Ok(n) => SliceOrder::Numeric(n, index.to_string()),
        Err(_) => SliceOrder::Named(index.to_string()),
    })
}
