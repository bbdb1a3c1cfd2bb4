//! File-backed feature collections.

use crate::artifact::Artifact;
use crate::codec::Codec;
use crate::error::{ErrorKind, QueryError, Result};
use crate::query::{QueryKey, QueryParser};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Named collection of per-item artifacts under one directory.
///
/// Reads go through an optional in-memory cache keyed by resolved path.
/// The cache lives in a `RefCell`, so a `Feature` is `!Sync`: callers sharing
/// one across threads must serialize access themselves.
#[derive(Debug)]
pub struct Feature {
    name: String,
    query_parser: QueryParser,
    codec: Box<dyn Codec>,
    cache: Option<RefCell<HashMap<PathBuf, Arc<Artifact>>>>,
}

impl Feature {
    /// Create a feature reading and writing through `codec`.
    pub fn new(
        name: impl Into<String>,
        query_parser: QueryParser,
        codec: impl Codec + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            query_parser,
            codec: Box::new(codec),
            cache: None,
        }
    }

    /// Memoize decoded artifacts for the lifetime of this feature.
    pub fn with_cache(mut self) -> Self {
        self.cache = Some(RefCell::default());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding this feature's artifacts.
    pub fn base(&self) -> &Path {
        self.query_parser.base()
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    pub fn query_parser(&self) -> &QueryParser {
        &self.query_parser
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// Number of memoized artifacts.
    pub fn cached_len(&self) -> usize {
        self.cache.as_ref().map_or(0, |c| c.borrow().len())
    }

    /// Path `key` is written to.
    pub fn path(&self, key: &QueryKey) -> Result<PathBuf> {
        self.query_parser.path(key, self.codec.extension())
    }

    /// Existing paths for `key`.
    pub fn resolve(&self, key: &QueryKey) -> Result<Vec<PathBuf>> {
        self.query_parser.resolve(key, self.codec.extension())
    }

    /// Read the first artifact `key` resolves to.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error when nothing matches `key`, or the codec's
    /// error when the file cannot be decoded.
    pub fn read(&self, key: &QueryKey) -> Result<Arc<Artifact>> {
        let path = self
            .resolve(key)?
            .into_iter()
            .next()
            .ok_or_else(|| QueryError::NotFound {
                key: key.to_string(),
                base: self.base().to_path_buf(),
            })?;

        self.read_path(&path)
    }

    /// Read every artifact `key` resolves to, in resolution order.
    pub fn read_all(&self, key: &QueryKey) -> Result<Vec<Arc<Artifact>>> {
        self.resolve(key)?
            .iter()
            .map(|path| self.read_path(path))
            .collect()
    }

    fn read_path(&self, path: &Path) -> Result<Arc<Artifact>> {
        let Some(cache) = &self.cache else {
            return Ok(Arc::new(self.codec.decode(path)?));
        };

        if let Some(artifact) = cache.borrow().get(path) {
            tracing::trace!(feature = %self.name, path = %path.display(), "cache hit");
            return Ok(Arc::clone(artifact));
        }

        let artifact = Arc::new(self.codec.decode(path)?);
        cache
            .borrow_mut()
            .insert(path.to_path_buf(), Arc::clone(&artifact));

        tracing::trace!(feature = %self.name, path = %path.display(), "cache miss");

        Ok(artifact)
    }

    /// Write `artifact` for `key`, replacing any cached value.
    pub fn write(&self, key: &QueryKey, artifact: Artifact) -> Result<()> {
        let path = self.path(key)?;

        if let Some(cache) = &self.cache {
            // A failed encode must not leave the old value cached
            cache.borrow_mut().remove(&path);
            self.codec.encode(&path, &artifact)?;
            cache.borrow_mut().insert(path, Arc::new(artifact));
        } else {
            self.codec.encode(&path, &artifact)?;
        }

        tracing::debug!(feature = %self.name, %key, "artifact written");

        Ok(())
    }

    /// Whether `key` resolves to at least one stored artifact.
    pub fn exists(&self, key: &QueryKey) -> Result<bool> {
        match self.resolve(key) {
            Ok(paths) => Ok(!paths.is_empty()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Forget cached artifacts for `key`.
    pub fn invalidate(&self, key: &QueryKey) -> Result<()> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };

        let path = self.path(key)?;
        let mut cache = cache.borrow_mut();
        cache.remove(&path);

        // Nested keys without an index also cover every slice file
        if key.index.is_none() && matches!(self.query_parser, QueryParser::Nested(_)) {
            let prefix = format!("{}-", key.basename);
            let dir = self.base().join(&key.speaker);
            cache.retain(|p, _| {
                !(p.parent() == Some(dir.as_path())
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(&prefix)))
            });
        }

        Ok(())
    }

    /// Forget every cached artifact.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.borrow_mut().clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{NpyCodec, TextCodec};
    use ndarray::{ArrayD, IxDyn};

    fn text_feature(root: &Path, cached: bool) -> Feature {
        let feature = Feature::new("text", QueryParser::flat(root.join("text")), TextCodec);
        if cached { feature.with_cache() } else { feature }
    }

    #[test]
    fn read_returns_written_value() {
        let dir = tempfile::tempdir().unwrap();
        let feature = text_feature(dir.path(), false);
        let key = QueryKey::new("spk1", "utt001");

        feature.write(&key, "hello world".into()).unwrap();

        assert_eq!(feature.read(&key).unwrap().as_text(), Some("hello world"));
        assert!(dir.path().join("text/spk1/utt001.txt").is_file());
    }

    #[test]
    fn cache_returns_same_allocation() {
        let dir = tempfile::tempdir().unwrap();
        let feature = text_feature(dir.path(), true);
        let key = QueryKey::new("spk1", "utt001");

        feature.write(&key, "a".into()).unwrap();

        let first = feature.read(&key).unwrap();
        let second = feature.read(&key).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(feature.cached_len(), 1);
    }

    #[test]
    fn write_replaces_cached_value() {
        let dir = tempfile::tempdir().unwrap();
        let feature = text_feature(dir.path(), true);
        let key = QueryKey::new("spk1", "utt001");

        feature.write(&key, "old".into()).unwrap();
        assert_eq!(feature.read(&key).unwrap().as_text(), Some("old"));

        feature.write(&key, "new".into()).unwrap();
        assert_eq!(feature.read(&key).unwrap().as_text(), Some("new"));
    }

    #[test]
    fn cache_does_not_change_results() {
        let dir = tempfile::tempdir().unwrap();
        let plain = text_feature(dir.path(), false);
        let cached = text_feature(dir.path(), true);
        let key = QueryKey::new("spk2", "utt");

        for value in ["one", "two", "three"] {
            cached.write(&key, value.into()).unwrap();
            assert_eq!(plain.read(&key).unwrap(), cached.read(&key).unwrap());
            assert_eq!(cached.read(&key).unwrap().as_text(), Some(value));
        }
    }

    #[test]
    fn missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let feature = text_feature(dir.path(), true);
        let key = QueryKey::new("spk1", "nope");

        assert!(!feature.exists(&key).unwrap());
        assert_eq!(feature.read(&key).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn corrupt_file_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let feature = text_feature(dir.path(), true);
        let key = QueryKey::new("spk1", "bad");

        let path = feature.path(&key).unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"\xff\xfe").unwrap();

        assert_eq!(feature.read(&key).unwrap_err().kind(), ErrorKind::CorruptData);
        assert_eq!(feature.cached_len(), 0);
    }

    #[test]
    fn nested_read_all_follows_slice_order() {
        let dir = tempfile::tempdir().unwrap();
        let feature = Feature::new(
            "alignment_matrix",
            QueryParser::nested(dir.path().join("alignment_matrix")),
            NpyCodec,
        )
        .with_cache();
        let key = QueryKey::new("spk1", "utt");

        for layer in [2usize, 0, 1] {
            let matrix = ArrayD::from_elem(IxDyn(&[2, 3]), layer as f32);
            feature
                .write(&key.clone().with_index(layer), matrix.into())
                .unwrap();
        }

        let layers: Vec<f32> = feature
            .read_all(&key)
            .unwrap()
            .iter()
            .map(|a| a.as_f32_array().unwrap()[IxDyn(&[0, 0])])
            .collect();
        assert_eq!(layers, [0.0, 1.0, 2.0]);

        // `read` takes the first slice
        let first = feature.read(&key).unwrap();
        assert_eq!(first.as_f32_array().unwrap()[IxDyn(&[1, 2])], 0.0);

        feature.invalidate(&key).unwrap();
        assert_eq!(feature.cached_len(), 0);
    }
}
