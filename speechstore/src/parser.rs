//! Dataset parsers: named feature registries rooted at a directory.

use crate::audio::{SAMPLE_RATE_16K, SAMPLE_RATE_22K};
use crate::codec::{NpyCodec, ObjectCodec, TextCodec, TextGridCodec, WavCodec};
use crate::error::{ParserError, Result};
use crate::feature::Feature;
use crate::manifest::{self, DATA_INFO_FILE, QueryRecord, SPEAKERS_FILE, STATS_FILE};
use crate::query::QueryParser;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Directory under the dataset root holding one sub-namespace per SSL unit.
pub const SSL_UNITS_DIR: &str = "ssl_units";

/// A root directory exposing named features.
pub trait DatasetParser {
    /// Root directory of this parser.
    fn root(&self) -> &Path;

    /// Create the directories this parser requires.
    fn init_structure(&self) -> Result<()>;

    /// Look up a feature by name or slash-delimited path.
    fn get_feature(&self, query: &str) -> Result<&Feature>;
}

/// Feature registry enforcing unique names and directories.
#[derive(Debug, Default)]
pub struct FeatureSet {
    features: BTreeMap<String, Feature>,
}

impl FeatureSet {
    /// Register `feature`.
    ///
    /// # Errors
    ///
    /// Returns a `Duplicate` error when the name or directory is taken.
    pub fn insert(&mut self, feature: Feature) -> Result<()> {
        if self.features.contains_key(feature.name()) {
            return Err(ParserError::Duplicate {
                what: "feature name",
                name: feature.name().to_string(),
            }
            .into());
        }

        if let Some(other) = self.features.values().find(|f| f.base() == feature.base()) {
            return Err(ParserError::Duplicate {
                what: "feature directory",
                name: format!("{} (claimed by {})", feature.base().display(), other.name()),
            }
            .into());
        }

        self.features.insert(feature.name().to_string(), feature);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Feature> {
        self.features
            .get(name)
            .ok_or_else(|| ParserError::UnknownFeature(name.to_string()).into())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.values()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Declarative feature entry: name, directory, nesting, codec and caching.
struct Entry<C> {
    name: &'static str,
    dir: &'static str,
    nested: bool,
    codec: C,
    cache: bool,
}

impl<C: crate::codec::Codec + 'static> Entry<C> {
    fn flat(name: &'static str, codec: C) -> Self {
        Self {
            name,
            dir: name,
            nested: false,
            codec,
            cache: false,
        }
    }

    fn nested(name: &'static str, dir: &'static str, codec: C) -> Self {
        Self {
            name,
            dir,
            nested: true,
            codec,
            cache: false,
        }
    }

    fn cached(mut self) -> Self {
        self.cache = true;
        self
    }

    fn register(self, root: &Path, set: &mut FeatureSet) -> Result<()> {
        let base = root.join(self.dir);
        let query_parser = if self.nested {
            QueryParser::nested(base)
        } else {
            QueryParser::flat(base)
        };

        let feature = Feature::new(self.name, query_parser, self.codec);
        set.insert(if self.cache {
            feature.with_cache()
        } else {
            feature
        })
    }
}

/// Features of one SSL unit: `root/ssl_units/<unit>/`.
#[derive(Debug)]
pub struct SslUnitParser {
    root: PathBuf,
    features: FeatureSet,
}

impl SslUnitParser {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let mut features = FeatureSet::default();

        Entry::flat("dp_segment", ObjectCodec)
            .cached()
            .register(&root, &mut features)?;
        Entry::flat("phoneme", TextCodec)
            .cached()
            .register(&root, &mut features)?;

        for name in [
            "dp_duration",
            "dp_duration_avg_pitch",
            "dp_duration_avg_energy",
        ] {
            Entry::flat(name, NpyCodec)
                .cached()
                .register(&root, &mut features)?;
        }

        Entry::nested("alignment_matrix", "alignment_matrix", NpyCodec)
            .cached()
            .register(&root, &mut features)?;
        Entry::nested("lp_matrix", "label_propagation", NpyCodec)
            .cached()
            .register(&root, &mut features)?;

        let parser = Self { root, features };
        parser.init_structure()?;
        Ok(parser)
    }

    /// Unit name, taken from the root directory name.
    pub fn name(&self) -> Option<&str> {
        self.root.file_name().and_then(|n| n.to_str())
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }
}

impl DatasetParser for SslUnitParser {
    fn root(&self) -> &Path {
        &self.root
    }

    fn init_structure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    fn get_feature(&self, query: &str) -> Result<&Feature> {
        self.features.get(query)
    }
}

/// Top-level dataset parser.
///
/// SSL units are discovered by scanning `root/ssl_units/` once at
/// construction. Units created afterwards by other processes are only seen
/// after [`DataParser::rescan_ssl_units`].
#[derive(Debug)]
pub struct DataParser {
    root: PathBuf,
    features: FeatureSet,
    ssl_units: BTreeMap<String, SslUnitParser>,
}

impl DataParser {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let mut features = FeatureSet::default();

        Entry::flat("wav_16000", WavCodec::new(SAMPLE_RATE_16K)).register(&root, &mut features)?;
        Entry::flat("wav_22050", WavCodec::new(SAMPLE_RATE_22K)).register(&root, &mut features)?;

        for name in ["mel", "wav_trim_22050", "wav_trim_16000", "spk_ref_mel_slices"] {
            Entry::flat(name, NpyCodec).register(&root, &mut features)?;
        }

        for name in [
            "pitch",
            "interpolate_pitch",
            "energy",
            "mfa_duration_avg_pitch",
            "mfa_duration_avg_energy",
            "mfa_duration",
        ] {
            Entry::flat(name, NpyCodec)
                .cached()
                .register(&root, &mut features)?;
        }

        Entry::flat("mfa_segment", ObjectCodec)
            .cached()
            .register(&root, &mut features)?;
        Entry::nested("TextGrid", "TextGrid", TextGridCodec).register(&root, &mut features)?;

        for name in ["phoneme", "text"] {
            Entry::flat(name, TextCodec)
                .cached()
                .register(&root, &mut features)?;
        }

        let mut parser = Self {
            root,
            features,
            ssl_units: BTreeMap::new(),
        };

        parser.init_structure()?;
        parser.rescan_ssl_units()?;

        Ok(parser)
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.features.names()
    }

    pub fn ssl_unit(&self, name: &str) -> Result<&SslUnitParser> {
        self.ssl_units
            .get(name)
            .ok_or_else(|| ParserError::UnknownUnit(name.to_string()).into())
    }

    pub fn ssl_unit_names(&self) -> impl Iterator<Item = &str> {
        self.ssl_units.keys().map(String::as_str)
    }

    fn ssl_units_dir(&self) -> PathBuf {
        self.root.join(SSL_UNITS_DIR)
    }

    /// Register every unit directory under `ssl_units/` not yet known.
    ///
    /// Already registered units are kept even if their directory vanished.
    /// Returns the number of newly registered units.
    pub fn rescan_ssl_units(&mut self) -> Result<usize> {
        let mut names = Vec::new();

        for entry in std::fs::read_dir(self.ssl_units_dir())? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }

        names.sort();

        let mut added = 0;
        for name in names {
            if self.create_ssl_unit_feature(&name)? {
                added += 1;
            }
        }

        Ok(added)
    }

    /// Register the SSL unit `unit_name`; a no-op if it already exists.
    ///
    /// Returns whether a new unit was registered.
    pub fn create_ssl_unit_feature(&mut self, unit_name: &str) -> Result<bool> {
        if self.ssl_units.contains_key(unit_name) {
            return Ok(false);
        }

        // Exactly one plain path component directly under ssl_units/
        let mut components = Path::new(unit_name).components();
        let plain = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !plain || unit_name.contains(['/', '\\']) {
            return Err(ParserError::Unsupported(format!("{SSL_UNITS_DIR}/{unit_name}")).into());
        }

        let unit = SslUnitParser::new(self.ssl_units_dir().join(unit_name))?;
        self.ssl_units.insert(unit_name.to_string(), unit);

        tracing::info!(unit = unit_name, "registered ssl unit");

        Ok(true)
    }

    /// Load every (speaker, basename) record from `data_info.json`.
    pub fn get_all_queries(&self) -> Result<Vec<QueryRecord>> {
        manifest::load_json(&self.root.join(DATA_INFO_FILE))
    }

    /// Load every speaker id from `speakers.json`.
    pub fn get_all_speakers(&self) -> Result<Vec<String>> {
        manifest::load_json(&self.root.join(SPEAKERS_FILE))
    }

    /// Load dataset statistics from `stats.json`.
    pub fn get_stats(&self) -> Result<serde_json::Value> {
        manifest::load_json(&self.root.join(STATS_FILE))
    }

    pub fn write_queries(&self, records: &[QueryRecord]) -> Result<()> {
        manifest::write_json(&self.root.join(DATA_INFO_FILE), records)
    }

    pub fn write_speakers(&self, speakers: &[String]) -> Result<()> {
        manifest::write_json(&self.root.join(SPEAKERS_FILE), speakers)
    }
}

impl DatasetParser for DataParser {
    fn root(&self) -> &Path {
        &self.root
    }

    fn init_structure(&self) -> Result<()> {
        for dir in ["wav_16000", "wav_22050", "text", SSL_UNITS_DIR] {
            let path = self.root.join(dir);
            if !path.is_dir() {
                std::fs::create_dir_all(&path)?;
                tracing::debug!(path = %path.display(), "created directory");
            }
        }
        Ok(())
    }

    fn get_feature(&self, query: &str) -> Result<&Feature> {
        let Some((prefix, subquery)) = query.split_once('/') else {
            return self.features.get(query);
        };

        if prefix != SSL_UNITS_DIR {
            return Err(ParserError::Unsupported(query.to_string()).into());
        }

        let Some((unit_name, subquery)) = subquery.split_once('/') else {
            return Err(ParserError::Unsupported(query.to_string()).into());
        };

        self.ssl_unit(unit_name)?.get_feature(subquery)
    }
}
