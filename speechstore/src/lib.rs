//! speechstore: file-backed feature store for speech datasets.
//!
//! A dataset root maps named features (waveforms, mel-spectrograms, pitch and
//! energy contours, durations, alignment matrices, SSL unit labels, text and
//! TextGrid annotations) to files under `root/<feature>/<speaker>/`.
//!
//! # Architecture
//!
//! - [`query::QueryParser`]: maps a [`query::QueryKey`] to one file (flat) or
//!   an ordered listing of slice files (nested)
//! - [`codec::Codec`]: reads and writes one artifact format (npy, bincode
//!   segments, text, wav, TextGrid)
//! - [`feature::Feature`]: a query parser plus a codec, with optional caching
//! - [`parser::DataParser`]: the named feature registry of a dataset root,
//!   with one [`parser::SslUnitParser`] per SSL unit
//!
//! # Quick Start
//!
//! ```no_run
//! use speechstore::parser::{DataParser, DatasetParser};
//! use speechstore::query::QueryKey;
//!
//! # fn main() -> speechstore::error::Result<()> {
//! let parser = DataParser::new("preprocessed/LJSpeech")?;
//! let key: QueryKey = "LJ/LJ001-0001".parse()?;
//!
//! let mel = parser.get_feature("mel")?.read(&key)?;
//! println!("{:?}", mel.as_array().map(|a| a.shape().to_vec()));
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod audio;
pub mod codec;
pub mod error;
pub mod feature;
pub mod manifest;
pub mod parser;
pub mod query;
pub mod textgrid;
