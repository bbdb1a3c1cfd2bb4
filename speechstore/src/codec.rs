//! Codecs that read and write one artifact file each.

use crate::artifact::{Artifact, NdArray, Segment};
use crate::audio::{read_audio_mono, write_audio_mono};
use crate::error::{CodecError, Result};
use crate::textgrid::TextGrid;
use bincode::Options;
use ndarray::ArrayD;
use ndarray_npy::{ReadNpyError, ReadNpyExt, ReadableElement, WriteNpyExt};
use std::fmt::Debug;
use std::fs;
use std::path::Path;

/// On-disk format of one artifact type.
pub trait Codec: Debug {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// File extension without the leading dot.
    fn extension(&self) -> &str;

    /// Read and decode the artifact stored at `path`.
    fn decode(&self, path: &Path) -> Result<Artifact>;

    /// Encode `artifact` into `path`, creating parent directories.
    fn encode(&self, path: &Path, artifact: &Artifact) -> Result<()>;
}

fn read_bytes(path: &Path) -> std::result::Result<Vec<u8>, CodecError> {
    fs::read(path).map_err(|e| CodecError::io(path, e))
}

fn create_parent(path: &Path) -> std::result::Result<(), CodecError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| CodecError::io(parent, e))
        }
        _ => Ok(()),
    }
}

fn mismatch(codec: &'static str, artifact: &Artifact) -> CodecError {
    CodecError::ArtifactMismatch {
        codec,
        found: artifact.kind(),
    }
}

/// NumPy `.npy` arrays with shape and dtype preserved.
#[derive(Clone, Copy, Debug, Default)]
pub struct NpyCodec;

/// Try decoding as element type `T`; `None` when the stored dtype differs.
fn read_npy_as<T: ReadableElement>(
    bytes: &[u8],
) -> std::result::Result<Option<ArrayD<T>>, ReadNpyError> {
    match ArrayD::<T>::read_npy(bytes) {
        Ok(array) => Ok(Some(array)),
        Err(ReadNpyError::WrongDescriptor(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn decode_npy(bytes: &[u8]) -> std::result::Result<Option<NdArray>, ReadNpyError> {
    if let Some(a) = read_npy_as::<f32>(bytes)? {
        return Ok(Some(a.into()));
    }
    if let Some(a) = read_npy_as::<f64>(bytes)? {
        return Ok(Some(a.into()));
    }
    if let Some(a) = read_npy_as::<i64>(bytes)? {
        return Ok(Some(a.into()));
    }
    if let Some(a) = read_npy_as::<i32>(bytes)? {
        return Ok(Some(a.into()));
    }
    if let Some(a) = read_npy_as::<u8>(bytes)? {
        return Ok(Some(a.into()));
    }
    if let Some(a) = read_npy_as::<bool>(bytes)? {
        return Ok(Some(a.into()));
    }
    Ok(None)
}

fn write_npy<A: WriteNpyExt>(path: &Path, array: &A) -> std::result::Result<(), CodecError> {
    let mut bytes = Vec::new();
    array
        .write_npy(&mut bytes)
        .map_err(|e| CodecError::io(path, std::io::Error::other(e)))?;
    fs::write(path, bytes).map_err(|e| CodecError::io(path, e))
}

impl Codec for NpyCodec {
    fn name(&self) -> &'static str {
        "npy"
    }

    fn extension(&self) -> &str {
        "npy"
    }

    fn decode(&self, path: &Path) -> Result<Artifact> {
        let bytes = read_bytes(path)?;

        match decode_npy(&bytes) {
            Ok(Some(array)) => Ok(Artifact::Array(array)),
            Ok(None) => Err(CodecError::corrupt(path, "unsupported npy dtype").into()),
            Err(e) => Err(CodecError::corrupt(path, e).into()),
        }
    }

    fn encode(&self, path: &Path, artifact: &Artifact) -> Result<()> {
        let Artifact::Array(array) = artifact else {
            return Err(mismatch(self.name(), artifact).into());
        };

        create_parent(path)?;

        match array {
            NdArray::F32(a) => write_npy(path, a),
            NdArray::F64(a) => write_npy(path, a),
            NdArray::I32(a) => write_npy(path, a),
            NdArray::I64(a) => write_npy(path, a),
            NdArray::U8(a) => write_npy(path, a),
            NdArray::Bool(a) => write_npy(path, a),
        }?;

        Ok(())
    }
}

/// Bincode-serialized segment lists.
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjectCodec;

impl Codec for ObjectCodec {
    fn name(&self) -> &'static str {
        "object"
    }

    fn extension(&self) -> &str {
        "bin"
    }

    fn decode(&self, path: &Path) -> Result<Artifact> {
        let bytes = read_bytes(path)?;

        let segments: Vec<Segment> = bincode::DefaultOptions::new()
            .deserialize(&bytes)
            .map_err(|e| CodecError::corrupt(path, e))?;

        Ok(Artifact::Segments(segments))
    }

    fn encode(&self, path: &Path, artifact: &Artifact) -> Result<()> {
        let Artifact::Segments(segments) = artifact else {
            return Err(mismatch(self.name(), artifact).into());
        };

        let bytes = bincode::DefaultOptions::new()
            .serialize(segments)
            .map_err(|e| CodecError::io(path, std::io::Error::other(e)))?;

        create_parent(path)?;
        fs::write(path, bytes).map_err(|e| CodecError::io(path, e))?;
        Ok(())
    }
}

/// Whole-file UTF-8 text.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextCodec;

impl Codec for TextCodec {
    fn name(&self) -> &'static str {
        "text"
    }

    fn extension(&self) -> &str {
        "txt"
    }

    fn decode(&self, path: &Path) -> Result<Artifact> {
        let bytes = read_bytes(path)?;
        let text = String::from_utf8(bytes).map_err(|e| CodecError::corrupt(path, e))?;
        Ok(Artifact::Text(text))
    }

    fn encode(&self, path: &Path, artifact: &Artifact) -> Result<()> {
        let Artifact::Text(text) = artifact else {
            return Err(mismatch(self.name(), artifact).into());
        };

        create_parent(path)?;
        fs::write(path, text).map_err(|e| CodecError::io(path, e))?;
        Ok(())
    }
}

/// Mono WAV audio at a fixed sample rate.
#[derive(Clone, Copy, Debug)]
pub struct WavCodec {
    pub sample_rate: u32,
}

impl WavCodec {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl Codec for WavCodec {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn extension(&self) -> &str {
        "wav"
    }

    fn decode(&self, path: &Path) -> Result<Artifact> {
        Ok(Artifact::Audio(read_audio_mono(path, self.sample_rate)?))
    }

    fn encode(&self, path: &Path, artifact: &Artifact) -> Result<()> {
        let Artifact::Audio(samples) = artifact else {
            return Err(mismatch(self.name(), artifact).into());
        };

        create_parent(path)?;
        write_audio_mono(path, samples, self.sample_rate)?;
        Ok(())
    }
}

/// Praat TextGrid annotations.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextGridCodec;

impl Codec for TextGridCodec {
    fn name(&self) -> &'static str {
        "textgrid"
    }

    fn extension(&self) -> &str {
        "TextGrid"
    }

    fn decode(&self, path: &Path) -> Result<Artifact> {
        let bytes = read_bytes(path)?;
        let textgrid = TextGrid::from_bytes(&bytes).map_err(|e| CodecError::corrupt(path, e))?;
        Ok(Artifact::TextGrid(textgrid))
    }

    fn encode(&self, path: &Path, artifact: &Artifact) -> Result<()> {
        let Artifact::TextGrid(textgrid) = artifact else {
            return Err(mismatch(self.name(), artifact).into());
        };
        if !textgrid.has_finite_times() {
            return Err(CodecError::corrupt(path, "non-finite time in textgrid").into());
        }

        create_parent(path)?;
        fs::write(path, textgrid.to_long_format()).map_err(|e| CodecError::io(path, e))?;
        Ok(())
    }
}
