//! Decoded artifact values.

use crate::textgrid::TextGrid;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

/// Numeric array with its element type preserved.
#[derive(Clone, Debug, PartialEq)]
pub enum NdArray {
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    U8(ArrayD<u8>),
    Bool(ArrayD<bool>),
}

impl NdArray {
    pub fn shape(&self) -> &[usize] {
        match self {
            NdArray::F32(a) => a.shape(),
            NdArray::F64(a) => a.shape(),
            NdArray::I32(a) => a.shape(),
            NdArray::I64(a) => a.shape(),
            NdArray::U8(a) => a.shape(),
            NdArray::Bool(a) => a.shape(),
        }
    }

    /// NumPy dtype name of the elements.
    pub fn dtype(&self) -> &'static str {
        match self {
            NdArray::F32(_) => "float32",
            NdArray::F64(_) => "float64",
            NdArray::I32(_) => "int32",
            NdArray::I64(_) => "int64",
            NdArray::U8(_) => "uint8",
            NdArray::Bool(_) => "bool",
        }
    }
}

macro_rules! impl_from_array {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<ArrayD<$ty>> for NdArray {
                fn from(array: ArrayD<$ty>) -> Self {
                    NdArray::$variant(array)
                }
            }
        )*
    };
}

impl_from_array!(
    f32 => F32,
    f64 => F64,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    bool => Bool,
);

/// Time span in seconds, as produced by forced alignment or unit segmentation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
}

impl Segment {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// One decoded artifact.
#[derive(Clone, Debug, PartialEq)]
pub enum Artifact {
    /// Numeric array (mel, pitch, durations, matrices)
    Array(NdArray),
    /// Segment list (forced-alignment or unit boundaries)
    Segments(Vec<Segment>),
    /// Raw text (transcripts, phoneme strings)
    Text(String),
    /// Mono waveform at the codec's sample rate
    Audio(Vec<f32>),
    /// Interval-tier annotation
    TextGrid(TextGrid),
}

impl Artifact {
    /// Variant name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Artifact::Array(_) => "array",
            Artifact::Segments(_) => "segments",
            Artifact::Text(_) => "text",
            Artifact::Audio(_) => "audio",
            Artifact::TextGrid(_) => "textgrid",
        }
    }

    pub fn as_array(&self) -> Option<&NdArray> {
        match self {
            Artifact::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_f32_array(&self) -> Option<&ArrayD<f32>> {
        match self {
            Artifact::Array(NdArray::F32(a)) => Some(a),
            _ => None,
        }
    }

    pub fn as_segments(&self) -> Option<&[Segment]> {
        match self {
            Artifact::Segments(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Artifact::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_audio(&self) -> Option<&[f32]> {
        match self {
            Artifact::Audio(samples) => Some(samples),
            _ => None,
        }
    }

    pub fn as_textgrid(&self) -> Option<&TextGrid> {
        match self {
            Artifact::TextGrid(tg) => Some(tg),
            _ => None,
        }
    }
}

impl<T> From<ArrayD<T>> for Artifact
where
    NdArray: From<ArrayD<T>>,
{
    fn from(array: ArrayD<T>) -> Self {
        Artifact::Array(array.into())
    }
}

impl From<String> for Artifact {
    fn from(text: String) -> Self {
        Artifact::Text(text)
    }
}

impl From<&str> for Artifact {
    fn from(text: &str) -> Self {
        Artifact::Text(text.to_string())
    }
}

impl From<Vec<Segment>> for Artifact {
    fn from(segments: Vec<Segment>) -> Self {
        Artifact::Segments(segments)
    }
}

impl From<TextGrid> for Artifact {
    fn from(textgrid: TextGrid) -> Self {
        Artifact::TextGrid(textgrid)
    }
}
