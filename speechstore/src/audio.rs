//! WAV loading and writing utilities.

use crate::error::CodecError;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

/// Sample rate of the 16kHz waveform features.
pub const SAMPLE_RATE_16K: u32 = 16000;

/// Sample rate of the 22.05kHz waveform features.
pub const SAMPLE_RATE_22K: u32 = 22050;

fn hound_error(path: &Path, e: hound::Error) -> CodecError {
    match e {
        hound::Error::IoError(source) => CodecError::io(path, source),
        other => CodecError::corrupt(path, other),
    }
}

/// Load audio from a WAV file.
///
/// Returns interleaved samples normalized to [-1, 1] and the WAV specification.
///
/// # Errors
///
/// Returns error if file cannot be read or has unsupported format.
pub fn load_audio(path: &Path) -> Result<(Vec<f32>, WavSpec), CodecError> {
    let mut reader = WavReader::open(path).map_err(|e| hound_error(path, e))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<hound::Result<_>>(),
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / scale))
                .collect::<hound::Result<_>>()
        }
    }
    .map_err(|e| hound_error(path, e))?;

    Ok((samples, spec))
}

/// Load audio from a WAV file as mono f32 samples at `sample_rate`.
///
/// Multi-channel audio is averaged down to mono. No resampling is done.
///
/// # Errors
///
/// Returns error if:
/// - File cannot be read
/// - Sample rate differs from `sample_rate`
/// - Channel count is 0
pub fn read_audio_mono(path: &Path, sample_rate: u32) -> Result<Vec<f32>, CodecError> {
    let (audio, spec) = load_audio(path)?;

    if spec.sample_rate != sample_rate {
        return Err(CodecError::SampleRateMismatch {
            path: path.to_path_buf(),
            expected: sample_rate,
            got: spec.sample_rate,
        });
    }

    let channels = spec.channels as usize;

    match channels {
        0 => Err(CodecError::corrupt(path, "wav header declares 0 channels")),
        1 => Ok(audio),
        _ => Ok(audio
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()),
    }
}

/// Write mono f32 samples as a 32-bit float WAV file.
pub fn write_audio_mono(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), CodecError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec).map_err(|e| hound_error(path, e))?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| hound_error(path, e))?;
    }
    writer.finalize().map_err(|e| hound_error(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_wav(
        path: &Path,
        sample_rate: u32,
        channels: u16,
        samples: &[f32],
    ) -> hound::Result<()> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec)?;
        for &sample in samples {
            writer.write_sample((sample * 32768.0) as i16)?;
        }
        writer.finalize()?;
        Ok(())
    }

    #[test]
    fn reads_mono_16khz() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("test_mono.wav");

        let test_samples = vec![0.1, 0.2, 0.3];
        create_test_wav(&path, 16000, 1, &test_samples).unwrap();

        let result = read_audio_mono(&path, SAMPLE_RATE_16K).unwrap();

        for (expected, actual) in test_samples.iter().zip(result.iter()) {
            assert!((expected - actual).abs() < 0.01);
        }
    }

    #[test]
    fn converts_stereo_to_mono() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("test_stereo.wav");

        let test_samples = vec![0.2, 0.4, 0.6, 0.8];
        create_test_wav(&path, 16000, 2, &test_samples).unwrap();

        let result = read_audio_mono(&path, SAMPLE_RATE_16K).unwrap();

        assert_eq!(result.len(), 2);
        assert!((result[0] - 0.3).abs() < 0.01);
        assert!((result[1] - 0.7).abs() < 0.01);
    }

    #[test]
    fn rejects_wrong_sample_rate() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("test_44khz.wav");

        create_test_wav(&path, 44100, 1, &[0.0, 0.1]).unwrap();

        let result = read_audio_mono(&path, SAMPLE_RATE_22K);

        assert!(matches!(
            result,
            Err(CodecError::SampleRateMismatch {
                expected: 22050,
                got: 44100,
                ..
            })
        ));
    }

    #[test]
    fn float_wav_is_lossless() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("float.wav");

        let samples = vec![0.0, -0.123_456_79, 0.5, 1.0, -1.0];
        write_audio_mono(&path, &samples, SAMPLE_RATE_22K).unwrap();

        assert_eq!(read_audio_mono(&path, SAMPLE_RATE_22K).unwrap(), samples);
    }

    #[test]
    fn rejects_non_wav_bytes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("garbage.wav");
        std::fs::write(&path, b"definitely not RIFF").unwrap();

        let result = read_audio_mono(&path, SAMPLE_RATE_16K);
        assert!(matches!(result, Err(CodecError::Corrupt { .. })));
    }
}
