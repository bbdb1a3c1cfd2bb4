//! Experiment trackers receiving decoded transcripts.

use crate::error::Result;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Sink for free-form text attached to a training step.
pub trait ExperimentLogger {
    fn log_text(&mut self, text: &str, step: u64) -> Result<()>;
}

/// Discards all text.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLogger;

impl ExperimentLogger for NoopLogger {
    fn log_text(&mut self, _text: &str, _step: u64) -> Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct TextRecord<'a> {
    step: u64,
    text: &'a str,
}

/// Appends `{"step": .., "text": ..}` JSON lines to a file.
#[derive(Debug)]
pub struct TextFileLogger {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl TextFileLogger {
    /// Open `path` for appending, creating parent directories.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ExperimentLogger for TextFileLogger {
    fn log_text(&mut self, text: &str, step: u64) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &TextRecord { step, text })?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
