//! speechstore-log: training-loop logging for phoneme recognition.
//!
//! [`saver::Saver`] receives trainer hooks and writes:
//!
//! - fixed-width loss rows to the console
//! - per-sample CSV rows under `<log_dir>/csv/<stage>/` (or `<result_dir>`
//!   for stages other than training and validation)
//! - the aggregated `log.txt` table, flushed at the end of each validation
//!   epoch
//! - decoded ground-truth/prediction transcripts to an
//!   [`logger::ExperimentLogger`]

pub mod error;
pub mod format;
pub mod logger;
pub mod saver;
pub mod symbols;

pub use error::{Error, Result};
pub use format::{LogFormat, Losses};
pub use saver::{Saver, SaverConfig, StepOutput, TrainerState};
