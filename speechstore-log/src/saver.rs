//! Training-loop callback writing loss tables and decoded transcripts.

use crate::error::Result;
use crate::format::{
    LogFormat, LossRow, Losses, STAGE_COLUMN, STEP_COLUMN, TRAINING, VALIDATION,
};
use crate::logger::{ExperimentLogger, NoopLogger};
use crate::symbols::{SymbolTable, recover_sentences};
use ndarray::Array2;
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Aggregated per-stage log file under the log directory.
pub const LOG_FILE: &str = "log.txt";

/// Trainer progress at the time of a hook call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrainerState {
    pub global_step: u64,
    pub log_every_n_steps: u64,
    pub local_rank: usize,
}

impl TrainerState {
    /// Step number written to logs (`global_step + 1`).
    pub fn step(&self) -> u64 {
        self.global_step + 1
    }

    pub fn is_rank_zero(&self) -> bool {
        self.local_rank == 0
    }

    fn is_log_step(&self) -> bool {
        self.log_every_n_steps > 0 && self.step() % self.log_every_n_steps == 0
    }
}

/// What a training or validation step hands to the saver.
#[derive(Clone, Debug)]
pub struct StepOutput {
    pub losses: Losses,
    /// Frame logits `[T, C]` of the first batch item
    pub prediction: Array2<f32>,
    /// Ground-truth symbol ids of the first batch item, 0-padded
    pub labels: Vec<i64>,
    pub lang_id: u32,
}

/// Saver configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaverConfig {
    pub log_dir: PathBuf,
    pub result_dir: PathBuf,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub symbols: SymbolTable,
    /// Ids live in a space shared by all languages
    #[serde(default)]
    pub re_id: bool,
}

impl SaverConfig {
    pub fn new(log_dir: impl Into<PathBuf>, result_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            result_dir: result_dir.into(),
            format: LogFormat::default(),
            symbols: SymbolTable::default(),
            re_id: false,
        }
    }
}

/// Writes loss rows to the console and CSV files, and decoded
/// ground-truth/prediction pairs to an experiment logger.
pub struct Saver {
    log_dir: PathBuf,
    result_dir: PathBuf,
    format: LogFormat,
    symbols: SymbolTable,
    offsets: Option<BTreeMap<u32, i64>>,
    val_rows: Vec<Vec<Option<f32>>>,
    pending: Vec<LossRow>,
    logger: Box<dyn ExperimentLogger>,
    console: Box<dyn Write>,
}

impl Saver {
    /// Create the log and result directories.
    pub fn new(config: SaverConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.log_dir)?;
        std::fs::create_dir_all(&config.result_dir)?;

        tracing::info!(path = %config.log_dir.display(), "log directory");
        tracing::info!(path = %config.result_dir.display(), "result directory");

        let offsets = config.re_id.then(|| config.symbols.offsets());

        Ok(Self {
            log_dir: config.log_dir,
            result_dir: config.result_dir,
            format: config.format,
            symbols: config.symbols,
            offsets,
            val_rows: Vec::new(),
            pending: Vec::new(),
            logger: Box::new(NoopLogger),
            console: Box::new(std::io::stdout()),
        })
    }

    pub fn with_logger(mut self, logger: impl ExperimentLogger + 'static) -> Self {
        self.logger = Box::new(logger);
        self
    }

    /// Redirect console rows (stdout by default).
    pub fn with_console(mut self, console: impl Write + 'static) -> Self {
        self.console = Box::new(console);
        self
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn result_dir(&self) -> &Path {
        &self.result_dir
    }

    pub fn format(&self) -> &LogFormat {
        &self.format
    }

    /// Rows printed since the last flush to `log.txt`.
    pub fn pending_rows(&self) -> &[LossRow] {
        &self.pending
    }

    pub fn on_train_batch_end(&mut self, state: &TrainerState, output: &StepOutput) -> Result<()> {
        if !state.is_log_step() || !state.is_rank_zero() {
            return Ok(());
        }

        let step = state.step();
        let row = self.format.row(step, TRAINING, &output.losses);
        self.print_row(&row)?;
        self.pending.push(row);

        self.log_transcripts("Train", step, output)
    }

    pub fn on_validation_epoch_start(&mut self) {
        self.val_rows.clear();
    }

    pub fn on_validation_batch_end(
        &mut self,
        state: &TrainerState,
        output: &StepOutput,
        batch_idx: usize,
    ) -> Result<()> {
        let step = state.step();

        self.val_rows.push(self.format.project(&output.losses));
        self.log_csv(VALIDATION, step, "0", &output.losses)?;

        if batch_idx == 0 && state.is_rank_zero() {
            self.log_transcripts("Val", step, output)?;
        }

        Ok(())
    }

    /// Print the mean validation row and flush pending rows to `log.txt`.
    pub fn on_validation_epoch_end(&mut self, state: &TrainerState) -> Result<()> {
        let values = self
            .format
            .merge_mean(self.val_rows.iter().map(Vec::as_slice));
        let row = LossRow {
            step: state.step(),
            stage: VALIDATION.to_string(),
            values,
        };

        self.print_row(&row)?;
        self.pending.push(row);

        let header: Vec<&str> = [STEP_COLUMN, STAGE_COLUMN]
            .into_iter()
            .chain(self.format.columns().iter().map(String::as_str))
            .collect();
        let records = self.pending.iter().map(|row| {
            [row.step.to_string(), row.stage.clone()]
                .into_iter()
                .chain(row.values.iter().map(|&v| cell(v)))
                .collect::<Vec<_>>()
        });
        append_csv(&self.log_dir.join(LOG_FILE), &header, records)?;

        self.pending.clear();
        Ok(())
    }

    /// Append one loss row for `basename` at `step`.
    ///
    /// Training and validation rows go under the log directory, rows of any
    /// other stage under the result directory: `<dir>/csv/<stage>/<basename>.csv`.
    pub fn log_csv(
        &self,
        stage: &str,
        step: u64,
        basename: &str,
        losses: &Losses,
    ) -> Result<PathBuf> {
        let root = if stage == TRAINING || stage == VALIDATION {
            &self.log_dir
        } else {
            &self.result_dir
        };
        let dir = root.join("csv").join(stage);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{basename}.csv"));

        let header: Vec<&str> = std::iter::once(STEP_COLUMN)
            .chain(self.format.columns().iter().map(String::as_str))
            .collect();
        let record: Vec<String> = std::iter::once(step.to_string())
            .chain(self.format.project(losses).into_iter().map(cell))
            .collect();
        append_csv(&path, &header, std::iter::once(record))?;

        Ok(path)
    }

    fn print_row(&mut self, row: &LossRow) -> Result<()> {
        if self.pending.is_empty() {
            writeln!(self.console, "{}", self.format.header())?;
        }
        writeln!(self.console, "{}", self.format.line(row))?;
        Ok(())
    }

    fn log_transcripts(&mut self, prefix: &str, step: u64, output: &StepOutput) -> Result<()> {
        let pred_ids = match decode_prediction(&output.prediction) {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = %e, step, "failed to decode prediction");
                return Ok(());
            }
        };

        let (gt, pred) = recover_sentences(
            &self.symbols,
            &output.labels,
            &pred_ids,
            output.lang_id,
            self.offsets.as_ref(),
        )?;

        self.log_text(&format!("{prefix}/GT: {}", gt.join(", ")), step);
        self.log_text(&format!("{prefix}/Pred: {}", pred.join(", ")), step);
        Ok(())
    }

    fn log_text(&mut self, text: &str, step: u64) {
        if let Err(e) = self.logger.log_text(text, step) {
            tracing::warn!(error = %e, step, "failed to log text");
        }
    }
}

/// Greedy per-frame symbol ids; fails on frames with NaN logits.
fn decode_prediction(prediction: &Array2<f32>) -> Result<Vec<i64>> {
    let ids = prediction
        .rows()
        .into_iter()
        .map(|frame| frame.argmax().map(|i| i as i64))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn cell(value: Option<f32>) -> String {
    value.map(|v| format!("{v:?}")).unwrap_or_default()
}

/// Append records to a CSV file, writing `header` first if the file is new.
fn append_csv<I, R>(path: &Path, header: &[&str], records: I) -> Result<()>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let is_new = !path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if is_new {
        writer.write_record(header)?;
    }
    for record in records {
        writer.write_record(record)?;
    }
    writer.flush()?;

    tracing::debug!(path = %path.display(), is_new, "appended csv rows");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use ndarray::array;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Console(Rc<RefCell<Vec<u8>>>);

    impl Write for Console {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Console {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.borrow().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    #[derive(Clone, Default)]
    struct Texts(Rc<RefCell<Vec<(String, u64)>>>);

    impl ExperimentLogger for Texts {
        fn log_text(&mut self, text: &str, step: u64) -> Result<()> {
            self.0.borrow_mut().push((text.to_string(), step));
            Ok(())
        }
    }

    struct Failing;

    impl ExperimentLogger for Failing {
        fn log_text(&mut self, _text: &str, _step: u64) -> Result<()> {
            Err(std::io::Error::other("tracker unavailable").into())
        }
    }

    fn symbols() -> SymbolTable {
        let mut table = SymbolTable::new();
        table.insert(0, ["<pad>", "a", "b", "c"]);
        table
    }

    fn output(loss: f32) -> StepOutput {
        StepOutput {
            losses: Losses::Scalar(loss),
            // argmax per frame: 1, 3, 2
            prediction: array![
                [0.0, 0.9, 0.1, 0.0],
                [0.0, 0.1, 0.2, 0.7],
                [0.1, 0.0, 0.8, 0.1]
            ],
            labels: vec![1, 2, 0],
            lang_id: 0,
        }
    }

    fn state(global_step: u64) -> TrainerState {
        TrainerState {
            global_step,
            log_every_n_steps: 10,
            local_rank: 0,
        }
    }

    fn saver(dir: &Path) -> (Saver, Console, Texts) {
        let console = Console::default();
        let texts = Texts::default();
        let mut config = SaverConfig::new(dir.join("log"), dir.join("result"));
        config.symbols = symbols();

        let saver = Saver::new(config)
            .unwrap()
            .with_console(console.clone())
            .with_logger(texts.clone());
        (saver, console, texts)
    }

    #[test]
    fn creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let (saver, _, _) = saver(dir.path());

        assert!(saver.log_dir().is_dir());
        assert!(saver.result_dir().is_dir());
    }

    #[test]
    fn train_rows_only_on_log_steps() {
        let dir = tempfile::tempdir().unwrap();
        let (mut saver, console, texts) = saver(dir.path());

        saver.on_train_batch_end(&state(4), &output(1.0)).unwrap();
        assert!(console.lines().is_empty());

        saver.on_train_batch_end(&state(9), &output(1.0)).unwrap();
        saver.on_train_batch_end(&state(19), &output(0.5)).unwrap();

        let lines = console.lines();
        assert_eq!(lines.len(), 3, "one header and two rows: {lines:?}");
        assert!(lines[0].contains("Total Loss"));
        assert!(lines[1].trim_start().starts_with("10"));
        assert!(lines[2].trim_start().starts_with("20"));
        assert_eq!(saver.pending_rows().len(), 2);

        let texts = texts.0.borrow();
        assert_eq!(
            texts[..2],
            [
                ("Train/GT: a, b".to_string(), 10),
                ("Train/Pred: a, c".to_string(), 10)
            ]
        );
    }

    #[test]
    fn non_zero_rank_does_not_log_training() {
        let dir = tempfile::tempdir().unwrap();
        let (mut saver, console, texts) = saver(dir.path());
        let state = TrainerState {
            local_rank: 1,
            ..state(9)
        };

        saver.on_train_batch_end(&state, &output(1.0)).unwrap();

        assert!(console.lines().is_empty());
        assert!(texts.0.borrow().is_empty());
        assert!(saver.pending_rows().is_empty());
    }

    #[test]
    fn validation_epoch_writes_csv_and_log() {
        let dir = tempfile::tempdir().unwrap();
        let (mut saver, console, texts) = saver(dir.path());

        saver.on_train_batch_end(&state(9), &output(3.0)).unwrap();

        saver.on_validation_epoch_start();
        for (batch_idx, loss) in [1.0, 2.0].into_iter().enumerate() {
            saver
                .on_validation_batch_end(&state(9), &output(loss), batch_idx)
                .unwrap();
        }
        saver.on_validation_epoch_end(&state(9)).unwrap();

        let csv = std::fs::read_to_string(dir.path().join("log/csv/Validation/0.csv")).unwrap();
        assert_eq!(csv, "Step,Total Loss\n10,1.0\n10,2.0\n");

        let log = std::fs::read_to_string(dir.path().join("log").join(LOG_FILE)).unwrap();
        assert_eq!(log, "Step,Stage,Total Loss\n10,Training,3.0\n10,Validation,1.5\n");

        // Validation transcripts come from batch 0 only
        let val = texts
            .0
            .borrow()
            .iter()
            .filter(|(t, _)| t.starts_with("Val/"))
            .count();
        assert_eq!(val, 2);

        assert!(console.lines().last().unwrap().contains("Validation"));
        assert!(saver.pending_rows().is_empty());
    }

    #[test]
    fn log_header_written_once_across_epochs() {
        let dir = tempfile::tempdir().unwrap();
        let (mut saver, _, _) = saver(dir.path());

        for epoch in 0..2 {
            saver.on_validation_epoch_start();
            saver
                .on_validation_batch_end(&state(epoch), &output(1.0), 0)
                .unwrap();
            saver.on_validation_epoch_end(&state(epoch)).unwrap();
        }

        let log = std::fs::read_to_string(dir.path().join("log").join(LOG_FILE)).unwrap();
        assert_eq!(log.matches("Step,Stage").count(), 1);
        assert_eq!(log.lines().count(), 3);
    }

    #[test]
    fn other_stages_go_to_result_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SaverConfig::new(dir.path().join("log"), dir.path().join("result"));
        config.format = LogFormat::new(["Total Loss", "CTC Loss"]);
        let saver = Saver::new(config).unwrap();

        let losses = Losses::Named(vec![("CTC Loss".into(), 0.25)]);
        let path = saver.log_csv("Test", 42, "utt001", &losses).unwrap();

        assert_eq!(path, dir.path().join("result/csv/Test/utt001.csv"));
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "Step,Total Loss,CTC Loss\n42,,0.25\n"
        );
    }

    #[test]
    fn logger_failure_does_not_fail_hook() {
        let dir = tempfile::tempdir().unwrap();
        let (saver, console, _) = saver(dir.path());
        let mut saver = saver.with_logger(Failing);

        saver.on_train_batch_end(&state(9), &output(1.0)).unwrap();

        assert_eq!(console.lines().len(), 2);
    }

    #[test]
    fn nan_logits_skip_transcripts() {
        let dir = tempfile::tempdir().unwrap();
        let (mut saver, console, texts) = saver(dir.path());
        let mut output = output(1.0);
        output.prediction[[1, 2]] = f32::NAN;

        saver.on_train_batch_end(&state(9), &output).unwrap();
        saver.on_validation_epoch_start();
        saver.on_validation_batch_end(&state(9), &output, 0).unwrap();
        saver.on_validation_epoch_end(&state(9)).unwrap();

        assert!(texts.0.borrow().is_empty());
        assert_eq!(console.lines().len(), 3);
        let log = std::fs::read_to_string(dir.path().join("log").join(LOG_FILE)).unwrap();
        assert_eq!(log, "Step,Stage,Total Loss\n10,Training,1.0\n10,Validation,1.0\n");
    }

    #[test]
    fn unknown_symbol_fails_hook() {
        let dir = tempfile::tempdir().unwrap();
        let (mut saver, _, _) = saver(dir.path());
        let mut output = output(1.0);
        output.lang_id = 5;

        let err = saver.on_train_batch_end(&state(9), &output).unwrap_err();
        assert!(matches!(err, Error::Symbol(_)));
    }

    #[test]
    fn re_id_uses_language_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let texts = Texts::default();
        let mut symbols = symbols();
        symbols.insert(1, ["<pad>", "x", "y"]);

        let mut config = SaverConfig::new(dir.path().join("log"), dir.path().join("result"));
        config.symbols = symbols;
        config.re_id = true;
        let mut saver = Saver::new(config)
            .unwrap()
            .with_console(std::io::sink())
            .with_logger(texts.clone());

        let output = StepOutput {
            losses: Losses::Scalar(1.0),
            prediction: array![[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]],
            labels: vec![5],
            lang_id: 1,
        };
        saver.on_train_batch_end(&state(9), &output).unwrap();

        let texts = texts.0.borrow();
        assert_eq!(texts[0].0, "Train/GT: x");
        assert_eq!(texts[1].0, "Train/Pred: y");
    }
}
