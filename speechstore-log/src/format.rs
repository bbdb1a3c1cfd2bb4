//! Loss columns and fixed-width console rows.

use serde::{Deserialize, Serialize};

pub const STEP_COLUMN: &str = "Step";
pub const STAGE_COLUMN: &str = "Stage";

pub const TRAINING: &str = "Training";
pub const VALIDATION: &str = "Validation";

/// Widest expected step value.
const STEP_PLACEHOLDER: &str = "200000";

/// Loss values reported by one step.
#[derive(Clone, Debug, PartialEq)]
pub enum Losses {
    /// Total loss only
    Scalar(f32),
    /// Named components, in any order
    Named(Vec<(String, f32)>),
}

impl From<f32> for Losses {
    fn from(value: f32) -> Self {
        Losses::Scalar(value)
    }
}

/// One logged row: step, stage and one optional value per column.
#[derive(Clone, Debug, PartialEq)]
pub struct LossRow {
    pub step: u64,
    pub stage: String,
    pub values: Vec<Option<f32>>,
}

/// Ordered loss columns of one run.
///
/// Built once before logging starts. Named losses missing from the columns
/// are dropped; columns missing from the losses are empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogFormat {
    columns: Vec<String>,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::new(["Total Loss"])
    }
}

impl LogFormat {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Minimum console width of each column: step, stage, then losses.
    pub fn widths(&self) -> Vec<usize> {
        [STEP_PLACEHOLDER, VALIDATION]
            .into_iter()
            .chain(self.columns.iter().map(String::as_str))
            .map(str::len)
            .collect()
    }

    /// Values of `losses` in column order. A scalar fills the first column.
    pub fn project(&self, losses: &Losses) -> Vec<Option<f32>> {
        match losses {
            Losses::Scalar(value) => {
                let mut values = vec![None; self.columns.len()];
                if let Some(first) = values.first_mut() {
                    *first = Some(*value);
                }
                values
            }
            Losses::Named(named) => self
                .columns
                .iter()
                .map(|column| {
                    named
                        .iter()
                        .find(|(name, _)| name == column)
                        .map(|&(_, value)| value)
                })
                .collect(),
        }
    }

    pub fn row(&self, step: u64, stage: impl Into<String>, losses: &Losses) -> LossRow {
        LossRow {
            step,
            stage: stage.into(),
            values: self.project(losses),
        }
    }

    /// Column-wise mean over rows, skipping empty cells.
    pub fn merge_mean<'a>(
        &self,
        rows: impl IntoIterator<Item = &'a [Option<f32>]>,
    ) -> Vec<Option<f32>> {
        let mut sums = vec![(0.0f64, 0usize); self.columns.len()];

        for values in rows {
            for (acc, value) in sums.iter_mut().zip(values) {
                if let Some(v) = value {
                    acc.0 += f64::from(*v);
                    acc.1 += 1;
                }
            }
        }

        sums.into_iter()
            .map(|(sum, n)| (n > 0).then(|| (sum / n as f64) as f32))
            .collect()
    }

    /// Console header line.
    pub fn header(&self) -> String {
        let cells = [STEP_COLUMN, STAGE_COLUMN]
            .into_iter()
            .chain(self.columns.iter().map(String::as_str))
            .map(str::to_string);
        self.justify(cells)
    }

    /// Console line for `row`.
    pub fn line(&self, row: &LossRow) -> String {
        let cells = [row.step.to_string(), row.stage.clone()]
            .into_iter()
            .chain(row.values.iter().map(|value| match value {
                Some(v) => format!("{v:.6}"),
                None => "NaN".to_string(),
            }));
        self.justify(cells)
    }

    fn justify(&self, cells: impl Iterator<Item = String>) -> String {
        let widths = self.widths();
        let mut line = String::new();

        for (i, (cell, width)) in cells.zip(widths).enumerate() {
            if i > 0 {
                line.push(' ');
            }
            line.push_str(&format!("{cell:>width$}"));
        }

        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> LogFormat {
        LogFormat::new(["Total Loss", "CTC Loss"])
    }

    #[test]
    fn default_has_total_loss_only() {
        let format = LogFormat::default();
        assert_eq!(format.columns(), ["Total Loss"]);
        assert_eq!(format.widths(), [6, 10, 10]);
    }

    #[test]
    fn scalar_fills_first_column() {
        assert_eq!(format().project(&Losses::Scalar(1.5)), [Some(1.5), None]);
    }

    #[test]
    fn named_losses_follow_column_order() {
        let losses = Losses::Named(vec![
            ("CTC Loss".into(), 0.25),
            ("Extra".into(), 9.0),
            ("Total Loss".into(), 0.75),
        ]);
        assert_eq!(format().project(&losses), [Some(0.75), Some(0.25)]);

        let partial = Losses::Named(vec![("CTC Loss".into(), 0.5)]);
        assert_eq!(format().project(&partial), [None, Some(0.5)]);
    }

    #[test]
    fn mean_skips_empty_cells() {
        let rows = [vec![Some(1.0), None], vec![Some(3.0), None]];
        let merged = format().merge_mean(rows.iter().map(Vec::as_slice));
        assert_eq!(merged, [Some(2.0), None]);
    }

    #[test]
    fn rows_align_under_header() {
        let format = LogFormat::default();
        let row = format.row(100, TRAINING, &Losses::Scalar(0.5));

        assert_eq!(format.header(), "  Step      Stage Total Loss");
        assert_eq!(format.line(&row), "   100   Training   0.500000");
        assert_eq!(format.header().len(), format.line(&row).len());
    }

    #[test]
    fn deserializes_from_column_list() {
        let format: LogFormat = serde_json::from_str(r#"["Total Loss", "CTC Loss"]"#).unwrap();
        assert_eq!(format, self::format());
    }
}
