//! Feature, score and timing tables.

use std::io::{self, Write};

use crate::{FunqueError, Result};

/// Values of one kept frame, in schema order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FeatureRow {
    /// Frame index in the stream.
    pub frame: usize,
    /// One value per schema column.
    pub values: Vec<f64>,
}

/// Named columns, one row per kept frame.
///
/// Used for both the feature matrix and the raw score table.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FeatureMatrix {
    names: Vec<String>,
    rows: Vec<FeatureRow>,
}

impl FeatureMatrix {
    /// Creates an empty table with the given columns.
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            rows: Vec::new(),
        }
    }

    /// Appends a row.
    ///
    /// # Errors
    /// Returns [`FunqueError::InvalidParameter`] if the row width is wrong.
    pub fn push(&mut self, row: FeatureRow) -> Result<()> {
        if row.values.len() != self.names.len() {
            return Err(FunqueError::InvalidParameter {
                name: "row",
                reason: format!(
                    "expected {} values, got {}",
                    self.names.len(),
                    row.values.len()
                ),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of one column, or `None` for an unknown name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.names.iter().position(|n| n == name)?;
        Some(self.rows.iter().map(|r| r.values[index]).collect())
    }

    /// Value at a frame and column, if both exist.
    #[must_use]
    pub fn get(&self, frame: usize, name: &str) -> Option<f64> {
        let index = self.names.iter().position(|n| n == name)?;
        self.rows
            .iter()
            .find(|r| r.frame == frame)
            .map(|r| r.values[index])
    }

    /// Splits into a row-major value matrix and the column names.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Vec<f64>>, Vec<String>) {
        (
            self.rows.into_iter().map(|r| r.values).collect(),
            self.names,
        )
    }

    /// Writes the table as CSV with a leading `Frame` column.
    ///
    /// # Errors
    /// Propagates write errors.
    pub fn write_csv<W: Write>(&self, mut out: W) -> io::Result<()> {
        write!(out, "Frame")?;
        for name in &self.names {
            write!(out, ",{name}")?;
        }
        writeln!(out)?;
        for row in &self.rows {
            write!(out, "{}", row.frame)?;
            for v in &row.values {
                write!(out, ",{v}")?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

/// Stage durations of one processed frame, in seconds.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TimingRow {
    pub frame: usize,
    /// Whole frame, decode excluded.
    pub time_taken: f64,
    /// Resampling and size alignment.
    pub resizer: f64,
    /// CSF filtering, spatial or per subband.
    pub filters: f64,
    /// Wavelet decomposition.
    pub dwt: f64,
    /// One entry per kernel stage column; 0 on skipped frames.
    pub stages: Vec<f64>,
}

/// Per-frame stage durations plus a trailing sum.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TimingTable {
    stage_names: Vec<String>,
    rows: Vec<TimingRow>,
}

impl TimingTable {
    /// Creates an empty table with the given kernel stage columns.
    #[must_use]
    pub fn new(stage_names: Vec<String>) -> Self {
        Self {
            stage_names,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: TimingRow) {
        self.rows.push(row);
    }

    #[must_use]
    pub fn stage_names(&self) -> &[String] {
        &self.stage_names
    }

    #[must_use]
    pub fn rows(&self) -> &[TimingRow] {
        &self.rows
    }

    /// Column totals over all rows; `frame` is the row count.
    #[must_use]
    pub fn sum(&self) -> TimingRow {
        let mut total = TimingRow {
            frame: self.rows.len(),
            stages: vec![0.0; self.stage_names.len()],
            ..TimingRow::default()
        };
        for row in &self.rows {
            total.time_taken += row.time_taken;
            total.resizer += row.resizer;
            total.filters += row.filters;
            total.dwt += row.dwt;
            for (t, s) in total.stages.iter_mut().zip(&row.stages) {
                *t += s;
            }
        }
        total
    }

    /// Writes the table as CSV, ending with a `Sum` row.
    ///
    /// # Errors
    /// Propagates write errors.
    pub fn write_csv<W: Write>(&self, mut out: W) -> io::Result<()> {
        write!(out, "Frame,time_taken,resizer,filters,dwt")?;
        for name in &self.stage_names {
            write!(out, ",{name}")?;
        }
        writeln!(out)?;

        let mut write_row = |label: String, row: &TimingRow| -> io::Result<()> {
            write!(
                out,
                "{label},{},{},{},{}",
                row.time_taken, row.resizer, row.filters, row.dwt
            )?;
            for s in &row.stages {
                write!(out, ",{s}")?;
            }
            writeln!(out)
        };
        for row in &self.rows {
            write_row(row.frame.to_string(), row)?;
        }
        write_row("Sum".to_string(), &self.sum())
    }
}
