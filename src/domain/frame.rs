//! Time-indexed panel of values: one row per trading date, one column per instrument.
//!
//! Missing and warm-up values are `NaN`.

use crate::domain::error::AlphaError;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    dates: Vec<NaiveDate>,
    columns: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl Frame {
    pub fn new(
        dates: Vec<NaiveDate>,
        columns: Vec<String>,
        values: Vec<Vec<f64>>,
    ) -> Result<Self, AlphaError> {
        if dates.len() != values.len() {
            return Err(AlphaError::Shape {
                reason: format!("{} dates but {} rows", dates.len(), values.len()),
            });
        }
        if let Some((i, row)) = values
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(AlphaError::Shape {
                reason: format!(
                    "row {} has {} values, expected {}",
                    i,
                    row.len(),
                    columns.len()
                ),
            });
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AlphaError::Shape {
                reason: "dates must be strictly ascending".into(),
            });
        }
        Ok(Self {
            dates,
            columns,
            values,
        })
    }

    pub fn filled(dates: &[NaiveDate], columns: &[String], value: f64) -> Self {
        Self {
            dates: dates.to_vec(),
            columns: columns.to_vec(),
            values: vec![vec![value; columns.len()]; dates.len()],
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn get(&self, date: NaiveDate, column: &str) -> Option<f64> {
        let row = self.dates.binary_search(&date).ok()?;
        let col = self.columns.iter().position(|c| c == column)?;
        Some(self.values[row][col])
    }

    pub fn column(&self, index: usize) -> Vec<f64> {
        self.values.iter().map(|row| row[index]).collect()
    }

    /// Rows with `date1 <= date <= date2`.
    pub fn between(&self, date1: NaiveDate, date2: NaiveDate) -> Frame {
        let start = self.dates.partition_point(|d| *d < date1);
        let end = self.dates.partition_point(|d| *d <= date2).max(start);
        Frame {
            dates: self.dates[start..end].to_vec(),
            columns: self.columns.clone(),
            values: self.values[start..end].to_vec(),
        }
    }

    /// Rows dated on or after `date`.
    pub fn since(&self, date: NaiveDate) -> Frame {
        let start = self.dates.partition_point(|d| *d < date);
        Frame {
            dates: self.dates[start..].to_vec(),
            columns: self.columns.clone(),
            values: self.values[start..].to_vec(),
        }
    }

    fn check_aligned(&self, other: &Frame) -> Result<(), AlphaError> {
        if self.columns != other.columns {
            return Err(AlphaError::Shape {
                reason: format!(
                    "columns differ ({} vs {})",
                    self.columns.join(","),
                    other.columns.join(",")
                ),
            });
        }
        if self.dates != other.dates {
            return Err(AlphaError::Shape {
                reason: format!(
                    "date indexes differ ({} vs {} rows)",
                    self.dates.len(),
                    other.dates.len()
                ),
            });
        }
        Ok(())
    }

    /// Combine aligned frames cell by cell.
    pub fn combine(frames: &[Frame], apply: impl Fn(&[f64]) -> f64) -> Result<Frame, AlphaError> {
        let first = frames.first().ok_or_else(|| AlphaError::Shape {
            reason: "nothing to combine".into(),
        })?;
        for other in &frames[1..] {
            first.check_aligned(other)?;
        }

        let mut cell = Vec::with_capacity(frames.len());
        let values: Vec<Vec<f64>> = (0..first.len())
            .map(|row| {
                (0..first.width())
                    .map(|col| {
                        cell.clear();
                        cell.extend(frames.iter().map(|f| f.values[row][col]));
                        apply(&cell)
                    })
                    .collect()
            })
            .collect();

        Ok(Frame {
            dates: first.dates.clone(),
            columns: first.columns.clone(),
            values,
        })
    }

    /// Cross-sectional transform: `apply` sees one date's values across all columns.
    pub fn map_rows(&self, apply: impl Fn(&[f64]) -> Vec<f64>) -> Frame {
        Frame {
            dates: self.dates.clone(),
            columns: self.columns.clone(),
            values: self.values.iter().map(|row| apply(row)).collect(),
        }
    }

    /// Time-series transform: `apply` sees one column's full history.
    pub fn map_columns(&self, apply: impl Fn(&[f64]) -> Vec<f64>) -> Frame {
        let mut values = vec![Vec::with_capacity(self.width()); self.len()];
        for col in 0..self.width() {
            let transformed = apply(&self.column(col));
            for (row, value) in values.iter_mut().zip(transformed) {
                row.push(value);
            }
        }
        Frame {
            dates: self.dates.clone(),
            columns: self.columns.clone(),
            values,
        }
    }

    /// Time-series transform over two aligned frames, column by column.
    pub fn zip_columns(
        &self,
        other: &Frame,
        apply: impl Fn(&[f64], &[f64]) -> Vec<f64>,
    ) -> Result<Frame, AlphaError> {
        self.check_aligned(other)?;
        let mut values = vec![Vec::with_capacity(self.width()); self.len()];
        for col in 0..self.width() {
            let transformed = apply(&self.column(col), &other.column(col));
            for (row, value) in values.iter_mut().zip(transformed) {
                row.push(value);
            }
        }
        Ok(Frame {
            dates: self.dates.clone(),
            columns: self.columns.clone(),
            values,
        })
    }

    /// Reorder and subset columns. Every requested column must exist.
    pub fn select(&self, columns: &[String]) -> Result<Frame, AlphaError> {
        let indexes = columns
            .iter()
            .map(|name| {
                self.columns
                    .iter()
                    .position(|c| c == name)
                    .ok_or_else(|| AlphaError::Data {
                        reason: format!("no column '{}'", name),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Frame {
            dates: self.dates.clone(),
            columns: columns.to_vec(),
            values: self
                .values
                .iter()
                .map(|row| indexes.iter().map(|&i| row[i]).collect())
                .collect(),
        })
    }

    /// Re-index onto `dates`; rows absent from this frame become `NaN`.
    pub fn reindex(&self, dates: &[NaiveDate]) -> Frame {
        let values = dates
            .iter()
            .map(|date| match self.dates.binary_search(date) {
                Ok(row) => self.values[row].clone(),
                Err(_) => vec![f64::NAN; self.width()],
            })
            .collect();
        Frame {
            dates: dates.to_vec(),
            columns: self.columns.clone(),
            values,
        }
    }
}
