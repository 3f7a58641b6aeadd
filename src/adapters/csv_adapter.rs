//! Wide CSV series adapter.
//!
//! One file per series, `<dir>/<name>.csv`, with a header `date,<instrument>...`
//! and one row per date. Empty cells load as `NaN`.

use crate::domain::error::AlphaError;
use crate::domain::frame::Frame;
use crate::ports::data_port::SeriesPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, name: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", name))
    }
}

fn parse_cell(cell: &str, name: &str, date: NaiveDate) -> Result<f64, AlphaError> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(f64::NAN);
    }
    cell.parse().map_err(|e| AlphaError::Data {
        reason: format!("{}: invalid value '{}' on {}: {}", name, cell, date, e),
    })
}

impl SeriesPort for CsvAdapter {
    fn load_series(&self, name: &str) -> Result<Frame, AlphaError> {
        let path = self.csv_path(name);
        let content = fs::read_to_string(&path).map_err(|e| AlphaError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| AlphaError::Data {
            reason: format!("{}: CSV header error: {}", name, e),
        })?;
        let columns: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();
        if columns.is_empty() {
            return Err(AlphaError::Data {
                reason: format!("{}: no instrument columns", name),
            });
        }

        let mut rows: Vec<(NaiveDate, Vec<f64>)> = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| AlphaError::Data {
                reason: format!("{}: CSV parse error: {}", name, e),
            })?;

            let date_str = record.get(0).ok_or_else(|| AlphaError::Data {
                reason: format!("{}: missing date column", name),
            })?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
                AlphaError::Data {
                    reason: format!("{}: invalid date '{}': {}", name, date_str, e),
                }
            })?;

            let values = record
                .iter()
                .skip(1)
                .map(|cell| parse_cell(cell, name, date))
                .collect::<Result<Vec<f64>, _>>()?;
            rows.push((date, values));
        }

        rows.sort_by_key(|(date, _)| *date);
        let (dates, values): (Vec<NaiveDate>, Vec<Vec<f64>>) = rows.into_iter().unzip();
        Frame::new(dates, columns, values).map_err(|e| AlphaError::Data {
            reason: format!("{}: {}", name, e),
        })
    }

    fn list_series(&self) -> Result<Vec<String>, AlphaError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| AlphaError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut series = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| AlphaError::Data {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(stem) = name_str.strip_suffix(".csv") {
                series.push(stem.to_string());
            }
        }

        series.sort();
        Ok(series)
    }
}
