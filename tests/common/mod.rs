#![allow(dead_code)]

use alphagene::domain::dimension::Dimension;
use alphagene::domain::environment::Environment;
use alphagene::domain::error::AlphaError;
use alphagene::domain::frame::Frame;
use alphagene::ports::data_port::SeriesPort;
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::HashMap;

pub const UNIVERSE: [&str; 3] = ["AAA", "BBB", "CCC"];

pub struct MockSeriesPort {
    pub frames: HashMap<String, Frame>,
    pub errors: HashMap<String, String>,
}

impl MockSeriesPort {
    pub fn new() -> Self {
        Self {
            frames: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_series(mut self, name: &str, frame: Frame) -> Self {
        self.frames.insert(name.to_string(), frame);
        self
    }

    pub fn with_error(mut self, name: &str, reason: &str) -> Self {
        self.errors.insert(name.to_string(), reason.to_string());
        self
    }
}

impl SeriesPort for MockSeriesPort {
    fn load_series(&self, name: &str) -> Result<Frame, AlphaError> {
        if let Some(reason) = self.errors.get(name) {
            return Err(AlphaError::Data {
                reason: reason.clone(),
            });
        }
        self.frames
            .get(name)
            .cloned()
            .ok_or_else(|| AlphaError::Data {
                reason: format!("no series '{}'", name),
            })
    }

    fn list_series(&self) -> Result<Vec<String>, AlphaError> {
        let mut names: Vec<String> = self.frames.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// `count` weekdays starting on or after `start`.
pub fn business_days(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    start
        .iter_days()
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .take(count)
        .collect()
}

pub fn universe() -> Vec<String> {
    UNIVERSE.iter().map(|s| s.to_string()).collect()
}

/// Column `j` holds `start + step * i * (j + 1)` on row `i`.
pub fn linear_series(dates: &[NaiveDate], start: f64, step: f64) -> Frame {
    let values = (0..dates.len())
        .map(|i| {
            (0..UNIVERSE.len())
                .map(|j| start + step * i as f64 * (j + 1) as f64)
                .collect()
        })
        .collect();
    Frame::new(dates.to_vec(), universe(), values).unwrap()
}

pub const CALENDAR_DAYS: usize = 30;

pub fn calendar() -> Vec<NaiveDate> {
    business_days(date(2024, 1, 1), CALENDAR_DAYS)
}

/// Environment with the default operators and four series:
/// `open1` (CNY), `open2` (USD), `open` and `close` (CNY).
pub fn sample_environment() -> Environment {
    let dates = calendar();
    let mut env = Environment::with_default_operators(dates.clone(), universe());
    env.add_data("open1", linear_series(&dates, 10.0, 1.0), Dimension::unit("CNY"))
        .unwrap();
    env.add_data("open2", linear_series(&dates, 5.0, 0.5), Dimension::unit("USD"))
        .unwrap();
    env.add_data("open", linear_series(&dates, 100.0, 1.0), Dimension::unit("CNY"))
        .unwrap();
    env.add_data("close", linear_series(&dates, 101.0, 1.0), Dimension::unit("CNY"))
        .unwrap();
    env
}

pub fn sample_port() -> MockSeriesPort {
    let dates = calendar();
    MockSeriesPort::new()
        .with_series("open", linear_series(&dates, 100.0, 1.0))
        .with_series("close", linear_series(&dates, 101.0, 1.0))
}
