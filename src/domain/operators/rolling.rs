//! Rolling time-series operators.
//!
//! The window length is a constant argument. Kernels evaluate the series
//! argument from `window - 1` trading days before the requested start (`lag`
//! days for lag operators), compute per instrument, then drop the extra rows.
//! Too little calendar history surfaces as a range fault from the environment.

use crate::domain::catalog::OperatorCatalog;
use crate::domain::dimension::Dimension;
use crate::domain::error::AlphaError;
use crate::domain::frame::Frame;
use crate::domain::node::{Checked, DimensionRule, Operator};
use crate::domain::operators::{Args, Kernel, window_constraint};
use chrono::NaiveDate;
use std::sync::Arc;

/// One statistic over a trailing window of a single series.
#[derive(Debug, Clone, Copy)]
pub struct Rolling {
    apply: fn(&[f64]) -> f64,
}

impl Kernel for Rolling {
    fn eval(&self, args: &Args<'_>, date1: NaiveDate, date2: NaiveDate) -> Result<Frame, AlphaError> {
        let window = args.window(1)?;
        let frame = args.with_lookback(0, window - 1, date1, date2)?;
        let apply = self.apply;
        Ok(frame
            .map_columns(|column| rolling(column, window, apply))
            .since(date1))
    }
}

/// Combines each value with the value `lag` trading days earlier.
#[derive(Debug, Clone, Copy)]
pub struct Lagged {
    apply: fn(f64, f64) -> f64,
}

impl Kernel for Lagged {
    fn eval(&self, args: &Args<'_>, date1: NaiveDate, date2: NaiveDate) -> Result<Frame, AlphaError> {
        let lag = args.window(1)?;
        let frame = args.with_lookback(0, lag, date1, date2)?;
        let apply = self.apply;
        Ok(frame
            .map_columns(|column| {
                (0..column.len())
                    .map(|i| {
                        if i >= lag {
                            apply(column[i], column[i - lag])
                        } else {
                            f64::NAN
                        }
                    })
                    .collect()
            })
            .since(date1))
    }
}

/// One statistic over trailing windows of two aligned series.
#[derive(Debug, Clone, Copy)]
pub struct RollingPair {
    apply: fn(&[f64], &[f64]) -> f64,
}

impl Kernel for RollingPair {
    fn eval(&self, args: &Args<'_>, date1: NaiveDate, date2: NaiveDate) -> Result<Frame, AlphaError> {
        let window = args.window(2)?;
        let left = args.with_lookback(0, window - 1, date1, date2)?;
        let right = args.with_lookback(1, window - 1, date1, date2)?;
        let apply = self.apply;
        Ok(left
            .zip_columns(&right, |x, y| {
                (0..x.len())
                    .map(|i| {
                        if i + 1 < window {
                            f64::NAN
                        } else {
                            apply(&x[i + 1 - window..=i], &y[i + 1 - window..=i])
                        }
                    })
                    .collect()
            })?
            .since(date1))
    }
}

/// Apply `stat` to every full trailing window; earlier positions are NaN.
pub fn rolling(values: &[f64], window: usize, stat: fn(&[f64]) -> f64) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                f64::NAN
            } else {
                stat(&values[i + 1 - window..=i])
            }
        })
        .collect()
}

pub fn mean(window: &[f64]) -> f64 {
    window.iter().sum::<f64>() / window.len() as f64
}

pub fn sum(window: &[f64]) -> f64 {
    window.iter().sum()
}

/// Population standard deviation.
pub fn std(window: &[f64]) -> f64 {
    let m = mean(window);
    let variance = window.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / window.len() as f64;
    variance.sqrt()
}

pub fn max(window: &[f64]) -> f64 {
    window.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

pub fn min(window: &[f64]) -> f64 {
    window.iter().copied().fold(f64::INFINITY, f64::min)
}

/// Share of the window at or below its latest value.
pub fn last_rank(window: &[f64]) -> f64 {
    let Some(&last) = window.last() else {
        return f64::NAN;
    };
    if last.is_nan() {
        return f64::NAN;
    }
    window.iter().filter(|v| **v <= last).count() as f64 / window.len() as f64
}

/// Population covariance.
pub fn covariance(x: &[f64], y: &[f64]) -> f64 {
    let mx = mean(x);
    let my = mean(y);
    x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum::<f64>() / x.len() as f64
}

/// Pearson correlation; NaN when either side is flat.
pub fn correlation(x: &[f64], y: &[f64]) -> f64 {
    let sx = std(x);
    let sy = std(y);
    if sx <= f64::EPSILON || sy <= f64::EPSILON {
        return f64::NAN;
    }
    covariance(x, y) / (sx * sy)
}

fn product_rule(children: &[Checked<'_>]) -> Result<Dimension, String> {
    Ok(&children[0].dimension * &children[1].dimension)
}

fn windowed(name: &str, rule: DimensionRule, apply: fn(&[f64]) -> f64) -> Operator {
    Operator::new(name, 2, rule, Arc::new(Rolling { apply }))
        .with_constraint(1, window_constraint())
}

fn lagged(name: &str, rule: DimensionRule, apply: fn(f64, f64) -> f64) -> Operator {
    Operator::new(name, 2, rule, Arc::new(Lagged { apply }))
        .with_constraint(1, window_constraint())
}

fn paired(name: &str, rule: DimensionRule, apply: fn(&[f64], &[f64]) -> f64) -> Operator {
    Operator::new(name, 3, rule, Arc::new(RollingPair { apply }))
        .with_constraint(2, window_constraint())
}

pub fn register(catalog: &mut OperatorCatalog) -> Result<(), AlphaError> {
    catalog.register(windowed("ts_mean", DimensionRule::SameAsChild(0), mean))?;
    catalog.register(windowed("ts_sum", DimensionRule::SameAsChild(0), sum))?;
    catalog.register(windowed("ts_std", DimensionRule::SameAsChild(0), std))?;
    catalog.register(windowed("ts_max", DimensionRule::SameAsChild(0), max))?;
    catalog.register(windowed("ts_min", DimensionRule::SameAsChild(0), min))?;
    catalog.register(windowed("ts_rank", DimensionRule::NoDimension, last_rank))?;
    catalog.register(lagged("ts_delay", DimensionRule::SameAsChild(0), |_, lagged| lagged))?;
    catalog.register(lagged("ts_delta", DimensionRule::SameAsChild(0), |now, lagged| now - lagged))?;
    catalog.register(lagged("ts_return", DimensionRule::NoDimension, |now, lagged| {
        if lagged == 0.0 { f64::NAN } else { now / lagged - 1.0 }
    }))?;
    catalog.register(paired("ts_corr", DimensionRule::NoDimension, correlation))?;
    catalog.register(paired("ts_cov", DimensionRule::Custom(product_rule), covariance))?;
    Ok(())
}
