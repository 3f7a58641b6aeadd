//! Technical indicators applied per instrument.
//!
//! Each indicator needs a warmup of trading days before it produces a value;
//! the kernel requests that much history before the window start so the first
//! requested row is already valid.

use crate::domain::catalog::OperatorCatalog;
use crate::domain::dimension::Dimension;
use crate::domain::error::AlphaError;
use crate::domain::frame::Frame;
use crate::domain::node::{Checked, DimensionRule, Operator};
use crate::domain::operators::{Args, Kernel, window_constraint};
use chrono::NaiveDate;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct Indicator {
    warmup: fn(usize) -> usize,
    apply: fn(&[f64], usize) -> Vec<f64>,
}

impl Kernel for Indicator {
    fn eval(&self, args: &Args<'_>, date1: NaiveDate, date2: NaiveDate) -> Result<Frame, AlphaError> {
        let period = args.window(1)?;
        let frame = args.with_lookback(0, (self.warmup)(period), date1, date2)?;
        let apply = self.apply;
        Ok(frame
            .map_columns(|column| apply(column, period))
            .since(date1))
    }
}

/// k = 2/(n+1), seeded with the SMA of the first `n` values.
/// The first `n - 1` positions are NaN.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = ema;
    for i in period..values.len() {
        ema = values[i] * k + ema * (1.0 - k);
        out[i] = ema;
    }
    out
}

/// Linearly weighted moving average, newest value weighted `n`.
/// Divisor is n(n+1)/2. The first `n - 1` positions are NaN.
pub fn wma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let divisor = (period * (period + 1)) as f64 / 2.0;
    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        let weighted: f64 = window
            .iter()
            .enumerate()
            .map(|(j, v)| v * (j + 1) as f64)
            .sum();
        out[i] = weighted / divisor;
    }
    out
}

/// Relative strength index with Wilder smoothing.
///
/// The first average is the simple mean of `n` changes, then
/// avg = (prev * (n - 1) + current) / n. A window with no losses reads 100.
/// The first `n` positions are NaN.
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }
    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let gain = |c: f64| if c > 0.0 { c } else { 0.0 };
    let loss = |c: f64| if c < 0.0 { -c } else { 0.0 };
    let strength = |avg_gain: f64, avg_loss: f64| {
        if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
        }
    };

    let mut avg_gain = changes[..period].iter().map(|&c| gain(c)).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().map(|&c| loss(c)).sum::<f64>() / period as f64;
    out[period] = strength(avg_gain, avg_loss);

    let n = period as f64;
    for i in (period + 1)..values.len() {
        let change = changes[i - 1];
        avg_gain = (avg_gain * (n - 1.0) + gain(change)) / n;
        avg_loss = (avg_loss * (n - 1.0) + loss(change)) / n;
        out[i] = strength(avg_gain, avg_loss);
    }
    out
}

/// Rate of change in percent over `n` steps; zero when the earlier value is zero.
/// The first `n` positions are NaN.
pub fn roc(values: &[f64], period: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            if i < period {
                f64::NAN
            } else if values[i - period] == 0.0 {
                0.0
            } else {
                (values[i] - values[i - period]) / values[i - period] * 100.0
            }
        })
        .collect()
}

/// Oscillators and percent changes drop the unit of their input.
fn untracked(_: &[Checked<'_>]) -> Result<Dimension, String> {
    Ok(Dimension::Blackhole)
}

fn indicator(
    name: &str,
    rule: DimensionRule,
    warmup: fn(usize) -> usize,
    apply: fn(&[f64], usize) -> Vec<f64>,
) -> Operator {
    Operator::new(name, 2, rule, Arc::new(Indicator { warmup, apply }))
        .with_constraint(1, window_constraint())
}

pub fn register(catalog: &mut OperatorCatalog) -> Result<(), AlphaError> {
    catalog.register(indicator("ema", DimensionRule::SameAsChild(0), |n| n - 1, ema))?;
    catalog.register(indicator("wma", DimensionRule::SameAsChild(0), |n| n - 1, wma))?;
    catalog.register(indicator("rsi", DimensionRule::Custom(untracked), |n| n, rsi))?;
    catalog.register(indicator("roc", DimensionRule::Custom(untracked), |n| n, roc))?;
    Ok(())
}
