//! Cross-sectional operators: each date is transformed across the universe.

use crate::domain::catalog::OperatorCatalog;
use crate::domain::error::AlphaError;
use crate::domain::frame::Frame;
use crate::domain::node::{DimensionRule, Operator};
use crate::domain::operators::{Args, Kernel};
use chrono::NaiveDate;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct CrossSection {
    apply: fn(&[f64]) -> Vec<f64>,
}

impl Kernel for CrossSection {
    fn eval(&self, args: &Args<'_>, date1: NaiveDate, date2: NaiveDate) -> Result<Frame, AlphaError> {
        let frame = args.value(0, date1, date2)?;
        Ok(frame.map_rows(self.apply))
    }
}

/// Percentile rank in (0, 1], ties share their average rank. NaN stays NaN.
pub fn rank(row: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..row.len()).filter(|&i| !row[i].is_nan()).collect();
    order.sort_by(|&a, &b| row[a].total_cmp(&row[b]));

    let count = order.len() as f64;
    let mut ranks = vec![f64::NAN; row.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && row[order[end]] == row[order[start]] {
            end += 1;
        }
        // positions start..end are 1-based ranks start+1..=end
        let average = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = average / count;
        }
        start = end;
    }
    ranks
}

fn finite_mean(row: &[f64]) -> Option<f64> {
    let (sum, n) = row
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { None } else { Some(sum / n as f64) }
}

pub fn demean(row: &[f64]) -> Vec<f64> {
    match finite_mean(row) {
        Some(mean) => row.iter().map(|v| v - mean).collect(),
        None => row.to_vec(),
    }
}

/// Population z-score; a flat cross-section maps to zero.
pub fn zscore(row: &[f64]) -> Vec<f64> {
    let Some(mean) = finite_mean(row) else {
        return row.to_vec();
    };
    let finite: Vec<f64> = row.iter().copied().filter(|v| !v.is_nan()).collect();
    let variance = finite.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / finite.len() as f64;
    let std = variance.sqrt();
    row.iter()
        .map(|v| {
            if v.is_nan() {
                f64::NAN
            } else if std > f64::EPSILON {
                (v - mean) / std
            } else {
                0.0
            }
        })
        .collect()
}

fn cross_section(name: &str, rule: DimensionRule, apply: fn(&[f64]) -> Vec<f64>) -> Operator {
    Operator::new(name, 1, rule, Arc::new(CrossSection { apply }))
}

pub fn register(catalog: &mut OperatorCatalog) -> Result<(), AlphaError> {
    catalog.register(cross_section("rank", DimensionRule::NoDimension, rank))?;
    catalog.register(cross_section("zscore", DimensionRule::NoDimension, zscore))?;
    catalog.register(cross_section("demean", DimensionRule::SameAsChild(0), demean))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rank_orders_values() {
        let ranks = rank(&[30.0, 10.0, 20.0, 40.0]);
        assert_eq!(ranks, vec![0.75, 0.25, 0.5, 1.0]);
    }

    #[test]
    fn rank_averages_ties_and_skips_nan() {
        let ranks = rank(&[5.0, f64::NAN, 5.0, 1.0]);
        assert_relative_eq!(ranks[3], 1.0 / 3.0);
        assert_relative_eq!(ranks[0], 2.5 / 3.0);
        assert_relative_eq!(ranks[2], 2.5 / 3.0);
        assert!(ranks[1].is_nan());
    }

    #[test]
    fn zscore_of_known_row() {
        let z = zscore(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        // mean 5, population std 2
        assert_relative_eq!(z[0], -1.5);
        assert_relative_eq!(z[7], 2.0);
    }

    #[test]
    fn zscore_flat_row_is_zero() {
        assert_eq!(zscore(&[3.0, 3.0, 3.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn demean_ignores_nan_in_mean() {
        let d = demean(&[1.0, f64::NAN, 3.0]);
        assert_eq!(d[0], -1.0);
        assert!(d[1].is_nan());
        assert_eq!(d[2], 1.0);
    }
}
