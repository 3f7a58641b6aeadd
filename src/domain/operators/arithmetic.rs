//! Pointwise arithmetic operators.
//!
//! Every argument is evaluated over the requested window and the frames are
//! combined cell by cell; constants broadcast as filled frames.

use crate::domain::catalog::OperatorCatalog;
use crate::domain::dimension::Dimension;
use crate::domain::error::AlphaError;
use crate::domain::frame::Frame;
use crate::domain::node::{Checked, DimensionRule, Operator};
use crate::domain::operators::{Args, Kernel};
use chrono::NaiveDate;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct Pointwise {
    apply: fn(&[f64]) -> f64,
}

impl Pointwise {
    pub fn new(apply: fn(&[f64]) -> f64) -> Self {
        Self { apply }
    }
}

impl Kernel for Pointwise {
    fn eval(&self, args: &Args<'_>, date1: NaiveDate, date2: NaiveDate) -> Result<Frame, AlphaError> {
        let frames = args.values(date1, date2)?;
        Frame::combine(&frames, self.apply)
    }
}

fn divide(v: &[f64]) -> f64 {
    if v[1] == 0.0 { f64::NAN } else { v[0] / v[1] }
}

fn sign(v: &[f64]) -> f64 {
    if v[0].is_nan() {
        f64::NAN
    } else if v[0] > 0.0 {
        1.0
    } else if v[0] < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn log(v: &[f64]) -> f64 {
    if v[0] > 0.0 { v[0].ln() } else { f64::NAN }
}

fn product_rule(children: &[Checked<'_>]) -> Result<Dimension, String> {
    Ok(&children[0].dimension * &children[1].dimension)
}

fn quotient_rule(children: &[Checked<'_>]) -> Result<Dimension, String> {
    Ok(&children[0].dimension / &children[1].dimension)
}

fn power_rule(children: &[Checked<'_>]) -> Result<Dimension, String> {
    let exponent = children[1]
        .node
        .as_constant()
        .ok_or_else(|| format!("exponent '{}' must be a constant", children[1].node.token()))?;
    Ok(children[0].dimension.power(exponent))
}

fn log_rule(children: &[Checked<'_>]) -> Result<Dimension, String> {
    let dimension = &children[0].dimension;
    if dimension.is_faceless() || !dimension.is_truthy() {
        Ok(dimension.clone())
    } else {
        Ok(Dimension::Blackhole)
    }
}

fn pointwise(name: &str, arity: usize, rule: DimensionRule, apply: fn(&[f64]) -> f64) -> Operator {
    Operator::new(name, arity, rule, Arc::new(Pointwise::new(apply)))
}

pub fn register(catalog: &mut OperatorCatalog) -> Result<(), AlphaError> {
    catalog.register(pointwise("add", 2, DimensionRule::SameAsAll, |v| v[0] + v[1]))?;
    catalog.register(pointwise("sub", 2, DimensionRule::SameAsAll, |v| v[0] - v[1]))?;
    catalog.register(pointwise("max", 2, DimensionRule::SameAsAll, |v| v[0].max(v[1])))?;
    catalog.register(pointwise("min", 2, DimensionRule::SameAsAll, |v| v[0].min(v[1])))?;
    catalog.register(pointwise("mul", 2, DimensionRule::Custom(product_rule), |v| v[0] * v[1]))?;
    catalog.register(pointwise("div", 2, DimensionRule::Custom(quotient_rule), divide))?;
    catalog.register(pointwise("neg", 1, DimensionRule::SameAsChild(0), |v| -v[0]))?;
    catalog.register(pointwise("abs", 1, DimensionRule::SameAsChild(0), |v| v[0].abs()))?;
    catalog.register(pointwise("sign", 1, DimensionRule::NoDimension, sign))?;
    catalog.register(pointwise("pow", 2, DimensionRule::Custom(power_rule), |v| v[0].powf(v[1])))?;
    catalog.register(pointwise("log", 1, DimensionRule::Custom(log_rule), log))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::Node;
    use num_rational::Rational64;

    fn checked<'a>(node: &'a Node, dimension: &str) -> Checked<'a> {
        Checked {
            node,
            dimension: Dimension::parse(dimension),
        }
    }

    #[test]
    fn divide_by_zero_is_nan() {
        assert!(divide(&[1.0, 0.0]).is_nan());
        assert_eq!(divide(&[6.0, 3.0]), 2.0);
    }

    #[test]
    fn sign_values() {
        assert_eq!(sign(&[3.5]), 1.0);
        assert_eq!(sign(&[-0.1]), -1.0);
        assert_eq!(sign(&[0.0]), 0.0);
        assert!(sign(&[f64::NAN]).is_nan());
    }

    #[test]
    fn product_and_quotient_dimensions() {
        let leaf = Node::data("x", Dimension::unit("CNY"));
        let children = [checked(&leaf, "CNY"), checked(&leaf, "USD")];
        assert_eq!(product_rule(&children).unwrap().to_string(), "CNY USD");
        assert_eq!(quotient_rule(&children).unwrap().to_string(), "CNY // USD");
    }

    #[test]
    fn power_needs_constant_exponent() {
        let base = Node::data("x", Dimension::unit("CNY"));
        let half = Node::Constant(Rational64::new(1, 2));
        let children = [checked(&base, "CNY"), checked(&half, "")];
        assert_eq!(power_rule(&children).unwrap().to_string(), "CNY**1/2");

        let children = [checked(&base, "CNY"), checked(&base, "CNY")];
        assert!(power_rule(&children).is_err());
    }

    #[test]
    fn log_of_dimensioned_value_is_untracked() {
        let leaf = Node::data("x", Dimension::unit("CNY"));
        assert_eq!(log_rule(&[checked(&leaf, "CNY")]).unwrap(), Dimension::Blackhole);
        assert_eq!(log_rule(&[checked(&leaf, "")]).unwrap(), Dimension::dimensionless());
        assert_eq!(log_rule(&[checked(&leaf, "?")]).unwrap(), Dimension::Faceless);
    }
}
