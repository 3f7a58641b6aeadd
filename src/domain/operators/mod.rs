//! Operator library.
//!
//! Each operator pairs a dimension rule with a [`Kernel`], the numeric part of
//! its evaluation. Kernels pull their arguments through [`Args`], which lets
//! windowed kernels ask for an earlier start date before evaluating a child and
//! slice the result back to the requested window.

pub mod arithmetic;
pub mod cross_section;
pub mod rolling;
pub mod technical;

use crate::domain::catalog::OperatorCatalog;
use crate::domain::environment::Environment;
use crate::domain::error::{AlphaError, Direction};
use crate::domain::frame::Frame;
use crate::domain::gene::Gene;
use crate::domain::node::{ArgConstraint, Node};
use chrono::NaiveDate;
use num_rational::Rational64;
use num_traits::Signed;

/// Window lengths accepted by the library's windowed operators.
pub const DEFAULT_WINDOWS: &[&str] = &["1", "2", "3", "5", "10", "20", "30", "60", "120", "250"];

pub fn window_constraint() -> ArgConstraint {
    ArgConstraint::values(DEFAULT_WINDOWS.iter().copied())
}

pub trait Kernel: Send + Sync {
    fn eval(&self, args: &Args<'_>, date1: NaiveDate, date2: NaiveDate) -> Result<Frame, AlphaError>;
}

/// The arguments of one operator occurrence in a gene.
pub struct Args<'a> {
    operator: &'a str,
    env: &'a Environment,
    gene: &'a Gene,
    children: Vec<usize>,
}

impl<'a> Args<'a> {
    pub fn new(operator: &'a str, env: &'a Environment, gene: &'a Gene, children: Vec<usize>) -> Self {
        Self {
            operator,
            env,
            gene,
            children,
        }
    }

    pub fn operator(&self) -> &str {
        self.operator
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn position(&self, index: usize) -> Result<usize, AlphaError> {
        self.children.get(index).copied().ok_or_else(|| {
            AlphaError::eval(self.operator, format!("no argument {}", index))
        })
    }

    pub fn node(&self, index: usize) -> Result<&Node, AlphaError> {
        let position = self.position(index)?;
        self.gene
            .node(position)
            .ok_or_else(|| AlphaError::eval(self.operator, format!("no argument {}", index)))
    }

    /// Evaluate argument `index` over `[date1, date2]`.
    pub fn value(&self, index: usize, date1: NaiveDate, date2: NaiveDate) -> Result<Frame, AlphaError> {
        let position = self.position(index)?;
        self.gene.value_at(self.env, position, date1, date2)
    }

    /// Evaluate every argument over the same window.
    pub fn values(&self, date1: NaiveDate, date2: NaiveDate) -> Result<Vec<Frame>, AlphaError> {
        (0..self.len()).map(|i| self.value(i, date1, date2)).collect()
    }

    /// Literal value of argument `index`, which must be a constant.
    pub fn constant(&self, index: usize) -> Result<Rational64, AlphaError> {
        self.node(index)?.as_constant().ok_or_else(|| {
            AlphaError::eval(self.operator, format!("argument {} must be a constant", index))
        })
    }

    /// Window length held by argument `index`: a positive integer constant.
    pub fn window(&self, index: usize) -> Result<usize, AlphaError> {
        let value = self.constant(index)?;
        if !value.is_integer() || !value.is_positive() {
            return Err(AlphaError::eval(
                self.operator,
                format!("window must be a positive integer, got {}", value),
            ));
        }
        usize::try_from(value.to_integer())
            .map_err(|_| AlphaError::eval(self.operator, format!("window {} is too large", value)))
    }

    /// Evaluate argument `index` with `lookback` extra trading days before `date1`.
    ///
    /// The returned frame still starts `lookback` rows early; kernels compute on
    /// it and then slice with [`Frame::since`]. Fails with a range fault when the
    /// calendar has too little history.
    pub fn with_lookback(
        &self,
        index: usize,
        lookback: usize,
        date1: NaiveDate,
        date2: NaiveDate,
    ) -> Result<Frame, AlphaError> {
        let start = self.env.shift_date(date1, lookback, Direction::Backward)?;
        self.value(index, start, date2)
    }
}

/// Register the whole library.
pub fn register_defaults(catalog: &mut OperatorCatalog) -> Result<(), AlphaError> {
    arithmetic::register(catalog)?;
    cross_section::register(catalog)?;
    rolling::register(catalog)?;
    technical::register(catalog)?;
    Ok(())
}
