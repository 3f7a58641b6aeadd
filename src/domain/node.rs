//! Gene elements: constants, data references and operators.
//!
//! An operator is plain data. Its arity, dimension rule and per-argument
//! constraints are inspectable; only the numeric evaluation is delegated to a
//! shared [`Kernel`].

use crate::domain::dimension::Dimension;
use crate::domain::error::ValidationError;
use crate::domain::operators::Kernel;
use num_rational::Rational64;
use std::fmt;
use std::sync::Arc;

/// Parse an exact rational literal (`7`, `-2`, `1/3`).
///
/// The denominator must be positive and the numerator above `i64::MIN`, so
/// reducing the fraction cannot overflow.
pub fn parse_rational(text: &str) -> Option<Rational64> {
    let text = text.trim();
    let (numer, denom) = match text.split_once('/') {
        Some((numer, denom)) => (numer.parse::<i64>().ok()?, denom.parse::<i64>().ok()?),
        None => (text.parse::<i64>().ok()?, 1),
    };
    if denom <= 0 || numer == i64::MIN {
        return None;
    }
    Some(Rational64::new(numer, denom))
}

#[derive(Debug, Clone)]
pub enum Node {
    Constant(Rational64),
    Data { name: String, dimension: Dimension },
    Operator(Operator),
}

impl Node {
    pub fn data(name: &str, dimension: Dimension) -> Self {
        Node::Data {
            name: name.to_string(),
            dimension,
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Node::Constant(_) | Node::Data { .. } => 0,
            Node::Operator(op) => op.arity(),
        }
    }

    /// Canonical token: the literal, the series name or the operator name.
    pub fn token(&self) -> String {
        match self {
            Node::Constant(value) => value.to_string(),
            Node::Data { name, .. } => name.clone(),
            Node::Operator(op) => op.name().to_string(),
        }
    }

    /// XML element name.
    pub fn tag(&self) -> &'static str {
        match self {
            Node::Constant(_) => "Constant",
            Node::Data { .. } => "Data",
            Node::Operator(_) => "Operator",
        }
    }

    pub fn as_constant(&self) -> Option<Rational64> {
        match self {
            Node::Constant(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_operator(&self) -> Option<&Operator> {
        match self {
            Node::Operator(op) => Some(op),
            _ => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// A child that has been type-checked: the node at the root of its subtree and
/// the dimension inferred for the whole subtree.
#[derive(Debug, Clone)]
pub struct Checked<'g> {
    pub node: &'g Node,
    pub dimension: Dimension,
}

pub type DimensionFn = fn(&[Checked<'_>]) -> Result<Dimension, String>;

/// How an operator derives its output dimension from its children.
#[derive(Clone, Copy)]
pub enum DimensionRule {
    /// All non-Faceless children share one dimension, which is the result.
    SameAsAll,
    /// Always dimensionless (ranks, statistics).
    NoDimension,
    /// A copy of the designated child's dimension.
    SameAsChild(usize),
    Custom(DimensionFn),
}

impl fmt::Debug for DimensionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionRule::SameAsAll => write!(f, "SameAsAll"),
            DimensionRule::NoDimension => write!(f, "NoDimension"),
            DimensionRule::SameAsChild(i) => write!(f, "SameAsChild({})", i),
            DimensionRule::Custom(_) => write!(f, "Custom"),
        }
    }
}

impl DimensionRule {
    pub fn infer(
        &self,
        operator: &str,
        children: &[Checked<'_>],
    ) -> Result<Dimension, ValidationError> {
        match self {
            DimensionRule::SameAsAll => same_as_all(operator, children),
            DimensionRule::NoDimension => Ok(Dimension::dimensionless()),
            DimensionRule::SameAsChild(index) => children
                .get(*index)
                .map(|child| child.dimension.clone())
                .ok_or_else(|| ValidationError::Rule {
                    operator: operator.to_string(),
                    reason: format!("no argument {}", index),
                }),
            DimensionRule::Custom(rule) => rule(children).map_err(|reason| ValidationError::Rule {
                operator: operator.to_string(),
                reason,
            }),
        }
    }
}

fn same_as_all(operator: &str, children: &[Checked<'_>]) -> Result<Dimension, ValidationError> {
    if children.iter().any(|c| c.dimension.is_blackhole()) {
        return Ok(Dimension::Blackhole);
    }

    let mut common: Option<&Dimension> = None;
    for child in children.iter().filter(|c| !c.dimension.is_faceless()) {
        match common {
            None => common = Some(&child.dimension),
            Some(dimension) if *dimension == child.dimension => {}
            Some(dimension) => {
                return Err(ValidationError::Incompatible {
                    operator: operator.to_string(),
                    left: dimension.to_string(),
                    right: child.dimension.to_string(),
                });
            }
        }
    }
    Ok(common.cloned().unwrap_or(Dimension::Faceless))
}

/// Restrictions on one operator argument.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgConstraint {
    pub dimension: Option<Dimension>,
    pub values: Option<Vec<String>>,
}

impl ArgConstraint {
    pub fn dimension(text: &str) -> Self {
        Self {
            dimension: Some(Dimension::parse(text)),
            values: None,
        }
    }

    pub fn values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dimension: None,
            values: Some(values.into_iter().map(Into::into).collect()),
        }
    }

    /// Split a configured literal list on commas and whitespace.
    pub fn parse_values(text: &str) -> Vec<String> {
        text.split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.dimension.is_none() && self.values.is_none()
    }

    pub fn check(
        &self,
        operator: &str,
        index: usize,
        child: &Checked<'_>,
    ) -> Result<(), ValidationError> {
        if let Some(expected) = &self.dimension {
            if *expected != child.dimension {
                return Err(ValidationError::ArgumentDimension {
                    operator: operator.to_string(),
                    index,
                    expected: expected.to_string(),
                    found: child.dimension.to_string(),
                });
            }
        }

        if let Some(values) = &self.values {
            let allowed = match child.node {
                Node::Constant(value) => values
                    .iter()
                    .any(|literal| parse_rational(literal) == Some(*value)),
                Node::Data { name, .. } => values.iter().any(|literal| literal == name),
                Node::Operator(_) => false,
            };
            if !allowed {
                return Err(ValidationError::ArgumentValue {
                    operator: operator.to_string(),
                    index,
                    found: child.node.token(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct Operator {
    name: String,
    arity: usize,
    rule: DimensionRule,
    constraints: Vec<ArgConstraint>,
    kernel: Arc<dyn Kernel>,
}

impl Operator {
    pub fn new(name: &str, arity: usize, rule: DimensionRule, kernel: Arc<dyn Kernel>) -> Self {
        Self {
            name: name.to_string(),
            arity,
            rule,
            constraints: vec![ArgConstraint::default(); arity],
            kernel,
        }
    }

    pub fn with_constraint(mut self, index: usize, constraint: ArgConstraint) -> Self {
        if index < self.arity {
            self.constraints[index] = constraint;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn rule(&self) -> DimensionRule {
        self.rule
    }

    pub fn constraints(&self) -> &[ArgConstraint] {
        &self.constraints
    }

    pub fn constraint_mut(&mut self, index: usize) -> Option<&mut ArgConstraint> {
        self.constraints.get_mut(index)
    }

    pub fn kernel(&self) -> &dyn Kernel {
        self.kernel.as_ref()
    }

    /// Check every constrained argument, then infer the output dimension.
    pub fn check(&self, children: &[Checked<'_>]) -> Result<Dimension, ValidationError> {
        for (index, (constraint, child)) in self.constraints.iter().zip(children).enumerate() {
            constraint.check(&self.name, index, child)?;
        }
        self.rule.infer(&self.name, children)
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("rule", &self.rule)
            .field("constraints", &self.constraints)
            .finish()
    }
}
