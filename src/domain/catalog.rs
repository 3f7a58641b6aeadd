//! Operator catalog: prototypes keyed by name.
//!
//! Creating an operator node clones the prototype, so each node owns its own
//! copy of the argument constraints.

use crate::domain::error::AlphaError;
use crate::domain::node::{ArgConstraint, Operator};
use crate::domain::operators;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct OperatorCatalog {
    operators: BTreeMap<String, Operator>,
}

impl OperatorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog pre-populated with the operator library.
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        if let Err(err) = operators::register_defaults(&mut catalog) {
            tracing::error!(error = %err, "operator library registration failed");
        }
        catalog
    }

    pub fn register(&mut self, operator: Operator) -> Result<(), AlphaError> {
        if self.operators.contains_key(operator.name()) {
            return Err(AlphaError::Duplicate {
                kind: "operator",
                name: operator.name().to_string(),
            });
        }
        self.operators.insert(operator.name().to_string(), operator);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Operator> {
        self.operators.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    pub fn instantiate(&self, name: &str) -> Option<Operator> {
        self.operators.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.operators.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operator> {
        self.operators.values()
    }

    /// Replace the constraint on argument `index` of `name`.
    pub fn constrain(
        &mut self,
        name: &str,
        index: usize,
        constraint: ArgConstraint,
    ) -> Result<(), AlphaError> {
        let operator = self
            .operators
            .get_mut(name)
            .ok_or_else(|| AlphaError::Catalog {
                reason: format!("unknown operator '{}'", name),
            })?;
        let arity = operator.arity();
        let slot = operator
            .constraint_mut(index)
            .ok_or_else(|| AlphaError::Catalog {
                reason: format!("{} takes {} argument(s), no argument {}", name, arity, index),
            })?;
        *slot = constraint;
        Ok(())
    }
}
