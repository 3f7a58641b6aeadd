//! Physical dimensions: the static type of every expression.
//!
//! An ordinary dimension is a product of named units raised to exact rational
//! powers, e.g. `CNY**2 // USD`. Two sentinels sit outside the group:
//! - `Faceless` (`?`): unknown dimension, an identity under `*` and `/`
//! - `Blackhole` (`*`): untracked dimension, absorbing under every operation
//!
//! The unit map never stores a zero exponent, so the canonical string form and
//! structural equality coincide. Exponents are arbitrary precision, so no chain
//! of products and powers can overflow.

use num_bigint::BigInt;
use num_rational::{BigRational, Rational64};
use num_traits::{One, Signed, Zero};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Div, Mul};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dimension {
    Units(BTreeMap<String, BigRational>),
    Faceless,
    Blackhole,
}

impl Default for Dimension {
    fn default() -> Self {
        Dimension::dimensionless()
    }
}

impl Dimension {
    pub fn dimensionless() -> Self {
        Dimension::Units(BTreeMap::new())
    }

    pub fn unit(name: &str) -> Self {
        let mut units = BTreeMap::new();
        units.insert(name.to_string(), BigRational::one());
        Dimension::Units(units)
    }

    /// Parse `unit unit**p/q // unit`; `?` is Faceless and `*` is Blackhole.
    ///
    /// Parsing never fails: a token whose exponent does not parse is taken as a
    /// unit name with exponent 1, and a zero exponent contributes nothing.
    pub fn parse(text: &str) -> Self {
        match text.trim() {
            "?" => return Dimension::Faceless,
            "*" => return Dimension::Blackhole,
            _ => {}
        }

        let mut units: BTreeMap<String, BigRational> = BTreeMap::new();
        let mut denominator = false;
        for token in text.split_whitespace() {
            if token == "//" {
                denominator = true;
                continue;
            }
            let (name, exponent) = split_power(token);
            if exponent.is_zero() {
                continue;
            }
            let entry = units.entry(name.to_string()).or_insert_with(BigRational::zero);
            if denominator {
                *entry -= exponent;
            } else {
                *entry += exponent;
            }
        }
        units.retain(|_, e| !e.is_zero());
        Dimension::Units(units)
    }

    pub fn is_faceless(&self) -> bool {
        matches!(self, Dimension::Faceless)
    }

    pub fn is_blackhole(&self) -> bool {
        matches!(self, Dimension::Blackhole)
    }

    /// False only for the dimensionless identity.
    pub fn is_truthy(&self) -> bool {
        match self {
            Dimension::Units(units) => !units.is_empty(),
            Dimension::Faceless | Dimension::Blackhole => true,
        }
    }

    /// Exponent of `unit`, zero when absent. Sentinels report zero.
    pub fn exponent(&self, unit: &str) -> BigRational {
        match self {
            Dimension::Units(units) => units.get(unit).cloned().unwrap_or_else(BigRational::zero),
            _ => BigRational::zero(),
        }
    }

    pub fn power(&self, exponent: Rational64) -> Dimension {
        match self {
            Dimension::Units(units) => {
                if exponent.is_zero() {
                    return Dimension::dimensionless();
                }
                let exponent = widen(exponent);
                Dimension::Units(
                    units
                        .iter()
                        .map(|(unit, e)| (unit.clone(), e * &exponent))
                        .collect(),
                )
            }
            sentinel => sentinel.clone(),
        }
    }

    fn combine(&self, other: &Dimension, divide: bool) -> Dimension {
        match (self, other) {
            (Dimension::Blackhole, _) | (_, Dimension::Blackhole) => Dimension::Blackhole,
            (Dimension::Faceless, other) => other.clone(),
            (this, Dimension::Faceless) => this.clone(),
            (Dimension::Units(left), Dimension::Units(right)) => {
                let mut units = left.clone();
                for (unit, exponent) in right {
                    let entry = units.entry(unit.clone()).or_insert_with(BigRational::zero);
                    if divide {
                        *entry -= exponent;
                    } else {
                        *entry += exponent;
                    }
                }
                units.retain(|_, e| !e.is_zero());
                Dimension::Units(units)
            }
        }
    }
}

fn widen(value: Rational64) -> BigRational {
    BigRational::new(BigInt::from(*value.numer()), BigInt::from(*value.denom()))
}

/// Split off a trailing `**p/q`; anything else is a unit name with exponent 1.
fn split_power(token: &str) -> (&str, BigRational) {
    if let Some((name, exponent)) = token.rsplit_once("**") {
        if !name.is_empty() {
            if let Ok(value) = exponent.parse::<BigRational>() {
                return (name, value);
            }
        }
    }
    (token, BigRational::one())
}

fn write_term(f: &mut fmt::Formatter<'_>, unit: &str, exponent: &BigRational) -> fmt::Result {
    if exponent.is_one() {
        write!(f, "{}", unit)
    } else {
        write!(f, "{}**{}", unit, exponent)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = match self {
            Dimension::Faceless => return write!(f, "?"),
            Dimension::Blackhole => return write!(f, "*"),
            Dimension::Units(units) => units,
        };

        let mut first = true;
        for (unit, exponent) in units.iter().filter(|(_, e)| e.is_positive()) {
            if !first {
                write!(f, " ")?;
            }
            write_term(f, unit, exponent)?;
            first = false;
        }

        let mut denominator = units.iter().filter(|(_, e)| e.is_negative()).peekable();
        if denominator.peek().is_some() {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "//")?;
            for (unit, exponent) in denominator {
                write!(f, " ")?;
                write_term(f, unit, &-exponent)?;
            }
        }
        Ok(())
    }
}

impl FromStr for Dimension {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Dimension::parse(s))
    }
}

impl Mul for &Dimension {
    type Output = Dimension;

    fn mul(self, rhs: &Dimension) -> Dimension {
        self.combine(rhs, false)
    }
}

impl Div for &Dimension {
    type Output = Dimension;

    fn div(self, rhs: &Dimension) -> Dimension {
        self.combine(rhs, true)
    }
}

impl Mul for Dimension {
    type Output = Dimension;

    fn mul(self, rhs: Dimension) -> Dimension {
        &self * &rhs
    }
}

impl Div for Dimension {
    type Output = Dimension;

    fn div(self, rhs: Dimension) -> Dimension {
        &self / &rhs
    }
}
