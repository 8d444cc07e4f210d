//! Dimension sets and dimensioned constants.

pub use fvcore_dims::{si, DimensionError, DimensionSet, Exponent};

use serde_json::Value;
use std::fmt;

/// A named constant carrying physical dimensions, e.g. a diffusivity `nu`.
#[derive(Clone, Debug, PartialEq)]
pub struct Dimensioned<T> {
    pub name: String,
    pub dimensions: DimensionSet,
    pub value: T,
}

impl<T> Dimensioned<T> {
    pub fn new(name: &str, dimensions: DimensionSet, value: T) -> Self {
        Self {
            name: name.to_string(),
            dimensions,
            value,
        }
    }
}

impl Dimensioned<f64> {
    pub fn scalar(name: &str, dimensions: DimensionSet, value: f64) -> Self {
        Self::new(name, dimensions, value)
    }

    pub fn dimensionless(name: &str, value: f64) -> Self {
        Self::new(name, DimensionSet::dimensionless(), value)
    }

    pub fn try_add(&self, rhs: &Self) -> Result<Self, DimensionError> {
        let dims = self.dimensions.check_same(rhs.dimensions, "+")?;
        Ok(Self::new(
            &format!("({}+{})", self.name, rhs.name),
            dims,
            self.value + rhs.value,
        ))
    }

    pub fn try_sub(&self, rhs: &Self) -> Result<Self, DimensionError> {
        let dims = self.dimensions.check_same(rhs.dimensions, "-")?;
        Ok(Self::new(
            &format!("({}-{})", self.name, rhs.name),
            dims,
            self.value - rhs.value,
        ))
    }

    pub fn mul(&self, rhs: &Self) -> Self {
        Self::new(
            &format!("({}*{})", self.name, rhs.name),
            self.dimensions * rhs.dimensions,
            self.value * rhs.value,
        )
    }

    pub fn div(&self, rhs: &Self) -> Self {
        Self::new(
            &format!("({}|{})", self.name, rhs.name),
            self.dimensions / rhs.dimensions,
            self.value / rhs.value,
        )
    }

    pub fn sqrt(&self) -> Self {
        Self::new(
            &format!("sqrt({})", self.name),
            self.dimensions.sqrt(),
            self.value.sqrt(),
        )
    }

    pub fn exp(&self) -> Result<Self, DimensionError> {
        self.dimensions.ensure_dimensionless("exp")?;
        Ok(Self::dimensionless(
            &format!("exp({})", self.name),
            self.value.exp(),
        ))
    }

    pub fn ln(&self) -> Result<Self, DimensionError> {
        self.dimensions.ensure_dimensionless("log")?;
        Ok(Self::dimensionless(
            &format!("log({})", self.name),
            self.value.ln(),
        ))
    }

    /// Parses `[dims..] value` as written in dictionaries: either a bare number
    /// (dimensions taken from `expected`) or `{"dimensions": [...], "value": x}`.
    pub fn from_json(name: &str, expected: DimensionSet, value: &Value) -> Result<Self, DimensionError> {
        match value {
            Value::Object(map) => {
                let dims = match map.get("dimensions").and_then(|d| d.as_array()) {
                    Some(list) => {
                        let exps: Vec<f64> = list.iter().filter_map(|v| v.as_f64()).collect();
                        DimensionSet::from_exponents(&exps)?
                    }
                    None => expected,
                };
                dims.check_same(expected, name)?;
                let v = map.get("value").and_then(|v| v.as_f64()).unwrap_or(0.0);
                Ok(Self::new(name, dims, v))
            }
            other => Ok(Self::new(name, expected, other.as_f64().unwrap_or(0.0))),
        }
    }
}

impl<T: fmt::Debug> fmt::Display for Dimensioned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {:?}", self.name, self.dimensions.exponent_list(), self.value)
    }
}
