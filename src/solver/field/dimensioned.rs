use super::value::FieldValue;
use crate::solver::units::{DimensionError, DimensionSet, Dimensioned};
use std::ops::{Add, Neg, Sub};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl FieldOp {
    pub fn symbol(self) -> &'static str {
        match self {
            FieldOp::Add => "+",
            FieldOp::Subtract => "-",
            FieldOp::Multiply => "*",
            FieldOp::Divide => "/",
        }
    }

    /// Dimensions of `lhs op rhs`.
    pub fn dimensions(self, lhs: DimensionSet, rhs: DimensionSet) -> Result<DimensionSet, DimensionError> {
        match self {
            FieldOp::Add | FieldOp::Subtract => lhs.check_same(rhs, self.symbol()),
            FieldOp::Multiply => Ok(lhs * rhs),
            FieldOp::Divide => Ok(lhs / rhs),
        }
    }

    pub(super) fn apply<T: FieldValue>(self, a: T, b: T) -> T {
        match self {
            FieldOp::Add => a + b,
            FieldOp::Subtract => a - b,
            FieldOp::Multiply => a.cmpt_multiply(&b),
            FieldOp::Divide => a.cmpt_divide(&b),
        }
    }
}

/// Named values with physical dimensions, one per cell (or face).
#[derive(Clone, Debug, PartialEq)]
pub struct DimensionedField<T> {
    pub name: String,
    pub dimensions: DimensionSet,
    pub values: Vec<T>,
}

impl<T: FieldValue> DimensionedField<T> {
    pub fn new(name: &str, dimensions: DimensionSet, values: Vec<T>) -> Self {
        Self {
            name: name.to_string(),
            dimensions,
            values,
        }
    }

    pub fn uniform(name: &str, dimensions: DimensionSet, n: usize, value: T) -> Self {
        Self::new(name, dimensions, vec![value; n])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `a op b`, component-wise, with dimension checking.
    pub fn combine(a: &Self, b: &Self, op: FieldOp) -> Result<Self, DimensionError> {
        let dims = op.dimensions(a.dimensions, b.dimensions)?;
        assert_eq!(a.len(), b.len(), "field sizes differ in {}", op.symbol());
        let values = a
            .values
            .iter()
            .zip(&b.values)
            .map(|(&x, &y)| op.apply(x, y))
            .collect();
        Ok(Self::new(
            &format!("({}{}{})", a.name, op.symbol(), b.name),
            dims,
            values,
        ))
    }

    pub fn try_add(&self, rhs: &Self) -> Result<Self, DimensionError> {
        Self::combine(self, rhs, FieldOp::Add)
    }

    pub fn try_sub(&self, rhs: &Self) -> Result<Self, DimensionError> {
        Self::combine(self, rhs, FieldOp::Subtract)
    }

    /// Multiplies every value by a scalar field.
    pub fn scale(&self, s: &DimensionedField<f64>) -> Self {
        assert_eq!(self.len(), s.len(), "field sizes differ in *");
        Self::new(
            &format!("({}*{})", s.name, self.name),
            s.dimensions * self.dimensions,
            self.values
                .iter()
                .zip(&s.values)
                .map(|(&v, &f)| v * f)
                .collect(),
        )
    }

    pub fn scale_by(&self, c: &Dimensioned<f64>) -> Self {
        Self::new(
            &format!("({}*{})", c.name, self.name),
            c.dimensions * self.dimensions,
            self.values.iter().map(|&v| v * c.value).collect(),
        )
    }

    pub fn add_constant(&self, c: &Dimensioned<T>) -> Result<Self, DimensionError> {
        let dims = self.dimensions.check_same(c.dimensions, "+")?;
        Ok(Self::new(
            &format!("({}+{})", self.name, c.name),
            dims,
            self.values.iter().map(|&v| v + c.value).collect(),
        ))
    }

    pub fn mag(&self) -> DimensionedField<f64> {
        DimensionedField::new(
            &format!("mag({})", self.name),
            self.dimensions,
            self.values.iter().map(|v| v.mag()).collect(),
        )
    }

    pub fn component(&self, d: usize) -> DimensionedField<f64> {
        DimensionedField::new(
            &format!("{}.component({})", self.name, d),
            self.dimensions,
            self.values.iter().map(|v| v.component(d)).collect(),
        )
    }

    /// `sum(w * v) / sum(w)`.
    pub fn weighted_average(&self, weights: &[f64]) -> T {
        let mut sum = T::zero();
        let mut wsum = 0.0;
        for (&v, &w) in self.values.iter().zip(weights) {
            sum += v * w;
            wsum += w;
        }
        if wsum > 0.0 {
            sum * (1.0 / wsum)
        } else {
            T::zero()
        }
    }
}

impl DimensionedField<f64> {
    pub fn sqrt(&self) -> Self {
        Self::new(
            &format!("sqrt({})", self.name),
            self.dimensions.sqrt(),
            self.values.iter().map(|v| v.sqrt()).collect(),
        )
    }

    /// `self^(num/den)`.
    pub fn pow(&self, num: i32, den: i32) -> Self {
        let e = num as f64 / den as f64;
        Self::new(
            &format!("pow({},{}/{})", self.name, num, den),
            self.dimensions.pow_ratio(num, den),
            self.values.iter().map(|v| v.powf(e)).collect(),
        )
    }

    pub fn exp(&self) -> Result<Self, DimensionError> {
        self.dimensions.ensure_dimensionless("exp")?;
        Ok(Self::new(
            &format!("exp({})", self.name),
            DimensionSet::dimensionless(),
            self.values.iter().map(|v| v.exp()).collect(),
        ))
    }

    pub fn log(&self) -> Result<Self, DimensionError> {
        self.dimensions.ensure_dimensionless("log")?;
        Ok(Self::new(
            &format!("log({})", self.name),
            DimensionSet::dimensionless(),
            self.values.iter().map(|v| v.ln()).collect(),
        ))
    }

    pub fn reciprocal(&self) -> Self {
        Self::new(
            &format!("(1|{})", self.name),
            self.dimensions.inv(),
            self.values.iter().map(|v| 1.0 / v).collect(),
        )
    }
}

fn fatal<T>(result: Result<T, DimensionError>) -> T {
    result.unwrap_or_else(|e| panic!("{}", e))
}

impl<T: FieldValue> Add for &DimensionedField<T> {
    type Output = DimensionedField<T>;

    /// Panics on a dimension mismatch; use [`DimensionedField::try_add`] to recover.
    fn add(self, rhs: Self) -> DimensionedField<T> {
        fatal(self.try_add(rhs))
    }
}

impl<T: FieldValue> Sub for &DimensionedField<T> {
    type Output = DimensionedField<T>;

    fn sub(self, rhs: Self) -> DimensionedField<T> {
        fatal(self.try_sub(rhs))
    }
}

impl<T: FieldValue> Neg for &DimensionedField<T> {
    type Output = DimensionedField<T>;

    fn neg(self) -> DimensionedField<T> {
        DimensionedField::new(
            &format!("-{}", self.name),
            self.dimensions,
            self.values.iter().map(|&v| -v).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::units::si;

    #[test]
    fn product_and_quotient_dimensions() {
        let u = DimensionedField::uniform("U", si::VELOCITY, 3, 2.0);
        let t = DimensionedField::uniform("t", si::TIME, 3, 4.0);
        let l = DimensionedField::combine(&u, &t, FieldOp::Multiply).unwrap();
        assert_eq!(l.dimensions, si::LENGTH);
        assert_eq!(l.values, vec![8.0; 3]);
        let back = DimensionedField::combine(&l, &t, FieldOp::Divide).unwrap();
        assert_eq!(back.dimensions, si::VELOCITY);
    }

    #[test]
    fn mismatch_reports_both_sides() {
        let p = DimensionedField::uniform("p", si::PRESSURE, 2, 1.0);
        let u = DimensionedField::uniform("U", si::VELOCITY, 2, 1.0);
        let err = p.try_add(&u).unwrap_err();
        match &err {
            DimensionError::Mismatch { operation, lhs, rhs } => {
                assert_eq!(operation, "+");
                assert_eq!(*lhs, si::PRESSURE);
                assert_eq!(*rhs, si::VELOCITY);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    #[should_panic]
    fn operator_sugar_is_fatal() {
        let p = DimensionedField::uniform("p", si::PRESSURE, 2, 1.0);
        let u = DimensionedField::uniform("U", si::VELOCITY, 2, 1.0);
        let _ = &p - &u;
    }

    #[test]
    fn transcendental_needs_dimensionless() {
        let x = DimensionedField::uniform("x", si::DIMENSIONLESS, 1, 0.0);
        assert_eq!(x.exp().unwrap().values, vec![1.0]);
        let l = DimensionedField::uniform("L", si::LENGTH, 1, 4.0);
        assert!(matches!(l.log(), Err(DimensionError::NotDimensionless { .. })));
        let area = DimensionedField::uniform("A", si::AREA, 1, 4.0);
        let side = area.sqrt();
        assert_eq!(side.dimensions, si::LENGTH);
        assert_eq!(side.values, vec![2.0]);
        assert_eq!(area.pow(3, 2).dimensions, si::VOLUME);
    }
}
