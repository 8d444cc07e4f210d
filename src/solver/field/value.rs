use nalgebra::{Matrix3, Vector3};
use num_traits::Zero;
use serde_json::Value;
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// Scalar, vector or tensor value stored in a field. Matrices and solvers
/// work component by component.
pub trait FieldValue:
    Copy
    + Debug
    + PartialEq
    + Zero
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + Mul<f64, Output = Self>
    + AddAssign
    + SubAssign
    + Send
    + Sync
    + 'static
{
    const N_COMPONENTS: usize;
    const TYPE_NAME: &'static str;

    fn component(&self, d: usize) -> f64;
    fn set_component(&mut self, d: usize, value: f64);

    fn splat(value: f64) -> Self {
        let mut v = Self::zero();
        for d in 0..Self::N_COMPONENTS {
            v.set_component(d, value);
        }
        v
    }

    fn from_components(values: &[f64]) -> Self {
        let mut v = Self::zero();
        for (d, &c) in values.iter().enumerate().take(Self::N_COMPONENTS) {
            v.set_component(d, c);
        }
        v
    }

    fn cmpt_multiply(&self, other: &Self) -> Self {
        let mut v = Self::zero();
        for d in 0..Self::N_COMPONENTS {
            v.set_component(d, self.component(d) * other.component(d));
        }
        v
    }

    fn cmpt_divide(&self, other: &Self) -> Self {
        let mut v = Self::zero();
        for d in 0..Self::N_COMPONENTS {
            v.set_component(d, self.component(d) / other.component(d));
        }
        v
    }

    fn cmpt_map(&self, f: impl Fn(f64) -> f64) -> Self {
        let mut v = *self;
        for d in 0..Self::N_COMPONENTS {
            v.set_component(d, f(self.component(d)));
        }
        v
    }

    fn mag(&self) -> f64 {
        (0..Self::N_COMPONENTS)
            .map(|d| self.component(d).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Accepts a bare number (splatted) or a list of `N_COMPONENTS` numbers.
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().map(Self::splat),
            Value::Array(items) if items.len() == Self::N_COMPONENTS => {
                let comps: Option<Vec<f64>> = items.iter().map(|v| v.as_f64()).collect();
                comps.map(|c| Self::from_components(&c))
            }
            _ => None,
        }
    }

    fn to_json(&self) -> Value {
        if Self::N_COMPONENTS == 1 {
            serde_json::json!(self.component(0))
        } else {
            Value::Array(
                (0..Self::N_COMPONENTS)
                    .map(|d| serde_json::json!(self.component(d)))
                    .collect(),
            )
        }
    }
}

impl FieldValue for f64 {
    const N_COMPONENTS: usize = 1;
    const TYPE_NAME: &'static str = "scalar";

    fn component(&self, _d: usize) -> f64 {
        *self
    }

    fn set_component(&mut self, _d: usize, value: f64) {
        *self = value;
    }

    fn splat(value: f64) -> Self {
        value
    }

    fn mag(&self) -> f64 {
        self.abs()
    }
}

impl FieldValue for Vector3<f64> {
    const N_COMPONENTS: usize = 3;
    const TYPE_NAME: &'static str = "vector";

    fn component(&self, d: usize) -> f64 {
        self[d]
    }

    fn set_component(&mut self, d: usize, value: f64) {
        self[d] = value;
    }

    fn mag(&self) -> f64 {
        self.norm()
    }
}

impl FieldValue for Matrix3<f64> {
    const N_COMPONENTS: usize = 9;
    const TYPE_NAME: &'static str = "tensor";

    // Row-major, xx xy xz yx ...
    fn component(&self, d: usize) -> f64 {
        self[(d / 3, d % 3)]
    }

    fn set_component(&mut self, d: usize, value: f64) {
        self[(d / 3, d % 3)] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_values() {
        let v: Vector3<f64> = FieldValue::from_json(&serde_json::json!([1.0, 2.0, 3.0])).unwrap();
        assert_eq!(v, Vector3::new(1.0, 2.0, 3.0));
        let s: f64 = FieldValue::from_json(&serde_json::json!(2.5)).unwrap();
        assert_eq!(s, 2.5);
        assert!(<Vector3<f64> as FieldValue>::from_json(&serde_json::json!([1.0])).is_none());

        let t: Matrix3<f64> = FieldValue::from_json(&serde_json::json!(1.0)).unwrap();
        assert_eq!(t.component(4), 1.0);
        assert_eq!(t.component(1), 1.0);
    }

    #[test]
    fn component_ops() {
        let a = Vector3::new(1.0, -2.0, 3.0);
        let b = Vector3::new(2.0, 2.0, 2.0);
        assert_eq!(a.cmpt_multiply(&b), Vector3::new(2.0, -4.0, 6.0));
        assert_eq!(a.cmpt_map(f64::abs), Vector3::new(1.0, 2.0, 3.0));
        assert!((FieldValue::mag(&a) - 14f64.sqrt()).abs() < 1e-14);
    }
}
