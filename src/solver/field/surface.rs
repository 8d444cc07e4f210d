use super::dimensioned::FieldOp;
use super::tmp::Tmp;
use super::value::FieldValue;
use crate::solver::mesh::FvMesh;
use crate::solver::units::{DimensionError, DimensionSet};

/// Face field: one value per internal face plus one list per patch.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceField<T> {
    pub name: String,
    pub dimensions: DimensionSet,
    pub internal: Vec<T>,
    pub boundary: Vec<Vec<T>>,
}

impl<T: FieldValue> SurfaceField<T> {
    pub fn new(name: &str, dimensions: DimensionSet, internal: Vec<T>, boundary: Vec<Vec<T>>) -> Self {
        Self {
            name: name.to_string(),
            dimensions,
            internal,
            boundary,
        }
    }

    pub fn uniform(name: &str, mesh: &FvMesh, dimensions: DimensionSet, value: T) -> Self {
        Self::new(
            name,
            dimensions,
            vec![value; mesh.num_internal_faces()],
            mesh.patches.iter().map(|p| vec![value; p.size()]).collect(),
        )
    }

    /// Evaluates `f(face)` on every face, with global face indices.
    pub fn from_fn(name: &str, mesh: &FvMesh, dimensions: DimensionSet, f: impl Fn(usize) -> T) -> Self {
        Self::new(
            name,
            dimensions,
            (0..mesh.num_internal_faces()).map(&f).collect(),
            mesh.patches.iter().map(|p| p.faces().map(&f).collect()).collect(),
        )
    }

    pub fn patch(&self, patch: usize) -> &[T] {
        &self.boundary[patch]
    }

    pub fn map<U: FieldValue>(&self, name: &str, dimensions: DimensionSet, f: impl Fn(T) -> U) -> SurfaceField<U> {
        SurfaceField::new(
            name,
            dimensions,
            self.internal.iter().map(|&v| f(v)).collect(),
            self.boundary
                .iter()
                .map(|b| b.iter().map(|&v| f(v)).collect())
                .collect(),
        )
    }

    pub fn combine(a: &Self, b: &Self, op: FieldOp) -> Result<Self, DimensionError> {
        let dims = op.dimensions(a.dimensions, b.dimensions)?;
        let apply = |x: T, y: T| op.apply(x, y);
        Ok(Self::new(
            &format!("({}{}{})", a.name, op.symbol(), b.name),
            dims,
            a.internal
                .iter()
                .zip(&b.internal)
                .map(|(&x, &y)| apply(x, y))
                .collect(),
            a.boundary
                .iter()
                .zip(&b.boundary)
                .map(|(pa, pb)| pa.iter().zip(pb).map(|(&x, &y)| apply(x, y)).collect())
                .collect(),
        ))
    }

    /// Like [`combine`](Self::combine), working in `a`'s storage while the
    /// handle is unique.
    pub fn combine_tmp(mut a: Tmp<Self>, b: &Self, op: FieldOp) -> Result<Tmp<Self>, DimensionError> {
        let dims = op.dimensions(a.dimensions, b.dimensions)?;
        let field = a.make_mut();
        for (x, &y) in field.internal.iter_mut().zip(&b.internal) {
            *x = op.apply(*x, y);
        }
        for (pa, pb) in field.boundary.iter_mut().zip(&b.boundary) {
            for (x, &y) in pa.iter_mut().zip(pb) {
                *x = op.apply(*x, y);
            }
        }
        field.name = format!("({}{}{})", field.name, op.symbol(), b.name);
        field.dimensions = dims;
        Ok(a)
    }

    pub fn try_add(&self, rhs: &Self) -> Result<Self, DimensionError> {
        Self::combine(self, rhs, FieldOp::Add)
    }

    pub fn try_sub(&self, rhs: &Self) -> Result<Self, DimensionError> {
        Self::combine(self, rhs, FieldOp::Subtract)
    }

    /// Multiplies by a scalar face field.
    pub fn scale(&self, s: &SurfaceField<f64>) -> Self {
        Self::new(
            &format!("({}*{})", s.name, self.name),
            s.dimensions * self.dimensions,
            self.internal
                .iter()
                .zip(&s.internal)
                .map(|(&v, &f)| v * f)
                .collect(),
            self.boundary
                .iter()
                .zip(&s.boundary)
                .map(|(pv, ps)| pv.iter().zip(ps).map(|(&v, &f)| v * f).collect())
                .collect(),
        )
    }

    pub fn component(&self, d: usize) -> SurfaceField<f64> {
        self.map(&format!("{}.component({})", self.name, d), self.dimensions, |v| {
            v.component(d)
        })
    }

    /// Value on global face `face`.
    pub fn face_value(&self, mesh: &FvMesh, face: usize) -> T {
        if face < self.internal.len() {
            return self.internal[face];
        }
        for (p, patch) in mesh.patches.iter().enumerate() {
            if patch.faces().contains(&face) {
                return self.boundary[p][face - patch.start];
            }
        }
        T::zero()
    }
}

impl SurfaceField<f64> {
    /// Total over every face; used for net boundary flux checks.
    pub fn boundary_sum(&self) -> f64 {
        self.boundary.iter().flatten().sum()
    }
}
