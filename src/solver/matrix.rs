//! LDU-addressed finite-volume matrix.
//!
//! `upper[f]` couples the owner row of face `f` to its neighbour and
//! `lower[f]` the neighbour row to its owner; `lower == None` means the two
//! are equal. Per-patch `internal_coeffs` are added to the diagonal when the
//! system is built; `boundary_coeffs` go to the source on uncoupled patches
//! and become interface coefficients on coupled ones.

use crate::solver::boundary::EvalContext;
use crate::solver::error::FvError;
use crate::solver::field::{DimensionedField, FieldError, FieldOp, FieldValue, SurfaceField, Tmp, VolField};
use crate::solver::fvc::patch_neighbour_values;
use crate::solver::linear_solver::{
    self, CsrMatrix, Interface, InterfaceKind, LinearSolverControls, LinearSystem, SolverPerformance,
};
use crate::solver::mesh::{Coupling, FvMesh};
use crate::solver::parallel::{CommError, Communicator};
use crate::solver::units::{si, DimensionError, DimensionSet};
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct FvMatrix<T: FieldValue> {
    mesh: Arc<FvMesh>,
    psi_name: String,
    psi_dimensions: DimensionSet,
    /// Dimensions of each row, i.e. of the volume-integrated equation.
    dimensions: DimensionSet,
    pub diag: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Option<Vec<f64>>,
    pub source: Vec<T>,
    pub internal_coeffs: Vec<Vec<T>>,
    pub boundary_coeffs: Vec<Vec<T>>,
    /// Explicit non-orthogonal part of the face flux.
    pub face_flux_correction: Option<Tmp<SurfaceField<T>>>,
}

fn cmpt_av<T: FieldValue>(v: &T) -> f64 {
    (0..T::N_COMPONENTS).map(|d| v.component(d)).sum::<f64>() / T::N_COMPONENTS as f64
}

/// `U` -> `Ux`, `Uy`, `Uz`; scalars keep their name.
pub fn component_name(name: &str, n_components: usize, d: usize) -> String {
    const VECTOR: [&str; 3] = ["x", "y", "z"];
    const TENSOR: [&str; 9] = ["xx", "xy", "xz", "yx", "yy", "yz", "zx", "zy", "zz"];
    match n_components {
        1 => name.to_string(),
        3 => format!("{}{}", name, VECTOR[d]),
        9 => format!("{}{}", name, TENSOR[d]),
        _ => format!("{}.component({})", name, d),
    }
}

impl<T: FieldValue> FvMatrix<T> {
    /// Empty matrix for `psi` with equation dimensions `dimensions`.
    pub fn new(psi: &VolField<T>, dimensions: DimensionSet) -> Self {
        let mesh = Arc::clone(psi.mesh());
        let n_cells = mesh.num_cells();
        let n_faces = mesh.num_internal_faces();
        let internal_coeffs = mesh.patches.iter().map(|p| vec![T::zero(); p.size()]).collect();
        let boundary_coeffs = mesh.patches.iter().map(|p| vec![T::zero(); p.size()]).collect();
        Self {
            psi_name: psi.name().to_string(),
            psi_dimensions: psi.dimensions(),
            dimensions,
            diag: vec![0.0; n_cells],
            upper: vec![0.0; n_faces],
            lower: None,
            source: vec![T::zero(); n_cells],
            internal_coeffs,
            boundary_coeffs,
            face_flux_correction: None,
            mesh,
        }
    }

    pub fn mesh(&self) -> &Arc<FvMesh> {
        &self.mesh
    }

    pub fn psi_name(&self) -> &str {
        &self.psi_name
    }

    pub fn dimensions(&self) -> DimensionSet {
        self.dimensions
    }

    pub fn is_symmetric(&self) -> bool {
        self.lower.is_none()
    }

    pub fn lower(&self) -> &[f64] {
        self.lower.as_deref().unwrap_or(&self.upper)
    }

    /// Separate lower coefficients, copied from `upper` on first use.
    pub fn lower_mut(&mut self) -> &mut Vec<f64> {
        let upper = &self.upper;
        self.lower.get_or_insert_with(|| upper.clone())
    }

    /// `diag[owner] -= lower`, `diag[neighbour] -= upper`.
    pub fn neg_sum_diag(&mut self) {
        let lower = self.lower.as_deref().unwrap_or(&self.upper);
        for f in 0..self.upper.len() {
            self.diag[self.mesh.owner[f]] -= lower[f];
            self.diag[self.mesh.neighbour[f]] -= self.upper[f];
        }
    }

    /// Both matrices must address the same mesh instance and field.
    fn check(&self, rhs: &Self, operation: &'static str) -> Result<(), FieldError> {
        if !Arc::ptr_eq(&self.mesh, &rhs.mesh) {
            return Err(FieldError::MeshMismatch {
                operation,
                lhs: self.psi_name.clone(),
                rhs: rhs.psi_name.clone(),
            });
        }
        if self.psi_name != rhs.psi_name {
            return Err(FieldError::FieldMismatch {
                operation,
                lhs: self.psi_name.clone(),
                rhs: rhs.psi_name.clone(),
            });
        }
        self.dimensions.check_same(rhs.dimensions, operation)?;
        Ok(())
    }

    /// `self += rhs`, checking mesh, field and dimensions.
    pub fn add_matrix(&mut self, rhs: &Self) -> Result<(), FieldError> {
        self.combine(rhs, 1.0, "+")
    }

    /// `self -= rhs`, checking mesh, field and dimensions.
    pub fn sub_matrix(&mut self, rhs: &Self) -> Result<(), FieldError> {
        self.combine(rhs, -1.0, "-")
    }

    fn combine(&mut self, rhs: &Self, sign: f64, operation: &'static str) -> Result<(), FieldError> {
        self.check(rhs, operation)?;

        for (a, b) in self.diag.iter_mut().zip(&rhs.diag) {
            *a += sign * b;
        }
        match (&mut self.lower, &rhs.lower) {
            (Some(lower), _) => {
                for (a, b) in lower.iter_mut().zip(rhs.lower()) {
                    *a += sign * b;
                }
            }
            (None, Some(rhs_lower)) => {
                let mut lower = self.upper.clone();
                for (a, b) in lower.iter_mut().zip(rhs_lower) {
                    *a += sign * b;
                }
                self.lower = Some(lower);
            }
            (None, None) => {}
        }
        for (a, b) in self.upper.iter_mut().zip(&rhs.upper) {
            *a += sign * b;
        }
        for (a, &b) in self.source.iter_mut().zip(&rhs.source) {
            *a += b * sign;
        }
        for (pa, pb) in self.internal_coeffs.iter_mut().zip(&rhs.internal_coeffs) {
            for (a, &b) in pa.iter_mut().zip(pb) {
                *a += b * sign;
            }
        }
        for (pa, pb) in self.boundary_coeffs.iter_mut().zip(&rhs.boundary_coeffs) {
            for (a, &b) in pa.iter_mut().zip(pb) {
                *a += b * sign;
            }
        }
        if let Some(rhs_corr) = &rhs.face_flux_correction {
            let scaled = rhs_corr.map(&rhs_corr.name, rhs_corr.dimensions, |v| v * sign);
            self.face_flux_correction = Some(match self.face_flux_correction.take() {
                Some(corr) => SurfaceField::combine_tmp(corr, &scaled, FieldOp::Add)?,
                None => Tmp::new(scaled),
            });
        }
        Ok(())
    }

    pub fn try_add(mut self, rhs: &Self) -> Result<Self, FieldError> {
        self.add_matrix(rhs)?;
        Ok(self)
    }

    pub fn try_sub(mut self, rhs: &Self) -> Result<Self, FieldError> {
        self.sub_matrix(rhs)?;
        Ok(self)
    }

    pub fn negate(&mut self) {
        for v in self.diag.iter_mut().chain(self.upper.iter_mut()) {
            *v = -*v;
        }
        if let Some(lower) = &mut self.lower {
            for v in lower.iter_mut() {
                *v = -*v;
            }
        }
        for v in self.source.iter_mut() {
            *v = -*v;
        }
        for v in self
            .internal_coeffs
            .iter_mut()
            .chain(self.boundary_coeffs.iter_mut())
            .flatten()
        {
            *v = -*v;
        }
        if let Some(corr) = &mut self.face_flux_correction {
            let corr = corr.make_mut();
            for v in corr.internal.iter_mut().chain(corr.boundary.iter_mut().flatten()) {
                *v = -*v;
            }
        }
    }

    fn check_source(&self, su: &DimensionedField<T>, operation: &str) -> Result<(), DimensionError> {
        (su.dimensions * si::VOLUME)
            .check_same(self.dimensions, operation)
            .map(|_| ())
    }

    /// Adds an explicit term `su` to the left-hand side (`fvm + su`).
    pub fn add_source(&mut self, su: &DimensionedField<T>) -> Result<(), DimensionError> {
        self.check_source(su, "+")?;
        for ((s, &v), &vol) in self.source.iter_mut().zip(&su.values).zip(&self.mesh.cell_volumes) {
            *s -= v * vol;
        }
        Ok(())
    }

    /// Subtracts an explicit term (`fvm - su`).
    pub fn sub_source(&mut self, su: &DimensionedField<T>) -> Result<(), DimensionError> {
        self.check_source(su, "-")?;
        for ((s, &v), &vol) in self.source.iter_mut().zip(&su.values).zip(&self.mesh.cell_volumes) {
            *s += v * vol;
        }
        Ok(())
    }

    /// `fvm == su`: the equation's right-hand side.
    pub fn equals(mut self, su: &DimensionedField<T>) -> Result<Self, DimensionError> {
        self.check_source(su, "==")?;
        for ((s, &v), &vol) in self.source.iter_mut().zip(&su.values).zip(&self.mesh.cell_volumes) {
            *s += v * vol;
        }
        Ok(self)
    }

    /// `fvm == other`: moves `other` to the left-hand side.
    pub fn equals_matrix(self, other: &Self) -> Result<Self, FieldError> {
        self.try_sub(other)
    }

    /// Diagonal including the component average of the boundary internal
    /// coefficients.
    pub fn d(&self) -> Vec<f64> {
        let mut d = self.diag.clone();
        for (patch, coeffs) in self.mesh.patches.iter().zip(&self.internal_coeffs) {
            for (&c, ic) in patch.face_cells.iter().zip(coeffs) {
                d[c] += cmpt_av(ic);
            }
        }
        d
    }

    /// `D / V`.
    pub fn a(&self) -> DimensionedField<f64> {
        let values = self
            .d()
            .into_iter()
            .zip(&self.mesh.cell_volumes)
            .map(|(d, &v)| d / v)
            .collect();
        DimensionedField::new(
            &format!("A({})", self.psi_name),
            self.dimensions / self.psi_dimensions / si::VOLUME,
            values,
        )
    }

    /// Off-diagonal and source part: `(b - sum_N a_N psi_N) / V`, so that a
    /// solution satisfies `psi = H / A`.
    pub fn h(&self, psi: &VolField<T>) -> DimensionedField<T> {
        let mesh = &self.mesh;
        let x = psi.values();
        let mut h = vec![T::zero(); mesh.num_cells()];

        for (patch, coeffs) in mesh.patches.iter().zip(&self.internal_coeffs) {
            for (&c, ic) in patch.face_cells.iter().zip(coeffs) {
                h[c] += (T::splat(cmpt_av(ic)) - *ic).cmpt_multiply(&x[c]);
            }
        }

        let lower = self.lower();
        for f in 0..self.upper.len() {
            let (o, n) = (mesh.owner[f], mesh.neighbour[f]);
            h[o] -= x[n] * self.upper[f];
            h[n] -= x[o] * lower[f];
        }

        for (hi, &s) in h.iter_mut().zip(&self.source) {
            *hi += s;
        }
        self.add_boundary_source(psi, &mut h, true);

        for (hi, &v) in h.iter_mut().zip(&mesh.cell_volumes) {
            *hi = *hi * (1.0 / v);
        }
        DimensionedField::new(&format!("H({})", self.psi_name), self.dimensions / si::VOLUME, h)
    }

    /// Adds the boundary source; with `couples`, coupled patches contribute
    /// their coefficients times the current neighbour values.
    fn add_boundary_source(&self, psi: &VolField<T>, b: &mut [T], couples: bool) {
        for (patch, coeffs) in self.mesh.patches.iter().zip(&self.boundary_coeffs) {
            if patch.is_coupled() {
                if !couples {
                    continue;
                }
                if let Some(nbr) = patch_neighbour_values(psi, patch.index) {
                    for ((&c, bc), n) in patch.face_cells.iter().zip(coeffs).zip(&nbr) {
                        b[c] += bc.cmpt_multiply(n);
                    }
                }
            } else {
                for (&c, &bc) in patch.face_cells.iter().zip(coeffs) {
                    b[c] += bc;
                }
            }
        }
    }

    /// Face flux implied by the matrix coefficients for `psi`.
    pub fn flux(&self, psi: &VolField<T>) -> SurfaceField<T> {
        let mesh = &self.mesh;
        let x = psi.values();
        let lower = self.lower();
        let internal = (0..self.upper.len())
            .map(|f| x[mesh.neighbour[f]] * self.upper[f] - x[mesh.owner[f]] * lower[f])
            .collect();
        let boundary = mesh
            .patches
            .iter()
            .map(|patch| {
                let ic = &self.internal_coeffs[patch.index];
                let bc = &self.boundary_coeffs[patch.index];
                let nbr = patch_neighbour_values(psi, patch.index);
                (0..patch.size())
                    .map(|i| {
                        let own = ic[i].cmpt_multiply(&x[patch.face_cells[i]]);
                        match &nbr {
                            Some(nbr) => own - bc[i].cmpt_multiply(&nbr[i]),
                            None => own - bc[i],
                        }
                    })
                    .collect()
            })
            .collect();
        let mut flux = SurfaceField::new(
            &format!("flux({})", self.psi_name),
            self.dimensions,
            internal,
            boundary,
        );
        if let Some(corr) = &self.face_flux_correction {
            for (v, &c) in flux.internal.iter_mut().zip(&corr.internal) {
                *v += c;
            }
            for (pv, pc) in flux.boundary.iter_mut().zip(&corr.boundary) {
                for (v, &c) in pv.iter_mut().zip(pc) {
                    *v += c;
                }
            }
        }
        flux
    }

    /// Implicit under-relaxation: `D' = D / alpha`,
    /// `source += (D' - D) psi`, with `D` including the boundary diagonal.
    /// Factors outside `(0, 1]` leave the matrix unchanged.
    pub fn relax(&mut self, psi: &VolField<T>, alpha: f64) {
        if !(alpha > 0.0 && alpha <= 1.0) {
            log::warn!(
                "{}: relaxation factor {} outside (0, 1]; equation not relaxed",
                self.psi_name,
                alpha
            );
            return;
        }
        let d_total = self.d();
        for ((diag, s), (&d, &x)) in self
            .diag
            .iter_mut()
            .zip(self.source.iter_mut())
            .zip(d_total.iter().zip(psi.values()))
        {
            let d_new = d / alpha;
            *diag += d_new - d;
            *s += x * (d_new - d);
        }
    }

    /// Pins `psi` in `cell` to `value`; no-op when this rank does not own
    /// the reference cell.
    pub fn set_reference(&mut self, cell: Option<usize>, value: T) -> Result<(), FieldError> {
        let Some(c) = cell else {
            return Ok(());
        };
        if c >= self.diag.len() {
            return Err(FieldError::CellOutOfRange {
                what: "reference cell",
                cell: c,
                n_cells: self.diag.len(),
            });
        }
        self.source[c] += value * self.diag[c];
        self.diag[c] += self.diag[c];
        Ok(())
    }

    /// Fixes `psi` in `cells`, eliminating their coupling to other cells.
    pub fn set_values(&mut self, psi: &mut VolField<T>, cells: &[usize], values: &[T]) -> Result<(), FieldError> {
        if cells.len() != values.len() {
            return Err(FieldError::SizeMismatch {
                what: "fixed values",
                expected: cells.len(),
                found: values.len(),
            });
        }
        let mesh = Arc::clone(&self.mesh);
        let x = psi.values_mut();
        for (&cell, &value) in cells.iter().zip(values) {
            x[cell] = value;
            self.source[cell] = value * self.diag[cell];

            for f in 0..mesh.num_internal_faces() {
                let (o, n) = (mesh.owner[f], mesh.neighbour[f]);
                if o == cell {
                    let l = self.lower()[f];
                    self.source[n] -= value * l;
                } else if n == cell {
                    let u = self.upper[f];
                    self.source[o] -= value * u;
                } else {
                    continue;
                }
                self.upper[f] = 0.0;
                if let Some(lower) = &mut self.lower {
                    lower[f] = 0.0;
                }
            }
            for patch in &mesh.patches {
                for (i, &c) in patch.face_cells.iter().enumerate() {
                    if c == cell {
                        self.internal_coeffs[patch.index][i] = T::zero();
                        self.boundary_coeffs[patch.index][i] = T::zero();
                    }
                }
            }
        }
        Ok(())
    }

    /// Linear system for component `d`: boundary internal coefficients on
    /// the diagonal, uncoupled boundary coefficients in the source, coupled
    /// ones as interfaces.
    pub fn linear_system<'c>(&self, d: usize, comm: &'c dyn Communicator) -> LinearSystem<'c> {
        let mesh = &self.mesh;
        let n = mesh.num_cells();
        let mut diag = self.diag.clone();
        let mut source: Vec<f64> = self.source.iter().map(|s| s.component(d)).collect();
        let mut interfaces = Vec::new();

        for patch in &mesh.patches {
            let ic = &self.internal_coeffs[patch.index];
            let bc = &self.boundary_coeffs[patch.index];
            for (i, &c) in patch.face_cells.iter().enumerate() {
                diag[c] += ic[i].component(d);
            }
            let kind = match patch.coupling {
                Some(Coupling::Cyclic { neighbour }) => Some(InterfaceKind::Cyclic {
                    neighbour_cells: mesh.patches[neighbour].face_cells.clone(),
                }),
                Some(Coupling::Processor { rank, tag }) => Some(InterfaceKind::Processor { rank, tag }),
                None => None,
            };
            match kind {
                Some(kind) => interfaces.push(Interface {
                    patch: patch.index,
                    face_cells: patch.face_cells.clone(),
                    coeffs: bc.iter().map(|v| v.component(d)).collect(),
                    kind,
                }),
                None => {
                    for (i, &c) in patch.face_cells.iter().enumerate() {
                        source[c] += bc[i].component(d);
                    }
                }
            }
        }

        let lower = self.lower();
        let mut triplets = Vec::with_capacity(n + 2 * self.upper.len());
        for (c, &dv) in diag.iter().enumerate() {
            triplets.push((c, c, dv));
        }
        for f in 0..self.upper.len() {
            let (o, nb) = (mesh.owner[f], mesh.neighbour[f]);
            triplets.push((o, nb, self.upper[f]));
            triplets.push((nb, o, lower[f]));
        }

        LinearSystem {
            matrix: CsrMatrix::from_triplets(n, &triplets),
            source,
            interfaces,
            symmetric: self.is_symmetric(),
            comm,
        }
    }

    /// Normalised residual per component.
    pub fn residual(&self, psi: &VolField<T>, comm: &dyn Communicator) -> Result<T, CommError> {
        let mut res = T::zero();
        for d in 0..T::N_COMPONENTS {
            let system = self.linear_system(d, comm);
            let x: Vec<f64> = psi.values().iter().map(|v| v.component(d)).collect();
            res.set_component(d, system.normalised_residual(&x)?);
        }
        Ok(res)
    }

    /// Solves component by component, writes `psi` and corrects its
    /// boundary conditions. The returned performance is the worst over the
    /// components.
    pub fn solve(
        &self,
        psi: &mut VolField<T>,
        controls: &LinearSolverControls,
        ctx: &EvalContext<'_>,
    ) -> Result<SolverPerformance, FvError> {
        let mut values = psi.values().to_vec();
        let mut perf: Option<SolverPerformance> = None;

        for d in 0..T::N_COMPONENTS {
            let system = self.linear_system(d, ctx.comm);
            let mut x: Vec<f64> = values.iter().map(|v| v.component(d)).collect();
            let name = component_name(psi.name(), T::N_COMPONENTS, d);
            let p = linear_solver::solve(&system, &mut x, controls, &name)?;
            for (v, xi) in values.iter_mut().zip(x) {
                v.set_component(d, xi);
            }
            match &mut perf {
                Some(all) => all.merge(&p),
                None => {
                    let mut first = p;
                    first.field = psi.name().to_string();
                    perf = Some(first);
                }
            }
        }

        psi.set_values(&values)?;
        psi.correct_boundary_conditions(ctx)?;
        Ok(perf.unwrap_or_else(|| SolverPerformance::new(&controls.solver, psi.name())))
    }
}

impl<T: FieldValue> Add for FvMatrix<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.try_add(&rhs).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl<T: FieldValue> Sub for FvMatrix<T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.try_sub(&rhs).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl<T: FieldValue> Neg for FvMatrix<T> {
    type Output = Self;

    fn neg(mut self) -> Self {
        self.negate();
        self
    }
}

impl<T: FieldValue> AddAssign<&DimensionedField<T>> for FvMatrix<T> {
    fn add_assign(&mut self, su: &DimensionedField<T>) {
        if let Err(e) = self.add_source(su) {
            panic!("{}", e);
        }
    }
}

impl<T: FieldValue> SubAssign<&DimensionedField<T>> for FvMatrix<T> {
    fn sub_assign(&mut self, su: &DimensionedField<T>) {
        if let Err(e) = self.sub_source(su) {
            panic!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::mesh::{generate_line_mesh, SidePatch};

    fn psi(n: usize) -> VolField<f64> {
        let mesh = Arc::new(generate_line_mesh(n, 1.0, SidePatch::patch("inlet"), SidePatch::patch("outlet")).unwrap());
        VolField::calculated("T", mesh, si::DIMENSIONLESS, (0..n).map(|i| i as f64).collect()).unwrap()
    }

    fn sample(psi: &VolField<f64>) -> FvMatrix<f64> {
        let mut m = FvMatrix::new(psi, si::VOLUME);
        for (f, u) in m.upper.iter_mut().enumerate() {
            *u = -1.0 - f as f64;
        }
        *m.lower_mut() = m.upper.iter().map(|u| u * 0.5).collect();
        m.neg_sum_diag();
        m.internal_coeffs[0][0] = 2.0;
        m.boundary_coeffs[0][0] = 3.0;
        m.source[1] = 1.0;
        m
    }

    #[test]
    fn neg_sum_diag_balances_rows() {
        let t = psi(4);
        let mut m = FvMatrix::new(&t, si::VOLUME);
        m.upper = vec![-1.0, -2.0, -3.0];
        m.neg_sum_diag();
        assert_eq!(m.diag, vec![1.0, 3.0, 5.0, 3.0]);
        let system = m.linear_system(0, &crate::solver::parallel::SerialComm);
        assert!(system.matrix.row_sums().iter().all(|s| s.abs() < 1e-15));
    }

    #[test]
    fn relax_with_unit_factor_is_identity() {
        let t = psi(4);
        let mut m = sample(&t);
        let before = m.clone();
        m.relax(&t, 1.0);
        assert_eq!(m.diag, before.diag);
        assert_eq!(m.source, before.source);
    }

    #[test]
    fn h_over_a_reproduces_solution() {
        let t = psi(4);
        let m = sample(&t);
        // Make the current values a solution: b = A x
        let system = m.linear_system(0, &crate::solver::parallel::SerialComm);
        let mut ax = vec![0.0; 4];
        system.amul(t.values(), &mut ax).unwrap();
        let mut m = m;
        m.source = ax;
        // inlet face of cell 0 adds its boundary coefficient to the source
        m.source[0] -= m.boundary_coeffs[0][0];
        let a = m.a();
        let h = m.h(&t);
        for c in 0..4 {
            assert!((h.values[c] / a.values[c] - t.values()[c]).abs() < 1e-12, "cell {}", c);
        }
    }

    #[test]
    fn set_reference_doubles_diagonal() {
        let t = psi(3);
        let mut m = sample(&t);
        let d0 = m.diag[0];
        m.set_reference(Some(0), 2.0).unwrap();
        assert_eq!(m.diag[0], 2.0 * d0);
        assert_eq!(m.source[0], 2.0 * d0);
        let d1 = m.diag[1];
        m.set_reference(None, 5.0).unwrap();
        assert_eq!(m.diag[1], d1);
    }

    #[test]
    fn reference_cell_outside_mesh_is_an_error() {
        let t = psi(3);
        let mut m = sample(&t);
        let before = m.clone();
        let err = m.set_reference(Some(3), 1.0).unwrap_err();
        assert_eq!(
            err,
            FieldError::CellOutOfRange {
                what: "reference cell",
                cell: 3,
                n_cells: 3
            }
        );
        assert_eq!(m.diag, before.diag);
        assert_eq!(m.source, before.source);
    }

    #[test]
    fn relax_outside_unit_interval_leaves_matrix_unchanged() {
        let t = psi(4);
        let mut m = sample(&t);
        let before = m.clone();
        for alpha in [0.0, -0.5, 1.5, f64::NAN] {
            m.relax(&t, alpha);
            assert_eq!(m.diag, before.diag, "alpha {}", alpha);
            assert_eq!(m.source, before.source, "alpha {}", alpha);
        }
        m.relax(&t, 0.5);
        assert_ne!(m.diag, before.diag);
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let t = psi(3);
        let a = FvMatrix::new(&t, si::VOLUME);
        let b = FvMatrix::new(&t, si::AREA);
        let err = a.try_add(&b).unwrap_err();
        assert!(matches!(err, FieldError::Dimension(DimensionError::Mismatch { .. })));
    }

    #[test]
    fn matrices_on_different_meshes_are_rejected() {
        let t = psi(3);
        let other = psi(3);
        let a = FvMatrix::new(&t, si::VOLUME);
        let b = FvMatrix::new(&other, si::VOLUME);
        let err = a.clone().try_add(&b).unwrap_err();
        assert!(matches!(err, FieldError::MeshMismatch { operation: "+", .. }));

        let same_mesh = VolField::calculated("T", Arc::clone(t.mesh()), si::DIMENSIONLESS, vec![0.0; 3]).unwrap();
        assert!(a.try_sub(&FvMatrix::new(&same_mesh, si::VOLUME)).is_ok());
    }

    #[test]
    fn matrices_for_different_fields_are_rejected() {
        let t = psi(3);
        let s = VolField::calculated("S", Arc::clone(t.mesh()), si::DIMENSIONLESS, vec![0.0; 3]).unwrap();
        let mut a = FvMatrix::new(&t, si::VOLUME);
        let err = a.sub_matrix(&FvMatrix::new(&s, si::VOLUME)).unwrap_err();
        assert_eq!(
            err,
            FieldError::FieldMismatch {
                operation: "-",
                lhs: "T".into(),
                rhs: "S".into()
            }
        );
    }

    #[test]
    #[should_panic(expected = "dimension mismatch")]
    fn operator_sugar_panics_on_mismatch() {
        let t = psi(3);
        let _ = FvMatrix::new(&t, si::VOLUME) + FvMatrix::new(&t, si::LENGTH);
    }

    #[test]
    fn cloned_matrices_share_the_flux_correction_until_written() {
        let t = psi(3);
        let mut a = FvMatrix::new(&t, si::VOLUME);
        let corr = SurfaceField::uniform("corr", t.mesh(), si::VOLUME, 1.0);
        a.face_flux_correction = Some(Tmp::new(corr));
        let mut b = a.clone();
        assert!(!a.face_flux_correction.as_ref().unwrap().is_unique());

        b.negate();
        let a_corr = a.face_flux_correction.as_ref().unwrap();
        let b_corr = b.face_flux_correction.as_ref().unwrap();
        assert!(a_corr.internal.iter().all(|&v| v == 1.0));
        assert!(b_corr.internal.iter().all(|&v| v == -1.0));
        assert!(a_corr.is_unique());

        a.add_matrix(&b).unwrap();
        let sum = a.face_flux_correction.as_ref().unwrap();
        assert!(sum.internal.iter().chain(sum.boundary.iter().flatten()).all(|&v| v == 0.0));
    }

    #[test]
    fn component_names() {
        assert_eq!(component_name("U", 3, 1), "Uy");
        assert_eq!(component_name("p", 1, 0), "p");
        assert_eq!(component_name("R", 9, 4), "Ryy");
    }
}
