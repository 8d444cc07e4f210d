//! Boundary conditions expressed as `boundary = Ci * cell + Cv`.
//!
//! Each [`PatchField`] caches the `(Ci, Cv)` pair computed by its
//! [`PatchCondition`] at `update_coeffs` time; assembly reads the cached pair
//! and boundary values are re-derived from it lazily when the internal field
//! changes.

pub mod conditions;
pub mod coupled;
pub mod function1;
pub mod registry;

pub use conditions::*;
pub use coupled::{Cyclic, Processor};
pub use function1::Function1;
pub use registry::{PatchFieldRegistry, PatchSetup};

use crate::solver::field::{FieldError, FieldValue, SurfaceField};
use crate::solver::mesh::{FvMesh, Patch};
use crate::solver::parallel::{Communicator, SerialComm};
use crate::solver::time::TimeState;
use nalgebra::Vector3;
use serde_json::Value;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;

/// Per-face coefficients of `boundary = internal * cell + boundary`.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueCoeffs<T> {
    pub internal: Vec<T>,
    pub boundary: Vec<T>,
}

impl<T: FieldValue> ValueCoeffs<T> {
    pub fn uniform(n: usize, internal: T, boundary: T) -> Self {
        Self {
            internal: vec![internal; n],
            boundary: vec![boundary; n],
        }
    }
}

/// Everything a condition may look at while refreshing its coefficients.
pub struct PatchContext<'a, T> {
    pub mesh: &'a FvMesh,
    pub patch: &'a Patch,
    pub field_name: &'a str,
    pub patch_internal: &'a [T],
    /// Partner cell values for coupled patches, face by face.
    pub neighbour: Option<&'a [T]>,
    /// Face flux on this patch, when the caller supplies one.
    pub flux: Option<&'a [f64]>,
    pub time: TimeState,
}

/// Explicit evaluation context threaded through boundary updates and solves.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub time: TimeState,
    pub comm: &'a dyn Communicator,
    pub flux: Option<&'a SurfaceField<f64>>,
}

impl<'a> EvalContext<'a> {
    pub fn serial(time: TimeState) -> EvalContext<'static> {
        EvalContext {
            time,
            comm: &SerialComm,
            flux: None,
        }
    }

    pub fn new(time: TimeState, comm: &'a dyn Communicator) -> Self {
        Self {
            time,
            comm,
            flux: None,
        }
    }

    pub fn with_flux(self, flux: &'a SurfaceField<f64>) -> Self {
        Self {
            flux: Some(flux),
            ..self
        }
    }
}

/// Which side a coupled condition draws its partner values from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoupledKind {
    Cyclic,
    Processor,
}

/// A boundary condition type.
pub trait PatchCondition<T: FieldValue>: fmt::Debug + Send {
    fn type_name(&self) -> &'static str;

    /// Refreshes time- or flux-dependent state.
    fn update_coeffs(&mut self, _ctx: &PatchContext<'_, T>) -> Result<(), FieldError> {
        Ok(())
    }

    /// `(Ci, Cv)` for the current state.
    fn coeffs(&self, ctx: &PatchContext<'_, T>) -> ValueCoeffs<T>;

    /// Writes boundary values from the coefficients.
    fn evaluate(&self, coeffs: &ValueCoeffs<T>, patch_internal: &[T], values: &mut [T]) {
        for (i, v) in values.iter_mut().enumerate() {
            *v = coeffs.internal[i].cmpt_multiply(&patch_internal[i]) + coeffs.boundary[i];
        }
    }

    fn fixes_value(&self) -> bool {
        false
    }

    /// True for conditions whose values may be overwritten by assignment.
    fn assignable(&self) -> bool {
        true
    }

    fn coupled(&self) -> Option<CoupledKind> {
        None
    }

    /// Dictionary entries, without `value`.
    fn write(&self) -> Value;

    fn box_clone(&self) -> Box<dyn PatchCondition<T>>;
}

impl<T: FieldValue> Clone for Box<dyn PatchCondition<T>> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Boundary part of a field on one patch.
#[derive(Clone, Debug)]
pub struct PatchField<T: FieldValue> {
    patch: usize,
    condition: Box<dyn PatchCondition<T>>,
    values: RefCell<Vec<T>>,
    coeffs: ValueCoeffs<T>,
    neighbour: Option<Vec<T>>,
    /// Partner cell gradients, `[component][face]`.
    neighbour_gradients: Option<Vec<Vec<Vector3<f64>>>>,
    partner_version: u64,
    /// `(internal state, partner version)` of the last evaluation.
    evaluated_at: Cell<Option<(u64, u64)>>,
    updated: bool,
}

impl<T: FieldValue> PatchField<T> {
    pub fn new(patch: &Patch, condition: Box<dyn PatchCondition<T>>, values: Vec<T>) -> Self {
        let n = patch.size();
        Self {
            patch: patch.index,
            condition,
            values: RefCell::new(values),
            // Extrapolate until the first update.
            coeffs: ValueCoeffs::uniform(n, T::splat(1.0), T::zero()),
            neighbour: None,
            neighbour_gradients: None,
            partner_version: 0,
            evaluated_at: Cell::new(None),
            updated: false,
        }
    }

    pub fn patch(&self) -> usize {
        self.patch
    }

    pub fn size(&self) -> usize {
        self.coeffs.internal.len()
    }

    pub fn type_name(&self) -> &'static str {
        self.condition.type_name()
    }

    pub fn condition(&self) -> &dyn PatchCondition<T> {
        self.condition.as_ref()
    }

    pub fn is_coupled(&self) -> bool {
        self.condition.coupled().is_some()
    }

    pub fn coupled_kind(&self) -> Option<CoupledKind> {
        self.condition.coupled()
    }

    pub fn fixes_value(&self) -> bool {
        self.condition.fixes_value()
    }

    pub fn updated(&self) -> bool {
        self.updated
    }

    /// Cached `(Ci, Cv)`.
    pub fn coeffs(&self) -> &ValueCoeffs<T> {
        &self.coeffs
    }

    pub fn neighbour_values(&self) -> Option<&[T]> {
        self.neighbour.as_deref()
    }

    /// Partner cell gradients from the last processor exchange.
    pub fn neighbour_gradients(&self) -> Option<&[Vec<Vector3<f64>>]> {
        self.neighbour_gradients.as_deref()
    }

    pub fn partner_version(&self) -> u64 {
        self.partner_version
    }

    /// Current values without re-evaluation.
    pub fn raw_values(&self) -> Ref<'_, [T]> {
        Ref::map(self.values.borrow(), |v| v.as_slice())
    }

    /// Coefficient of the cell value in the face value, for interpolation
    /// weights `weights` (used only by coupled patches).
    pub fn value_internal_coeffs(&self, weights: &[f64]) -> Vec<T> {
        if self.is_coupled() {
            weights.iter().map(|&w| T::splat(w)).collect()
        } else {
            self.coeffs.internal.clone()
        }
    }

    /// Constant part of the face value; for coupled patches, the coefficient
    /// of the neighbour cell value.
    pub fn value_boundary_coeffs(&self, weights: &[f64]) -> Vec<T> {
        if self.is_coupled() {
            weights.iter().map(|&w| T::splat(1.0 - w)).collect()
        } else {
            self.coeffs.boundary.clone()
        }
    }

    pub fn gradient_internal_coeffs(&self, delta_coeffs: &[f64]) -> Vec<T> {
        if self.is_coupled() {
            delta_coeffs.iter().map(|&d| T::splat(-d)).collect()
        } else {
            self.coeffs
                .internal
                .iter()
                .zip(delta_coeffs)
                .map(|(&ci, &d)| (ci - T::splat(1.0)) * d)
                .collect()
        }
    }

    pub fn gradient_boundary_coeffs(&self, delta_coeffs: &[f64]) -> Vec<T> {
        if self.is_coupled() {
            delta_coeffs.iter().map(|&d| T::splat(d)).collect()
        } else {
            self.coeffs
                .boundary
                .iter()
                .zip(delta_coeffs)
                .map(|(&cv, &d)| cv * d)
                .collect()
        }
    }

    /// Coefficients from the current state without running the condition's
    /// update (used at construction, before any flux or exchange exists).
    pub(crate) fn init_coeffs(&mut self, ctx: &PatchContext<'_, T>) {
        if let Some(nbr) = ctx.neighbour {
            self.neighbour = Some(nbr.to_vec());
        }
        self.coeffs = self.condition.coeffs(ctx);
        self.evaluated_at.set(None);
    }

    /// Installs read values as current for `state`.
    pub(crate) fn preset_values(&mut self, values: Vec<T>, state: u64) {
        *self.values.get_mut() = values;
        self.evaluated_at.set(Some((state, self.partner_version)));
    }

    pub(crate) fn is_fresh(&self, state: u64) -> bool {
        self.evaluated_at.get() == Some((state, self.partner_version))
    }

    /// Cyclic partners live in the same field, so the face value is rebuilt
    /// from current cell values on both sides.
    pub(crate) fn refresh_cyclic(&self, state: u64, patch_internal: &[T], nbr_internal: &[T], weights: &[f64]) {
        if self.is_fresh(state) {
            return;
        }
        let mut values = self.values.borrow_mut();
        for (i, v) in values.iter_mut().enumerate() {
            let w = weights[i];
            *v = patch_internal[i] * w + nbr_internal[i] * (1.0 - w);
        }
        self.evaluated_at.set(Some((state, self.partner_version)));
    }

    pub(crate) fn set_neighbour(&mut self, values: Vec<T>) {
        self.neighbour = Some(values);
        self.partner_version += 1;
    }

    pub(crate) fn set_neighbour_gradients(&mut self, grads: Vec<Vec<Vector3<f64>>>) {
        self.neighbour_gradients = Some(grads);
    }

    /// Idempotent until the next [`PatchField::evaluate`].
    pub(crate) fn update_coeffs(&mut self, ctx: &PatchContext<'_, T>) -> Result<(), FieldError> {
        if self.updated {
            return Ok(());
        }
        self.condition.update_coeffs(ctx)?;
        self.coeffs = self.condition.coeffs(ctx);
        self.evaluated_at.set(None);
        self.updated = true;
        Ok(())
    }

    pub(crate) fn evaluate(&mut self, state: u64, patch_internal: &[T]) {
        self.evaluated_at.set(None);
        self.refresh(state, patch_internal);
        self.updated = false;
    }

    /// Re-derives the values if the internal field or partner snapshot moved
    /// since the last evaluation.
    pub(crate) fn refresh(&self, state: u64, patch_internal: &[T]) {
        let key = (state, self.partner_version);
        if self.is_fresh(state) {
            return;
        }
        let mut values = self.values.borrow_mut();
        self.condition
            .evaluate(&self.coeffs, patch_internal, values.as_mut_slice());
        self.evaluated_at.set(Some(key));
    }

    /// Overwrites the values of assignable conditions.
    pub fn assign(&mut self, values: &[T], state: u64) -> Result<(), FieldError> {
        if values.len() != self.size() {
            return Err(FieldError::SizeMismatch {
                what: "patch values",
                expected: self.size(),
                found: values.len(),
            });
        }
        if self.condition.assignable() {
            self.values.borrow_mut().copy_from_slice(values);
            self.evaluated_at.set(Some((state, self.partner_version)));
        }
        Ok(())
    }

    pub fn write(&self) -> Value {
        let mut dict = self.condition.write();
        if let Value::Object(map) = &mut dict {
            let values: Vec<Value> = self.values.borrow().iter().map(|v| v.to_json()).collect();
            map.insert(
                "value".to_string(),
                serde_json::json!({ "nonuniform": values }),
            );
        }
        dict
    }
}
