use super::dimensioned::DimensionedField;
use super::source::{FieldSource, ReadPolicy};
use super::value::FieldValue;
use super::FieldError;
use crate::solver::boundary::conditions::{parse_values, read_patch_values};
use crate::solver::boundary::coupled::{cyclic_neighbour_values, exchange_processor_values};
use crate::solver::boundary::{
    Calculated, CoupledKind, Cyclic, EvalContext, PatchCondition, PatchContext, PatchField,
    PatchFieldRegistry, PatchSetup, Processor,
};
use crate::solver::dictionary::{ConfigError, Dictionary};
use crate::solver::fvc;
use crate::solver::mesh::{Coupling, FvMesh};
use crate::solver::parallel::{CommError, Communicator};
use crate::solver::time::TimeState;
use crate::solver::units::DimensionSet;
use nalgebra::Vector3;
use serde_json::{json, Value};
use std::cell::Ref;
use std::sync::Arc;

/// Cell-centred field with boundary conditions, old-time levels and a
/// previous-iteration level.
#[derive(Clone, Debug)]
pub struct VolField<T: FieldValue> {
    mesh: Arc<FvMesh>,
    internal: DimensionedField<T>,
    boundary: Vec<PatchField<T>>,
    old: Option<Vec<T>>,
    old_old: Option<Vec<T>>,
    prev_iter: Option<Vec<T>>,
    time_index: Option<usize>,
    /// Bumped on every change to the internal values.
    state: u64,
}

fn coupled_condition<T: FieldValue>(coupling: Option<Coupling>) -> Option<Box<dyn PatchCondition<T>>> {
    match coupling {
        Some(Coupling::Cyclic { .. }) => Some(Box::new(Cyclic)),
        Some(Coupling::Processor { .. }) => Some(Box::new(Processor)),
        None => None,
    }
}

impl<T: FieldValue> VolField<T> {
    /// Builds a field with one condition per patch. `preset` optionally
    /// supplies initial boundary values per patch; missing ones are evaluated.
    pub fn from_conditions(
        name: &str,
        mesh: Arc<FvMesh>,
        dimensions: DimensionSet,
        values: Vec<T>,
        conditions: Vec<Box<dyn PatchCondition<T>>>,
        preset: Vec<Option<Vec<T>>>,
    ) -> Result<Self, FieldError> {
        if values.len() != mesh.num_cells() {
            return Err(FieldError::SizeMismatch {
                what: "internal field",
                expected: mesh.num_cells(),
                found: values.len(),
            });
        }
        if conditions.len() != mesh.patches.len() {
            return Err(FieldError::SizeMismatch {
                what: "boundary conditions",
                expected: mesh.patches.len(),
                found: conditions.len(),
            });
        }

        let boundary = mesh
            .patches
            .iter()
            .zip(conditions)
            .map(|(patch, condition)| {
                let initial = patch.patch_internal_field(&values);
                PatchField::new(patch, condition, initial)
            })
            .collect();

        let mut field = Self {
            mesh,
            internal: DimensionedField::new(name, dimensions, values),
            boundary,
            old: None,
            old_old: None,
            prev_iter: None,
            time_index: None,
            state: 0,
        };
        field.init_boundary(preset)?;
        Ok(field)
    }

    /// Uniform field whose uncoupled patches are all `calculated`.
    pub fn calculated(name: &str, mesh: Arc<FvMesh>, dimensions: DimensionSet, values: Vec<T>) -> Result<Self, FieldError> {
        let conditions = mesh
            .patches
            .iter()
            .map(|p| {
                coupled_condition(p.coupling)
                    .unwrap_or_else(|| Box::new(Calculated::new(p.size())) as Box<dyn PatchCondition<T>>)
            })
            .collect();
        let n = mesh.patches.len();
        Self::from_conditions(name, mesh, dimensions, values, conditions, vec![None; n])
    }

    /// Uniform field; uncoupled patches get `patch_type` built from
    /// `{"type": patch_type, "value": value}`.
    pub fn uniform(
        name: &str,
        mesh: Arc<FvMesh>,
        dimensions: DimensionSet,
        value: T,
        patch_type: &str,
        registry: &PatchFieldRegistry<T>,
    ) -> Result<Self, FieldError> {
        let mut conditions = Vec::with_capacity(mesh.patches.len());
        for patch in &mesh.patches {
            let condition = match coupled_condition(patch.coupling) {
                Some(c) => c,
                None => {
                    let setup = PatchSetup::new(name, patch);
                    let mut dict = Dictionary::new(&setup.scope);
                    dict.insert("type", json!(patch_type));
                    dict.insert("value", value.to_json());
                    registry.construct_type(patch_type, &dict, &setup)?
                }
            };
            conditions.push(condition);
        }
        let n_cells = mesh.num_cells();
        let n = mesh.patches.len();
        Self::from_conditions(name, mesh, dimensions, vec![value; n_cells], conditions, vec![None; n])
    }

    /// Constructs the field through the persistence collaborator.
    pub fn read(
        name: &str,
        mesh: Arc<FvMesh>,
        source: &dyn FieldSource,
        registry: &PatchFieldRegistry<T>,
        policy: ReadPolicy<T>,
    ) -> Result<Self, FieldError> {
        match policy {
            ReadPolicy::MustRead => {
                let dict = source
                    .read_field(name)?
                    .ok_or_else(|| FieldError::MissingData {
                        field: name.to_string(),
                        source: source.describe(),
                    })?;
                Self::from_dict(name, mesh, &dict, registry)
            }
            ReadPolicy::ReadIfPresent {
                dimensions,
                value,
                patch_type,
            } => match source.read_field(name)? {
                Some(dict) => Self::from_dict(name, mesh, &dict, registry),
                None => Self::uniform(name, mesh, dimensions, value, &patch_type, registry),
            },
            ReadPolicy::Default {
                dimensions,
                value,
                patch_type,
            } => Self::uniform(name, mesh, dimensions, value, &patch_type, registry),
        }
    }

    /// Builds the field from a `dimensions` / `internalField` /
    /// `boundaryField` dictionary.
    pub fn from_dict(
        name: &str,
        mesh: Arc<FvMesh>,
        dict: &Dictionary,
        registry: &PatchFieldRegistry<T>,
    ) -> Result<Self, FieldError> {
        let dict = Dictionary::from_value(name, dict.as_value())?;
        let exps: Vec<f64> = dict.lookup("dimensions")?;
        let dimensions = DimensionSet::from_exponents(&exps)?;
        let values = parse_values(dict.entry("internalField")?, mesh.num_cells()).map_err(|reason| {
            ConfigError::InvalidEntry {
                scope: name.to_string(),
                key: "internalField".to_string(),
                reason,
            }
        })?;

        let boundary_dict = dict.sub_dict("boundaryField")?;
        let mut conditions = Vec::with_capacity(mesh.patches.len());
        let mut preset = Vec::with_capacity(mesh.patches.len());

        for patch in &mesh.patches {
            let setup = PatchSetup::new(name, patch);
            if boundary_dict.found(&patch.name) {
                let patch_dict = boundary_dict.sub_dict(&patch.name)?;
                let condition = registry.construct(&patch_dict, &setup)?;
                if patch.is_coupled() && condition.coupled().is_none() {
                    return Err(ConfigError::InvalidEntry {
                        scope: setup.scope,
                        key: "type".to_string(),
                        reason: format!(
                            "{} patch needs a coupled condition, not {}",
                            patch.kind.as_str(),
                            condition.type_name()
                        ),
                    }
                    .into());
                }
                conditions.push(condition);
                preset.push(if patch_dict.found("value") && !patch.is_coupled() {
                    Some(read_patch_values(&patch_dict, "value", patch.size())?)
                } else {
                    None
                });
            } else if let Some(condition) = coupled_condition(patch.coupling) {
                conditions.push(condition);
                preset.push(None);
            } else {
                return Err(ConfigError::MissingEntry {
                    scope: boundary_dict.scope().to_string(),
                    key: patch.name.clone(),
                }
                .into());
            }
        }

        Self::from_conditions(name, mesh, dimensions, values, conditions, preset)
    }

    fn init_boundary(&mut self, preset: Vec<Option<Vec<T>>>) -> Result<(), FieldError> {
        let mesh = Arc::clone(&self.mesh);
        for ((p, patch), preset) in mesh.patches.iter().enumerate().zip(preset) {
            let patch_internal = patch.patch_internal_field(&self.internal.values);
            let neighbour = cyclic_neighbour_values(&mesh, p, &self.internal.values);
            let ctx = PatchContext {
                mesh: &mesh,
                patch,
                field_name: &self.internal.name,
                patch_internal: &patch_internal,
                neighbour: neighbour.as_deref(),
                flux: None,
                time: TimeState::default(),
            };
            self.boundary[p].init_coeffs(&ctx);
            match preset {
                Some(values) => {
                    if values.len() != patch.size() {
                        return Err(FieldError::SizeMismatch {
                            what: "patch values",
                            expected: patch.size(),
                            found: values.len(),
                        });
                    }
                    self.boundary[p].preset_values(values, self.state);
                }
                None => self.refresh_patch(p),
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.internal.name
    }

    pub fn rename(&mut self, name: &str) {
        self.internal.name = name.to_string();
    }

    pub fn dimensions(&self) -> DimensionSet {
        self.internal.dimensions
    }

    pub fn mesh(&self) -> &Arc<FvMesh> {
        &self.mesh
    }

    pub fn values(&self) -> &[T] {
        &self.internal.values
    }

    pub fn internal_field(&self) -> &DimensionedField<T> {
        &self.internal
    }

    /// Mutable internal values; marks every boundary value stale.
    pub fn values_mut(&mut self) -> &mut [T] {
        self.state += 1;
        &mut self.internal.values
    }

    pub fn set_values(&mut self, values: &[T]) -> Result<(), FieldError> {
        if values.len() != self.internal.values.len() {
            return Err(FieldError::SizeMismatch {
                what: "internal field",
                expected: self.internal.values.len(),
                found: values.len(),
            });
        }
        self.values_mut().copy_from_slice(values);
        Ok(())
    }

    /// Modification counter of the internal values.
    pub fn state(&self) -> u64 {
        self.state
    }

    pub fn boundary_fields(&self) -> &[PatchField<T>] {
        &self.boundary
    }

    pub fn boundary_field(&self, patch: usize) -> &PatchField<T> {
        &self.boundary[patch]
    }

    pub fn patch_internal(&self, patch: usize) -> Vec<T> {
        self.mesh.patches[patch].patch_internal_field(&self.internal.values)
    }

    fn refresh_patch(&self, patch: usize) {
        let pf = &self.boundary[patch];
        if pf.is_fresh(self.state) {
            return;
        }
        let mesh_patch = &self.mesh.patches[patch];
        let patch_internal = mesh_patch.patch_internal_field(&self.internal.values);
        match pf.coupled_kind() {
            Some(CoupledKind::Cyclic) => {
                let nbr = cyclic_neighbour_values(&self.mesh, patch, &self.internal.values)
                    .unwrap_or_else(|| patch_internal.clone());
                pf.refresh_cyclic(self.state, &patch_internal, &nbr, &mesh_patch.weights);
            }
            _ => pf.refresh(self.state, &patch_internal),
        }
    }

    /// Boundary values on `patch`, re-evaluated only if the internal field or
    /// the coupled partner snapshot changed since the last evaluation.
    pub fn boundary_value(&self, patch: usize) -> Ref<'_, [T]> {
        self.refresh_patch(patch);
        self.boundary[patch].raw_values()
    }

    pub fn boundary_values(&self) -> Vec<Vec<T>> {
        (0..self.boundary.len())
            .map(|p| self.boundary_value(p).to_vec())
            .collect()
    }

    /// Overwrites the values of an assignable patch (e.g. `calculated`).
    pub fn assign_boundary(&mut self, patch: usize, values: &[T]) -> Result<(), FieldError> {
        let state = self.state;
        self.boundary[patch].assign(values, state)
    }

    fn has_processor_patches(&self) -> bool {
        self.boundary
            .iter()
            .any(|b| b.coupled_kind() == Some(CoupledKind::Processor))
    }

    /// Swaps patch-internal values with every processor partner.
    fn exchange_neighbour_values(&mut self, comm: &dyn Communicator) -> Result<(), FieldError> {
        let received = exchange_processor_values(&self.mesh, &self.internal.values, comm)?;
        for (pf, values) in self.boundary.iter_mut().zip(received) {
            if let Some(values) = values {
                pf.set_neighbour(values);
            }
        }
        Ok(())
    }

    /// Swaps patch-internal cell gradients with every processor partner, for
    /// limiters and explicit corrections on processor faces.
    fn exchange_neighbour_gradients(&mut self, comm: &dyn Communicator) -> Result<(), FieldError> {
        let grads = fvc::component_gradients(self);
        let mut received: Vec<Vec<Vec<Vector3<f64>>>> = vec![Vec::new(); self.mesh.patches.len()];
        for g in &grads {
            let exchanged = exchange_processor_values(&self.mesh, g, comm)?;
            for (patch, values) in received.iter_mut().zip(exchanged) {
                if let Some(values) = values {
                    patch.push(values);
                }
            }
        }
        for (pf, grads) in self.boundary.iter_mut().zip(received) {
            if !grads.is_empty() {
                pf.set_neighbour_gradients(grads);
            }
        }
        Ok(())
    }

    /// Exchanges coupled values and refreshes every patch's coefficients.
    /// Patches already updated since their last evaluation are left alone.
    pub fn update_coeffs(&mut self, ctx: &EvalContext<'_>) -> Result<(), FieldError> {
        self.update_coeffs_exchanging(ctx).map(|_| ())
    }

    /// [`VolField::update_coeffs`]; returns whether processor values were
    /// exchanged.
    fn update_coeffs_exchanging(&mut self, ctx: &EvalContext<'_>) -> Result<bool, FieldError> {
        let needs_exchange = self
            .boundary
            .iter()
            .any(|b| !b.updated() && b.coupled_kind() == Some(CoupledKind::Processor));
        if needs_exchange {
            self.exchange_neighbour_values(ctx.comm)?;
        }

        let mesh = Arc::clone(&self.mesh);
        for (p, patch) in mesh.patches.iter().enumerate() {
            if self.boundary[p].updated() {
                continue;
            }
            if self.boundary[p].coupled_kind() == Some(CoupledKind::Cyclic) {
                if let Some(values) = cyclic_neighbour_values(&mesh, p, &self.internal.values) {
                    self.boundary[p].set_neighbour(values);
                }
            }
            let patch_internal = patch.patch_internal_field(&self.internal.values);
            let neighbour = self.boundary[p].neighbour_values().map(|v| v.to_vec());
            let patch_ctx = PatchContext {
                mesh: &mesh,
                patch,
                field_name: &self.internal.name,
                patch_internal: &patch_internal,
                neighbour: neighbour.as_deref(),
                flux: ctx.flux.map(|f| f.patch(p)),
                time: ctx.time,
            };
            self.boundary[p].update_coeffs(&patch_ctx)?;
        }

        if needs_exchange {
            self.exchange_neighbour_gradients(ctx.comm)?;
        }
        Ok(needs_exchange)
    }

    /// Updates (if needed) and recomputes every boundary value, clearing the
    /// updated flags. Processor partners are always re-exchanged.
    pub fn evaluate(&mut self, ctx: &EvalContext<'_>) -> Result<(), FieldError> {
        let exchanged = self.update_coeffs_exchanging(ctx)?;
        let mesh = Arc::clone(&self.mesh);
        let refresh_partners = !exchanged && self.has_processor_patches();
        if refresh_partners {
            self.exchange_neighbour_values(ctx.comm)?;
            for (p, patch) in mesh.patches.iter().enumerate() {
                if self.boundary[p].coupled_kind() != Some(CoupledKind::Processor) {
                    continue;
                }
                let patch_internal = patch.patch_internal_field(&self.internal.values);
                let neighbour = self.boundary[p].neighbour_values().map(|v| v.to_vec());
                let patch_ctx = PatchContext {
                    mesh: &mesh,
                    patch,
                    field_name: &self.internal.name,
                    patch_internal: &patch_internal,
                    neighbour: neighbour.as_deref(),
                    flux: ctx.flux.map(|f| f.patch(p)),
                    time: ctx.time,
                };
                self.boundary[p].init_coeffs(&patch_ctx);
            }
        }

        for (p, patch) in mesh.patches.iter().enumerate() {
            let patch_internal = patch.patch_internal_field(&self.internal.values);
            self.boundary[p].evaluate(self.state, &patch_internal);
        }

        if refresh_partners {
            self.exchange_neighbour_gradients(ctx.comm)?;
        }
        Ok(())
    }

    pub fn correct_boundary_conditions(&mut self, ctx: &EvalContext<'_>) -> Result<(), FieldError> {
        self.evaluate(ctx)
    }

    /// Rotates old-time levels once per time index.
    pub fn store_old_times(&mut self, time: &TimeState) {
        if self.time_index == Some(time.index) {
            return;
        }
        self.old_old = self.old.take();
        self.old = Some(self.internal.values.clone());
        self.time_index = Some(time.index);
    }

    /// Old-time values; the current values if none were stored.
    pub fn old_time(&self) -> &[T] {
        self.old.as_deref().unwrap_or(&self.internal.values)
    }

    pub fn old_old_time(&self) -> Option<&[T]> {
        self.old_old.as_deref()
    }

    pub fn n_old_times(&self) -> usize {
        usize::from(self.old.is_some()) + usize::from(self.old_old.is_some())
    }

    pub fn store_prev_iter(&mut self) {
        self.prev_iter = Some(self.internal.values.clone());
    }

    pub fn prev_iter(&self) -> Option<&[T]> {
        self.prev_iter.as_deref()
    }

    /// `psi = prev + alpha * (psi - prev)`.
    pub fn relax(&mut self, alpha: f64) -> Result<(), FieldError> {
        let prev = self
            .prev_iter
            .take()
            .ok_or_else(|| FieldError::NoPreviousIteration {
                field: self.internal.name.clone(),
            })?;
        if alpha < 1.0 {
            for (v, &p) in self.values_mut().iter_mut().zip(&prev) {
                *v = p + (*v - p) * alpha;
            }
        }
        self.prev_iter = Some(prev);
        Ok(())
    }

    /// Arithmetic mean over all cells of all ranks.
    pub fn global_average(&self, comm: &dyn Communicator) -> Result<T, CommError> {
        let mut local = vec![0.0; T::N_COMPONENTS + 1];
        for v in &self.internal.values {
            for d in 0..T::N_COMPONENTS {
                local[d] += v.component(d);
            }
        }
        local[T::N_COMPONENTS] = self.internal.values.len() as f64;
        let sums = comm.all_reduce_sum_vec(&local)?;
        let count = sums[T::N_COMPONENTS].max(1.0);
        Ok(T::from_components(
            &sums[..T::N_COMPONENTS]
                .iter()
                .map(|s| s / count)
                .collect::<Vec<_>>(),
        ))
    }

    /// Volume-weighted mean over all ranks.
    pub fn weighted_average(&self, comm: &dyn Communicator) -> Result<T, CommError> {
        let mut local = vec![0.0; T::N_COMPONENTS + 1];
        for (v, &vol) in self.internal.values.iter().zip(&self.mesh.cell_volumes) {
            for d in 0..T::N_COMPONENTS {
                local[d] += v.component(d) * vol;
            }
        }
        local[T::N_COMPONENTS] = self.mesh.total_volume();
        let sums = comm.all_reduce_sum_vec(&local)?;
        let vol = sums[T::N_COMPONENTS];
        Ok(T::from_components(
            &sums[..T::N_COMPONENTS]
                .iter()
                .map(|s| if vol > 0.0 { s / vol } else { 0.0 })
                .collect::<Vec<_>>(),
        ))
    }

    /// Field dictionary in the layout [`VolField::from_dict`] reads.
    pub fn write(&self) -> Value {
        let exps: Vec<f64> = (0..fvcore_dims::N_BASE_DIMENSIONS)
            .map(|i| self.internal.dimensions.exponent(i).to_f64())
            .collect();
        let mut boundary = serde_json::Map::new();
        for (p, patch) in self.mesh.patches.iter().enumerate() {
            self.refresh_patch(p);
            boundary.insert(patch.name.clone(), self.boundary[p].write());
        }
        json!({
            "dimensions": exps,
            "internalField": {
                "nonuniform": self.internal.values.iter().map(|v| v.to_json()).collect::<Vec<_>>()
            },
            "boundaryField": Value::Object(boundary),
        })
    }
}

impl VolField<f64> {
    pub fn min(&self) -> f64 {
        self.internal.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.internal.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::field::MemoryFieldSource;
    use crate::solver::mesh::{generate_line_mesh, SidePatch};
    use crate::solver::units::si;

    fn line(n: usize) -> Arc<FvMesh> {
        Arc::new(generate_line_mesh(n, 1.0, SidePatch::patch("inlet"), SidePatch::patch("outlet")).unwrap())
    }

    fn t_dict() -> Dictionary {
        Dictionary::parse(
            "T",
            r#"{
                "dimensions": [0, 0, 0, 1, 0, 0, 0],
                "internalField": {"uniform": 300},
                "boundaryField": {
                    "inlet": {"type": "fixedValue", "value": {"uniform": 400}},
                    "outlet": {"type": "zeroGradient"}
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn reads_from_source() {
        let source = MemoryFieldSource::new().with("T", t_dict());
        let registry = PatchFieldRegistry::standard();
        let t = VolField::<f64>::read("T", line(4), &source, &registry, ReadPolicy::MustRead).unwrap();
        assert_eq!(t.dimensions(), si::TEMPERATURE);
        assert_eq!(t.values(), &[300.0; 4]);
        assert_eq!(&*t.boundary_value(0), &[400.0]);
        assert_eq!(&*t.boundary_value(1), &[300.0]);
        assert_eq!(t.boundary_field(1).type_name(), "zeroGradient");
    }

    #[test]
    fn missing_data_is_an_error_unless_defaulted() {
        let source = MemoryFieldSource::new();
        let registry = PatchFieldRegistry::<f64>::standard();
        let err = VolField::read("p", line(3), &source, &registry, ReadPolicy::MustRead).unwrap_err();
        assert!(matches!(err, FieldError::MissingData { .. }));

        let p = VolField::read(
            "p",
            line(3),
            &source,
            &registry,
            ReadPolicy::Default {
                dimensions: si::KINEMATIC_PRESSURE,
                value: 0.0,
                patch_type: "zeroGradient".into(),
            },
        )
        .unwrap();
        assert_eq!(p.values(), &[0.0; 3]);
    }

    #[test]
    fn missing_patch_entry_names_field_and_patch() {
        let mut dict = t_dict();
        let mut boundary = dict.sub_dict("boundaryField").unwrap().as_value();
        boundary.as_object_mut().unwrap().remove("outlet");
        dict.insert("boundaryField", boundary);
        let registry = PatchFieldRegistry::<f64>::standard();
        let err = VolField::from_dict("T", line(2), &dict, &registry).unwrap_err();
        assert_eq!(
            err,
            FieldError::Config(ConfigError::MissingEntry {
                scope: "T.boundaryField".into(),
                key: "outlet".into()
            })
        );
    }

    #[test]
    fn boundary_value_follows_internal_changes() {
        let registry = PatchFieldRegistry::standard();
        let mut t = VolField::from_dict("T", line(3), &t_dict(), &registry).unwrap();
        t.values_mut()[2] = 350.0;
        assert_eq!(&*t.boundary_value(1), &[350.0]);
        assert_eq!(&*t.boundary_value(0), &[400.0]);
    }

    #[test]
    fn old_times_rotate_once_per_step() {
        let mut t = VolField::calculated("T", line(2), si::TEMPERATURE, vec![1.0, 1.0]).unwrap();
        let mut time = TimeState::new(0.0, 0.1);
        time.index = 1;
        t.store_old_times(&time);
        t.set_values(&[2.0, 2.0]).unwrap();
        t.store_old_times(&time);
        assert_eq!(t.old_time(), &[1.0, 1.0]);
        assert!(t.old_old_time().is_none());

        time.index = 2;
        t.store_old_times(&time);
        assert_eq!(t.old_time(), &[2.0, 2.0]);
        assert_eq!(t.old_old_time().unwrap(), &[1.0, 1.0]);
    }

    #[test]
    fn relax_blends_with_previous_iteration() {
        let mut p = VolField::calculated("p", line(2), si::KINEMATIC_PRESSURE, vec![0.0, 0.0]).unwrap();
        assert!(p.relax(0.3).is_err());
        p.store_prev_iter();
        p.set_values(&[1.0, 2.0]).unwrap();
        p.relax(0.3).unwrap();
        assert!((p.values()[0] - 0.3).abs() < 1e-14);
        assert!((p.values()[1] - 0.6).abs() < 1e-14);
    }
}
