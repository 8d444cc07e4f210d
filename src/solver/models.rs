//! Run-time selected source terms injected into transport equations.
//!
//! An [`FvModel`] adds terms to a matrix holding the right-hand side of an
//! equation; applications write `eqn == models.source(psi)`.

use crate::solver::boundary::{EvalContext, Function1};
use crate::solver::dictionary::{ConfigError, Dictionary};
use crate::solver::error::FvError;
use crate::solver::field::{DimensionedField, FieldValue, VolField};
use crate::solver::fvm;
use crate::solver::matrix::FvMatrix;
use crate::solver::mesh::FvMesh;
use crate::solver::units::si;
use indexmap::IndexMap;
use nalgebra::Point3;
use std::fmt;

pub trait FvModel<T: FieldValue>: fmt::Debug + Send {
    fn name(&self) -> &str;

    fn type_name(&self) -> &'static str;

    /// True if the model contributes to the equation of `field`.
    fn adds_sup_to_field(&self, field: &str) -> bool;

    /// Adds the model's terms for `psi` to `eqn`.
    fn add_sup(&self, psi: &VolField<T>, eqn: &mut FvMatrix<T>, ctx: &EvalContext<'_>) -> Result<(), FvError>;
}

/// Cells a model acts on.
#[derive(Clone, Debug, PartialEq)]
pub enum CellSelection {
    All,
    Cells(Vec<usize>),
    /// Cells whose centre lies inside the axis-aligned box.
    Box { min: Point3<f64>, max: Point3<f64> },
}

impl CellSelection {
    pub const NAMES: [&'static str; 3] = ["all", "cells", "box"];

    pub fn from_dict(dict: &Dictionary) -> Result<Self, ConfigError> {
        let mode: String = dict.lookup_or("selectionMode", "all".to_string())?;
        match mode.as_str() {
            "all" => Ok(CellSelection::All),
            "cells" => Ok(CellSelection::Cells(dict.lookup("cells")?)),
            "box" => {
                let min: [f64; 3] = dict.lookup("min")?;
                let max: [f64; 3] = dict.lookup("max")?;
                Ok(CellSelection::Box {
                    min: Point3::from(min),
                    max: Point3::from(max),
                })
            }
            other => Err(ConfigError::UnknownType {
                what: "selectionMode",
                name: other.to_string(),
                valid: Self::NAMES.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }

    pub fn cells(&self, mesh: &FvMesh) -> Vec<usize> {
        match self {
            CellSelection::All => (0..mesh.num_cells()).collect(),
            CellSelection::Cells(cells) => cells.iter().copied().filter(|&c| c < mesh.num_cells()).collect(),
            CellSelection::Box { min, max } => mesh
                .cell_centres
                .iter()
                .enumerate()
                .filter(|(_, c)| (0..3).all(|d| c[d] >= min[d] && c[d] <= max[d]))
                .map(|(i, _)| i)
                .collect(),
        }
    }
}

/// How source values relate to the selected volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VolumeMode {
    /// Values are totals over the selection and are divided by its volume.
    Absolute,
    /// Values are per unit volume.
    Specific,
}

/// `S = Su + Sp psi` on a cell selection, with time-dependent `Su`, `Sp`.
#[derive(Clone, Debug)]
pub struct SemiImplicitSource<T: FieldValue> {
    name: String,
    cells: Vec<usize>,
    volume_mode: VolumeMode,
    sources: IndexMap<String, (Function1<T>, Function1<f64>)>,
}

impl<T: FieldValue> SemiImplicitSource<T> {
    pub const TYPE_NAME: &'static str = "semiImplicitSource";

    /// Reads `sources` entries for the fields in `fields`; other entries
    /// belong to models of a different value type.
    pub fn from_dict(name: &str, dict: &Dictionary, mesh: &FvMesh, fields: &[&str]) -> Result<Self, ConfigError> {
        let selection = CellSelection::from_dict(dict)?;
        let volume_mode = match dict.lookup_or("volumeMode", "absolute".to_string())?.as_str() {
            "absolute" => VolumeMode::Absolute,
            "specific" => VolumeMode::Specific,
            other => {
                return Err(ConfigError::UnknownType {
                    what: "volumeMode",
                    name: other.to_string(),
                    valid: vec!["absolute".to_string(), "specific".to_string()],
                })
            }
        };

        let sources_dict = dict.sub_dict("sources")?;
        let mut sources = IndexMap::new();
        for field in sources_dict.keys() {
            if !fields.contains(&field.as_str()) {
                continue;
            }
            let entry = sources_dict.sub_dict(field)?;
            let explicit = Function1::<T>::from_dict(&entry, "explicit")?;
            let implicit = if entry.found("implicit") {
                Function1::<f64>::from_dict(&entry, "implicit")?
            } else {
                Function1::Constant(0.0)
            };
            sources.insert(field.clone(), (explicit, implicit));
        }

        Ok(Self {
            name: name.to_string(),
            cells: selection.cells(mesh),
            volume_mode,
            sources,
        })
    }
}

impl<T: FieldValue> FvModel<T> for SemiImplicitSource<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn adds_sup_to_field(&self, field: &str) -> bool {
        self.sources.contains_key(field)
    }

    fn add_sup(&self, psi: &VolField<T>, eqn: &mut FvMatrix<T>, ctx: &EvalContext<'_>) -> Result<(), FvError> {
        let Some((explicit, implicit)) = self.sources.get(psi.name()) else {
            return Ok(());
        };
        let mesh = psi.mesh();
        let scale = match self.volume_mode {
            VolumeMode::Specific => 1.0,
            VolumeMode::Absolute => {
                let local: f64 = self.cells.iter().map(|&c| mesh.cell_volumes[c]).sum();
                let total = ctx.comm.all_reduce_sum(local)?;
                if total > 0.0 {
                    1.0 / total
                } else {
                    0.0
                }
            }
        };

        let t = ctx.time.value;
        let su_value = explicit.value(t) * scale;
        let sp_value = implicit.value(t) * scale;
        let n = mesh.num_cells();
        let mut su = DimensionedField::uniform(
            &format!("{}:Su", self.name),
            psi.dimensions() / si::TIME,
            n,
            T::zero(),
        );
        let mut sp = DimensionedField::uniform(&format!("{}:Sp", self.name), si::INV_TIME, n, 0.0);
        for &c in &self.cells {
            su.values[c] = su_value;
            sp.values[c] = sp_value;
        }
        log::debug!(
            "{} {}: adding source to {} on {} cells",
            Self::TYPE_NAME,
            self.name,
            psi.name(),
            self.cells.len()
        );

        eqn.add_matrix(&fvm::su(&su, psi))?;
        eqn.add_matrix(&fvm::sp(&sp, psi))?;
        Ok(())
    }
}

pub type ModelConstructor<T> = fn(&str, &Dictionary, &FvMesh, &[&str]) -> Result<Box<dyn FvModel<T>>, ConfigError>;

fn semi_implicit_source<T: FieldValue>(
    name: &str,
    dict: &Dictionary,
    mesh: &FvMesh,
    fields: &[&str],
) -> Result<Box<dyn FvModel<T>>, ConfigError> {
    Ok(Box::new(SemiImplicitSource::<T>::from_dict(name, dict, mesh, fields)?))
}

/// Model constructors keyed by type name.
pub fn model_registry<T: FieldValue>() -> IndexMap<&'static str, ModelConstructor<T>> {
    let mut registry: IndexMap<&'static str, ModelConstructor<T>> = IndexMap::new();
    registry.insert(SemiImplicitSource::<T>::TYPE_NAME, semi_implicit_source::<T>);
    registry
}

/// The models of one value type.
#[derive(Debug)]
pub struct FvModels<T: FieldValue> {
    models: Vec<Box<dyn FvModel<T>>>,
}

impl<T: FieldValue> Default for FvModels<T> {
    fn default() -> Self {
        Self { models: Vec::new() }
    }
}

impl<T: FieldValue> FvModels<T> {
    /// Reads every sub-dictionary of `dict` as a model.
    pub fn from_dict(dict: &Dictionary, mesh: &FvMesh, fields: &[&str]) -> Result<Self, ConfigError> {
        let registry = model_registry::<T>();
        let mut models = Self::default();
        for name in dict.keys() {
            let model_dict = dict.sub_dict(name)?;
            let type_name: String = model_dict.lookup("type")?;
            let constructor = registry.get(type_name.as_str()).ok_or_else(|| ConfigError::UnknownType {
                what: "fvModel",
                name: type_name.clone(),
                valid: registry.keys().map(|k| k.to_string()).collect(),
            })?;
            log::info!("Selecting fvModel {} of type {}", name, type_name);
            models.push(constructor(name, &model_dict, mesh, fields)?);
        }
        Ok(models)
    }

    pub fn push(&mut self, model: Box<dyn FvModel<T>>) {
        self.models.push(model);
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn adds_sup_to_field(&self, field: &str) -> bool {
        self.models.iter().any(|m| m.adds_sup_to_field(field))
    }

    /// Right-hand-side matrix of all model terms for `psi`, with the
    /// dimensions of `ddt(psi)`.
    pub fn source(&self, psi: &VolField<T>, ctx: &EvalContext<'_>) -> Result<FvMatrix<T>, FvError> {
        let mut eqn = FvMatrix::new(psi, psi.dimensions() * si::VOLUME / si::TIME);
        for model in self.models.iter().filter(|m| m.adds_sup_to_field(psi.name())) {
            model.add_sup(psi, &mut eqn, ctx)?;
        }
        Ok(eqn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::mesh::{generate_line_mesh, SidePatch};
    use crate::solver::time::TimeState;
    use serde_json::json;
    use std::sync::Arc;

    fn setup() -> (Arc<FvMesh>, VolField<f64>) {
        let mesh = Arc::new(generate_line_mesh(4, 2.0, SidePatch::patch("inlet"), SidePatch::patch("outlet")).unwrap());
        let t = VolField::calculated("T", Arc::clone(&mesh), si::TEMPERATURE, vec![10.0; 4]).unwrap();
        (mesh, t)
    }

    #[test]
    fn absolute_source_is_spread_over_the_selection() {
        let (mesh, t) = setup();
        let dict = Dictionary::from_value(
            "fvModels",
            json!({
                "heater": {
                    "type": "semiImplicitSource",
                    "selectionMode": "cells",
                    "cells": [1, 2],
                    "sources": {"T": {"explicit": 4.0, "implicit": -0.5}, "U": {"explicit": [1, 0, 0]}}
                }
            }),
        )
        .unwrap();
        let models = FvModels::<f64>::from_dict(&dict, &mesh, &["T"]).unwrap();
        assert_eq!(models.len(), 1);
        assert!(models.adds_sup_to_field("T"));
        assert!(!models.adds_sup_to_field("U"));

        let ctx = EvalContext::serial(TimeState::new(0.0, 1.0));
        let s = models.source(&t, &ctx).unwrap();
        let set_volume = mesh.cell_volumes[1] + mesh.cell_volumes[2];
        // Source matrices carry the term on the left: source = -V Su.
        let total_su: f64 = s.source.iter().map(|v| -v).sum();
        assert!((total_su - 4.0).abs() < 1e-12);
        assert!((s.diag[1] + 0.5 * mesh.cell_volumes[1] / set_volume).abs() < 1e-12);
        assert_eq!(s.diag[0], 0.0);
    }

    #[test]
    fn unknown_model_type_lists_valid_names() {
        let (mesh, _) = setup();
        let dict = Dictionary::from_value("fvModels", json!({"x": {"type": "magic"}})).unwrap();
        match FvModels::<f64>::from_dict(&dict, &mesh, &["T"]) {
            Err(ConfigError::UnknownType { name, valid, .. }) => {
                assert_eq!(name, "magic");
                assert_eq!(valid, vec!["semiImplicitSource".to_string()]);
            }
            other => panic!("unexpected {:?}", other.map(|m| m.len())),
        }
    }

    #[test]
    fn box_selection_uses_cell_centres() {
        let (mesh, _) = setup();
        let sel = CellSelection::Box {
            min: Point3::new(0.0, -1.0, -1.0),
            max: Point3::new(1.0, 2.0, 2.0),
        };
        assert_eq!(sel.cells(&mesh), vec![0, 1]);
    }
}
