//! Solver applications built on the assembly core, and the `fvSolution`
//! controls they read.

pub mod scalar_transport;
pub mod simple;

pub use scalar_transport::ScalarTransport;
pub use simple::SimpleFluid;

use crate::solver::boundary::EvalContext;
use crate::solver::dictionary::{ConfigError, Dictionary};
use crate::solver::field::{FieldError, FieldValue, VolField};
use crate::solver::linear_solver::LinearSolverControls;
use crate::solver::mesh::FvMesh;
use crate::solver::units::DimensionSet;
use indexmap::IndexMap;
use serde::Deserialize;
use std::sync::Arc;

/// Under-relaxation factors for explicit field and implicit equation
/// relaxation.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RelaxationFactors {
    #[serde(default)]
    pub fields: IndexMap<String, f64>,
    #[serde(default)]
    pub equations: IndexMap<String, f64>,
}

impl RelaxationFactors {
    pub fn field(&self, name: &str) -> Option<f64> {
        lookup_pattern(&self.fields, name).copied()
    }

    pub fn equation(&self, name: &str) -> Option<f64> {
        lookup_pattern(&self.equations, name).copied()
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleControls {
    #[serde(default = "default_true")]
    pub momentum_predictor: bool,
    #[serde(default)]
    pub n_non_orthogonal_correctors: usize,
    #[serde(default)]
    pub p_ref_cell: usize,
    #[serde(default)]
    pub p_ref_value: f64,
    /// Initial-residual thresholds per field; the run stops when every
    /// listed field is below its threshold.
    #[serde(default)]
    pub residual_control: IndexMap<String, f64>,
}

impl Default for SimpleControls {
    fn default() -> Self {
        Self {
            momentum_predictor: true,
            n_non_orthogonal_correctors: 0,
            p_ref_cell: 0,
            p_ref_value: 0.0,
            residual_control: IndexMap::new(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PimpleControls {
    #[serde(default = "default_one")]
    pub n_outer_correctors: usize,
    #[serde(default)]
    pub n_non_orthogonal_correctors: usize,
}

impl Default for PimpleControls {
    fn default() -> Self {
        Self {
            n_outer_correctors: 1,
            n_non_orthogonal_correctors: 0,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_one() -> usize {
    1
}

/// `fvSolution`: linear solver controls per field plus algorithm controls.
#[derive(Clone, Debug, Default)]
pub struct FvSolution {
    solvers: IndexMap<String, LinearSolverControls>,
    pub relaxation_factors: RelaxationFactors,
    pub simple: SimpleControls,
    pub pimple: PimpleControls,
}

impl FvSolution {
    pub fn from_dict(dict: &Dictionary) -> Result<Self, ConfigError> {
        let solvers_dict = dict.sub_dict_or_empty("solvers")?;
        let mut solvers = IndexMap::new();
        for key in solvers_dict.keys() {
            solvers.insert(key.clone(), solvers_dict.lookup::<LinearSolverControls>(key)?);
        }
        Ok(Self {
            solvers,
            relaxation_factors: dict.sub_dict_or_empty("relaxationFactors")?.to_typed()?,
            simple: dict.sub_dict_or_empty("SIMPLE")?.to_typed()?,
            pimple: dict.sub_dict_or_empty("PIMPLE")?.to_typed()?,
        })
    }

    pub fn set_solver(&mut self, field: &str, controls: LinearSolverControls) {
        self.solvers.insert(field.to_string(), controls);
    }

    /// Controls for `field`. Keys may list alternatives, `(U|T)`; a `Final`
    /// field falls back to its base name.
    pub fn solver(&self, field: &str) -> Result<&LinearSolverControls, ConfigError> {
        lookup_pattern(&self.solvers, field)
            .or_else(|| field.strip_suffix("Final").and_then(|base| lookup_pattern(&self.solvers, base)))
            .ok_or_else(|| ConfigError::MissingEntry {
                scope: "fvSolution.solvers".to_string(),
                key: field.to_string(),
            })
    }
}

fn lookup_pattern<'a, V>(map: &'a IndexMap<String, V>, name: &str) -> Option<&'a V> {
    map.get(name).or_else(|| {
        map.iter()
            .find(|(key, _)| {
                key.trim_start_matches('(')
                    .trim_end_matches(')')
                    .split('|')
                    .any(|alt| alt == name)
            })
            .map(|(_, v)| v)
    })
}

/// Calculated field whose uncoupled boundary values are the adjacent cell
/// values and whose coupled patches hold exchanged neighbour values.
pub(crate) fn extrapolated<T: FieldValue>(
    name: &str,
    mesh: &Arc<FvMesh>,
    dimensions: DimensionSet,
    values: Vec<T>,
    ctx: &EvalContext<'_>,
) -> Result<VolField<T>, FieldError> {
    let mut field = VolField::calculated(name, Arc::clone(mesh), dimensions, values)?;
    field.update_coeffs(ctx)?;
    for patch in mesh.patches.iter().filter(|p| !p.is_coupled()) {
        let internal = field.patch_internal(patch.index);
        field.assign_boundary(patch.index, &internal)?;
    }
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn solver_lookup_handles_alternatives_and_final() {
        let dict = Dictionary::from_value(
            "fvSolution",
            json!({
                "solvers": {
                    "p": {"solver": "PCG", "preconditioner": "DIC", "tolerance": 1e-8, "relTol": 0.05},
                    "(U|T)": {"solver": "smoothSolver", "smoother": "symGaussSeidel"}
                },
                "SIMPLE": {"residualControl": {"p": 1e-4}},
                "relaxationFactors": {"fields": {"p": 0.3}, "equations": {"U": 0.7}}
            }),
        )
        .unwrap();
        let solution = FvSolution::from_dict(&dict).unwrap();
        assert_eq!(solution.solver("pFinal").unwrap().solver, "PCG");
        assert_eq!(solution.solver("T").unwrap().solver, "smoothSolver");
        assert!(solution.solver("k").is_err());
        assert_eq!(solution.relaxation_factors.field("p"), Some(0.3));
        assert_eq!(solution.relaxation_factors.equation("U"), Some(0.7));
        assert_eq!(solution.relaxation_factors.equation("p"), None);
        assert!(solution.simple.momentum_predictor);
        assert_eq!(solution.simple.residual_control["p"], 1e-4);
        assert_eq!(solution.pimple.n_outer_correctors, 1);
    }
}
