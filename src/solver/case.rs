//! JSON case files: mesh, initial fields, controls and the application that
//! runs them.
//!
//! ```json
//! {
//!   "application": "scalarTransport",
//!   "nProcs": 2,
//!   "mesh": { "cells": [20, 1, 1], "extent": [1, 0.1, 0.1], "patches": { ... } },
//!   "controlDict": { "endTime": 1.0, "deltaT": 0.01 },
//!   "transportProperties": { "DT": 0.01 },
//!   "fields": { "T": { ... }, "U": { ... } },
//!   "fvSchemes": { ... },
//!   "fvSolution": { ... },
//!   "fvModels": { ... }
//! }
//! ```

use crate::solver::apps::{FvSolution, ScalarTransport, SimpleFluid};
use crate::solver::boundary::{EvalContext, PatchFieldRegistry};
use crate::solver::dictionary::{ConfigError, Dictionary};
use crate::solver::error::FvError;
use crate::solver::field::{FieldValue, MemoryFieldSource, ReadPolicy, VolField};
use crate::solver::fvc;
use crate::solver::mesh::{decompose_box_mesh_x, generate_box_mesh, BoxMeshConfig, FvMesh};
use crate::solver::models::FvModels;
use crate::solver::parallel::{Communicator, SerialComm, ThreadComm};
use crate::solver::scheme::FvSchemes;
use crate::solver::time::{RunTime, TimeControls};
use crate::solver::units::{si, DimensionSet, Dimensioned};
use nalgebra::Vector3;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Application {
    ScalarTransport,
    SimpleFluid,
}

impl Application {
    pub const NAMES: [&'static str; 2] = ["scalarTransport", "simpleFluid"];

    pub fn as_str(self) -> &'static str {
        match self {
            Application::ScalarTransport => "scalarTransport",
            Application::SimpleFluid => "simpleFluid",
        }
    }
}

impl FromStr for Application {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scalarTransport" => Ok(Application::ScalarTransport),
            "simpleFluid" => Ok(Application::SimpleFluid),
            other => Err(ConfigError::UnknownType {
                what: "application",
                name: other.to_string(),
                valid: Self::NAMES.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of running a case on one rank.
#[derive(Clone, Debug)]
pub struct CaseReport {
    pub rank: usize,
    /// Time steps or SIMPLE iterations taken.
    pub steps: usize,
    /// For transient runs: every solve converged. For SIMPLE: residual
    /// control was met.
    pub converged: bool,
    pub residuals: Vec<(String, f64)>,
    /// Final fields in the layout `VolField::from_dict` reads.
    pub fields: Vec<(String, Value)>,
}

#[derive(Clone, Debug)]
pub struct Case {
    pub application: Application,
    pub n_procs: usize,
    pub mesh: BoxMeshConfig,
    pub control: TimeControls,
    pub schemes: FvSchemes,
    pub solution: FvSolution,
    transport: Dictionary,
    models: Dictionary,
    fields: MemoryFieldSource,
}

impl Case {
    pub fn read(path: &Path) -> Result<Self, FvError> {
        Self::from_dict(&Dictionary::read(path)?)
    }

    pub fn from_dict(dict: &Dictionary) -> Result<Self, FvError> {
        let application: Application = dict.lookup::<String>("application")?.parse()?;
        let n_procs = dict.lookup_or("nProcs", 1usize)?;
        if n_procs == 0 {
            return Err(ConfigError::InvalidEntry {
                scope: dict.scope().to_string(),
                key: "nProcs".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }

        let fields_dict = dict.sub_dict("fields")?;
        let mut fields = MemoryFieldSource::new();
        for name in fields_dict.keys() {
            fields.insert(name, fields_dict.sub_dict(name)?);
        }

        Ok(Self {
            application,
            n_procs,
            mesh: dict.lookup("mesh")?,
            control: dict.lookup("controlDict")?,
            schemes: FvSchemes::from_dict(&dict.sub_dict("fvSchemes")?)?,
            solution: FvSolution::from_dict(&dict.sub_dict_or_empty("fvSolution")?)?,
            transport: dict.sub_dict_or_empty("transportProperties")?,
            models: dict.sub_dict_or_empty("fvModels")?,
            fields,
        })
    }

    /// One mesh per rank; a single mesh when `nProcs` is 1.
    pub fn meshes(&self) -> Result<Vec<FvMesh>, FvError> {
        let spec = self.mesh.to_spec()?;
        if self.n_procs == 1 {
            Ok(vec![generate_box_mesh(&spec)?])
        } else {
            Ok(decompose_box_mesh_x(&spec, self.n_procs)?)
        }
    }

    /// Runs on every rank, one thread per rank when decomposed. Reports are
    /// in rank order.
    pub fn run_all(&self) -> Result<Vec<CaseReport>, FvError> {
        let meshes: Vec<Arc<FvMesh>> = self.meshes()?.into_iter().map(Arc::new).collect();
        log::info!(
            "{}: {} cells on {} rank(s)",
            self.application,
            meshes.iter().map(|m| m.num_cells()).sum::<usize>(),
            meshes.len()
        );
        if meshes.len() == 1 {
            return Ok(vec![self.run(Arc::clone(&meshes[0]), &SerialComm)?]);
        }
        ThreadComm::run(meshes.len(), |comm| self.run(Arc::clone(&meshes[comm.rank()]), &comm))
            .into_iter()
            .collect()
    }

    /// Runs the application on this rank's mesh.
    pub fn run(&self, mesh: Arc<FvMesh>, comm: &dyn Communicator) -> Result<CaseReport, FvError> {
        let mut run_time = RunTime::new(&self.control);
        match self.application {
            Application::ScalarTransport => {
                let t = self.read_field::<f64>("T", &mesh)?;
                let mut u = VolField::read(
                    "U",
                    Arc::clone(&mesh),
                    &self.fields,
                    &PatchFieldRegistry::standard(),
                    ReadPolicy::ReadIfPresent {
                        dimensions: si::VELOCITY,
                        value: Vector3::zeros(),
                        patch_type: "calculated".to_string(),
                    },
                )?;
                // Processor patches need neighbour values before the flux is formed.
                u.correct_boundary_conditions(&EvalContext::new(run_time.state(), comm))?;
                let mut phi = fvc::flux(&u);
                phi.name = "phi".to_string();
                let dt = self.constant("DT", si::KINEMATIC_VISCOSITY)?;
                let models = FvModels::from_dict(&self.models, &mesh, &["T"])?;

                let mut app = ScalarTransport::new(t, phi, dt, self.schemes.clone(), self.solution.clone())
                    .with_models(models);
                let history = app.run(&mut run_time, comm)?;
                Ok(CaseReport {
                    rank: comm.rank(),
                    steps: history.len(),
                    converged: history.iter().all(|perf| perf.converged),
                    residuals: app.residuals.clone(),
                    fields: vec![("T".to_string(), app.t.write())],
                })
            }
            Application::SimpleFluid => {
                let mut u = self.read_field::<Vector3<f64>>("U", &mesh)?;
                u.correct_boundary_conditions(&EvalContext::new(run_time.state(), comm))?;
                let p = self.read_field::<f64>("p", &mesh)?;
                let nu = self.constant("nu", si::KINEMATIC_VISCOSITY)?;
                let models = FvModels::from_dict(&self.models, &mesh, &["U"])?;

                let mut app = SimpleFluid::new(u, p, nu, self.schemes.clone(), self.solution.clone())
                    .with_models(models);
                let (steps, converged) = app.run(&mut run_time, comm)?;
                Ok(CaseReport {
                    rank: comm.rank(),
                    steps,
                    converged,
                    residuals: app.residuals.clone(),
                    fields: vec![("U".to_string(), app.u.write()), ("p".to_string(), app.p.write())],
                })
            }
        }
    }

    fn read_field<T: FieldValue>(&self, name: &str, mesh: &Arc<FvMesh>) -> Result<VolField<T>, FvError> {
        Ok(VolField::read(
            name,
            Arc::clone(mesh),
            &self.fields,
            &PatchFieldRegistry::standard(),
            ReadPolicy::MustRead,
        )?)
    }

    fn constant(&self, name: &str, dimensions: DimensionSet) -> Result<Dimensioned<f64>, FvError> {
        let value = self.transport.entry(name)?;
        Ok(Dimensioned::from_json(name, dimensions, value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn line_case(application: &str, n_procs: usize) -> Dictionary {
        Dictionary::from_value(
            "case",
            json!({
                "application": application,
                "nProcs": n_procs,
                "mesh": {
                    "cells": [8, 1, 1],
                    "extent": [1.0, 1.0, 1.0],
                    "patches": {
                        "left": {"name": "inlet"},
                        "right": {"name": "outlet"},
                        "bottom": {"name": "sides", "type": "empty"},
                        "top": {"name": "sides", "type": "empty"},
                        "back": {"name": "sides", "type": "empty"},
                        "front": {"name": "sides", "type": "empty"}
                    }
                },
                "controlDict": {"endTime": 0.5, "deltaT": 0.1},
                "transportProperties": {"DT": 0.05},
                "fields": {
                    "T": {
                        "dimensions": [0, 0, 0, 1, 0, 0, 0],
                        "internalField": {"uniform": 0.0},
                        "boundaryField": {
                            "inlet": {"type": "fixedValue", "value": {"uniform": 1.0}},
                            "outlet": {"type": "zeroGradient"}
                        }
                    }
                },
                "fvSchemes": {
                    "ddtSchemes": {"default": "Euler"},
                    "divSchemes": {"default": "Gauss upwind"},
                    "laplacianSchemes": {"default": "Gauss linear corrected"}
                },
                "fvSolution": {
                    "solvers": {"T": {"solver": "PBiCGStab", "preconditioner": "DILU", "tolerance": 1e-12}}
                }
            }),
        )
        .unwrap()
    }

    #[test]
    fn unknown_application_lists_valid_names() {
        let err = "icoFoam".parse::<Application>().unwrap_err();
        let text = err.to_string();
        assert!(text.contains("icoFoam"));
        assert!(text.contains("scalarTransport"));
        assert!(text.contains("simpleFluid"));
    }

    #[test]
    fn decomposed_diffusion_matches_serial_run() {
        let serial = Case::from_dict(&line_case("scalarTransport", 1)).unwrap().run_all().unwrap();
        let split = Case::from_dict(&line_case("scalarTransport", 2)).unwrap().run_all().unwrap();
        assert_eq!(serial.len(), 1);
        assert_eq!(split.len(), 2);
        assert_eq!(serial[0].steps, 5);

        let values = |report: &CaseReport| -> Vec<f64> {
            report.fields[0].1["internalField"]["nonuniform"]
                .as_array()
                .unwrap()
                .iter()
                .map(|v| v.as_f64().unwrap())
                .collect()
        };
        let joined: Vec<f64> = split.iter().flat_map(values).collect();
        for (a, b) in values(&serial[0]).iter().zip(&joined) {
            assert!((a - b).abs() < 1e-8, "{} vs {}", a, b);
        }
    }

    #[test]
    fn missing_field_is_reported() {
        let mut dict = line_case("simpleFluid", 1);
        dict.insert("transportProperties", json!({"nu": 0.01}));
        let case = Case::from_dict(&dict).unwrap();
        let err = case.run_all().unwrap_err();
        assert!(matches!(err, FvError::Field(_)), "{}", err);
    }
}
