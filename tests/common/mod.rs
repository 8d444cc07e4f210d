#![allow(dead_code)]

use fvcore::solver::boundary::{EvalContext, PatchFieldRegistry};
use fvcore::solver::dictionary::Dictionary;
use fvcore::solver::field::{FieldValue, VolField};
use fvcore::solver::linear_solver::LinearSolverControls;
use fvcore::solver::mesh::{generate_line_mesh, FvMesh, SidePatch};
use fvcore::solver::time::TimeState;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Unit-length line of `n` cells between `inlet` and `outlet`.
pub fn line(n: usize) -> Arc<FvMesh> {
    Arc::new(generate_line_mesh(n, 1.0, SidePatch::patch("inlet"), SidePatch::patch("outlet")).unwrap())
}

/// Field from a `boundaryField` JSON object and a uniform internal value.
pub fn field<T: FieldValue>(
    name: &str,
    mesh: &Arc<FvMesh>,
    dimensions: [i32; 7],
    internal: Value,
    boundary: Value,
) -> VolField<T> {
    let dict = Dictionary::from_value(
        name,
        json!({
            "dimensions": dimensions,
            "internalField": {"uniform": internal},
            "boundaryField": boundary,
        }),
    )
    .unwrap();
    VolField::from_dict(name, Arc::clone(mesh), &dict, &PatchFieldRegistry::standard()).unwrap()
}

pub fn temperature(mesh: &Arc<FvMesh>, internal: f64, boundary: Value) -> VolField<f64> {
    field("T", mesh, [0, 0, 0, 1, 0, 0, 0], json!(internal), boundary)
}

pub fn pcg() -> LinearSolverControls {
    LinearSolverControls::new("PCG")
        .with_preconditioner("DIC")
        .with_tolerance(1e-12, 0.0)
}

pub fn bicgstab() -> LinearSolverControls {
    LinearSolverControls::new("PBiCGStab")
        .with_preconditioner("DILU")
        .with_tolerance(1e-12, 0.0)
}

pub fn steady() -> EvalContext<'static> {
    EvalContext::serial(TimeState::steady())
}

pub fn assert_close(actual: &[f64], expected: &[f64], tol: f64) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() < tol, "cell {}: {} vs {}", i, a, e);
    }
}

/// Volume integral of a scalar field.
pub fn integral(t: &VolField<f64>) -> f64 {
    t.values()
        .iter()
        .zip(&t.mesh().cell_volumes)
        .map(|(v, vol)| v * vol)
        .sum()
}
