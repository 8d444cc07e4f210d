mod common;

use fvcore::solver::boundary::{EvalContext, PatchFieldRegistry};
use fvcore::solver::dictionary::{ConfigError, Dictionary};
use fvcore::solver::fvc;
use fvcore::solver::fvm;
use fvcore::solver::linear_solver::{self, LinearSolverControls};
use fvcore::solver::mesh::{
    decompose_box_mesh_x, decompose_line_mesh, generate_box_mesh, BoxMeshSpec, BoxSides, FvMesh, SidePatch,
};
use fvcore::solver::parallel::{Communicator, SerialComm, ThreadComm};
use fvcore::solver::scheme::{ConvectionScheme, DdtScheme, LaplacianScheme};
use fvcore::solver::time::TimeState;
use fvcore::solver::units::{si, Dimensioned};
use fvcore::solver::{FvError, VolField};
use nalgebra::{Point3, Vector3};
use serde_json::json;
use std::f64::consts::PI;
use std::sync::Arc;

const N: usize = 16;

/// Convection-diffusion of a sine profile on `mesh`; returns the cell values
/// after a few implicit steps.
fn advect_sine(mesh: Arc<FvMesh>, comm: &dyn Communicator, convection: &ConvectionScheme) -> Vec<f64> {
    let u: VolField<Vector3<f64>> = common::field(
        "U",
        &mesh,
        [0, 1, -1, 0, 0, 0, 0],
        json!([1.0, 0.0, 0.0]),
        json!({
            "inlet": {"type": "fixedValue", "value": {"uniform": [1.0, 0.0, 0.0]}},
            "outlet": {"type": "zeroGradient"}
        }),
    );
    let phi = fvc::flux(&u);
    let mut t = common::temperature(
        &mesh,
        0.0,
        json!({
            "inlet": {"type": "fixedValue", "value": {"uniform": 0.0}},
            "outlet": {"type": "zeroGradient"}
        }),
    );
    let initial: Vec<f64> = mesh.cell_centres.iter().map(|c| (PI * c.x).sin()).collect();
    t.set_values(&initial).unwrap();

    let dt = Dimensioned::new("DT", si::KINEMATIC_VISCOSITY, 0.02);
    let mut time = TimeState::new(0.0, 0.02);
    for step in 1..=5 {
        time.value += time.delta_t;
        time.index = step;
        let ctx = EvalContext::new(time, comm).with_flux(&phi);
        t.store_old_times(&time);
        t.update_coeffs(&ctx).unwrap();
        let eqn = fvm::ddt(&t, DdtScheme::Euler, &time)
            .try_add(&fvm::div(&phi, &t, convection))
            .unwrap()
            .try_sub(&fvm::laplacian_uniform(&dt, &t, &LaplacianScheme::default()))
            .unwrap();
        let perf = eqn.solve(&mut t, &common::bicgstab(), &ctx).unwrap();
        assert!(perf.converged);
    }
    t.values().to_vec()
}

fn split_matches_serial(convection: &ConvectionScheme, tol: f64) {
    let serial = advect_sine(common::line(N), &SerialComm, convection);

    for n_parts in [2, 3] {
        let parts = decompose_line_mesh(N, 1.0, n_parts, SidePatch::patch("inlet"), SidePatch::patch("outlet"))
            .unwrap()
            .into_iter()
            .map(Arc::new)
            .collect::<Vec<_>>();
        let per_rank = ThreadComm::run(n_parts, |comm| {
            advect_sine(Arc::clone(&parts[comm.rank()]), &comm, convection)
        });
        let joined: Vec<f64> = per_rank.into_iter().flatten().collect();
        common::assert_close(&joined, &serial, tol);
    }
}

#[test]
fn processor_split_matches_serial_solve() {
    common::init_logging();
    split_matches_serial(&ConvectionScheme::upwind(), 1e-10);
}

#[test]
fn limited_scheme_is_independent_of_decomposition() {
    split_matches_serial(&"Gauss vanLeer".parse().unwrap(), 1e-10);
}

#[test]
fn linear_upwind_is_independent_of_decomposition() {
    split_matches_serial(&"Gauss linearUpwind grad(T)".parse().unwrap(), 1e-10);
}

fn channel_spec() -> BoxMeshSpec {
    BoxMeshSpec {
        cells: [8, 4, 1],
        origin: Point3::origin(),
        extent: Vector3::new(2.0, 1.0, 0.1),
        sides: BoxSides::two_d(
            SidePatch::patch("inlet"),
            SidePatch::patch("outlet"),
            SidePatch::wall("walls"),
            SidePatch::wall("walls"),
        ),
    }
}

/// Transient diffusion from a hot inlet into cold walls; returns
/// `(cell centre, value)` pairs.
fn diffuse_channel(mesh: Arc<FvMesh>, comm: &dyn Communicator) -> Vec<(Point3<f64>, f64)> {
    let mut t = common::temperature(
        &mesh,
        0.0,
        json!({
            "inlet": {"type": "fixedValue", "value": {"uniform": 1.0}},
            "outlet": {"type": "zeroGradient"},
            "walls": {"type": "fixedValue", "value": {"uniform": 0.0}}
        }),
    );
    let dt = Dimensioned::new("DT", si::KINEMATIC_VISCOSITY, 0.05);
    let mut time = TimeState::new(0.0, 0.1);
    for step in 1..=5 {
        time.value += time.delta_t;
        time.index = step;
        let ctx = EvalContext::new(time, comm);
        t.store_old_times(&time);
        t.update_coeffs(&ctx).unwrap();
        let eqn = fvm::ddt(&t, DdtScheme::Euler, &time)
            .try_sub(&fvm::laplacian_uniform(&dt, &t, &LaplacianScheme::default()))
            .unwrap();
        assert!(eqn.solve(&mut t, &common::pcg(), &ctx).unwrap().converged);
    }
    mesh.cell_centres.iter().copied().zip(t.values().iter().copied()).collect()
}

#[test]
fn box_diffusion_is_independent_of_decomposition() {
    let spec = channel_spec();
    let serial = diffuse_channel(Arc::new(generate_box_mesh(&spec).unwrap()), &SerialComm);

    for n_parts in [2, 4] {
        let parts: Vec<Arc<FvMesh>> = decompose_box_mesh_x(&spec, n_parts)
            .unwrap()
            .into_iter()
            .map(Arc::new)
            .collect();
        let split: Vec<(Point3<f64>, f64)> =
            ThreadComm::run(n_parts, |comm| diffuse_channel(Arc::clone(&parts[comm.rank()]), &comm))
                .into_iter()
                .flatten()
                .collect();
        assert_eq!(split.len(), serial.len());
        for (centre, value) in &split {
            let (_, expected) = serial
                .iter()
                .find(|(c, _)| (c - centre).norm() < 1e-9)
                .expect("matching serial cell");
            assert!((value - expected).abs() < 1e-10, "{:?}: {} vs {}", centre, value, expected);
        }
    }
}

fn periodic_line(n: usize) -> Arc<FvMesh> {
    let spec = BoxMeshSpec {
        cells: [n, 1, 1],
        origin: Point3::origin(),
        extent: Vector3::new(1.0, 1.0, 1.0),
        sides: BoxSides::one_d(SidePatch::cyclic("left", "right"), SidePatch::cyclic("right", "left")),
    };
    Arc::new(generate_box_mesh(&spec).unwrap())
}

/// Periodic line of `n` cells over `length` carrying one sine wave per unit
/// length, advected with `convection`.
fn advect_periodic(n: usize, length: f64, convection: &ConvectionScheme) -> Vec<f64> {
    let spec = BoxMeshSpec {
        cells: [n, 1, 1],
        origin: Point3::origin(),
        extent: Vector3::new(length, 1.0, 1.0),
        sides: BoxSides::one_d(SidePatch::cyclic("left", "right"), SidePatch::cyclic("right", "left")),
    };
    let mesh = Arc::new(generate_box_mesh(&spec).unwrap());
    let u: VolField<Vector3<f64>> = common::field("U", &mesh, [0, 1, -1, 0, 0, 0, 0], json!([1.0, 0.0, 0.0]), json!({}));
    let phi = fvc::flux(&u);
    let mut t = common::temperature(&mesh, 0.0, json!({}));
    let initial: Vec<f64> = mesh.cell_centres.iter().map(|c| (2.0 * PI * c.x).sin()).collect();
    t.set_values(&initial).unwrap();

    let dt = Dimensioned::new("DT", si::KINEMATIC_VISCOSITY, 0.001);
    let mut time = TimeState::new(0.0, 0.02);
    for step in 1..=5 {
        time.value += time.delta_t;
        time.index = step;
        let ctx = EvalContext::serial(time).with_flux(&phi);
        t.store_old_times(&time);
        t.update_coeffs(&ctx).unwrap();
        let eqn = fvm::ddt(&t, DdtScheme::Euler, &time)
            .try_add(&fvm::div(&phi, &t, convection))
            .unwrap()
            .try_sub(&fvm::laplacian_uniform(&dt, &t, &LaplacianScheme::default()))
            .unwrap();
        assert!(eqn.solve(&mut t, &common::bicgstab(), &ctx).unwrap().converged);
    }
    t.values().to_vec()
}

#[test]
fn cyclic_seam_behaves_like_an_interior_face() {
    // Two periods on a doubled domain put the seam of the short domain on
    // an interior face.
    for entry in ["Gauss vanLeer", "Gauss linearUpwind grad(T)", "Gauss linear"] {
        let convection: ConvectionScheme = entry.parse().unwrap();
        let short = advect_periodic(N, 1.0, &convection);
        let wide = advect_periodic(2 * N, 2.0, &convection);
        common::assert_close(&wide[..N], &short, 1e-10);
        common::assert_close(&wide[N..], &short, 1e-10);
    }
}

#[test]
fn cyclic_diffusion_conserves_the_integral() {
    let mesh = periodic_line(N);
    let mut t = common::temperature(&mesh, 0.0, json!({}));
    let initial: Vec<f64> = (0..N).map(|c| if c < 3 { 4.0 } else { 0.0 }).collect();
    t.set_values(&initial).unwrap();
    let total = common::integral(&t);

    let dt = Dimensioned::new("DT", si::KINEMATIC_VISCOSITY, 0.05);
    let mut time = TimeState::new(0.0, 0.1);
    for step in 1..=10 {
        time.value += time.delta_t;
        time.index = step;
        let ctx = EvalContext::serial(time);
        t.store_old_times(&time);
        t.update_coeffs(&ctx).unwrap();
        let eqn = fvm::ddt(&t, DdtScheme::Euler, &time)
            .try_sub(&fvm::laplacian_uniform(&dt, &t, &LaplacianScheme::default()))
            .unwrap();
        eqn.solve(&mut t, &common::pcg(), &ctx).unwrap();
    }

    assert!((common::integral(&t) - total).abs() < 1e-10);
    // Heat crosses the periodic seam: the last cell warms up.
    assert!(t.values()[N - 1] > 0.0);
    assert!(t.values()[N - 1] > t.values()[N / 2]);
}

#[test]
fn repeated_coefficient_updates_are_idempotent() {
    let mesh = common::line(4);
    let u: VolField<Vector3<f64>> = common::field(
        "U",
        &mesh,
        [0, 1, -1, 0, 0, 0, 0],
        json!([-1.0, 0.0, 0.0]),
        json!({
            "inlet": {"type": "zeroGradient"},
            "outlet": {"type": "fixedValue", "value": {"uniform": [-1.0, 0.0, 0.0]}}
        }),
    );
    let phi = fvc::flux(&u);
    let mut t = common::temperature(
        &mesh,
        2.0,
        json!({
            "inlet": {
                "type": "mixed",
                "refValue": {"uniform": 1.0},
                "refGradient": {"uniform": 0.5},
                "valueFraction": {"uniform": 0.3}
            },
            "outlet": {"type": "inletOutlet", "inletValue": {"uniform": 5.0}}
        }),
    );
    let ctx = EvalContext::serial(TimeState::steady()).with_flux(&phi);
    let dt = Dimensioned::new("DT", si::KINEMATIC_VISCOSITY, 0.1);
    let assemble = |t: &VolField<f64>| {
        fvm::div(&phi, t, &ConvectionScheme::upwind())
            .try_sub(&fvm::laplacian_uniform(&dt, t, &LaplacianScheme::default()))
            .unwrap()
    };

    t.update_coeffs(&ctx).unwrap();
    let first = assemble(&t);
    let coeffs: Vec<_> = t.boundary_fields().iter().map(|pf| pf.coeffs().clone()).collect();

    t.update_coeffs(&ctx).unwrap();
    t.update_coeffs(&ctx).unwrap();
    let second = assemble(&t);
    let again: Vec<_> = t.boundary_fields().iter().map(|pf| pf.coeffs().clone()).collect();

    assert_eq!(coeffs, again);
    assert_eq!(first.internal_coeffs, second.internal_coeffs);
    assert_eq!(first.boundary_coeffs, second.boundary_coeffs);
    assert_eq!(first.source, second.source);

    t.correct_boundary_conditions(&ctx).unwrap();
    let values = t.boundary_values();
    t.correct_boundary_conditions(&ctx).unwrap();
    assert_eq!(values, t.boundary_values());
    // Inflow through the outlet takes the inlet value.
    assert_eq!(t.boundary_values()[1], vec![5.0]);
}

#[test]
fn unknown_names_list_the_valid_choices() {
    let mesh = common::line(2);
    let dict = Dictionary::from_value(
        "T",
        json!({
            "dimensions": [0, 0, 0, 1, 0, 0, 0],
            "internalField": {"uniform": 0.0},
            "boundaryField": {
                "inlet": {"type": "fixedTemperature", "value": {"uniform": 1.0}},
                "outlet": {"type": "zeroGradient"}
            }
        }),
    )
    .unwrap();
    let err: FvError = VolField::<f64>::from_dict("T", Arc::clone(&mesh), &dict, &PatchFieldRegistry::standard())
        .unwrap_err()
        .into();
    match &err {
        FvError::Config(ConfigError::UnknownType { name, valid, .. }) => {
            assert_eq!(name, "fixedTemperature");
            assert!(valid.iter().any(|v| v == "fixedValue"));
        }
        other => panic!("unexpected error {}", other),
    }

    let err = "Gauss QUICKER".parse::<ConvectionScheme>().unwrap_err();
    let text = err.to_string();
    assert!(text.contains("QUICKER") && text.contains("linearUpwind"), "{}", text);

    let err = "Gauss linear sideways".parse::<LaplacianScheme>().unwrap_err();
    assert!(err.to_string().contains("corrected"), "{}", err);

    let controls = LinearSolverControls::new("GAMG");
    let err = linear_solver::LinearSolver::select(&controls, "p").unwrap_err();
    let text = err.to_string();
    assert!(text.contains("GAMG") && text.contains("PBiCGStab"), "{}", text);
}
