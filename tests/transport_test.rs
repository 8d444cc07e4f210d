mod common;

use fvcore::solver::boundary::EvalContext;
use fvcore::solver::fvc;
use fvcore::solver::fvm;
use fvcore::solver::mesh::{generate_box_mesh, BoxMeshSpec, BoxSides, FvMesh, SidePatch};
use fvcore::solver::scheme::{ConvectionScheme, DdtScheme, LaplacianScheme};
use fvcore::solver::time::{RunTime, TimeControls, TimeState};
use fvcore::solver::units::{si, Dimensioned};
use fvcore::solver::{SurfaceField, VolField};
use nalgebra::{Point3, Vector3};
use serde_json::json;
use std::sync::Arc;

const VELOCITY_DIMS: [i32; 7] = [0, 1, -1, 0, 0, 0, 0];

fn inflow_line(n: usize) -> (Arc<FvMesh>, SurfaceField<f64>) {
    let mesh = common::line(n);
    let u: VolField<Vector3<f64>> = common::field(
        "U",
        &mesh,
        VELOCITY_DIMS,
        json!([1.0, 0.0, 0.0]),
        json!({
            "inlet": {"type": "fixedValue", "value": {"uniform": [1.0, 0.0, 0.0]}},
            "outlet": {"type": "zeroGradient"}
        }),
    );
    let phi = fvc::flux(&u);
    (mesh, phi)
}

/// Periodic line of `n` cells; x sides joined by a cyclic pair.
fn periodic_line(n: usize) -> Arc<FvMesh> {
    let spec = BoxMeshSpec {
        cells: [n, 1, 1],
        origin: Point3::origin(),
        extent: Vector3::new(1.0, 1.0, 1.0),
        sides: BoxSides::one_d(SidePatch::cyclic("left", "right"), SidePatch::cyclic("right", "left")),
    };
    Arc::new(generate_box_mesh(&spec).unwrap())
}

fn pulse(mesh: &Arc<FvMesh>) -> VolField<f64> {
    let mut t = common::temperature(mesh, 0.0, json!({}));
    let values: Vec<f64> = (0..mesh.num_cells())
        .map(|c| if (3..6).contains(&c) { 1.0 } else { 0.0 })
        .collect();
    t.set_values(&values).unwrap();
    t
}

#[test]
fn upwind_keeps_a_constant_constant() {
    common::init_logging();
    let (mesh, phi) = inflow_line(10);
    let mut t = common::temperature(
        &mesh,
        1.0,
        json!({
            "inlet": {"type": "fixedValue", "value": {"uniform": 1.0}},
            "outlet": {"type": "inletOutlet", "inletValue": {"uniform": 0.0}}
        }),
    );

    let controls = TimeControls {
        start_time: 0.0,
        end_time: 0.5,
        delta_t: 0.05,
        write_interval: None,
    };
    let mut run_time = RunTime::new(&controls);
    while run_time.running() {
        let time = run_time.advance();
        let ctx = EvalContext::serial(time).with_flux(&phi);
        t.store_old_times(&time);
        t.update_coeffs(&ctx).unwrap();
        let eqn = fvm::ddt(&t, DdtScheme::Euler, &time)
            .try_add(&fvm::div(&phi, &t, &ConvectionScheme::upwind()))
            .unwrap();
        eqn.solve(&mut t, &common::bicgstab(), &ctx).unwrap();
    }

    common::assert_close(t.values(), &[1.0; 10], 1e-10);
    assert!((t.boundary_value(1)[0] - 1.0).abs() < 1e-10);
}

#[test]
fn pure_convection_conserves_on_periodic_domain() {
    let mesh = periodic_line(12);
    let u: VolField<Vector3<f64>> = common::field("U", &mesh, VELOCITY_DIMS, json!([0.5, 0.0, 0.0]), json!({}));
    let phi = fvc::flux(&u);
    let mut t = pulse(&mesh);
    let initial = common::integral(&t);

    for scheme in ["Gauss upwind", "Gauss vanLeer"] {
        let scheme: ConvectionScheme = scheme.parse().unwrap();
        let mut time = TimeState::new(0.0, 0.1);
        for step in 1..=10 {
            time.value += time.delta_t;
            time.index = step;
            let ctx = EvalContext::serial(time).with_flux(&phi);
            t.store_old_times(&time);
            t.update_coeffs(&ctx).unwrap();
            let eqn = fvm::ddt(&t, DdtScheme::Euler, &time)
                .try_add(&fvm::div(&phi, &t, &scheme))
                .unwrap();
            eqn.solve(&mut t, &common::bicgstab(), &ctx).unwrap();
        }
        assert!((common::integral(&t) - initial).abs() < 1e-10, "{}", scheme);
    }
}

#[test]
fn pure_diffusion_conserves_on_closed_domain() {
    let mesh = common::line(10);
    let mut t = common::temperature(
        &mesh,
        0.0,
        json!({
            "inlet": {"type": "zeroGradient"},
            "outlet": {"type": "fixedGradient", "gradient": {"uniform": 0.0}}
        }),
    );
    let values: Vec<f64> = (0..10).map(|c| (c * c) as f64).collect();
    t.set_values(&values).unwrap();
    let initial = common::integral(&t);

    let dt = Dimensioned::new("DT", si::KINEMATIC_VISCOSITY, 0.01);
    let mut time = TimeState::new(0.0, 0.5);
    for step in 1..=20 {
        time.value += time.delta_t;
        time.index = step;
        let ctx = EvalContext::serial(time);
        t.store_old_times(&time);
        t.update_coeffs(&ctx).unwrap();
        let eqn = fvm::ddt(&t, DdtScheme::Backward, &time)
            .try_sub(&fvm::laplacian_uniform(&dt, &t, &LaplacianScheme::default()))
            .unwrap();
        eqn.solve(&mut t, &common::pcg(), &ctx).unwrap();
    }

    assert!((common::integral(&t) - initial).abs() < 1e-9 * initial);
    // Smoothing reduces the spread.
    assert!(t.max() - t.min() < 81.0);
}

#[test]
fn backward_matches_euler_on_first_step() {
    let mesh = periodic_line(6);
    let mut t = pulse(&mesh);
    let controls = TimeControls {
        start_time: 0.0,
        end_time: 1.0,
        delta_t: 0.1,
        write_interval: None,
    };
    let mut run_time = RunTime::new(&controls);
    let time = run_time.advance();
    t.store_old_times(&time);

    let euler = fvm::ddt(&t, DdtScheme::Euler, &time);
    let backward = fvm::ddt(&t, DdtScheme::Backward, &time);
    common::assert_close(&backward.diag, &euler.diag, 1e-14);
    common::assert_close(&backward.source, &euler.source, 1e-14);
}

#[test]
fn unit_relaxation_leaves_matrix_unchanged() {
    let (mesh, phi) = inflow_line(8);
    let mut t = common::temperature(
        &mesh,
        0.5,
        json!({
            "inlet": {"type": "fixedValue", "value": {"uniform": 1.0}},
            "outlet": {"type": "zeroGradient"}
        }),
    );
    t.update_coeffs(&EvalContext::serial(TimeState::steady()).with_flux(&phi)).unwrap();
    let dt = Dimensioned::new("DT", si::KINEMATIC_VISCOSITY, 0.05);
    let eqn = fvm::div(&phi, &t, &ConvectionScheme::upwind())
        .try_sub(&fvm::laplacian_uniform(&dt, &t, &LaplacianScheme::default()))
        .unwrap();

    let mut relaxed = eqn.clone();
    relaxed.relax(&t, 1.0);
    common::assert_close(&relaxed.diag, &eqn.diag, 1e-14);
    common::assert_close(&relaxed.source, &eqn.source, 1e-14);
    common::assert_close(&relaxed.upper, &eqn.upper, 1e-14);
}

#[test]
fn under_relaxation_converges_to_the_same_solution() {
    let (mesh, phi) = inflow_line(10);
    let boundary = json!({
        "inlet": {"type": "fixedValue", "value": {"uniform": 1.0}},
        "outlet": {"type": "fixedValue", "value": {"uniform": 0.0}}
    });
    let dt = Dimensioned::new("DT", si::KINEMATIC_VISCOSITY, 0.05);
    let ctx = EvalContext::serial(TimeState::steady()).with_flux(&phi);
    let assemble = |t: &VolField<f64>| {
        fvm::div(&phi, t, &ConvectionScheme::upwind())
            .try_sub(&fvm::laplacian_uniform(&dt, t, &LaplacianScheme::default()))
            .unwrap()
    };

    let mut direct = common::temperature(&mesh, 0.0, boundary.clone());
    direct.update_coeffs(&ctx).unwrap();
    assemble(&direct).solve(&mut direct, &common::bicgstab(), &ctx).unwrap();

    let mut relaxed = common::temperature(&mesh, 0.0, boundary);
    relaxed.update_coeffs(&ctx).unwrap();
    for _ in 0..400 {
        let mut eqn = assemble(&relaxed);
        eqn.relax(&relaxed, 0.5);
        eqn.solve(&mut relaxed, &common::bicgstab(), &ctx).unwrap();
    }

    common::assert_close(relaxed.values(), direct.values(), 1e-8);
}
