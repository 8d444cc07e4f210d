mod common;

use fvcore::solver::field::DimensionedField;
use fvcore::solver::fvm;
use fvcore::solver::linear_solver::LinearSolverControls;
use fvcore::solver::scheme::{DdtScheme, LaplacianScheme};
use fvcore::solver::time::TimeState;
use fvcore::solver::units::{si, Dimensioned};
use fvcore::solver::{FvMesh, VolField};
use serde_json::json;
use std::sync::Arc;

fn fixed_ends(mesh: &Arc<FvMesh>) -> VolField<f64> {
    common::temperature(
        mesh,
        0.0,
        json!({
            "inlet": {"type": "fixedValue", "value": {"uniform": 0.0}},
            "outlet": {"type": "fixedValue", "value": {"uniform": 1.0}}
        }),
    )
}

#[test]
fn five_cell_laplacian_reproduces_linear_profile() {
    common::init_logging();
    let mesh = common::line(5);
    let mut t = fixed_ends(&mesh);
    let ctx = common::steady();
    t.update_coeffs(&ctx).unwrap();

    let dt = Dimensioned::new("DT", si::KINEMATIC_VISCOSITY, 1.0);
    let eqn = -fvm::laplacian_uniform(&dt, &t, &LaplacianScheme::default());
    let perf = eqn.solve(&mut t, &common::pcg(), &ctx).unwrap();

    assert!(perf.converged);
    common::assert_close(t.values(), &[0.1, 0.3, 0.5, 0.7, 0.9], 1e-10);
}

#[test]
fn face_fluxes_of_solved_profile_balance() {
    let mesh = common::line(5);
    let mut t = fixed_ends(&mesh);
    let ctx = common::steady();
    t.update_coeffs(&ctx).unwrap();
    let dt = Dimensioned::new("DT", si::KINEMATIC_VISCOSITY, 1.0);
    let scheme = LaplacianScheme::default();
    (-fvm::laplacian_uniform(&dt, &t, &scheme))
        .solve(&mut t, &common::pcg(), &ctx)
        .unwrap();

    let flux = fvm::laplacian_uniform(&dt, &t, &scheme).flux(&t);
    for &f in &flux.internal {
        assert!((f - 1.0).abs() < 1e-9, "{}", f);
    }
    // Outward flux: heat enters at the outlet and leaves at the inlet.
    assert!((flux.patch(0)[0] + 1.0).abs() < 1e-9);
    assert!((flux.patch(1)[0] - 1.0).abs() < 1e-9);
}

#[test]
fn single_iteration_limit_reports_non_convergence() {
    common::init_logging();
    let mesh = common::line(20);
    let mut t = fixed_ends(&mesh);
    let ctx = common::steady();
    t.update_coeffs(&ctx).unwrap();
    let dt = Dimensioned::new("DT", si::KINEMATIC_VISCOSITY, 1.0);
    let eqn = -fvm::laplacian_uniform(&dt, &t, &LaplacianScheme::default());

    let controls = LinearSolverControls::new("PCG")
        .with_preconditioner("none")
        .with_tolerance(1e-12, 0.0)
        .with_max_iter(1);
    let perf = eqn.solve(&mut t, &controls, &ctx).unwrap();

    assert!(!perf.converged);
    assert_eq!(perf.n_iterations, 1);
    assert!(perf.final_residual > 1e-12);
}

#[test]
fn incompatible_terms_are_rejected() {
    let mesh = common::line(5);
    let mut t = fixed_ends(&mesh);
    let time = TimeState::new(0.1, 0.1);
    t.store_old_times(&time);
    let scheme = LaplacianScheme::default();

    let dt = Dimensioned::new("DT", si::KINEMATIC_VISCOSITY, 1.0);
    let ok = fvm::ddt(&t, DdtScheme::Euler, &time).try_sub(&fvm::laplacian_uniform(&dt, &t, &scheme));
    assert!(ok.is_ok());

    let wrong = Dimensioned::new("DT", si::DIMENSIONLESS, 1.0);
    let err = fvm::ddt(&t, DdtScheme::Euler, &time)
        .try_sub(&fvm::laplacian_uniform(&wrong, &t, &scheme))
        .unwrap_err();
    assert!(err.to_string().contains("dimension mismatch"), "{}", err);

    let heating = DimensionedField::uniform("q", si::TEMPERATURE / si::TIME, mesh.num_cells(), 1.0);
    let eqn = fvm::laplacian_uniform(&dt, &t, &scheme).equals(&heating);
    assert!(eqn.is_ok());

    let bad = DimensionedField::uniform("q", si::TEMPERATURE, mesh.num_cells(), 1.0);
    assert!(fvm::laplacian_uniform(&dt, &t, &scheme).equals(&bad).is_err());
}
