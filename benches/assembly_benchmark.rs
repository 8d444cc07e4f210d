use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fvcore::solver::boundary::{EvalContext, PatchFieldRegistry};
use fvcore::solver::fvc;
use fvcore::solver::fvm;
use fvcore::solver::linear_solver::LinearSolverControls;
use fvcore::solver::mesh::{generate_box_mesh, BoxMeshSpec, BoxSides, FvMesh, SidePatch};
use fvcore::solver::scheme::{ConvectionScheme, DdtScheme, LaplacianScheme};
use fvcore::solver::time::TimeState;
use fvcore::solver::units::{si, Dimensioned};
use fvcore::solver::VolField;
use nalgebra::{Point3, Vector3};
use std::sync::Arc;

fn channel(n: usize) -> Arc<FvMesh> {
    let spec = BoxMeshSpec {
        cells: [n, n, 1],
        origin: Point3::origin(),
        extent: Vector3::new(1.0, 1.0, 0.1),
        sides: BoxSides::two_d(
            SidePatch::patch("inlet"),
            SidePatch::patch("outlet"),
            SidePatch::wall("walls"),
            SidePatch::wall("walls"),
        ),
    };
    Arc::new(generate_box_mesh(&spec).expect("mesh"))
}

fn fields(mesh: &Arc<FvMesh>) -> (VolField<f64>, VolField<Vector3<f64>>) {
    let scalars = PatchFieldRegistry::standard();
    let vectors = PatchFieldRegistry::standard();
    let t = VolField::uniform("T", Arc::clone(mesh), si::TEMPERATURE, 1.0, "zeroGradient", &scalars).expect("T");
    let u = VolField::uniform(
        "U",
        Arc::clone(mesh),
        si::VELOCITY,
        Vector3::new(1.0, 0.2, 0.0),
        "fixedValue",
        &vectors,
    )
    .expect("U");
    (t, u)
}

fn assembly_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble_transport");
    for n in [32, 64, 128] {
        let mesh = channel(n);
        let (mut t, u) = fields(&mesh);
        let phi = fvc::flux(&u);
        let time = TimeState::new(0.01, 0.01);
        t.store_old_times(&time);
        t.update_coeffs(&EvalContext::serial(time).with_flux(&phi)).expect("coeffs");
        let dt = Dimensioned::new("DT", si::KINEMATIC_VISCOSITY, 1e-3);
        let convection: ConvectionScheme = "Gauss linearUpwind grad(T)".parse().expect("scheme");
        let laplacian = LaplacianScheme::default();

        group.bench_with_input(BenchmarkId::from_parameter(n * n), &n, |b, _| {
            b.iter(|| {
                let eqn = fvm::ddt(black_box(&t), DdtScheme::Euler, &time)
                    .try_add(&fvm::div(&phi, &t, &convection))
                    .and_then(|m| m.try_sub(&fvm::laplacian_uniform(&dt, &t, &laplacian)));
                black_box(eqn)
            })
        });
    }
    group.finish();
}

fn solve_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("solve_transport");
    group.sample_size(20);
    let controls = LinearSolverControls::new("PBiCGStab")
        .with_preconditioner("DILU")
        .with_tolerance(1e-8, 0.0);
    for n in [32, 64] {
        let mesh = channel(n);
        let (t, u) = fields(&mesh);
        let phi = fvc::flux(&u);
        let time = TimeState::new(0.01, 0.01);
        let dt = Dimensioned::new("DT", si::KINEMATIC_VISCOSITY, 1e-3);

        group.bench_with_input(BenchmarkId::from_parameter(n * n), &n, |b, _| {
            b.iter(|| {
                let mut t = t.clone();
                let ctx = EvalContext::serial(time).with_flux(&phi);
                t.store_old_times(&time);
                t.update_coeffs(&ctx).expect("coeffs");
                let eqn = fvm::ddt(&t, DdtScheme::Euler, &time)
                    .try_add(&fvm::div(&phi, &t, &ConvectionScheme::upwind()))
                    .and_then(|m| m.try_sub(&fvm::laplacian_uniform(&dt, &t, &LaplacianScheme::default())))
                    .expect("dimensions");
                black_box(eqn.solve(&mut t, &controls, &ctx).expect("solve"))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, assembly_benchmark, solve_benchmark);
criterion_main!(benches);
