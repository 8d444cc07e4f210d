use super::{ops, LinearSolverControls, LinearSystem, PreconditionerKind, SolveError, SolverPerformance};

/// Preconditioned conjugate gradients for symmetric systems.
pub fn solve(
    system: &LinearSystem<'_>,
    x: &mut [f64],
    preconditioner: PreconditionerKind,
    controls: &LinearSolverControls,
    solver_name: &str,
    field: &str,
) -> Result<SolverPerformance, SolveError> {
    let n = system.n();
    let mut perf = SolverPerformance::new(solver_name, field);

    let mut w = vec![0.0; n];
    let mut r = vec![0.0; n];
    let ax = system.residual(x, &mut r)?;
    let norm_factor = system.norm_factor(x, &ax)?;

    perf.initial_residual = system.global_sum_mag(&r)? / norm_factor;
    perf.final_residual = perf.initial_residual;

    if perf.keep_iterating(controls) {
        let precond = preconditioner.build(&system.matrix)?;
        let mut p = vec![0.0; n];
        let mut w_r: f64 = 0.0;

        loop {
            let w_r_old = w_r;
            precond.precondition(&r, &mut w);
            w_r = system.global_dot(&w, &r)?;

            if perf.n_iterations == 0 {
                p.copy_from_slice(&w);
            } else {
                ops::xpby(&w, w_r / w_r_old, &mut p);
            }

            system.amul(&p, &mut w)?;
            let w_p = system.global_dot(&w, &p)?;
            if perf.check_singularity(w_p.abs() / norm_factor) {
                break;
            }

            let alpha = w_r / w_p;
            ops::axpy(alpha, &p, x);
            ops::axpy(-alpha, &w, &mut r);
            perf.final_residual = system.global_sum_mag(&r)? / norm_factor;
            perf.n_iterations += 1;

            if !perf.keep_iterating(controls) {
                break;
            }
        }
    }

    log::info!("{}", perf);
    Ok(perf)
}
