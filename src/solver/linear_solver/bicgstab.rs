use super::{ops, LinearSolverControls, LinearSystem, PreconditionerKind, SolveError, SolverPerformance};

/// Preconditioned bi-conjugate gradient stabilised, for asymmetric systems.
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

    let mut r = vec![0.0; n];
    let ax = system.residual(x, &mut r)?;
    let norm_factor = system.norm_factor(x, &ax)?;

    perf.initial_residual = system.global_sum_mag(&r)? / norm_factor;
    perf.final_residual = perf.initial_residual;

    if perf.keep_iterating(controls) {
        let precond = preconditioner.build(&system.matrix)?;
        let mut r0 = r.clone();
        let mut p = vec![0.0; n];
        let mut y = vec![0.0; n];
        let mut ay = vec![0.0; n];
        let mut s = vec![0.0; n];
        let mut z = vec![0.0; n];
        let mut t = vec![0.0; n];

        let mut r0_r: f64 = 0.0;
        let mut alpha: f64 = 0.0;
        let mut omega: f64 = 0.0;

        loop {
            let r0_r_old = r0_r;
            r0_r = system.global_dot(&r0, &r)?;

            // Breakdown with an unconverged residual: restart the shadow
            // residual from the current one.
            let restart = perf.n_iterations > 0 && r0_r.abs() < super::VSMALL;
            if restart {
                log::debug!("{}: restarting {} at iteration {}", solver_name, field, perf.n_iterations);
                r0.copy_from_slice(&r);
                r0_r = system.global_dot(&r0, &r)?;
            }
            if perf.check_singularity(r0_r.abs()) {
                break;
            }

            if perf.n_iterations == 0 || restart {
                p.copy_from_slice(&r);
            } else {
                if perf.check_singularity(omega.abs()) {
                    break;
                }
                let beta = (r0_r / r0_r_old) * (alpha / omega);
                for i in 0..n {
                    p[i] = r[i] + beta * (p[i] - omega * ay[i]);
                }
            }

            precond.precondition(&p, &mut y);
            system.amul(&y, &mut ay)?;
            let r0_ay = system.global_dot(&r0, &ay)?;
            alpha = r0_r / r0_ay;

            ops::sub_scaled(&r, alpha, &ay, &mut s);
            perf.final_residual = system.global_sum_mag(&s)? / norm_factor;

            if perf.check_convergence(controls.tolerance, controls.rel_tol)
                && perf.n_iterations + 1 >= controls.min_iter
            {
                ops::axpy(alpha, &y, x);
                perf.n_iterations += 1;
                break;
            }

            precond.precondition(&s, &mut z);
            system.amul(&z, &mut t)?;
            let t_t = system.global_dot(&t, &t)?;
            omega = if t_t.abs() < super::VSMALL {
                0.0
            } else {
                system.global_dot(&t, &s)? / t_t
            };

            for i in 0..n {
                x[i] += alpha * y[i] + omega * z[i];
            }
            ops::sub_scaled(&s, omega, &t, &mut r);
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
