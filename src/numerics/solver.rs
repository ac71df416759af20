use crate::discretization::mesh::Mesh;
#[allow(unused)]
use crate::numerics::timing::{
    finalize_and_print, record_jacobian, record_linear_solve, reset_timing,
};
use crate::physics::PhysicsModel;
use nalgebra::{DMatrix, DVector};
use num_dual::{DualDVec64, jacobian};
use std::fs::File;
use std::io::{self, Write};
use thiserror::Error;

#[cfg(feature = "timing")]
use std::time::Instant;

/// Newton iteration with a dense LU factorization of the Jacobian.
/// This is the direct-solver path; it is exact but only sensible for
/// moderate problem sizes.
pub struct NewtonSolver {
    pub tolerance: f64,
    pub max_iterations: u32,
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("linear solve failed")]
    LinearSolveFailed,
    #[error("Newton's method failed to converge")]
    NonConvergence,
}

pub struct SolverResult {
    pub solution: DVector<f64>,
    pub iterations: u32,
    pub final_residual: f64,
}

impl NewtonSolver {
    pub fn solve<M>(
        &self,
        model: &M,
        mesh: &Mesh,
        initial_guess: DVector<f64>,
        logging: bool,
    ) -> Result<SolverResult, SolverError>
    where
        M: PhysicsModel<DualDVec64>,
    {
        reset_timing();

        #[cfg(feature = "timing")]
        let solve_start = Instant::now();

        let mut u = initial_guess;
        let mut history: Vec<(u32, f64, f64, f64)> = Vec::new();
        let mut initial_residual = None;
        let mut previous_residual = None;

        if logging {
            println!("{} unknowns \n", u.len());
            println!("    Iter   | Residual |  Fraction |  Step % |  Initial");
        }

        for i in 0..self.max_iterations {
            let (residual, jacobian) =
                record_jacobian(|| self.compute_residual_and_jacobian(model, mesh, &u));

            let res_norm = residual.norm();
            let init = *initial_residual.get_or_insert(res_norm);
            let fraction = res_norm / init;
            let step_percent =
                previous_residual.map_or(0.0, |prev| (prev - res_norm) / prev * 100.0);
            previous_residual = Some(res_norm);

            log_iteration(
                i,
                self.max_iterations,
                res_norm,
                fraction,
                step_percent,
                init,
                logging,
            );
            history.push((i, res_norm, fraction, step_percent));

            if res_norm < self.tolerance {
                #[cfg(feature = "timing")]
                finalize_and_print(solve_start.elapsed());

                write_hist_to_file(history, initial_residual);
                return Ok(SolverResult {
                    solution: u,
                    iterations: i,
                    final_residual: res_norm,
                });
            }

            let delta_u = record_linear_solve(|| {
                jacobian
                    .lu()
                    .solve(&-residual)
                    .ok_or(SolverError::LinearSolveFailed)
            })?;

            u += delta_u;
        }

        #[cfg(feature = "timing")]
        finalize_and_print(solve_start.elapsed());

        write_hist_to_file(history, initial_residual);
        Err(SolverError::NonConvergence)
    }

    // A helper that wraps the call to the AD library.
    pub fn compute_residual_and_jacobian<M: PhysicsModel<DualDVec64>>(
        &self,
        model: &M,
        mesh: &Mesh,
        u: &DVector<f64>,
    ) -> (DVector<f64>, DMatrix<f64>) {
        let (residual, jac) = jacobian(
            |arg: DVector<DualDVec64>| model.calculate_residual(mesh, arg),
            u.clone(),
        );
        (residual, jac)
    }
}

pub(crate) fn log_iteration(
    i: u32,
    max_iter: u32,
    res_norm: f64,
    fraction: f64,
    step_percent: f64,
    init: f64,
    logging: bool,
) {
    if !logging {
        return;
    }
    if i == 0 {
        println!(
            "{i:>4} | {res_norm:>8.3e} | {fraction:>8.3e} | {step_percent:>6.2}% | {init:>8.3e}"
        );
    } else {
        println!(
            "{i:>4}/{max_iter} | {res_norm:>8.3e} | {fraction:>9.3e} | {step_percent:>6.2}% | {init:>8.3e}"
        );
    }
    io::stdout().flush().ok();
}

/// Best-effort convergence history dump; silently skipped when the results
/// folder does not exist yet.
pub fn write_hist_to_file(history: Vec<(u32, f64, f64, f64)>, initial_residual: Option<f64>) {
    let init = initial_residual.unwrap_or(0.0);
    if let Ok(mut file) = File::create("results/solver_history.csv") {
        let _ = writeln!(file, "iter,residual,fraction,step_percent,initial");
        for (i, res, frac, step) in history {
            let _ = writeln!(file, "{i},{res},{frac},{step},{init}");
        }
    }
}
