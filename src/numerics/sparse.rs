use kryst::solver::LinearSolver;
use kryst::{
    parallel::{NoComm, UniverseComm},
    preconditioner::PcSide,
};
use nalgebra::DVector;
use num_dual::DualDVec64;

#[allow(unused)]
use crate::numerics::timing::{finalize_and_print, reset_timing};
use crate::numerics::timing::{record_jacobian, record_linear_solve};
use crate::{
    discretization::mesh::Mesh,
    numerics::solver::{SolverError, SolverResult, write_hist_to_file},
    physics::functional::FunctionalPhysics,
};

use std::sync::Arc;
use std::time::Instant;

/// Newton iteration with a row-local sparse Jacobian and BiCGStab.
pub struct SparseNewtonSolver {
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl SparseNewtonSolver {
    pub fn solve<D: 'static>(
        &self,
        model: &FunctionalPhysics<DualDVec64, D>,
        mesh: &Mesh,
        initial_guess: DVector<f64>,
        logging: bool,
    ) -> Result<SolverResult, SolverError> {
        reset_timing();
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
            let (residual, mut jacobian) =
                record_jacobian(|| self.compute_residual_and_jacobian(model, mesh, &u));

            if !residual.iter().all(|x| x.is_finite()) {
                eprintln!("Error: Residual contains NaN or Inf at iteration {}", i);
                return Err(SolverError::LinearSolveFailed);
            }

            let n = residual.len();
            let res_norm = residual.norm();
            let init = *initial_residual.get_or_insert(res_norm);
            let fraction = res_norm / init;
            let step_percent =
                previous_residual.map_or(0.0, |prev| (prev - res_norm) / prev * 100.0);
            previous_residual = Some(res_norm);

            super::solver::log_iteration(
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
                finalize_and_print(solve_start.elapsed());

                write_hist_to_file(history, initial_residual);
                return Ok(SolverResult {
                    solution: u,
                    iterations: i,
                    final_residual: res_norm,
                });
            }

            // Jacobi row scaling to improve conditioning. The hydrogen system
            // mixes unknowns spanning many orders of magnitude, so this is
            // load-bearing, not cosmetic.
            let d: Vec<f64> = (0..n)
                .map(|row_idx| {
                    let row_start = jacobian.row_ptr()[row_idx];
                    let row_end = jacobian.row_ptr()[row_idx + 1];

                    let diag = (row_start..row_end)
                        .find(|&idx| jacobian.col_idx()[idx] == row_idx)
                        .map(|idx| jacobian.values()[idx])
                        .unwrap_or(1.0);

                    if diag.abs() < 1e-12 { 1.0 } else { diag }
                })
                .collect();

            for row_idx in 0..n {
                let scale = 1.0 / d[row_idx];
                let row_vals = jacobian.row_values_mut(row_idx);
                for val in row_vals.iter_mut() {
                    *val *= scale;
                }
            }

            let op = kryst::matrix::op::CsrOp::new(Arc::new(jacobian));

            // Relax the linear tolerance relative to the Newton residual.
            let linear_tol = (res_norm * 0.1).max(self.tolerance).min(1e-2);
            let mut bicgstab_solver = kryst::solver::bicgstab::BiCgStabSolver::new(linear_tol, 2000);
            let mut workspace = kryst::context::ksp_context::Workspace::new(n);
            bicgstab_solver.setup_workspace(&mut workspace);

            let mut x = DVector::from_element(n, 0.0);
            let b: DVector<f64> =
                DVector::from_iterator(n, (0..n).map(|idx| -residual[idx] / d[idx]));

            if !b.iter().all(|x| x.is_finite()) {
                eprintln!("Error: RHS contains NaN or Inf at iteration {}", i);
                return Err(SolverError::LinearSolveFailed);
            }

            let result = record_linear_solve(|| {
                bicgstab_solver.solve(
                    &op,
                    None,
                    b.as_slice(),
                    x.as_mut_slice(),
                    PcSide::Left,
                    &UniverseComm::NoComm(NoComm {}),
                    None,
                    Some(&mut workspace),
                )
            });

            match result {
                Ok(stats) => {
                    if i == 0 && logging {
                        println!("Linear solve result: {:?}", stats);
                    }
                    if !x.iter().all(|val| val.is_finite()) {
                        eprintln!("Error: Linear solver produced NaN/Inf");
                        return Err(SolverError::LinearSolveFailed);
                    }
                }
                Err(e) => {
                    eprintln!("Linear solve failed: {:?}", e);
                    return Err(SolverError::LinearSolveFailed);
                }
            }

            u += x;
        }

        #[cfg(feature = "timing")]
        finalize_and_print(solve_start.elapsed());

        write_hist_to_file(history, initial_residual);

        if let Some(r) = previous_residual {
            if r < self.tolerance {
                Ok(SolverResult {
                    solution: u,
                    iterations: self.max_iterations,
                    final_residual: r,
                })
            } else {
                Err(SolverError::NonConvergence)
            }
        } else {
            Err(SolverError::NonConvergence)
        }
    }

    pub fn compute_residual_and_jacobian<D: 'static>(
        &self,
        model: &FunctionalPhysics<DualDVec64, D>,
        mesh: &Mesh,
        u: &DVector<f64>,
    ) -> (DVector<f64>, kryst::matrix::sparse::CsrMatrix<f64>) {
        assemble_sparse(model, mesh, u)
    }
}

/// Row-by-row sparse assembly shared by the sparse Newton variants.
pub(crate) fn assemble_sparse<D: 'static>(
    model: &FunctionalPhysics<DualDVec64, D>,
    mesh: &Mesh,
    u: &DVector<f64>,
) -> (DVector<f64>, kryst::matrix::sparse::CsrMatrix<f64>) {
    let n = u.len();
    let mut residual = DVector::<f64>::zeros(n);
    let mut indptr = Vec::with_capacity(n + 1);
    let mut indices = Vec::new();
    let mut data = Vec::new();
    indptr.push(0);

    let m = model.num_vars_per_cell;
    let mut cols_reuse: Vec<usize> = Vec::with_capacity(8 * m);
    let mut vals_reuse: Vec<f64> = Vec::with_capacity(8 * m);
    let mut diag_reuse: Vec<f64> = Vec::with_capacity(m);

    // dual representation for residual evaluation
    let u_dual: Vec<DualDVec64> = u.iter().map(|&x| DualDVec64::from_re(x)).collect();
    let u_slice = u.as_slice();

    for r in 0..n {
        residual[r] = model.residual_component_row(mesh, &u_dual, r).re;

        cols_reuse.clear();
        vals_reuse.clear();
        diag_reuse.clear();
        diag_reuse.resize(m, 0.0);

        model.jacobian_row_locals(mesh, u_slice, r, &mut cols_reuse, &mut vals_reuse, &mut diag_reuse);

        indices.extend_from_slice(&cols_reuse);
        data.extend_from_slice(&vals_reuse);
        indptr.push(indices.len());
    }

    let jacobian = kryst::matrix::sparse::CsrMatrix::from_csr(n, n, indptr, indices, data);
    (residual, jacobian)
}
