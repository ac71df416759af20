use crate::discretization::mesh::Mesh;
use crate::numerics::Tolerance;
use crate::numerics::sparse_armijo::NewtonArmijoSolver;
use crate::physics::functional::FunctionalPhysics;
use nalgebra::DVector;
use num_dual::DualDVec64;

/// Theta-scheme time integrator on top of the Armijo Newton solver.
/// Halves the step on a failed solve; never grows it back.
pub struct TransientSolver {
    pub t_start: f64,
    pub t_end: f64,
    pub dt: f64,
    pub tolerance: f64,
    pub theta: f64,
    pub logging: bool,
}

impl Default for TransientSolver {
    fn default() -> Self {
        Self {
            t_start: 0.0,
            t_end: 1.0,
            dt: 1e-4,
            tolerance: 1e-5,
            theta: 1.0,
            logging: true,
        }
    }
}

impl TransientSolver {
    pub fn solve<F>(
        &self,
        model: &mut FunctionalPhysics<DualDVec64, F>,
        mesh: &Mesh,
        initial_condition: DVector<f64>,
        mut callback: impl FnMut(f64, &DVector<f64>),
    ) where
        F: 'static,
    {
        model.theta = self.theta;

        let mut u = initial_condition;
        let mut t = self.t_start;
        let mut dt = self.dt;

        let mut solver = NewtonArmijoSolver::default();
        solver.convergence.tolerance = Tolerance::Combined(self.tolerance, 1e-9);

        if self.logging {
            println!(
                "Starting Transient Simulation: T={:.2} -> {:.2}",
                self.t_start, self.t_end
            );
        }

        let mut step = 0;
        while t < self.t_end {
            step += 1;

            model.prepare_time_step(mesh, u.clone(), dt);
            model.current_time = Some(t + dt);

            match solver.solve(model, mesh, u.clone(), false) {
                Ok(result) => {
                    t += dt;
                    u = result.solution;

                    if self.logging {
                        println!(
                            "Step {:>4} | t = {:.4e} | dt = {:.3e} | iters = {}",
                            step, t, dt, result.iterations
                        );
                    }

                    // User callback (e.g., writing exports)
                    callback(t, &u);
                }
                Err(e) => {
                    if self.logging {
                        println!(
                            "Step {:>4} | t = {:.4e} | dt = {:.3e} | FAILED: {}",
                            step, t, dt, e
                        );
                    }
                    dt *= 0.5;
                }
            }
        }
    }
}
