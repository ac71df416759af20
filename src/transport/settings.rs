/// Linear solver used inside the Newton iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinearSolverKind {
    /// Dense LU factorization (direct).
    DenseLu,
    /// Sparse BiCGStab with Jacobi row scaling (iterative).
    BiCgStab,
}

/// Solver settings of a simulation.
#[derive(Clone, Copy, Debug)]
pub struct Settings {
    /// Absolute residual-norm tolerance of the nonlinear solve.
    pub absolute_tolerance: f64,
    /// Residual reduction tolerance relative to the initial residual.
    pub relative_tolerance: f64,
    pub maximum_iterations: u32,
    /// Solve for theta = c/S so the chemical potential is continuous across
    /// material interfaces; otherwise the unknown is the concentration itself.
    pub chemical_pot: bool,
    pub transient: bool,
    /// End time of a transient run [s]; ignored for steady state.
    pub final_time: f64,
    /// Initial time-step of a transient run [s].
    pub initial_dt: f64,
    pub linear_solver: LinearSolverKind,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            absolute_tolerance: 1e10,
            relative_tolerance: 1e-10,
            maximum_iterations: 30,
            chemical_pot: false,
            transient: false,
            final_time: 1.0,
            initial_dt: 1e-2,
            linear_solver: LinearSolverKind::BiCgStab,
        }
    }
}
