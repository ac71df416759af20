use crate::discretization::mesh::Mesh;
use crate::numerics::solver::{NewtonSolver, SolverError, SolverResult};
use crate::numerics::sparse_armijo::NewtonArmijoSolver;
use crate::numerics::transient::TransientSolver;
use crate::numerics::Tolerance;
use crate::physics::functional::FunctionalPhysics;
use crate::processing::export::{ExportFrame, Exports};
use crate::processing::summary::SimulationSummary;
use crate::transport::boundary::BoundaryCondition;
use crate::transport::heat::HeatTransferProblem;
use crate::transport::hydrogen::{HTransportProblem, UnknownField};
use crate::transport::materials::Materials;
use crate::transport::settings::{LinearSolverKind, Settings};
use crate::transport::traps::Traps;
use nalgebra::DVector;
use num_dual::DualDVec64;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("solver failed: {0}")]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    UnknownField(#[from] UnknownField),
}

/// Accumulates the declarative configuration, then hands it to
/// [`Simulation::initialise`]. Nothing global: the built simulation owns
/// everything it needs.
#[derive(Default)]
pub struct SimulationBuilder {
    mesh: Option<Mesh>,
    material_ids: Vec<usize>,
    face_tags: HashMap<usize, String>,
    materials: Option<Materials>,
    traps: Traps,
    boundary_conditions: Vec<BoundaryCondition>,
    settings: Option<Settings>,
    exports: Exports,
    logging: bool,
}

impl SimulationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mesh with its per-cell material (volume) ids and tagged boundary faces.
    pub fn mesh(
        mut self,
        mesh: Mesh,
        material_ids: Vec<usize>,
        face_tags: HashMap<usize, String>,
    ) -> Self {
        self.mesh = Some(mesh);
        self.material_ids = material_ids;
        self.face_tags = face_tags;
        self
    }

    pub fn materials(mut self, materials: Materials) -> Self {
        self.materials = Some(materials);
        self
    }

    pub fn traps(mut self, traps: Traps) -> Self {
        self.traps = traps;
        self
    }

    pub fn boundary_conditions(mut self, bcs: Vec<BoundaryCondition>) -> Self {
        self.boundary_conditions = bcs;
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn exports(mut self, exports: Exports) -> Self {
        self.exports = exports;
        self
    }

    pub fn logging(mut self, logging: bool) -> Self {
        self.logging = logging;
        self
    }

    /// Validate the configuration and build both problems. The hydrogen
    /// problem starts on a uniform temperature field; the real one is frozen
    /// in during [`Simulation::run`], after the heat solve.
    pub fn initialise(self) -> Result<Simulation, SimulationError> {
        let mesh = self
            .mesh
            .ok_or_else(|| SimulationError::Config("no mesh supplied".into()))?;
        let materials = self
            .materials
            .ok_or_else(|| SimulationError::Config("no materials supplied".into()))?;
        let settings = self.settings.unwrap_or_default();

        if self.material_ids.len() != mesh.cells.len() {
            return Err(SimulationError::Config(format!(
                "{} material ids for {} cells",
                self.material_ids.len(),
                mesh.cells.len()
            )));
        }

        let material_index: Vec<usize> = self
            .material_ids
            .iter()
            .map(|id| {
                materials
                    .index_of(*id)
                    .ok_or_else(|| SimulationError::Config(format!("unknown material id {id}")))
            })
            .collect::<Result<_, _>>()?;

        for trap in self.traps.iter() {
            for id in trap.material_ids() {
                if materials.index_of(id).is_none() {
                    return Err(SimulationError::Config(format!(
                        "trap references unknown material id {id}"
                    )));
                }
            }
        }

        let t0 = HeatTransferProblem::initial_temperature(&self.boundary_conditions);

        let mut heat = HeatTransferProblem::new(
            materials.snapshot(),
            material_index.clone(),
            settings.transient,
        );
        heat.physics.face_tags = self.face_tags.clone();
        heat.physics.calibrate_tolerances(&mesh);
        heat.lower_boundary_conditions(&self.boundary_conditions);

        let mut h_transport = HTransportProblem::new(
            &materials,
            &self.traps,
            material_index,
            vec![t0; mesh.cells.len()],
            settings.chemical_pot,
        );
        h_transport.physics.face_tags = self.face_tags;
        h_transport.physics.calibrate_tolerances(&mesh);

        Ok(Simulation {
            mesh,
            settings,
            boundary_conditions: self.boundary_conditions,
            heat,
            h_transport,
            exports: self.exports,
            logging: self.logging,
            initial_temperature: t0,
        })
    }
}

/// Everything solved and derived by one run.
pub struct RunOutput {
    pub temperature: Vec<f64>,
    pub solute: Vec<f64>,
    pub trap_concentrations: Vec<Vec<f64>>,
    pub retention: Vec<f64>,
    pub solution: DVector<f64>,
    pub summary: SimulationSummary,
}

/// An initialised simulation. Residual extension terms (decay sinks) may be
/// registered on `h_transport` between `initialise` and `run`.
pub struct Simulation {
    pub mesh: Mesh,
    pub settings: Settings,
    boundary_conditions: Vec<BoundaryCondition>,
    pub heat: HeatTransferProblem,
    pub h_transport: HTransportProblem,
    exports: Exports,
    logging: bool,
    initial_temperature: f64,
}

impl Simulation {
    pub fn builder() -> SimulationBuilder {
        SimulationBuilder::new()
    }

    /// Solve heat, freeze the temperature, lower the hydrogen boundary
    /// conditions, solve the hydrogen system, write every export.
    pub fn run(&mut self) -> Result<RunOutput, SimulationError> {
        if self.logging {
            println!("Solving heat transfer ({} cells)...", self.mesh.cells.len());
        }
        let heat_guess =
            DVector::from_element(self.mesh.cells.len(), self.initial_temperature);
        let heat_result = solve_steady(
            &self.settings,
            Tolerance::Relative(self.settings.relative_tolerance),
            &self.heat.physics,
            &self.mesh,
            heat_guess,
            self.logging,
        )?;
        let temperature: Vec<f64> = heat_result.solution.iter().cloned().collect();

        self.h_transport.physics.data.temperature = temperature.clone();
        self.h_transport
            .lower_boundary_conditions(&self.mesh, &self.boundary_conditions);

        if self.logging {
            println!(
                "Solving hydrogen transport (1 mobile + {} traps)...",
                self.h_transport.num_traps()
            );
        }

        let n_dofs = self.mesh.cells.len() * self.h_transport.physics.num_vars_per_cell;
        let init = DVector::zeros(n_dofs);

        let (final_time, h_result) = if self.settings.transient {
            self.run_transient(init)?
        } else {
            let result = solve_steady(
                &self.settings,
                Tolerance::Combined(
                    self.settings.absolute_tolerance,
                    self.settings.relative_tolerance,
                ),
                &self.h_transport.physics,
                &self.mesh,
                init,
                self.logging,
            )?;
            (0.0, result)
        };

        let solution = h_result.solution.clone();
        let solute = self.h_transport.mobile_concentration(&solution);
        let trap_concentrations: Vec<Vec<f64>> = (0..self.h_transport.num_traps())
            .map(|i| self.h_transport.trap_concentration(&solution, i))
            .collect();
        let retention = self.h_transport.retention(&solution);

        let mut frame = ExportFrame::new(&self.mesh);
        frame.insert("T", temperature.clone());
        frame.insert("solute", solute.clone());
        frame.insert("retention", retention.clone());
        for (name, values) in self
            .h_transport
            .trap_field_names()
            .iter()
            .zip(&trap_concentrations)
        {
            frame.insert(name, values.clone());
        }
        self.exports.write_all(final_time, &frame)?;

        let mut summary =
            SimulationSummary::from_fields(&self.mesh, &temperature, &solute, &trap_concentrations);
        summary.add_heat_solver_info(heat_result.iterations, heat_result.final_residual);
        summary.add_transport_solver_info(h_result.iterations, h_result.final_residual);

        Ok(RunOutput {
            temperature,
            solute,
            trap_concentrations,
            retention,
            solution,
            summary,
        })
    }

    fn run_transient(
        &mut self,
        init: DVector<f64>,
    ) -> Result<(f64, SolverResult), SimulationError> {
        let stepper = TransientSolver {
            t_start: 0.0,
            t_end: self.settings.final_time,
            dt: self.settings.initial_dt,
            tolerance: self.settings.absolute_tolerance,
            theta: 1.0,
            logging: self.logging,
        };

        let mut last: Option<(f64, DVector<f64>)> = None;
        stepper.solve(
            &mut self.h_transport.physics,
            &self.mesh,
            init,
            |t, u| last = Some((t, u.clone())),
        );

        let (t, u) = last.ok_or(SolverError::NonConvergence)?;
        Ok((
            t,
            SolverResult {
                solution: u,
                iterations: 0,
                final_residual: f64::NAN,
            },
        ))
    }
}

/// Dispatch one steady nonlinear solve to the configured linear solver.
fn solve_steady<D: 'static>(
    settings: &Settings,
    tolerance: Tolerance,
    physics: &FunctionalPhysics<DualDVec64, D>,
    mesh: &Mesh,
    guess: DVector<f64>,
    logging: bool,
) -> Result<SolverResult, SolverError> {
    let mut solver = NewtonArmijoSolver::default();
    solver.max_iterations = settings.maximum_iterations;

    match settings.linear_solver {
        LinearSolverKind::BiCgStab => {
            solver.convergence.tolerance = tolerance;
            solver.solve(physics, mesh, guess, logging)
        }
        LinearSolverKind::DenseLu => {
            // The dense path keeps a plain absolute tolerance; derive it from
            // the requested criterion and the initial residual.
            let r0 = solver.compute_residual_only(physics, mesh, &guess).norm();
            let absolute = match tolerance {
                Tolerance::Absolute(a) => a,
                Tolerance::Relative(r) => r * r0,
                Tolerance::Combined(a, r) => a.max(r * r0),
            };
            let dense = NewtonSolver {
                tolerance: absolute,
                max_iterations: settings.maximum_iterations,
            };
            dense.solve(physics, mesh, guess, logging)
        }
    }
}
