//! The hydrogen-transport layer: declarative materials, traps, boundary
//! conditions and settings, lowered onto the finite-volume physics core,
//! plus the simulation orchestration (initialise/run).

pub mod boundary;
pub mod decay;
pub mod heat;
pub mod hydrogen;
pub mod materials;
pub mod settings;
pub mod simulation;
pub mod traps;

pub use boundary::BoundaryCondition;
pub use materials::{Material, Materials, K_B};
pub use settings::{LinearSolverKind, Settings};
pub use simulation::{Simulation, SimulationBuilder, SimulationError};
pub use traps::{Trap, TrapParams, Traps};
