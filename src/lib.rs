//! Finite-volume hydrogen transport in plasma-facing components.
//!
//! The crate is organised in two layers. The lower layer (`discretization`,
//! `physics`, `numerics`) is a generic cell-centered finite-volume framework:
//! physics are configured with flux/reaction/storage closures, boundary
//! conditions are applied through ghost values, and Jacobians come from
//! dual-number automatic differentiation. The upper layer (`transport`,
//! `models`) expresses hydrogen transport on it: Arrhenius materials, trap
//! kinetics, tritium decay and the monoblock parameterization.

pub mod discretization;
pub mod models;
pub mod numerics;
pub mod physics;
pub mod processing;
pub mod transport;
