//! Sweep the coolant heat-exchange coefficient and record the armour
//! surface temperature of a 1-D monoblock column.

use nalgebra::DVector;
use std::fs;

use hytrans_rs::discretization::generator::{create_line_mesh, tag_boundary_faces};
use hytrans_rs::models::monoblock::monoblock::{ID_CU, ID_CUCRZR, ID_W, monoblock_materials};
use hytrans_rs::numerics::Tolerance;
use hytrans_rs::numerics::sparse_armijo::NewtonArmijoSolver;
use hytrans_rs::processing::csv_writer;
use hytrans_rs::transport::boundary::{BoundaryCondition, FieldTarget};
use hytrans_rs::transport::heat::HeatTransferProblem;

fn main() {
    fs::create_dir_all("results").expect("Failed to create results directory");

    // CuCrZr wall, Cu interlayer, W armour stacked along x.
    let structure = 1.5e-3;
    let interlayer = 1e-3;
    let armour = 6e-3;
    let length = structure + interlayer + armour;
    let n = 60;

    let mesh = create_line_mesh(length, n);
    let x0 = -length / 2.0;
    let materials = monoblock_materials();
    let ids: Vec<usize> = mesh
        .cells
        .iter()
        .map(|c| {
            let x = c.centroid[0];
            if x < x0 + structure {
                ID_CUCRZR
            } else if x < x0 + structure + interlayer {
                ID_CU
            } else {
                ID_W
            }
        })
        .collect();
    let index: Vec<usize> = ids
        .iter()
        .map(|id| materials.index_of(*id).unwrap())
        .collect();

    let tags = tag_boundary_faces(&mesh, move |c, _| {
        if c[0] < -length / 2.0 + 1e-9 {
            Some("coolant".to_string())
        } else if c[0] > length / 2.0 - 1e-9 {
            Some("plasma_top".to_string())
        } else {
            None
        }
    });

    let q_plasma = 10e6;
    let t_ext = 323.0;
    let h_values: Vec<f64> = (1..=6).map(|i| 2e4 * i as f64).collect();

    println!("Coolant exchange sweep");
    println!("======================");

    let mut peaks = Vec::new();
    for &h in &h_values {
        let mut heat =
            HeatTransferProblem::new(materials.snapshot(), index.clone(), false);
        heat.physics.face_tags = tags.clone();
        heat.lower_boundary_conditions(&[
            BoundaryCondition::flux("plasma_top", q_plasma, FieldTarget::Temperature),
            BoundaryCondition::convective_flux("coolant", h, t_ext),
        ]);

        let mut solver = NewtonArmijoSolver::default();
        solver.convergence.tolerance = Tolerance::Relative(1e-8);
        let init = DVector::from_element(n, t_ext);

        match solver.solve(&heat.physics, &mesh, init, false) {
            Ok(result) => {
                let peak = result
                    .solution
                    .iter()
                    .cloned()
                    .fold(f64::NEG_INFINITY, f64::max);
                println!("h = {h:>9.3e} W/(m2 K) | peak T = {peak:7.1} K");
                peaks.push(peak);
            }
            Err(e) => {
                eprintln!("h = {h:>9.3e}: solve failed: {e}");
                peaks.push(f64::NAN);
            }
        }
    }

    csv_writer::write_xy(
        "results/coolant_sweep.csv",
        "h_coeff",
        "peak_temperature",
        &h_values,
        &peaks,
    )
    .expect("Failed to write sweep results");
    println!("Sweep saved to results/coolant_sweep.csv");
}
