//! Transient hydrogen uptake into a sealed tungsten slab: a fixed surface
//! concentration on one side, everything else closed. Writes the total
//! inventory against time.

use nalgebra::DVector;
use std::fs;

use hytrans_rs::discretization::generator::{create_line_mesh, tag_boundary_faces};
use hytrans_rs::numerics::transient::TransientSolver;
use hytrans_rs::processing::csv_writer;
use hytrans_rs::transport::boundary::{BoundaryCondition, FieldTarget};
use hytrans_rs::transport::hydrogen::HTransportProblem;
use hytrans_rs::transport::materials::{Material, Materials};
use hytrans_rs::transport::traps::{Trap, Traps};

fn lam_w(_t: f64) -> f64 {
    150.0
}

fn rho_cp_w(_t: f64) -> f64 {
    2.6e6
}

fn main() {
    fs::create_dir_all("results").expect("Failed to create results directory");

    let length = 1e-3;
    let n = 40;
    let t_uniform = 600.0;
    let c_surface = 1e20;

    let mesh = create_line_mesh(length, n);
    let tags = tag_boundary_faces(&mesh, move |c, _| {
        if c[0] < -length / 2.0 + 1e-9 {
            Some("exposed".to_string())
        } else {
            None
        }
    });

    let materials = Materials::new(vec![Material {
        id: 1,
        d_0: 4.1e-7,
        e_d: 0.39,
        s_0: 1.87e24,
        e_s: 1.04,
        thermal_cond: lam_w,
        heat_capacity: rho_cp_w,
        rho: 1.0,
    }]);
    let traps = Traps::new(vec![Trap::new(8.96e-17, 0.39, 1e13, 0.87, 1e25, 1)]);

    let mut problem = HTransportProblem::new(
        &materials,
        &traps,
        vec![0; n],
        vec![t_uniform; n],
        false,
    );
    problem.physics.face_tags = tags;
    problem.lower_boundary_conditions(
        &mesh,
        &[BoundaryCondition::dirichlet(
            "exposed",
            c_surface,
            FieldTarget::Solute,
        )],
    );

    let stepper = TransientSolver {
        t_start: 0.0,
        t_end: 2.0,
        dt: 0.02,
        tolerance: 1e4,
        theta: 1.0,
        logging: true,
    };

    let m = problem.physics.num_vars_per_cell;
    let mut times = Vec::new();
    let mut inventories = Vec::new();

    let init = DVector::zeros(n * m);
    stepper.solve(&mut problem.physics, &mesh, init, |t, u| {
        let mut inventory = 0.0;
        for cell in &mesh.cells {
            for var in 0..m {
                inventory += u[cell.id * m + var] * cell.volume;
            }
        }
        times.push(t);
        inventories.push(inventory);
    });

    csv_writer::write_xy(
        "results/uptake_inventory.csv",
        "t",
        "inventory",
        &times,
        &inventories,
    )
    .expect("Failed to write inventory history");

    println!(
        "Uptake finished: {} steps, final inventory {:.4e} atoms",
        times.len(),
        inventories.last().unwrap_or(&0.0)
    );
    println!("History saved to results/uptake_inventory.csv");
}
