use nalgebra::DVector;

use hytrans_rs::discretization::generator::{create_line_mesh, tag_boundary_faces};
use hytrans_rs::discretization::mesh::Mesh;
use hytrans_rs::numerics::Tolerance;
use hytrans_rs::numerics::sparse_armijo::NewtonArmijoSolver;
use hytrans_rs::transport::boundary::{BoundaryCondition, FieldTarget};
use hytrans_rs::transport::heat::HeatTransferProblem;
use hytrans_rs::transport::hydrogen::HTransportProblem;
use hytrans_rs::transport::materials::{K_B, Material, Materials};
use hytrans_rs::transport::traps::{Trap, Traps};

fn lam_150(_t: f64) -> f64 {
    150.0
}

fn rho_cp_3e6(_t: f64) -> f64 {
    3e6
}

fn slab_material(id: usize, d_0: f64, e_d: f64, s_0: f64, e_s: f64) -> Material {
    Material {
        id,
        d_0,
        e_d,
        s_0,
        e_s,
        thermal_cond: lam_150,
        heat_capacity: rho_cp_3e6,
        rho: 1.0,
    }
}

fn tag_ends(mesh: &Mesh, width: f64, left: &str, right: &str) -> std::collections::HashMap<usize, String> {
    let (left, right) = (left.to_string(), right.to_string());
    tag_boundary_faces(mesh, move |c, _| {
        if c[0] < -width / 2.0 + 1e-9 {
            Some(left.clone())
        } else if c[0] > width / 2.0 - 1e-9 {
            Some(right.clone())
        } else {
            None
        }
    })
}

/// Cells ordered left to right.
fn ordered_cells(mesh: &Mesh) -> Vec<usize> {
    let mut ids: Vec<usize> = (0..mesh.cells.len()).collect();
    ids.sort_by(|a, b| mesh.cells[*a].centroid[0].total_cmp(&mesh.cells[*b].centroid[0]));
    ids
}

#[test]
fn heat_slab_with_flux_and_convection() {
    // 1-D slab, imposed flux q on the right, convective exchange on the left:
    // the coolant-side cell sits at T_ext + q/h, the profile is linear with
    // slope q/lambda.
    let length = 0.01;
    let n = 50;
    let q = 1e6;
    let h = 1e4;
    let t_ext = 300.0;
    let lam = 150.0;

    let mesh = create_line_mesh(length, n);
    let tags = tag_ends(&mesh, length, "coolant", "top");

    let mat = slab_material(1, 4.1e-7, 0.39, 1.87e24, 1.04);
    let mut heat = HeatTransferProblem::new(vec![mat], vec![0; n], false);
    heat.physics.face_tags = tags;
    heat.lower_boundary_conditions(&[
        BoundaryCondition::flux("top", q, FieldTarget::Temperature),
        BoundaryCondition::convective_flux("coolant", h, t_ext),
    ]);

    let mut solver = NewtonArmijoSolver::default();
    solver.convergence.tolerance = Tolerance::Relative(1e-10);
    let init = DVector::from_element(n, t_ext);
    let result = solver.solve(&heat.physics, &mesh, init, false).expect("solved");

    let order = ordered_cells(&mesh);
    let t_cold = result.solution[order[0]];
    assert!(
        (t_cold - (t_ext + q / h)).abs() < 1e-3,
        "coolant-side temperature {t_cold}"
    );

    let x0 = mesh.cells[order[0]].centroid[0];
    for &i in &order {
        let exact = (t_ext + q / h) + q * (mesh.cells[i].centroid[0] - x0) / lam;
        let err = (result.solution[i] - exact).abs();
        assert!(err < 1e-3, "temperature profile error {err:.2e}");
    }
}

#[test]
fn trap_reaches_equilibrium_occupancy() {
    // Uniform temperature and a fixed surface concentration on both ends:
    // the mobile field is flat and every trap settles at n*kc/(kc + p).
    let length = 1e-3;
    let n = 20;
    let t_uniform = 600.0;
    let c0 = 1e20;
    let density = 1e25;

    let mesh = create_line_mesh(length, n);
    let materials = Materials::new(vec![slab_material(1, 4.1e-7, 0.39, 1.87e24, 1.04)]);
    let traps = Traps::new(vec![Trap::new(8.96e-17, 0.39, 1e13, 0.87, density, 1)]);

    let mut problem = HTransportProblem::new(
        &materials,
        &traps,
        vec![0; n],
        vec![t_uniform; n],
        false,
    );
    problem.physics.face_tags = tag_ends(&mesh, length, "left", "right");
    problem.lower_boundary_conditions(
        &mesh,
        &[
            BoundaryCondition::dirichlet("left", c0, FieldTarget::Solute),
            BoundaryCondition::dirichlet("right", c0, FieldTarget::Solute),
        ],
    );

    let mut solver = NewtonArmijoSolver::default();
    solver.convergence.tolerance = Tolerance::Relative(1e-10);
    let init = DVector::zeros(n * 2);
    let result = solver.solve(&problem.physics, &mesh, init, false).expect("solved");

    let mobile = problem.mobile_concentration(&result.solution);
    let trapped = problem.trap_concentration(&result.solution, 0);

    let k_rate = 8.96e-17 * (-0.39 / (K_B * t_uniform)).exp();
    let p_rate = 1e13 * (-0.87 / (K_B * t_uniform)).exp();
    let ct_exact = density * k_rate * c0 / (k_rate * c0 + p_rate);

    for c in &mobile {
        assert!((c - c0).abs() / c0 < 1e-5, "mobile {c:.4e} vs {c0:.4e}");
    }
    for ct in &trapped {
        assert!(
            (ct - ct_exact).abs() / ct_exact < 1e-4,
            "trap {ct:.4e} vs {ct_exact:.4e}"
        );
    }
}

#[test]
fn chemical_potential_continuity_across_interface() {
    // Two materials with different solubilities. Dirichlet concentrations
    // chosen so theta = c/S matches on both ends: the steady state is a flat
    // theta, i.e. zero flux, with the concentration jumping by S_b/S_a at
    // the interface.
    let length = 1e-3;
    let n = 40;
    let s_a = 1e22;
    let s_b = 3e22;
    let c_left = 1e20;
    let c_right = c_left * s_b / s_a;

    let mesh = create_line_mesh(length, n);
    let materials = Materials::new(vec![
        slab_material(1, 1e-8, 0.0, s_a, 0.0),
        slab_material(2, 1e-8, 0.0, s_b, 0.0),
    ]);

    let material_index: Vec<usize> = mesh
        .cells
        .iter()
        .map(|c| if c.centroid[0] < 0.0 { 0 } else { 1 })
        .collect();

    let mut problem = HTransportProblem::new(
        &materials,
        &Traps::default(),
        material_index.clone(),
        vec![500.0; n],
        true,
    );
    problem.physics.face_tags = tag_ends(&mesh, length, "left", "right");
    problem.lower_boundary_conditions(
        &mesh,
        &[
            BoundaryCondition::dirichlet("left", c_left, FieldTarget::Solute),
            BoundaryCondition::dirichlet("right", c_right, FieldTarget::Solute),
        ],
    );

    let mut solver = NewtonArmijoSolver::default();
    solver.convergence.tolerance = Tolerance::Relative(1e-12);
    let init = DVector::zeros(n);
    let result = solver.solve(&problem.physics, &mesh, init, false).expect("solved");

    // theta is flat
    let theta0 = result.solution[0];
    for th in result.solution.iter() {
        assert!((th - theta0).abs() / theta0 < 1e-8, "theta not flat");
    }

    // concentration jumps with the solubility
    let mobile = problem.mobile_concentration(&result.solution);
    for (i, c) in mobile.iter().enumerate() {
        let expected = if material_index[i] == 0 { c_left } else { c_right };
        assert!(
            (c - expected).abs() / expected < 1e-8,
            "cell {i}: {c:.4e} vs {expected:.4e}"
        );
    }
}

#[test]
fn implantation_recombination_balance() {
    // Implantation source on the left face, second-order recombination on
    // the right: the steady flux satisfies D*(c_s - c_b)/L_eff = Kr*c_b^2.
    let length = 1e-3;
    let n = 50;
    let d = 1e-8;
    let kr = 2e-25;
    let phi = 1e21;
    let r_p = 1e-9;
    let c_s = phi * r_p / d;

    let mesh = create_line_mesh(length, n);
    let materials = Materials::new(vec![slab_material(1, d, 0.0, 1e24, 0.0)]);

    let mut problem = HTransportProblem::new(
        &materials,
        &Traps::default(),
        vec![0; n],
        vec![500.0; n],
        false,
    );
    problem.physics.face_tags = tag_ends(&mesh, length, "left", "right");
    problem.lower_boundary_conditions(
        &mesh,
        &[
            BoundaryCondition::implantation_dirichlet("left", phi, r_p, d, 0.0),
            BoundaryCondition::recombination_flux("right", kr, 0.0, 2),
        ],
    );

    let mut solver = NewtonArmijoSolver::default();
    solver.convergence.tolerance = Tolerance::Relative(1e-10);
    let init = DVector::zeros(n);
    let result = solver.solve(&problem.physics, &mesh, init, false).expect("solved");

    let order = ordered_cells(&mesh);
    let dx = length / n as f64;
    let l_eff = length - dx / 2.0;
    let a = d / l_eff;
    let c_b_exact = (-a + (a * a + 4.0 * kr * a * c_s).sqrt()) / (2.0 * kr);

    let c_b = result.solution[*order.last().unwrap()];
    assert!(
        (c_b - c_b_exact).abs() / c_b_exact < 1e-3,
        "recombination-side concentration {c_b:.4e} vs {c_b_exact:.4e}"
    );

    // monotonically decreasing toward the recombining surface
    for w in order.windows(2) {
        assert!(result.solution[w[0]] >= result.solution[w[1]]);
    }
}

#[test]
fn imposed_particle_flux() {
    // Imposed influx q on the left, zero concentration on the right:
    // c(x) = q*(x_right_face - x)/D.
    let length = 1e-3;
    let n = 50;
    let d = 1e-8;
    let q = 1e15;

    let mesh = create_line_mesh(length, n);
    let materials = Materials::new(vec![slab_material(1, d, 0.0, 1e24, 0.0)]);

    let mut problem = HTransportProblem::new(
        &materials,
        &Traps::default(),
        vec![0; n],
        vec![500.0; n],
        false,
    );
    problem.physics.face_tags = tag_ends(&mesh, length, "left", "right");
    problem.lower_boundary_conditions(
        &mesh,
        &[
            BoundaryCondition::flux("left", q, FieldTarget::Solute),
            BoundaryCondition::dirichlet("right", 0.0, FieldTarget::Solute),
        ],
    );

    let mut solver = NewtonArmijoSolver::default();
    solver.convergence.tolerance = Tolerance::Relative(1e-10);
    let init = DVector::zeros(n);
    let result = solver.solve(&problem.physics, &mesh, init, false).expect("solved");

    for (i, cell) in mesh.cells.iter().enumerate() {
        let exact = q * (length / 2.0 - cell.centroid[0]) / d;
        let err = (result.solution[i] - exact).abs() / exact;
        assert!(err < 1e-6, "cell {i}: rel error {err:.2e}");
    }
}
