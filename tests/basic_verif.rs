use nalgebra::DVector;
use num_dual::DualDVec64;

use hytrans_rs::discretization::generator::{create_line_mesh, tag_boundary_faces};
use hytrans_rs::discretization::mesh::{Cell, Face, Mesh};
use hytrans_rs::numerics::Tolerance;
use hytrans_rs::numerics::sparse_armijo::NewtonArmijoSolver;
use hytrans_rs::physics::bc::{BCRule, BoundarySelector, DirichletStyle, Field, GeneralizedBC};
use hytrans_rs::physics::functional::FunctionalPhysics;

#[derive(Clone)]
struct DiffusionParams {
    k: f64,
}

// The PDE: -k * d2T/dx2 = 0
fn setup_diffusion(params: DiffusionParams) -> FunctionalPhysics<DualDVec64, DiffusionParams> {
    let flux = Box::new(
        |f: &mut [DualDVec64],
         u_k: &[DualDVec64],
         u_l: &[DualDVec64],
         _: &Face,
         data: &DiffusionParams| {
            f[0] = (u_k[0].clone() - u_l[0].clone()) * data.k;
        },
    );
    let reaction = Box::new(
        |f: &mut [DualDVec64], _: &[DualDVec64], _: &Cell, _: &DiffusionParams| {
            f[0] = DualDVec64::from_re(0.0)
        },
    );
    let storage = Box::new(
        |f: &mut [DualDVec64], _: &[DualDVec64], _: &Cell, _: &DiffusionParams| {
            f[0] = DualDVec64::from_re(0.0)
        },
    );
    FunctionalPhysics::new(vec![Field::from("T")], params, flux, reaction, storage)
}

#[derive(Clone)]
struct PoissonParams {
    source: f64,
}

// The PDE: -d2u/dx2 = source
fn setup_poisson(params: PoissonParams) -> FunctionalPhysics<DualDVec64, PoissonParams> {
    let flux = Box::new(
        |f: &mut [DualDVec64],
         u_k: &[DualDVec64],
         u_l: &[DualDVec64],
         _: &Face,
         _: &PoissonParams| {
            f[0] = u_k[0].clone() - u_l[0].clone();
        },
    );
    let reaction = Box::new(
        |f: &mut [DualDVec64], _: &[DualDVec64], _: &Cell, data: &PoissonParams| {
            f[0] = DualDVec64::from_re(-data.source);
        },
    );
    let storage = Box::new(
        |f: &mut [DualDVec64], _: &[DualDVec64], _: &Cell, _: &PoissonParams| {
            f[0] = DualDVec64::from_re(0.0)
        },
    );
    FunctionalPhysics::new(vec![Field::from("u")], params, flux, reaction, storage)
}

fn setup_1d(n: usize) -> Mesh {
    create_line_mesh(1.0, n)
}

fn end_tags(mesh: &Mesh) -> std::collections::HashMap<usize, String> {
    tag_boundary_faces(mesh, |c, _| {
        if c[0] < -0.5 + 1e-9 {
            Some("left".to_string())
        } else if c[0] > 0.5 - 1e-9 {
            Some("right".to_string())
        } else {
            None
        }
    })
}

#[test]
fn linear_diffusion_matches_exact_profile() {
    let mesh = setup_1d(101);
    let mut physics = setup_diffusion(DiffusionParams { k: 1.0 });
    physics.face_tags = end_tags(&mesh);

    physics.bc_registry.add(BCRule {
        field: Field::from("T"),
        on: BoundarySelector::Label("left".to_string()),
        bc: GeneralizedBC::dirichlet(0.0),
        style: DirichletStyle::Strong,
    });
    physics.bc_registry.add(BCRule {
        field: Field::from("T"),
        on: BoundarySelector::Label("right".to_string()),
        bc: GeneralizedBC::dirichlet(100.0),
        style: DirichletStyle::Strong,
    });

    let mut solver = NewtonArmijoSolver::default();
    solver.convergence.tolerance = Tolerance::Absolute(1e-8);
    let init = DVector::zeros(mesh.cells.len());
    let result = solver.solve(&physics, &mesh, init, false).expect("solved");

    let mut max_err: f64 = 0.0;
    for (i, val) in result.solution.iter().enumerate() {
        let x = mesh.cells[i].centroid[0];
        let exact = 100.0 * (x + 0.5);
        max_err = max_err.max((val - exact).abs());
    }
    // the scheme is exact for linear solutions
    assert!(max_err < 1e-6, "max error {max_err:.2e}");
}

#[test]
fn poisson_matches_parabola() {
    let mesh = setup_1d(101);
    let source = 10.0;
    let mut physics = setup_poisson(PoissonParams { source });
    physics.face_tags = end_tags(&mesh);

    for label in ["left", "right"] {
        physics.bc_registry.add(BCRule {
            field: Field::from("u"),
            on: BoundarySelector::Label(label.to_string()),
            bc: GeneralizedBC::dirichlet(0.0),
            style: DirichletStyle::Strong,
        });
    }

    let mut solver = NewtonArmijoSolver::default();
    solver.convergence.tolerance = Tolerance::Absolute(1e-9);
    let init = DVector::zeros(mesh.cells.len());
    let result = solver.solve(&physics, &mesh, init, false).expect("solved");

    let mut max_err: f64 = 0.0;
    for (i, val) in result.solution.iter().enumerate() {
        let x = mesh.cells[i].centroid[0];
        let exact = (source / 2.0) * (0.25 - x * x);
        max_err = max_err.max((val - exact).abs());
    }
    assert!(max_err < 5e-3, "max error {max_err:.2e}");
}
