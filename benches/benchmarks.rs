use criterion::{Criterion, criterion_group, criterion_main};
use nalgebra::DVector;

use hytrans_rs::discretization::mesh::Mesh;
use hytrans_rs::models::monoblock::monoblock::{
    MonoblockGeometry, monoblock_boundary_conditions, monoblock_materials, monoblock_mesh,
    monoblock_traps,
};
use hytrans_rs::numerics::sparse::SparseNewtonSolver;
use hytrans_rs::numerics::sparse_armijo::NewtonArmijoSolver;
use hytrans_rs::transport::hydrogen::HTransportProblem;

fn monoblock_transport() -> (Mesh, HTransportProblem) {
    let geom = MonoblockGeometry {
        nx: 16,
        ny: 20,
        ..MonoblockGeometry::default()
    };
    let (mesh, ids, tags) = monoblock_mesh(&geom);
    let materials = monoblock_materials();
    let index: Vec<usize> = ids
        .iter()
        .map(|id| materials.index_of(*id).unwrap())
        .collect();

    let mut problem = HTransportProblem::new(
        &materials,
        &monoblock_traps(),
        index,
        vec![800.0; mesh.cells.len()],
        true,
    );
    problem.physics.face_tags = tags;
    problem.lower_boundary_conditions(&mesh, &monoblock_boundary_conditions());
    (mesh, problem)
}

fn bench_residual(c: &mut Criterion) {
    let (mesh, problem) = monoblock_transport();
    let n = mesh.cells.len() * problem.physics.num_vars_per_cell;
    let u = DVector::from_element(n, 1.0);
    let armijo = NewtonArmijoSolver::default();

    c.bench_function("monoblock_residual", |b| {
        b.iter(|| armijo.compute_residual_only(&problem.physics, &mesh, &u))
    });
}

fn bench_jacobian(c: &mut Criterion) {
    let (mesh, problem) = monoblock_transport();
    let n = mesh.cells.len() * problem.physics.num_vars_per_cell;
    let u = DVector::from_element(n, 1.0);
    let solver = SparseNewtonSolver {
        tolerance: 1e-6,
        max_iterations: 1,
    };

    c.bench_function("monoblock_jacobian", |b| {
        b.iter(|| solver.compute_residual_and_jacobian(&problem.physics, &mesh, &u))
    });
}

criterion_group!(benches, bench_residual, bench_jacobian);
criterion_main!(benches);
