use nalgebra::DVector;

use hytrans_rs::discretization::generator::create_line_mesh;
use hytrans_rs::numerics::sparse_armijo::NewtonArmijoSolver;
use hytrans_rs::processing::export::{DecayAdjusted, ExportFrame, Exporter, XdmfExport};
use hytrans_rs::transport::decay::{TRITIUM_DECAY_CONSTANT, decay_constant};
use hytrans_rs::transport::hydrogen::HTransportProblem;
use hytrans_rs::transport::materials::{Material, Materials};
use hytrans_rs::transport::traps::{Trap, Traps};

fn lam(_t: f64) -> f64 {
    100.0
}

fn rho_cp(_t: f64) -> f64 {
    3e6
}

fn material() -> Materials {
    Materials::new(vec![Material {
        id: 1,
        d_0: 4.1e-7,
        e_d: 0.39,
        s_0: 1.87e24,
        e_s: 1.04,
        thermal_cond: lam,
        heat_capacity: rho_cp,
        rho: 1.0,
    }])
}

fn two_traps() -> Traps {
    Traps::new(vec![
        Trap::new(8.96e-17, 0.39, 1e13, 0.87, 1e25, 1),
        Trap::new(6e-17, 0.39, 8e13, 1.0, 4e24, 1),
    ])
}

// Room temperature keeps the trapping terms small enough that the decay
// contribution is well above floating-point cancellation in the residual
// differences below.
fn problem(n: usize) -> HTransportProblem {
    HTransportProblem::new(&material(), &two_traps(), vec![0; n], vec![300.0; n], false)
}

/// An arbitrary, nonuniform state to evaluate residuals at.
fn state(n: usize) -> DVector<f64> {
    DVector::from_iterator(
        n * 3,
        (0..n * 3).map(|i| {
            let cell = (i / 3) as f64;
            match i % 3 {
                0 => 1e19 * (1.0 + 0.1 * cell),
                1 => 2e18 * (1.0 + 0.05 * cell),
                _ => 5e17 * (1.0 + 0.2 * cell),
            }
        }),
    )
}

#[test]
fn decay_constant_follows_the_conversion_chain() {
    // half-life in years -> days -> hours -> seconds, ln(2) as 0.69
    let expected = 0.69 / (12.4 * 364.25 * 24.0 * 3600.0);
    assert_eq!(TRITIUM_DECAY_CONSTANT, expected);
    assert!((TRITIUM_DECAY_CONSTANT - 1.77e-9).abs() < 0.01e-9);
    // pure function of its input
    assert_eq!(decay_constant(12.4), decay_constant(12.4));
}

#[test]
fn augmented_residual_adds_decay_per_field() {
    let n = 6;
    let mesh = create_line_mesh(1e-3, n);
    let u = state(n);
    let solver = NewtonArmijoSolver::default();

    let base = problem(n);
    let r0 = solver.compute_residual_only(&base.physics, &mesh, &u);

    let mut augmented = problem(n);
    augmented
        .add_first_order_sink("solute", TRITIUM_DECAY_CONSTANT)
        .unwrap();
    for name in augmented.trap_field_names() {
        augmented
            .add_first_order_sink(&name, TRITIUM_DECAY_CONSTANT)
            .unwrap();
    }
    let r1 = solver.compute_residual_only(&augmented.physics, &mesh, &u);

    // difference is exactly lambda * c * V on every degree of freedom
    for cell in &mesh.cells {
        for var in 0..3 {
            let dof = cell.id * 3 + var;
            let expected = TRITIUM_DECAY_CONSTANT * u[dof] * cell.volume;
            let diff = r1[dof] - r0[dof];
            assert!(
                (diff - expected).abs() <= 1e-6 * expected.abs(),
                "dof {dof}: diff {diff:.6e}, expected {expected:.6e}"
            );
        }
    }
}

#[test]
fn omitting_one_trap_sink_is_detectable() {
    let n = 4;
    let mesh = create_line_mesh(1e-3, n);
    let u = state(n);
    let solver = NewtonArmijoSolver::default();

    let mut full = problem(n);
    full.add_first_order_sink("solute", TRITIUM_DECAY_CONSTANT)
        .unwrap();
    full.add_first_order_sink("trap_1", TRITIUM_DECAY_CONSTANT)
        .unwrap();
    full.add_first_order_sink("trap_2", TRITIUM_DECAY_CONSTANT)
        .unwrap();

    let mut partial = problem(n);
    partial
        .add_first_order_sink("solute", TRITIUM_DECAY_CONSTANT)
        .unwrap();
    partial
        .add_first_order_sink("trap_1", TRITIUM_DECAY_CONSTANT)
        .unwrap();
    // trap_2 deliberately left undecayed

    let r_full = solver.compute_residual_only(&full.physics, &mesh, &u);
    let r_partial = solver.compute_residual_only(&partial.physics, &mesh, &u);

    for cell in &mesh.cells {
        // solute and trap_1 rows agree...
        for var in [0usize, 1] {
            let dof = cell.id * 3 + var;
            assert_eq!(r_full[dof], r_partial[dof]);
        }
        // ...trap_2 rows differ by exactly the missing decay term
        let dof = cell.id * 3 + 2;
        let missing = TRITIUM_DECAY_CONSTANT * u[dof] * cell.volume;
        assert!(missing > 0.0);
        assert!(
            ((r_full[dof] - r_partial[dof]) - missing).abs() <= 1e-6 * missing,
            "missing trap_2 decay term not detected"
        );
    }
}

#[test]
fn sink_on_unknown_field_is_rejected() {
    let mut p = problem(4);
    assert!(p.add_first_order_sink("trap_9", TRITIUM_DECAY_CONSTANT).is_err());
}

#[test]
fn decay_export_is_pointwise_scaling() {
    let export = DecayAdjusted::new(XdmfExport::new("retention", "decay", "."));
    let retention = vec![1.0, 2.5, 1e21, 0.0];
    let adjusted = export.adjusted(&retention);
    for (a, r) in adjusted.iter().zip(&retention) {
        assert_eq!(*a, r * TRITIUM_DECAY_CONSTANT);
    }
}

#[test]
fn identical_exports_have_identical_constants() {
    let a = DecayAdjusted::new(XdmfExport::new("retention", "decay", "."));
    let b = DecayAdjusted::new(XdmfExport::new("retention", "decay", "."));
    assert_eq!(a.decay_constant(), b.decay_constant());
    assert_eq!(a.decay_constant(), TRITIUM_DECAY_CONSTANT);
}

#[test]
fn uniform_retention_writes_uniform_decay_rate() {
    // A field of 1.0 everywhere must serialize as the decay constant
    // everywhere, while the frame's own array stays undecayed.
    let dir = std::env::temp_dir();
    let mesh = create_line_mesh(1e-3, 5);
    let mut frame = ExportFrame::new(&mesh);
    frame.insert("retention", vec![1.0; 5]);

    let mut export = DecayAdjusted::new(XdmfExport::new("retention", "decay", &dir));
    export.write(0.0, &frame).unwrap();

    let content = std::fs::read_to_string(dir.join("decay.xdmf")).unwrap();
    let expected = format!("{:e}", TRITIUM_DECAY_CONSTANT);
    assert_eq!(content.matches(expected.as_str()).count(), 5);

    // source field untouched
    assert!(frame.get("retention").unwrap().iter().all(|&v| v == 1.0));

    std::fs::remove_file(dir.join("decay.xdmf")).ok();
}
