use super::properties;
use crate::discretization::generator::{
    create_flat_3d_mesh, create_regular_2d_grid, tag_boundary_faces,
};
use crate::discretization::mesh::Mesh;
use crate::processing::export::{DecayAdjusted, Exports, XdmfExport};
use crate::transport::boundary::{BoundaryCondition, FieldTarget};
use crate::transport::materials::{Material, Materials};
use crate::transport::settings::{LinearSolverKind, Settings};
use crate::transport::simulation::SimulationBuilder;
use crate::transport::traps::{Trap, TrapParams, Traps};
use std::collections::HashMap;

// Volume and surface ids of the monoblock.
pub const ID_W: usize = 6;
pub const ID_CU: usize = 7;
pub const ID_CUCRZR: usize = 8;

pub const SURF_PLASMA_TOP: &str = "plasma_top";
pub const SURF_COOLANT: &str = "coolant";
pub const SURF_POLOIDAL_GAP: &str = "poloidal_gap";
pub const SURF_TOROIDAL_GAP: &str = "toroidal_gap";

/// Cross-section of the monoblock: x spans the block width, y the
/// through-thickness stack (CuCrZr tube wall at the bottom, Cu interlayer,
/// W armour on top). z is the extruded toroidal thickness.
#[derive(Clone, Copy)]
pub struct MonoblockGeometry {
    pub width: f64,
    pub armour_height: f64,
    pub interlayer_height: f64,
    pub structure_height: f64,
    pub thickness: f64,
    pub nx: usize,
    pub ny: usize,
}

impl Default for MonoblockGeometry {
    fn default() -> Self {
        Self {
            width: 23e-3,
            armour_height: 6e-3,
            interlayer_height: 1e-3,
            structure_height: 1.5e-3,
            thickness: 12e-3,
            nx: 24,
            ny: 30,
        }
    }
}

impl MonoblockGeometry {
    pub fn total_height(&self) -> f64 {
        self.armour_height + self.interlayer_height + self.structure_height
    }
}

/// Build the monoblock mesh with per-cell volume ids and tagged surfaces.
/// The mesh is centered on the origin, so y runs from -H/2 (coolant side)
/// to +H/2 (plasma side).
pub fn monoblock_mesh(
    geom: &MonoblockGeometry,
) -> (Mesh, Vec<usize>, HashMap<usize, String>) {
    let height = geom.total_height();
    let width = [geom.width, height];
    let points = create_regular_2d_grid(width, geom.nx, geom.ny);
    let mesh = create_flat_3d_mesh(&points, width, geom.thickness);

    let y_bottom = -height / 2.0;
    let y_cu = y_bottom + geom.structure_height;
    let y_w = y_cu + geom.interlayer_height;

    let material_ids: Vec<usize> = mesh
        .cells
        .iter()
        .map(|cell| {
            let y = cell.centroid[1];
            if y < y_cu {
                ID_CUCRZR
            } else if y < y_w {
                ID_CU
            } else {
                ID_W
            }
        })
        .collect();

    // Classify by face centroid; the extruded z faces stay untagged and
    // therefore adiabatic/no-flux.
    let tol = (geom.width / geom.nx as f64).min(height / geom.ny as f64) / 4.0;
    let half_w = geom.width / 2.0;
    let half_h = height / 2.0;
    let face_tags = tag_boundary_faces(&mesh, move |c, _n| {
        if c[1] > half_h - tol {
            Some(SURF_PLASMA_TOP.to_string())
        } else if c[1] < -half_h + tol {
            Some(SURF_COOLANT.to_string())
        } else if c[0] < -half_w + tol {
            Some(SURF_POLOIDAL_GAP.to_string())
        } else if c[0] > half_w - tol {
            Some(SURF_TOROIDAL_GAP.to_string())
        } else {
            None
        }
    });

    (mesh, material_ids, face_tags)
}

/// The three monoblock materials with their hydrogen transport parameters.
pub fn monoblock_materials() -> Materials {
    let tungsten = Material {
        id: ID_W,
        d_0: 4.1e-7,
        e_d: 0.39,
        s_0: 1.87e24,
        e_s: 1.04,
        thermal_cond: properties::thermal_cond_w,
        heat_capacity: properties::rho_cp_w,
        rho: 1.0,
    };

    let copper = Material {
        id: ID_CU,
        d_0: 6.6e-7,
        e_d: 0.387,
        s_0: 3.14e24,
        e_s: 0.572,
        thermal_cond: properties::thermal_cond_cu,
        heat_capacity: properties::rho_cp_cu,
        rho: 1.0,
    };

    let cucrzr = Material {
        id: ID_CUCRZR,
        d_0: 3.92e-7,
        e_d: 0.418,
        s_0: 4.28e23,
        e_s: 0.387,
        thermal_cond: properties::thermal_cond_cucrzr,
        heat_capacity: properties::rho_cp_cucrzr,
        rho: 1.0,
    };

    Materials::new(vec![tungsten, copper, cucrzr])
}

/// Trap 1: intrinsic tungsten trap. Trap 2: one parameter set per material.
pub fn monoblock_traps() -> Traps {
    Traps::new(vec![
        Trap::new(
            8.96e-17,
            0.39,
            1e13,
            0.87,
            1.3e-3 * properties::ATOM_DENSITY_W,
            ID_W,
        ),
        Trap::per_material(vec![
            (
                ID_W,
                TrapParams {
                    k_0: 8.96e-17,
                    e_k: 0.39,
                    p_0: 1e13,
                    e_p: 1.0,
                    density: 4e-4 * properties::ATOM_DENSITY_W,
                },
            ),
            (
                ID_CU,
                TrapParams {
                    k_0: 6e-17,
                    e_k: 0.39,
                    p_0: 8e13,
                    e_p: 0.5,
                    density: 5e-5 * properties::ATOM_DENSITY_CU,
                },
            ),
            (
                ID_CUCRZR,
                TrapParams {
                    k_0: 1.2e-16,
                    e_k: 0.42,
                    p_0: 8e13,
                    e_p: 0.85,
                    density: 5e-5 * properties::ATOM_DENSITY_CUCRZR,
                },
            ),
        ]),
    ])
}

pub fn monoblock_boundary_conditions() -> Vec<BoundaryCondition> {
    let heat_flux_top = BoundaryCondition::flux(SURF_PLASMA_TOP, 10e6, FieldTarget::Temperature);
    let convective_heat_flux_coolant =
        BoundaryCondition::convective_flux(SURF_COOLANT, 7e4, 323.0);

    let h_implantation_top = BoundaryCondition::implantation_dirichlet(
        SURF_PLASMA_TOP,
        1.61e22,
        9.52e-10,
        4.1e-7,
        0.39,
    );
    let recombination_flux_coolant =
        BoundaryCondition::recombination_flux(SURF_COOLANT, 2.9e-14, 1.92, 2);
    let instantaneous_recombination_poloidal =
        BoundaryCondition::dirichlet(SURF_POLOIDAL_GAP, 0.0, FieldTarget::Solute);
    let instantaneous_recombination_toroidal =
        BoundaryCondition::dirichlet(SURF_TOROIDAL_GAP, 0.0, FieldTarget::Solute);

    vec![
        heat_flux_top,
        convective_heat_flux_coolant,
        h_implantation_top,
        recombination_flux_coolant,
        instantaneous_recombination_poloidal,
        instantaneous_recombination_toroidal,
    ]
}

pub fn monoblock_settings() -> Settings {
    Settings {
        absolute_tolerance: 1e4,
        relative_tolerance: 1e-5,
        maximum_iterations: 30,
        chemical_pot: true,
        transient: false,
        final_time: 0.0,
        initial_dt: 0.0,
        linear_solver: LinearSolverKind::DenseLu,
    }
}

pub fn monoblock_exports(folder: &str) -> Exports {
    Exports::new(vec![
        Box::new(XdmfExport::of("T", folder)),
        Box::new(XdmfExport::of("solute", folder)),
        Box::new(XdmfExport::of("retention", folder)),
        Box::new(DecayAdjusted::new(XdmfExport::new(
            "retention", "decay", folder,
        ))),
    ])
}

/// The full steady-state monoblock case, ready to initialise.
pub fn monoblock_simulation(folder: &str, logging: bool) -> SimulationBuilder {
    let (mesh, material_ids, face_tags) = monoblock_mesh(&MonoblockGeometry::default());

    SimulationBuilder::new()
        .mesh(mesh, material_ids, face_tags)
        .materials(monoblock_materials())
        .traps(monoblock_traps())
        .boundary_conditions(monoblock_boundary_conditions())
        .settings(monoblock_settings())
        .exports(monoblock_exports(folder))
        .logging(logging)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_layers_and_surfaces() {
        let geom = MonoblockGeometry {
            nx: 8,
            ny: 10,
            ..MonoblockGeometry::default()
        };
        let (mesh, ids, tags) = monoblock_mesh(&geom);
        assert_eq!(ids.len(), mesh.cells.len());

        // all three materials present, tungsten dominant
        let n_w = ids.iter().filter(|&&id| id == ID_W).count();
        let n_cu = ids.iter().filter(|&&id| id == ID_CU).count();
        let n_cucrzr = ids.iter().filter(|&&id| id == ID_CUCRZR).count();
        assert!(n_w > 0 && n_cu > 0 && n_cucrzr > 0);
        assert!(n_w > n_cucrzr);
        assert_eq!(n_w + n_cu + n_cucrzr, mesh.cells.len());

        // the four surfaces are tagged
        for surf in [
            SURF_PLASMA_TOP,
            SURF_COOLANT,
            SURF_POLOIDAL_GAP,
            SURF_TOROIDAL_GAP,
        ] {
            assert!(
                tags.values().any(|l| l == surf),
                "surface {surf} not tagged"
            );
        }

        // plasma-facing cells are tungsten, coolant-side cells are CuCrZr
        for (face_idx, label) in &tags {
            let cell = mesh.faces[*face_idx].neighbor_cell_ids.0;
            if label == SURF_PLASMA_TOP {
                assert_eq!(ids[cell], ID_W);
            } else if label == SURF_COOLANT {
                assert_eq!(ids[cell], ID_CUCRZR);
            }
        }
    }

    #[test]
    fn configuration_initialises() {
        let sim = monoblock_simulation("results", false).initialise();
        let sim = sim.expect("monoblock configuration should be valid");
        assert_eq!(sim.h_transport.num_traps(), 2);
        assert_eq!(
            sim.h_transport.trap_field_names(),
            vec!["trap_1", "trap_2"]
        );
    }
}
