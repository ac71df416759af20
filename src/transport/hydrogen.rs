use crate::discretization::mesh::{Cell, Face, Mesh};
use crate::physics::bc::{
    BCRule, BoundarySelector, DirichletStyle, Field, GeneralizedBC, Normal, Point,
};
use crate::physics::functional::{FunctionalPhysics, ReactionFn};
use crate::transport::boundary::{BoundaryCondition, FieldTarget};
use crate::transport::materials::{K_B, Material, Materials};
use crate::transport::traps::{TrapParams, Traps};
use nalgebra::DVector;
use num_dual::{DualDVec64, DualNum};
use std::collections::HashMap;
use thiserror::Error;

/// Particle exchange on a tagged surface.
#[derive(Clone, Copy)]
pub enum SurfaceReaction {
    /// Outward flux Kr(T) * c^order.
    Recombination { kr_0: f64, e_kr: f64, order: i32 },
    /// Inward particle flux [1/(m2 s)].
    ImposedFlux(f64),
}

/// Data carried by the hydrogen-transport physics closures. The temperature
/// field is frozen here: it is filled in from the heat solve before the
/// hydrogen boundary conditions are lowered.
pub struct HTransportParams {
    pub materials: Vec<Material>,
    /// Per-cell index into `materials`.
    pub material_index: Vec<usize>,
    /// Per-cell temperature [K].
    pub temperature: Vec<f64>,
    /// Per-trap, per-cell kinetic parameters (None where the cell's material
    /// hosts no such trap).
    pub trap_params: Vec<Vec<Option<TrapParams>>>,
    /// Solve for theta = c/S instead of c.
    pub chemical_pot: bool,
    pub surface_reactions: HashMap<String, Vec<SurfaceReaction>>,
}

impl HTransportParams {
    /// Conversion factor from the unknown to a concentration in this cell.
    #[inline]
    pub fn unknown_to_concentration(&self, cell_id: usize) -> f64 {
        if self.chemical_pot {
            let mat = &self.materials[self.material_index[cell_id]];
            mat.solubility(self.temperature[cell_id])
        } else {
            1.0
        }
    }

    /// Interface transmissivity of a cell: D (concentration unknown) or
    /// D*S (chemical-potential unknown).
    #[inline]
    fn transmissivity(&self, cell_id: usize) -> f64 {
        let mat = &self.materials[self.material_index[cell_id]];
        let t = self.temperature[cell_id];
        if self.chemical_pot {
            mat.diffusivity(t) * mat.solubility(t)
        } else {
            mat.diffusivity(t)
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown field `{0}`")]
pub struct UnknownField(pub String);

/// Coupled mobile-hydrogen and trap concentrations on a frozen temperature
/// field. Fields: `solute`, then `trap_1`, `trap_2`, ...
pub struct HTransportProblem {
    pub physics: FunctionalPhysics<DualDVec64, HTransportParams>,
}

impl HTransportProblem {
    pub fn new(
        materials: &Materials,
        traps: &Traps,
        material_index: Vec<usize>,
        temperature: Vec<f64>,
        chemical_pot: bool,
    ) -> Self {
        let snapshot = materials.snapshot();

        // Resolve trap parameters per cell once, so the closures do a flat
        // lookup instead of a material-id search in the hot loop.
        let trap_params: Vec<Vec<Option<TrapParams>>> = traps
            .iter()
            .map(|trap| {
                material_index
                    .iter()
                    .map(|&mi| trap.params_for(snapshot[mi].id).copied())
                    .collect()
            })
            .collect();

        let mut field_names = vec![Field::from("solute")];
        field_names.extend(traps.field_names().into_iter().map(Field::from));

        let params = HTransportParams {
            materials: snapshot,
            material_index,
            temperature,
            trap_params,
            chemical_pot,
            surface_reactions: HashMap::new(),
        };

        Self {
            physics: setup_h_transport_physics(field_names, params),
        }
    }

    pub fn num_traps(&self) -> usize {
        self.physics.data.trap_params.len()
    }

    pub fn trap_field_names(&self) -> Vec<String> {
        self.physics
            .field_names
            .iter()
            .skip(1)
            .map(|f| f.0.as_ref().to_string())
            .collect()
    }

    /// Register a first-order volumetric sink `rate * c` on one field — the
    /// residual extension point. For the mobile field the sink acts on the
    /// concentration, so the unknown is converted through the local
    /// solubility when the chemical-potential formulation is active.
    pub fn add_first_order_sink(&mut self, field: &str, rate: f64) -> Result<(), UnknownField> {
        let idx = self
            .physics
            .field_index(field)
            .ok_or_else(|| UnknownField(field.to_string()))?;

        let sink: ReactionFn<DualDVec64, HTransportParams> =
            Box::new(move |f, u, cell, data| {
                let conv = if idx == 0 {
                    data.unknown_to_concentration(cell.id)
                } else {
                    1.0
                };
                f[idx] += u[idx].clone() * (rate * conv);
            });
        self.physics.add_reaction(sink);
        Ok(())
    }

    /// Lower the hydrogen subset of the declarative boundary conditions.
    /// Requires the frozen temperature field to be in place.
    pub fn lower_boundary_conditions(&mut self, mesh: &Mesh, bcs: &[BoundaryCondition]) {
        for bc in bcs.iter().filter(|b| !b.is_heat()) {
            match bc {
                BoundaryCondition::Dirichlet { surfaces, value, .. } => {
                    for s in surfaces {
                        let rule_bc = self.facewise_dirichlet(mesh, s, |data, cell_id| {
                            *value / data.unknown_to_concentration(cell_id)
                        });
                        self.physics.bc_registry.add(BCRule {
                            field: Field::from("solute"),
                            on: BoundarySelector::Label(s.clone()),
                            bc: rule_bc,
                            style: DirichletStyle::Strong,
                        });
                    }
                }
                BoundaryCondition::ImplantationDirichlet {
                    surfaces,
                    phi,
                    r_p,
                    d_0,
                    e_d,
                } => {
                    let (phi, r_p, d_0, e_d) = (*phi, *r_p, *d_0, *e_d);
                    for s in surfaces {
                        let rule_bc = self.facewise_dirichlet(mesh, s, move |data, cell_id| {
                            let t = data.temperature[cell_id];
                            let d = d_0 * (-e_d / (K_B * t)).exp();
                            let c_surface = phi * r_p / d;
                            c_surface / data.unknown_to_concentration(cell_id)
                        });
                        self.physics.bc_registry.add(BCRule {
                            field: Field::from("solute"),
                            on: BoundarySelector::Label(s.clone()),
                            bc: rule_bc,
                            style: DirichletStyle::Strong,
                        });
                    }
                }
                BoundaryCondition::RecombinationFlux {
                    surfaces,
                    kr_0,
                    e_kr,
                    order,
                } => {
                    for s in surfaces {
                        self.physics
                            .data
                            .surface_reactions
                            .entry(s.clone())
                            .or_default()
                            .push(SurfaceReaction::Recombination {
                                kr_0: *kr_0,
                                e_kr: *e_kr,
                                order: *order,
                            });
                    }
                }
                BoundaryCondition::Flux { surfaces, value, field } => {
                    if *field == FieldTarget::Solute {
                        for s in surfaces {
                            self.physics
                                .data
                                .surface_reactions
                                .entry(s.clone())
                                .or_default()
                                .push(SurfaceReaction::ImposedFlux(*value));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// A Dirichlet rule whose value varies per boundary face (the surface
    /// temperature does). Values are tabulated at lowering time against the
    /// face centroid; the rule picks the nearest entry.
    fn facewise_dirichlet(
        &self,
        mesh: &Mesh,
        label: &str,
        value_at: impl Fn(&HTransportParams, usize) -> f64,
    ) -> GeneralizedBC {
        let data = &self.physics.data;
        let mut table: Vec<([f64; 3], f64)> = Vec::new();
        for (face_idx, tag) in &self.physics.face_tags {
            if tag != label {
                continue;
            }
            let face = &mesh.faces[*face_idx];
            let (cell_id, _) = face.neighbor_cell_ids;
            table.push((face.centroid, value_at(data, cell_id)));
        }

        GeneralizedBC::dirichlet(move |_t: f64, p: Point, _n: Normal| nearest_value(&table, p))
    }

    /// Mobile concentration per cell [m-3].
    pub fn mobile_concentration(&self, u: &DVector<f64>) -> Vec<f64> {
        let m = self.physics.num_vars_per_cell;
        (0..self.physics.data.material_index.len())
            .map(|c| u[c * m] * self.physics.data.unknown_to_concentration(c))
            .collect()
    }

    /// Concentration of trap `i` per cell [m-3].
    pub fn trap_concentration(&self, u: &DVector<f64>, i: usize) -> Vec<f64> {
        let m = self.physics.num_vars_per_cell;
        (0..self.physics.data.material_index.len())
            .map(|c| u[c * m + 1 + i])
            .collect()
    }

    /// Total retention per cell: mobile plus every trap [m-3].
    pub fn retention(&self, u: &DVector<f64>) -> Vec<f64> {
        let mut ret = self.mobile_concentration(u);
        for i in 0..self.num_traps() {
            for (r, ct) in ret.iter_mut().zip(self.trap_concentration(u, i)) {
                *r += ct;
            }
        }
        ret
    }
}

fn nearest_value(table: &[([f64; 3], f64)], p: Point) -> f64 {
    let mut best = 0.0;
    let mut best_d = f64::INFINITY;
    for (c, v) in table {
        let d = (c[0] - p.x).powi(2) + (c[1] - p.y).powi(2) + (c[2] - p.z).powi(2);
        if d < best_d {
            best_d = d;
            best = *v;
        }
    }
    best
}

/// Creates a FunctionalPhysics object configured for the coupled
/// mobile/trap transport system.
pub fn setup_h_transport_physics(
    field_names: Vec<Field>,
    params: HTransportParams,
) -> FunctionalPhysics<DualDVec64, HTransportParams> {
    // Only the mobile field diffuses. The face transmissivity is the
    // harmonic mean of the cell transmissivities, which keeps the flux
    // continuous across material interfaces (and, with the theta unknown,
    // the chemical potential as well).
    let flux = Box::new(
        |f: &mut [DualDVec64],
         u_k: &[DualDVec64],
         u_l: &[DualDVec64],
         face: &Face,
         data: &HTransportParams| {
            let (k, l_opt) = face.neighbor_cell_ids;
            let g_k = data.transmissivity(k);
            let g_l = l_opt.map(|l| data.transmissivity(l)).unwrap_or(g_k);
            let g = 2.0 * g_k * g_l / (g_k + g_l);

            f[0] = (u_k[0].clone() - u_l[0].clone()) * g;
        },
    );

    // Trapping kinetics: rate = k(T)*c*(n - c_t) - p(T)*c_t for each trap.
    // The mobile equation gains the rate, the trap equation loses it. Cells
    // whose material hosts no such trap get their trap unknown pinned to 0.
    let reaction = Box::new(
        |f: &mut [DualDVec64], u: &[DualDVec64], cell: &Cell, data: &HTransportParams| {
            let t = data.temperature[cell.id];
            let conv = data.unknown_to_concentration(cell.id);
            let c_m = u[0].clone() * conv;

            for (i, trap) in data.trap_params.iter().enumerate() {
                match &trap[cell.id] {
                    Some(p) => {
                        let k_rate = p.trapping_rate(t);
                        let p_rate = p.detrapping_rate(t);
                        let ct = &u[1 + i];
                        let free = DualDVec64::from_re(p.density) - ct.clone();
                        let rate = free * c_m.clone() * k_rate - ct.clone() * p_rate;
                        f[0] += rate.clone();
                        f[1 + i] -= rate;
                    }
                    None => {
                        f[1 + i] = u[1 + i].clone();
                    }
                }
            }
        },
    );

    let storage = Box::new(
        |f: &mut [DualDVec64], u: &[DualDVec64], cell: &Cell, data: &HTransportParams| {
            let conv = data.unknown_to_concentration(cell.id);
            f[0] = u[0].clone() * conv;
            for i in 1..u.len() {
                f[i] = u[i].clone();
            }
        },
    );

    let mut physics = FunctionalPhysics::new(field_names, params, flux, reaction, storage);

    physics.set_boundary_flux(Box::new(
        |f: &mut [DualDVec64],
         u_k: &[DualDVec64],
         _face: &Face,
         cell: &Cell,
         label: &str,
         _t: f64,
         data: &HTransportParams| {
            let Some(reactions) = data.surface_reactions.get(label) else {
                return;
            };
            for r in reactions {
                match r {
                    SurfaceReaction::Recombination { kr_0, e_kr, order } => {
                        let t = data.temperature[cell.id];
                        let kr = kr_0 * (-e_kr / (K_B * t)).exp();
                        let conv = data.unknown_to_concentration(cell.id);
                        let c = u_k[0].clone() * conv;
                        f[0] += c.powi(*order) * kr;
                    }
                    SurfaceReaction::ImposedFlux(q) => {
                        f[0] += DualDVec64::from_re(-q);
                    }
                }
            }
        },
    ));

    physics
}
