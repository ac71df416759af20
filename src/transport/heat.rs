use crate::discretization::mesh::{Cell, Face};
use crate::physics::bc::{BCRule, BoundarySelector, DirichletStyle, Field, GeneralizedBC};
use crate::physics::functional::FunctionalPhysics;
use crate::transport::boundary::{BoundaryCondition, FieldTarget};
use crate::transport::materials::Material;
use num_dual::DualDVec64;
use std::collections::HashMap;

/// Heat exchange on a tagged surface.
#[derive(Clone, Copy)]
pub enum SurfaceExchange {
    /// Inward heat flux [W/m2].
    ImposedFlux(f64),
    /// Outward flux h*(T - T_ext).
    Convective { h_coeff: f64, t_ext: f64 },
}

/// Data carried by the heat-conduction physics closures.
pub struct HeatParams {
    pub materials: Vec<Material>,
    /// Per-cell index into `materials`.
    pub material_index: Vec<usize>,
    pub surface_exchanges: HashMap<String, SurfaceExchange>,
}

/// Steady or transient heat conduction with temperature-dependent
/// conductivity. One unknown per cell.
pub struct HeatTransferProblem {
    pub physics: FunctionalPhysics<DualDVec64, HeatParams>,
    pub transient: bool,
}

impl HeatTransferProblem {
    pub fn new(materials: Vec<Material>, material_index: Vec<usize>, transient: bool) -> Self {
        let params = HeatParams {
            materials,
            material_index,
            surface_exchanges: HashMap::new(),
        };
        Self {
            physics: setup_heat_physics(params),
            transient,
        }
    }

    /// Lower the heat-transfer subset of the declarative boundary conditions.
    pub fn lower_boundary_conditions(&mut self, bcs: &[BoundaryCondition]) {
        for bc in bcs.iter().filter(|b| b.is_heat()) {
            match bc {
                BoundaryCondition::Flux { surfaces, value, .. } => {
                    for s in surfaces {
                        self.physics
                            .data
                            .surface_exchanges
                            .insert(s.clone(), SurfaceExchange::ImposedFlux(*value));
                    }
                }
                BoundaryCondition::ConvectiveFlux {
                    surfaces,
                    h_coeff,
                    t_ext,
                } => {
                    for s in surfaces {
                        self.physics.data.surface_exchanges.insert(
                            s.clone(),
                            SurfaceExchange::Convective {
                                h_coeff: *h_coeff,
                                t_ext: *t_ext,
                            },
                        );
                    }
                }
                BoundaryCondition::Dirichlet { surfaces, value, .. } => {
                    for s in surfaces {
                        self.physics.bc_registry.add(BCRule {
                            field: Field::from("T"),
                            on: BoundarySelector::Label(s.clone()),
                            bc: GeneralizedBC::dirichlet(*value),
                            style: DirichletStyle::Strong,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    /// Uniform starting guess: the coldest external temperature referenced by
    /// the boundary conditions, or 300 K if there is none.
    pub fn initial_temperature(bcs: &[BoundaryCondition]) -> f64 {
        let coldest = bcs
            .iter()
            .filter_map(|bc| match bc {
                BoundaryCondition::ConvectiveFlux { t_ext, .. } => Some(*t_ext),
                BoundaryCondition::Dirichlet {
                    value,
                    field: FieldTarget::Temperature,
                    ..
                } => Some(*value),
                _ => None,
            })
            .fold(f64::INFINITY, f64::min);
        if coldest.is_finite() { coldest } else { 300.0 }
    }
}

/// Creates a FunctionalPhysics object configured for heat conduction.
pub fn setup_heat_physics(params: HeatParams) -> FunctionalPhysics<DualDVec64, HeatParams> {
    // Conductive flux with harmonic-mean conductivity across the face.
    // Conductivity is evaluated at the real part of the local temperature:
    // the residual is exact, the Jacobian treats it as frozen.
    let flux = Box::new(
        |f: &mut [DualDVec64], u_k: &[DualDVec64], u_l: &[DualDVec64], face: &Face, data: &HeatParams| {
            let (k, l_opt) = face.neighbor_cell_ids;
            let mi_k = data.material_index[k];
            let mi_l = l_opt.map(|l| data.material_index[l]).unwrap_or(mi_k);

            let lam_k = (data.materials[mi_k].thermal_cond)(u_k[0].re);
            let lam_l = (data.materials[mi_l].thermal_cond)(u_l[0].re);
            let lam = 2.0 * lam_k * lam_l / (lam_k + lam_l);

            f[0] = (u_k[0].clone() - u_l[0].clone()) * lam;
        },
    );

    let reaction = Box::new(
        |f: &mut [DualDVec64], _u: &[DualDVec64], _cell: &Cell, _data: &HeatParams| {
            f[0] = DualDVec64::from_re(0.0);
        },
    );

    let storage = Box::new(
        |f: &mut [DualDVec64], u: &[DualDVec64], cell: &Cell, data: &HeatParams| {
            let mat = &data.materials[data.material_index[cell.id]];
            let rho_cp = (mat.heat_capacity)(u[0].re) * mat.rho;
            f[0] = u[0].clone() * rho_cp;
        },
    );

    let mut physics =
        FunctionalPhysics::new(vec![Field::from("T")], params, flux, reaction, storage);

    // Imposed and convective heat fluxes enter as boundary fluxes so the
    // exchange coefficients never need division by the (temperature
    // dependent) conductivity.
    physics.set_boundary_flux(Box::new(
        |f: &mut [DualDVec64],
         u_k: &[DualDVec64],
         _face: &Face,
         _cell: &Cell,
         label: &str,
         _t: f64,
         data: &HeatParams| {
            if let Some(ex) = data.surface_exchanges.get(label) {
                match ex {
                    SurfaceExchange::ImposedFlux(q) => {
                        f[0] += DualDVec64::from_re(-q);
                    }
                    SurfaceExchange::Convective { h_coeff, t_ext } => {
                        f[0] += (u_k[0].clone() - DualDVec64::from_re(*t_ext)) * *h_coeff;
                    }
                }
            }
        },
    ));

    physics
}
