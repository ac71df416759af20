/// The field a boundary condition applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldTarget {
    Temperature,
    Solute,
}

/// Declarative boundary conditions: surface labels plus physical parameters,
/// with no behavior of their own. The problem builders lower them onto the
/// finite-volume core (ghost-value rules for the linear ones, boundary-flux
/// closures for the nonlinear ones) once the temperature field is available.
pub enum BoundaryCondition {
    /// Imposed inward surface flux (heat [W/m2] or particles [1/(m2 s)]).
    Flux {
        surfaces: Vec<String>,
        value: f64,
        field: FieldTarget,
    },
    /// Convective heat exchange with a coolant:
    /// outward flux h*(T - T_ext).
    ConvectiveFlux {
        surfaces: Vec<String>,
        h_coeff: f64,
        t_ext: f64,
    },
    /// Fixed field value. With value 0 on the solute this is instantaneous
    /// recombination.
    Dirichlet {
        surfaces: Vec<String>,
        value: f64,
        field: FieldTarget,
    },
    /// Arrhenius recombination: outward particle flux Kr(T) * c^order.
    RecombinationFlux {
        surfaces: Vec<String>,
        kr_0: f64,
        e_kr: f64,
        order: i32,
    },
    /// Surface concentration phi*R_p/D(T) set by an implantation flux
    /// phi [1/(m2 s)] and range R_p [m].
    ImplantationDirichlet {
        surfaces: Vec<String>,
        phi: f64,
        r_p: f64,
        d_0: f64,
        e_d: f64,
    },
}

impl BoundaryCondition {
    /// Single-surface imposed flux.
    pub fn flux(surface: &str, value: f64, field: FieldTarget) -> Self {
        Self::Flux {
            surfaces: vec![surface.to_string()],
            value,
            field,
        }
    }

    pub fn convective_flux(surface: &str, h_coeff: f64, t_ext: f64) -> Self {
        Self::ConvectiveFlux {
            surfaces: vec![surface.to_string()],
            h_coeff,
            t_ext,
        }
    }

    pub fn dirichlet(surface: &str, value: f64, field: FieldTarget) -> Self {
        Self::Dirichlet {
            surfaces: vec![surface.to_string()],
            value,
            field,
        }
    }

    pub fn recombination_flux(surface: &str, kr_0: f64, e_kr: f64, order: i32) -> Self {
        Self::RecombinationFlux {
            surfaces: vec![surface.to_string()],
            kr_0,
            e_kr,
            order,
        }
    }

    pub fn implantation_dirichlet(surface: &str, phi: f64, r_p: f64, d_0: f64, e_d: f64) -> Self {
        Self::ImplantationDirichlet {
            surfaces: vec![surface.to_string()],
            phi,
            r_p,
            d_0,
            e_d,
        }
    }

    /// Whether this condition belongs to the heat-transfer problem.
    pub fn is_heat(&self) -> bool {
        match self {
            Self::Flux { field, .. } | Self::Dirichlet { field, .. } => {
                *field == FieldTarget::Temperature
            }
            Self::ConvectiveFlux { .. } => true,
            Self::RecombinationFlux { .. } | Self::ImplantationDirichlet { .. } => false,
        }
    }

    pub fn surfaces(&self) -> &[String] {
        match self {
            Self::Flux { surfaces, .. }
            | Self::ConvectiveFlux { surfaces, .. }
            | Self::Dirichlet { surfaces, .. }
            | Self::RecombinationFlux { surfaces, .. }
            | Self::ImplantationDirichlet { surfaces, .. } => surfaces,
        }
    }
}
