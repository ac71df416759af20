//! Temperature-dependent thermal properties and atomic densities of the
//! monoblock materials. Conductivities in W/(m K), volumetric heat
//! capacities rho*Cp in J/(m3 K), temperatures in K.

/// Tungsten thermal conductivity fit, valid 300-3000 K.
pub fn thermal_cond_w(t: f64) -> f64 {
    149.441 - 45.466e-3 * t + 13.193e-6 * t * t - 1.484e-9 * t * t * t + 3866.0 / t
}

/// Tungsten rho*Cp.
pub fn rho_cp_w(t: f64) -> f64 {
    2.268e6 + 239.0 * t - 0.047 * t * t
}

/// Copper thermal conductivity fit, valid 300-1300 K.
pub fn thermal_cond_cu(t: f64) -> f64 {
    420.75 - 6.8493e-2 * t
}

/// Copper rho*Cp.
pub fn rho_cp_cu(t: f64) -> f64 {
    3.30e6 + 500.0 * t
}

/// CuCrZr thermal conductivity fit, valid 300-900 K.
pub fn thermal_cond_cucrzr(t: f64) -> f64 {
    271.0 + 0.1249 * t - 7.62e-5 * t * t
}

/// CuCrZr rho*Cp.
pub fn rho_cp_cucrzr(t: f64) -> f64 {
    3.32e6 + 510.0 * t
}

/// Atomic densities [m-3].
pub const ATOM_DENSITY_W: f64 = 6.3e28;
pub const ATOM_DENSITY_CU: f64 = 8.4e28;
pub const ATOM_DENSITY_CUCRZR: f64 = 8.4e28;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conductivities_in_physical_range() {
        // tungsten conductivity decreases with temperature
        assert!(thermal_cond_w(300.0) > thermal_cond_w(1500.0));
        assert!(thermal_cond_w(300.0) > 100.0 && thermal_cond_w(300.0) < 200.0);
        // copper stays the best conductor of the three up to coolant temps
        assert!(thermal_cond_cu(400.0) > thermal_cond_w(400.0));
        assert!(thermal_cond_cu(400.0) > thermal_cond_cucrzr(400.0));
    }

    #[test]
    fn heat_capacities_positive_over_operating_range() {
        for t in [300.0, 600.0, 1000.0, 1800.0] {
            assert!(rho_cp_w(t) > 0.0);
            assert!(rho_cp_cu(t) > 0.0);
            assert!(rho_cp_cucrzr(t) > 0.0);
        }
    }
}
