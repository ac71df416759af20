/// Boltzmann constant in eV/K; activation energies are given in eV.
pub const K_B: f64 = 8.617333262e-5;

/// Temperature-dependent scalar property, e.g. thermal conductivity.
pub type PropertyFn = fn(f64) -> f64;

/// One material of the component. Immutable after construction; diffusivity
/// and solubility follow Arrhenius laws, thermal properties are arbitrary
/// functions of temperature.
#[derive(Clone, Copy)]
pub struct Material {
    /// Volume id, matching the per-cell assignment of the mesh.
    pub id: usize,
    /// Diffusivity pre-factor [m2/s].
    pub d_0: f64,
    /// Diffusion activation energy [eV].
    pub e_d: f64,
    /// Solubility pre-factor [m-3 Pa-0.5].
    pub s_0: f64,
    /// Solubility activation energy [eV].
    pub e_s: f64,
    /// Thermal conductivity [W/(m K)] as a function of T [K].
    pub thermal_cond: PropertyFn,
    /// Volumetric heat capacity rho*Cp [J/(m3 K)] as a function of T [K].
    pub heat_capacity: PropertyFn,
    /// Density multiplier applied to the storage term.
    pub rho: f64,
}

impl Material {
    pub fn diffusivity(&self, t: f64) -> f64 {
        self.d_0 * (-self.e_d / (K_B * t)).exp()
    }

    pub fn solubility(&self, t: f64) -> f64 {
        self.s_0 * (-self.e_s / (K_B * t)).exp()
    }
}

/// The set of materials of a simulation, looked up by volume id.
pub struct Materials {
    list: Vec<Material>,
}

impl Materials {
    pub fn new(list: Vec<Material>) -> Self {
        Self { list }
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        self.list.iter()
    }

    pub fn by_index(&self, index: usize) -> &Material {
        &self.list[index]
    }

    pub fn index_of(&self, id: usize) -> Option<usize> {
        self.list.iter().position(|m| m.id == id)
    }

    /// Copy of the underlying list, for physics data structs that need
    /// closure-friendly ownership.
    pub fn snapshot(&self) -> Vec<Material> {
        self.list.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(_t: f64) -> f64 {
        1.0
    }

    #[test]
    fn arrhenius_evaluation() {
        let m = Material {
            id: 1,
            d_0: 4.1e-7,
            e_d: 0.39,
            s_0: 1.87e24,
            e_s: 1.04,
            thermal_cond: unit,
            heat_capacity: unit,
            rho: 1.0,
        };
        let d = m.diffusivity(1000.0);
        let expected = 4.1e-7 * (-0.39 / (K_B * 1000.0)).exp();
        assert!((d - expected).abs() / expected < 1e-12);
        // diffusivity grows with temperature
        assert!(m.diffusivity(1200.0) > m.diffusivity(800.0));
        // solubility at 1000 K is far below the pre-factor
        assert!(m.solubility(1000.0) < m.s_0 * 1e-4);
    }

    #[test]
    fn lookup_by_id() {
        let mk = |id| Material {
            id,
            d_0: 1e-7,
            e_d: 0.4,
            s_0: 1e24,
            e_s: 1.0,
            thermal_cond: unit,
            heat_capacity: unit,
            rho: 1.0,
        };
        let mats = Materials::new(vec![mk(6), mk(7), mk(8)]);
        assert_eq!(mats.index_of(7), Some(1));
        assert_eq!(mats.index_of(9), None);
        assert_eq!(mats.by_index(2).id, 8);
    }
}
