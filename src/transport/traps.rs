use crate::transport::materials::K_B;

/// Kinetic parameters of one trap inside one material.
#[derive(Clone, Copy, Debug)]
pub struct TrapParams {
    /// Trapping rate pre-factor [m3/s].
    pub k_0: f64,
    /// Trapping activation energy [eV].
    pub e_k: f64,
    /// Detrapping rate pre-factor [1/s].
    pub p_0: f64,
    /// Detrapping activation energy [eV].
    pub e_p: f64,
    /// Trap site density [m-3].
    pub density: f64,
}

impl TrapParams {
    pub fn trapping_rate(&self, t: f64) -> f64 {
        self.k_0 * (-self.e_k / (K_B * t)).exp()
    }

    pub fn detrapping_rate(&self, t: f64) -> f64 {
        self.p_0 * (-self.e_p / (K_B * t)).exp()
    }

    /// Steady occupancy fraction for a given mobile concentration.
    pub fn equilibrium_occupancy(&self, t: f64, c_mobile: f64) -> f64 {
        let kc = self.trapping_rate(t) * c_mobile;
        kc / (kc + self.detrapping_rate(t))
    }
}

/// A trap, present in one or several materials with per-material parameters.
/// Cells whose material carries no entry have no trap sites there.
pub struct Trap {
    entries: Vec<(usize, TrapParams)>,
}

impl Trap {
    /// Trap confined to a single material.
    pub fn new(k_0: f64, e_k: f64, p_0: f64, e_p: f64, density: f64, material_id: usize) -> Self {
        Self {
            entries: vec![(
                material_id,
                TrapParams {
                    k_0,
                    e_k,
                    p_0,
                    e_p,
                    density,
                },
            )],
        }
    }

    /// Trap spanning several materials, one parameter set per material.
    pub fn per_material(entries: Vec<(usize, TrapParams)>) -> Self {
        Self { entries }
    }

    pub fn params_for(&self, material_id: usize) -> Option<&TrapParams> {
        self.entries
            .iter()
            .find(|(id, _)| *id == material_id)
            .map(|(_, p)| p)
    }

    pub fn material_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }
}

/// The ordered trap set of a simulation. Order defines field names:
/// trap i becomes field `trap_{i+1}`.
#[derive(Default)]
pub struct Traps {
    list: Vec<Trap>,
}

impl Traps {
    pub fn new(list: Vec<Trap>) -> Self {
        Self { list }
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trap> {
        self.list.iter()
    }

    pub fn field_names(&self) -> Vec<String> {
        (1..=self.list.len()).map(|i| format!("trap_{i}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupancy_saturates() {
        let p = TrapParams {
            k_0: 8.96e-17,
            e_k: 0.39,
            p_0: 1e13,
            e_p: 0.87,
            density: 1e25,
        };
        let low = p.equilibrium_occupancy(600.0, 1e18);
        let high = p.equilibrium_occupancy(600.0, 1e26);
        assert!(low < high);
        assert!(high <= 1.0);
        // strongly detrapping at high temperature
        assert!(p.equilibrium_occupancy(2000.0, 1e18) < low);
    }

    #[test]
    fn per_material_lookup() {
        let trap = Trap::per_material(vec![
            (
                6,
                TrapParams {
                    k_0: 8.96e-17,
                    e_k: 0.39,
                    p_0: 1e13,
                    e_p: 1.0,
                    density: 1e25,
                },
            ),
            (
                7,
                TrapParams {
                    k_0: 6e-17,
                    e_k: 0.39,
                    p_0: 8e13,
                    e_p: 0.5,
                    density: 4e24,
                },
            ),
        ]);
        assert!(trap.params_for(6).is_some());
        assert!(trap.params_for(8).is_none());
        assert_eq!(trap.params_for(7).unwrap().p_0, 8e13);
    }

    #[test]
    fn trap_field_names_are_ordered() {
        let traps = Traps::new(vec![
            Trap::new(1e-17, 0.4, 1e13, 0.9, 1e25, 6),
            Trap::new(1e-17, 0.4, 1e13, 0.9, 1e25, 7),
        ]);
        assert_eq!(traps.field_names(), vec!["trap_1", "trap_2"]);
    }
}
