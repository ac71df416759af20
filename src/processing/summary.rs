use crate::discretization::mesh::Mesh;
use crate::transport::decay::TRITIUM_DECAY_CONSTANT;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Condensed report of one run: mesh statistics, field extrema, hydrogen
/// inventories and solver diagnostics.
pub struct SimulationSummary {
    pub num_cells: usize,
    pub num_faces: usize,
    pub num_nodes: usize,
    pub total_volume: f64,

    pub peak_temperature: f64,
    pub min_temperature: f64,
    pub peak_mobile: f64,

    /// Volume integrals [atoms].
    pub mobile_inventory: f64,
    pub trap_inventories: Vec<f64>,
    pub retention_inventory: f64,
    /// Decay rate of the retained inventory [1/s].
    pub decay_activity: f64,

    pub heat_iterations: Option<u32>,
    pub heat_final_residual: Option<f64>,
    pub transport_iterations: Option<u32>,
    pub transport_final_residual: Option<f64>,
}

impl SimulationSummary {
    pub fn from_fields(
        mesh: &Mesh,
        temperature: &[f64],
        mobile: &[f64],
        traps: &[Vec<f64>],
    ) -> Self {
        let peak_t = temperature.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min_t = temperature.iter().cloned().fold(f64::INFINITY, f64::min);
        let peak_mobile = mobile.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let mobile_inventory = mesh.integrate(mobile);
        let trap_inventories: Vec<f64> = traps.iter().map(|ct| mesh.integrate(ct)).collect();
        let retention_inventory = mobile_inventory + trap_inventories.iter().sum::<f64>();

        Self {
            num_cells: mesh.cells.len(),
            num_faces: mesh.faces.len(),
            num_nodes: mesh.nodes.len(),
            total_volume: mesh.total_volume(),
            peak_temperature: peak_t,
            min_temperature: min_t,
            peak_mobile,
            mobile_inventory,
            trap_inventories,
            retention_inventory,
            decay_activity: retention_inventory * TRITIUM_DECAY_CONSTANT,
            heat_iterations: None,
            heat_final_residual: None,
            transport_iterations: None,
            transport_final_residual: None,
        }
    }

    pub fn add_heat_solver_info(&mut self, iterations: u32, final_residual: f64) {
        self.heat_iterations = Some(iterations);
        self.heat_final_residual = Some(final_residual);
    }

    pub fn add_transport_solver_info(&mut self, iterations: u32, final_residual: f64) {
        self.transport_iterations = Some(iterations);
        self.transport_final_residual = Some(final_residual);
    }

    fn render(&self) -> String {
        let mut s = String::new();
        s.push_str("=== Simulation summary ===\n\n");
        s.push_str(&format!(
            "Mesh: {} cells, {} faces, {} nodes, volume {:.4e} m3\n",
            self.num_cells, self.num_faces, self.num_nodes, self.total_volume
        ));
        s.push_str(&format!(
            "Temperature: {:.1} K .. {:.1} K\n",
            self.min_temperature, self.peak_temperature
        ));
        s.push_str(&format!(
            "Peak mobile concentration: {:.4e} m-3\n\n",
            self.peak_mobile
        ));
        s.push_str(&format!(
            "Mobile inventory:    {:.4e} atoms\n",
            self.mobile_inventory
        ));
        for (i, inv) in self.trap_inventories.iter().enumerate() {
            s.push_str(&format!("Trap {} inventory:    {:.4e} atoms\n", i + 1, inv));
        }
        s.push_str(&format!(
            "Total retention:     {:.4e} atoms\n",
            self.retention_inventory
        ));
        s.push_str(&format!(
            "Decay activity:      {:.4e} /s\n\n",
            self.decay_activity
        ));

        if let (Some(it), Some(res)) = (self.heat_iterations, self.heat_final_residual) {
            s.push_str(&format!(
                "Heat solve:      {} iterations, residual {:.3e}\n",
                it, res
            ));
        }
        if let (Some(it), Some(res)) = (self.transport_iterations, self.transport_final_residual) {
            s.push_str(&format!(
                "Transport solve: {} iterations, residual {:.3e}\n",
                it, res
            ));
        }
        s
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(self.render().as_bytes())
    }

    pub fn print_to_console(&self) {
        println!("{}", self.render());
    }
}
