/// The complete computational grid.
pub struct Mesh {
    pub cells: Vec<Cell>,
    pub faces: Vec<Face>,
    pub nodes: Vec<Node>,
}

/// A single control volume (a Voronoi cell).
pub struct Cell {
    pub id: usize,
    pub volume: f64,
    pub centroid: [f64; 3],
    pub face_ids: Vec<usize>,
}

/// An interface between two cells.
pub struct Face {
    pub area: f64,
    pub normal: [f64; 3],
    /// Tuple of (cell1_id, optional cell2_id). `None` indicates a boundary face.
    /// Only the right cell can be None.
    pub neighbor_cell_ids: (usize, Option<usize>),
    pub centroid: [f64; 3],
}

pub struct Node {
    pub position: [f64; 3],
}

impl Mesh {
    /// Total volume of the domain.
    pub fn total_volume(&self) -> f64 {
        self.cells.iter().map(|c| c.volume).sum()
    }

    /// Indices of all boundary faces.
    pub fn boundary_faces(&self) -> impl Iterator<Item = usize> + '_ {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| f.neighbor_cell_ids.1.is_none())
            .map(|(i, _)| i)
    }

    /// Volume integral of a cell-centered field.
    pub fn integrate(&self, values: &[f64]) -> f64 {
        self.cells.iter().map(|c| values[c.id] * c.volume).sum()
    }
}
