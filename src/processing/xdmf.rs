use crate::discretization::mesh::Mesh;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

/// XDMF time series of one cell-centered scalar field, written as a
/// Polyvertex grid with inline values (no HDF5 sidecar). Every append
/// rewrites the file so it is always a complete, readable document.
pub struct XdmfSeries {
    path: PathBuf,
    name: String,
    snapshots: Vec<(f64, Vec<f64>)>,
}

impl XdmfSeries {
    pub fn new(path: PathBuf, name: &str) -> Self {
        Self {
            path,
            name: name.to_string(),
            snapshots: Vec::new(),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Append a snapshot and rewrite the document.
    pub fn append(&mut self, t: f64, mesh: &Mesh, values: &[f64]) -> io::Result<()> {
        if values.len() != mesh.cells.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "field `{}` has {} values for {} cells",
                    self.name,
                    values.len(),
                    mesh.cells.len()
                ),
            ));
        }
        self.snapshots.push((t, values.to_vec()));
        self.rewrite(mesh)
    }

    fn rewrite(&self, mesh: &Mesh) -> io::Result<()> {
        let file = File::create(&self.path)?;
        let mut w = BufWriter::new(file);
        let n = mesh.cells.len();

        writeln!(w, "<?xml version=\"1.0\"?>")?;
        writeln!(w, "<Xdmf Version=\"3.0\">")?;
        writeln!(w, "  <Domain>")?;
        writeln!(
            w,
            "    <Grid Name=\"{}\" GridType=\"Collection\" CollectionType=\"Temporal\">",
            self.name
        )?;

        for (step, (t, values)) in self.snapshots.iter().enumerate() {
            writeln!(
                w,
                "      <Grid Name=\"{}_{}\" GridType=\"Uniform\">",
                self.name, step
            )?;
            writeln!(w, "        <Time Value=\"{t:e}\"/>")?;
            writeln!(
                w,
                "        <Topology TopologyType=\"Polyvertex\" NumberOfElements=\"{n}\"/>"
            )?;
            writeln!(w, "        <Geometry GeometryType=\"XYZ\">")?;
            writeln!(
                w,
                "          <DataItem Dimensions=\"{n} 3\" Format=\"XML\">"
            )?;
            for cell in &mesh.cells {
                writeln!(
                    w,
                    "            {:e} {:e} {:e}",
                    cell.centroid[0], cell.centroid[1], cell.centroid[2]
                )?;
            }
            writeln!(w, "          </DataItem>")?;
            writeln!(w, "        </Geometry>")?;
            writeln!(
                w,
                "        <Attribute Name=\"{}\" AttributeType=\"Scalar\" Center=\"Node\">",
                self.name
            )?;
            writeln!(w, "          <DataItem Dimensions=\"{n}\" Format=\"XML\">")?;
            for v in values {
                writeln!(w, "            {v:e}")?;
            }
            writeln!(w, "          </DataItem>")?;
            writeln!(w, "        </Attribute>")?;
            writeln!(w, "      </Grid>")?;
        }

        writeln!(w, "    </Grid>")?;
        writeln!(w, "  </Domain>")?;
        writeln!(w, "</Xdmf>")?;
        w.flush()
    }
}
