use crate::discretization::mesh::Mesh;
use crate::processing::xdmf::XdmfSeries;
use crate::transport::decay::TRITIUM_DECAY_CONSTANT;
use std::collections::HashMap;
use std::io;
use std::path::Path;

/// One time level of solved and derived fields handed to the exporters.
pub struct ExportFrame<'a> {
    pub mesh: &'a Mesh,
    fields: HashMap<String, Vec<f64>>,
}

impl<'a> ExportFrame<'a> {
    pub fn new(mesh: &'a Mesh) -> Self {
        Self {
            mesh,
            fields: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: &str, values: Vec<f64>) {
        self.fields.insert(name.to_string(), values);
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.fields.get(name).map(|v| v.as_slice())
    }
}

/// Transform-then-serialize contract: an exporter may derive what it writes
/// from the frame, but never mutates it.
pub trait Exporter {
    fn label(&self) -> &str;
    fn write(&mut self, t: f64, frame: &ExportFrame) -> io::Result<()>;
}

/// Writes one named field of the frame to an XDMF time series.
pub struct XdmfExport {
    field: String,
    label: String,
    series: XdmfSeries,
}

impl XdmfExport {
    pub fn new(field: &str, label: &str, folder: impl AsRef<Path>) -> Self {
        let path = folder.as_ref().join(format!("{label}.xdmf"));
        Self {
            field: field.to_string(),
            label: label.to_string(),
            series: XdmfSeries::new(path, label),
        }
    }

    /// Shorthand for the common case where label and field coincide.
    pub fn of(field: &str, folder: impl AsRef<Path>) -> Self {
        Self::new(field, field, folder)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Serialize the given values under this export's label, bypassing the
    /// frame lookup. Decorators use this to write transformed copies.
    pub fn write_values(&mut self, t: f64, mesh: &Mesh, values: &[f64]) -> io::Result<()> {
        self.series.append(t, mesh, values)
    }
}

impl Exporter for XdmfExport {
    fn label(&self) -> &str {
        &self.label
    }

    fn write(&mut self, t: f64, frame: &ExportFrame) -> io::Result<()> {
        let values = frame.get(&self.field).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("field `{}` missing from export frame", self.field),
            )
        })?;
        self.series.append(t, frame.mesh, values)
    }
}

/// Decorator around an [`XdmfExport`]: at every output time the wrapped
/// field is copied, multiplied by the tritium decay constant and handed to
/// the base serializer. The frame's own array is left untouched.
pub struct DecayAdjusted {
    inner: XdmfExport,
    decay_constant: f64,
}

impl DecayAdjusted {
    pub fn new(inner: XdmfExport) -> Self {
        Self {
            inner,
            decay_constant: TRITIUM_DECAY_CONSTANT,
        }
    }

    pub fn decay_constant(&self) -> f64 {
        self.decay_constant
    }

    /// The pointwise transform applied before serialization.
    pub fn adjusted(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| v * self.decay_constant).collect()
    }
}

impl Exporter for DecayAdjusted {
    fn label(&self) -> &str {
        self.inner.label()
    }

    fn write(&mut self, t: f64, frame: &ExportFrame) -> io::Result<()> {
        let values = frame.get(self.inner.field()).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("field `{}` missing from export frame", self.inner.field()),
            )
        })?;
        let adjusted = self.adjusted(values);
        self.inner.write_values(t, frame.mesh, &adjusted)
    }
}

/// The export set of a simulation.
#[derive(Default)]
pub struct Exports {
    list: Vec<Box<dyn Exporter>>,
}

impl Exports {
    pub fn new(list: Vec<Box<dyn Exporter>>) -> Self {
        Self { list }
    }

    pub fn push(&mut self, e: Box<dyn Exporter>) {
        self.list.push(e);
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn write_all(&mut self, t: f64, frame: &ExportFrame) -> io::Result<()> {
        for e in &mut self.list {
            e.write(t, frame)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::create_line_mesh;
    use crate::transport::decay::TRITIUM_DECAY_CONSTANT;
    use std::fs;

    #[test]
    fn decay_adjusted_scales_a_copy() {
        let export = DecayAdjusted::new(XdmfExport::new("retention", "decay", "."));
        let values = vec![1.0, 2.0, 0.5];
        let adjusted = export.adjusted(&values);
        for (a, v) in adjusted.iter().zip(&values) {
            assert_eq!(*a, v * TRITIUM_DECAY_CONSTANT);
        }
        // input untouched
        assert_eq!(values, vec![1.0, 2.0, 0.5]);
    }

    #[test]
    fn identical_construction_identical_constant() {
        let a = DecayAdjusted::new(XdmfExport::new("retention", "decay", "."));
        let b = DecayAdjusted::new(XdmfExport::new("retention", "decay", "."));
        assert_eq!(a.decay_constant(), b.decay_constant());
    }

    #[test]
    fn exporter_writes_frame_field() {
        let mesh = create_line_mesh(1.0, 3);
        let mut frame = ExportFrame::new(&mesh);
        frame.insert("T", vec![400.0, 500.0, 600.0]);

        let mut export = XdmfExport::of("T", ".");
        export.write(0.0, &frame).unwrap();

        let content = fs::read_to_string("T.xdmf").unwrap();
        assert!(content.contains("Attribute Name=\"T\""));
        fs::remove_file("T.xdmf").ok();
    }
}
