pub mod monoblock;
pub mod properties;
