pub mod monoblock;
