pub mod csv_writer;
pub mod export;
pub mod summary;
pub mod xdmf;
