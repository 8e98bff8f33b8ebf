//! Filesystem and XML output helpers shared by loggers and report writers.

pub mod fs;
pub mod xml;

pub use fs::{create_output_file, ensure_dir_exists};
