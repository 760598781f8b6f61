pub mod cli;
pub mod collectors;
pub mod exporter;
