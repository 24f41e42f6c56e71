//! Input and output adapters used by the command-line binary.

pub mod csv;
pub mod json;
