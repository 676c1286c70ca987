//! Command-line interface for kirana.

mod commands;
pub mod icons;

pub use commands::{is_verbose, run};
