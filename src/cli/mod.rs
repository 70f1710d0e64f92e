//! Command-line interface for the control plane.

pub mod commands;
pub mod display;

pub use commands::{Cli, Command};
