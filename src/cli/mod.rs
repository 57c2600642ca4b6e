//! Command line interface module
//!
//! Argument parsing and the runner that wires configuration, AWS clients and
//! the chain scheduler together for `serve`, `run` and `list`.

pub mod args;
pub mod runner;

pub use args::{Args, Command};
pub use runner::Runner;
