//! CLI module
//!
//! Handles command-line argument parsing and the demo workload the
//! subcommands run against.

pub mod args;
pub mod demo;

pub use args::{Args, Commands};
