//! Subcommand implementations

pub mod forecast;
pub mod monitor;
pub mod optimize;
