//! Subcommand implementations

pub mod build;
pub mod completions;
pub mod hash;
pub mod verify;
