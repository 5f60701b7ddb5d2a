//! Terminal output.
//!
//! - [`theme`] - status icons shared by every command
//! - [`reporter`] - the [`lyst_core::Reporter`] the build command hands to targets
//! - [`summary`] - per-target and per-directory result tables

pub mod reporter;
pub mod summary;
pub mod theme;

pub use reporter::TerminalReporter;
pub use theme::Icons;
