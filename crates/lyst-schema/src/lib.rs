//! Shared types for lyst.
//!
//! `api` mirrors the OpenLyst catalogue as it comes off the wire, `types`
//! holds the normalized [`ManifestEntry`] every target renders from, and
//! `hash` provides the validated SHA-256 newtype.

pub mod api;
pub mod hash;
pub mod types;

// Re-exports
pub use api::{ApiResponse, App, AppVersion};
pub use hash::*;
pub use types::*;

/// Placeholder emitted in place of a checksum that was not computed.
pub const SHA256_PLACEHOLDER: &str = "REPLACE_WITH_ACTUAL_SHA256";

/// Homepage used when an app does not declare one.
pub const DEFAULT_HOMEPAGE: &str = "https://openlyst.ink";
