//! lyst core: everything between the OpenLyst API and a manifest tree on disk.
//!
//! - [`client`] talks to the catalogue API.
//! - [`select`] picks the artifact URL a target needs out of a version record.
//! - [`io`] probes and hashes artifacts, and writes output idempotently.
//! - [`targets`] renders AltStore, F-Droid, Homebrew and Winget repositories.
//! - [`verify`] checks an existing manifest tree.

pub mod client;
pub mod config;
pub mod hashing;
pub mod io;
pub mod ipa;
pub mod naming;
pub mod paths;
pub mod reporter;
pub mod select;
pub mod targets;
pub mod verify;

pub use config::Config;
pub use paths::*;
pub use reporter::{NullReporter, Reporter};
pub use targets::{BuildContext, BuildOptions, Target, TargetKind, TargetReport};

/// User Agent string for all outgoing requests
pub const USER_AGENT: &str = concat!("lyst/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client.
///
/// Per-request timeouts are applied by the callers; the client itself only
/// bounds connection setup.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(std::time::Duration::from_secs(10))
        .build()
}

/// The instant stamped into generated indexes.
///
/// Honours a `SOURCE_DATE_EPOCH` value (seconds since the epoch) so repeated
/// runs over the same catalogue produce byte-identical trees.
pub fn generated_at(source_date_epoch: Option<&str>) -> chrono::DateTime<chrono::Utc> {
    source_date_epoch
        .and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(chrono::Utc::now)
}
