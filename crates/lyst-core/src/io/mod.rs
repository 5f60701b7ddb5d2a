//! Network and filesystem IO.

pub mod artifacts;
pub mod download;
pub mod output;

pub use artifacts::ArtifactProbe;
pub use download::{ArtifactInfo, DownloadError};
pub use output::{OutputTree, WriteOutcome, WriteStats};
