//! lyst - package repositories for the OpenLyst catalogue
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Reads the OpenLyst API and writes the manifests four package ecosystems
//! consume:
//!
//! ```text
//! repo/            # AltStore source (apps.json, index.json)
//! fdroid-repo/     # F-Droid metadata/, index.json
//! homebrew-tap/    # Formula/*.rb, tap-info.json
//! winget-repo/     # manifests/<Publisher>/<App>/<version>/
//! ```
//!
//! Every directory can be checked afterwards with `lyst verify`.

pub mod cmd;
pub mod ui;

use clap::{Args, Parser, Subcommand, ValueEnum};
use lyst_schema::Platform;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "lyst")]
#[command(author, version = env!("LYST_VERSION"), about = "lyst - package repositories for the OpenLyst catalogue")]
pub struct Cli {
    /// Config file (defaults to ./lyst.toml when present)
    #[arg(long, global = true, env = "LYST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate repositories from the OpenLyst API
    Build(BuildArgs),

    /// Check generated manifests for missing or broken fields
    Verify {
        /// Output directories to check
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Also fetch every artifact and compare checksums
        #[arg(long)]
        online: bool,

        /// Artifacts fetched concurrently with --online
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },

    /// Compute SHA256 hash of files
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// Which Homebrew platforms to build formulae for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlatformChoice {
    #[value(name = "macOS", alias = "macos")]
    MacOs,
    #[value(name = "Linux", alias = "linux")]
    Linux,
    Both,
}

impl PlatformChoice {
    pub fn platforms(self) -> Vec<Platform> {
        match self {
            PlatformChoice::MacOs => vec![Platform::MacOs],
            PlatformChoice::Linux => vec![Platform::Linux],
            PlatformChoice::Both => vec![Platform::MacOs, Platform::Linux],
        }
    }
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Targets to build: "all" or a comma-separated list of altstore, fdroid, homebrew, winget
    #[arg(long, default_value = "all")]
    pub target: String,

    /// Homebrew platforms to generate formulae for
    #[arg(long, value_enum, default_value_t = PlatformChoice::Both)]
    pub platform: PlatformChoice,

    /// AltStore source directory
    #[arg(long)]
    pub altstore_output: Option<PathBuf>,

    /// F-Droid repository directory
    #[arg(long)]
    pub fdroid_output: Option<PathBuf>,

    /// Homebrew tap directory
    #[arg(long)]
    pub homebrew_output: Option<PathBuf>,

    /// Winget repository directory
    #[arg(long)]
    pub winget_output: Option<PathBuf>,

    /// Public URL the AltStore source is served from
    #[arg(long, env = "LYST_REPO_URL")]
    pub repo_url: Option<String>,

    /// OpenLyst API root
    #[arg(long, env = "LYST_API_URL")]
    pub api_url: Option<String>,

    /// Download artifacts and record their SHA256 checksums
    #[arg(long)]
    pub calculate_sha256: bool,

    /// Download APKs and record their checksums and sizes
    #[arg(long)]
    pub calculate_info: bool,

    /// Do not download IPAs to extract entitlements and privacy strings
    #[arg(long)]
    pub no_ipa_permissions: bool,

    /// Ignore and do not update the hash cache
    #[arg(long)]
    pub no_cache: bool,

    /// Remove manifests for apps no longer in the catalogue
    #[arg(long)]
    pub prune: bool,

    /// Apps processed concurrently within a target
    #[arg(long)]
    pub concurrency: Option<usize>,
}
