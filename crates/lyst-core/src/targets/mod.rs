//! Package-manager targets.
//!
//! Each target lists the catalogue for its platform, renders one manifest
//! per app and writes them into its own [`OutputTree`]. Apps are rendered
//! concurrently but written in catalogue order, so output and collision
//! handling are deterministic.

pub mod altstore;
pub mod fdroid;
pub mod homebrew;
pub mod winget;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use lyst_schema::{App, AppVersion, Platform};

use crate::client::OpenLystClient;
use crate::config::{Config, Outputs};
use crate::io::{ArtifactProbe, OutputTree, WriteOutcome, WriteStats};
use crate::reporter::Reporter;

pub use altstore::AltStoreSource;
pub use fdroid::FDroidRepo;
pub use homebrew::HomebrewTap;
pub use winget::WingetRepo;

/// Switches that shape a build run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Download artifacts to fill in Homebrew and Winget checksums.
    pub calculate_sha256: bool,
    /// Download APKs to fill in F-Droid hashes and sizes.
    pub calculate_info: bool,
    /// Download the newest IPA of each app to read its permissions.
    pub ipa_permissions: bool,
    /// Remove managed files that this run did not produce.
    pub prune: bool,
    /// Apps processed at once within a target.
    pub concurrency: usize,
    /// Platforms the Homebrew tap is built for.
    pub homebrew_platforms: Vec<Platform>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            calculate_sha256: false,
            calculate_info: false,
            ipa_permissions: true,
            prune: false,
            concurrency: 4,
            homebrew_platforms: vec![Platform::MacOs, Platform::Linux],
        }
    }
}

/// Everything a target needs for one run.
pub struct BuildContext {
    pub client: OpenLystClient,
    pub artifacts: ArtifactProbe,
    pub config: Config,
    pub options: BuildOptions,
    /// Single instant stamped into every index of the run.
    pub generated_at: DateTime<Utc>,
    pub reporter: Arc<dyn Reporter>,
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("client", &self.client)
            .field("options", &self.options)
            .field("generated_at", &self.generated_at)
            .finish_non_exhaustive()
    }
}

impl BuildContext {
    /// `generated_at` as RFC 3339 with a `Z` suffix.
    pub fn timestamp(&self) -> String {
        self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// `generated_at` in milliseconds since the epoch.
    pub fn timestamp_millis(&self) -> i64 {
        self.generated_at.timestamp_millis()
    }

    fn concurrency(&self) -> usize {
        self.options.concurrency.max(1)
    }
}

/// Outcome of one target build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub target: &'static str,
    /// Apps with a manifest in the output.
    pub generated: usize,
    /// Apps left out on purpose.
    pub skipped: usize,
    /// Apps whose processing failed.
    pub failed: usize,
    pub files: WriteStats,
    /// Stale files removed by `--prune`.
    pub pruned: usize,
}

impl TargetReport {
    pub fn new(target: &'static str) -> Self {
        Self {
            target,
            generated: 0,
            skipped: 0,
            failed: 0,
            files: WriteStats::default(),
            pruned: 0,
        }
    }

    /// A target succeeds when it emitted at least one manifest.
    pub fn success(&self) -> bool {
        self.generated > 0
    }

    fn record_write(&mut self, outcome: WriteOutcome) {
        self.files.record(outcome);
    }

    fn record_skip(&mut self, reporter: &dyn Reporter, app: &str, skip: &Skip) {
        match skip {
            Skip::Unsupported(reason) => {
                tracing::info!("{}: skipping {app}: {reason}", self.target);
                reporter.skipped(self.target, app, reason);
                self.skipped += 1;
            }
            Skip::Failed(reason) => {
                tracing::warn!("{}: {app} failed: {reason}", self.target);
                reporter.failed(self.target, app, reason);
                self.failed += 1;
            }
        }
    }
}

/// Why an app produced no manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    /// Nothing to publish for this platform.
    Unsupported(String),
    /// Something went wrong while processing the app.
    Failed(String),
}

impl Skip {
    fn unsupported(reason: impl Into<String>) -> Self {
        Self::Unsupported(reason.into())
    }

    fn failed(reason: impl fmt::Display) -> Self {
        Self::Failed(reason.to_string())
    }
}

/// A package-manager output.
#[async_trait]
pub trait Target: Send + Sync {
    /// Short display name.
    fn name(&self) -> &'static str;

    /// Fetch the catalogue and write this target's tree.
    ///
    /// Per-app problems are counted in the report; an error means the
    /// target could not run at all.
    async fn build(&self, ctx: &BuildContext) -> Result<TargetReport>;
}

/// The targets `lyst build` knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TargetKind {
    AltStore,
    FDroid,
    Homebrew,
    Winget,
}

impl TargetKind {
    pub const ALL: [TargetKind; 4] = [
        TargetKind::AltStore,
        TargetKind::FDroid,
        TargetKind::Homebrew,
        TargetKind::Winget,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::AltStore => "altstore",
            TargetKind::FDroid => "fdroid",
            TargetKind::Homebrew => "homebrew",
            TargetKind::Winget => "winget",
        }
    }

    /// Parse `all` or a comma-separated list. Duplicates collapse and the
    /// result follows [`TargetKind::ALL`] order.
    ///
    /// # Errors
    ///
    /// Returns the offending name when a target is unknown.
    pub fn parse_list(s: &str) -> Result<Vec<TargetKind>, String> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::ALL.to_vec());
        }
        let mut kinds = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<TargetKind>, String>>()?;
        if kinds.is_empty() {
            return Err("no target given".to_string());
        }
        kinds.sort();
        kinds.dedup();
        Ok(kinds)
    }

    /// The target writing into its configured output directory.
    pub fn instantiate(self, outputs: &Outputs) -> Box<dyn Target> {
        match self {
            TargetKind::AltStore => Box::new(AltStoreSource::new(&outputs.altstore)),
            TargetKind::FDroid => Box::new(FDroidRepo::new(&outputs.fdroid)),
            TargetKind::Homebrew => Box::new(HomebrewTap::new(&outputs.homebrew)),
            TargetKind::Winget => Box::new(WingetRepo::new(&outputs.winget)),
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown target '{s}'"))
    }
}

/// Catalogue listing for `platform`, failing the target when unavailable.
async fn list_apps(ctx: &BuildContext, platform: Platform) -> Result<Vec<App>> {
    let apps = ctx
        .client
        .list_apps(platform)
        .await
        .with_context(|| format!("Failed to fetch {platform} apps"))?;
    ctx.reporter
        .info(&format!("Found {} {platform} apps", apps.len()));
    Ok(apps)
}

/// Versions of `app`, newest first.
async fn app_versions(ctx: &BuildContext, app: &App) -> Result<Vec<AppVersion>, Skip> {
    let slug = app
        .slug
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| Skip::unsupported("missing slug"))?;
    let versions = ctx
        .client
        .app_versions(slug)
        .await
        .map_err(Skip::failed)?;
    if versions.is_empty() {
        return Err(Skip::unsupported("no versions"));
    }
    Ok(versions)
}

/// Name used in progress output.
fn app_label(app: &App) -> String {
    app.name
        .as_deref()
        .or(app.slug.as_deref())
        .unwrap_or("Unknown")
        .to_string()
}

/// Reject values that would escape their directory when used as a path segment.
fn path_segment(value: &str) -> Result<&str, Skip> {
    let value = value.trim();
    if value.is_empty() || value == "." || value == ".." || value.contains(['/', '\\']) {
        return Err(Skip::failed(format!(
            "'{value}' cannot be used as a path component"
        )));
    }
    Ok(value)
}

/// Prune `subdirs` of `tree` when the run asked for it.
fn prune(
    tree: &OutputTree,
    ctx: &BuildContext,
    report: &mut TargetReport,
    subdirs: &[&str],
) -> Result<()> {
    if !ctx.options.prune {
        return Ok(());
    }
    for subdir in subdirs {
        let removed = tree
            .prune(Path::new(subdir))
            .with_context(|| format!("Failed to prune {subdir}"))?;
        report.pruned += removed.len();
    }
    if report.pruned > 0 {
        ctx.reporter.info(&format!(
            "Pruned {} stale file(s) from {}",
            report.pruned,
            tree.root().display()
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::reporter::NullReporter;
    use mockito::{Matcher, Mock, ServerGuard};
    use serde_json::Value;
    use std::time::Duration;

    pub(crate) const EPOCH: &str = "1700000000";

    pub(crate) fn context(server: &ServerGuard, options: BuildOptions) -> BuildContext {
        let http = reqwest::Client::new();
        let config = Config {
            api_url: server.url(),
            ..Config::default()
        };
        BuildContext {
            client: OpenLystClient::new(http.clone(), server.url()),
            artifacts: ArtifactProbe::new(http, Duration::from_secs(5)),
            config,
            options,
            generated_at: crate::generated_at(Some(EPOCH)),
            reporter: Arc::new(NullReporter),
        }
    }

    pub(crate) async fn mock_apps(server: &mut ServerGuard, platform: &str, apps: Value) -> Mock {
        server
            .mock("GET", "/apps")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("platform".into(), platform.into()),
                Matcher::UrlEncoded("filter".into(), "active".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(serde_json::json!({"success": true, "data": apps}).to_string())
            .create_async()
            .await
    }

    pub(crate) async fn mock_versions(server: &mut ServerGuard, slug: &str, versions: Value) -> Mock {
        server
            .mock("GET", format!("/apps/{slug}/versions").as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(serde_json::json!({"success": true, "data": versions}).to_string())
            .create_async()
            .await
    }
}
