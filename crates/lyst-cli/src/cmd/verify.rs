//! Verify command

use crate::ui::{Icons, summary};
use anyhow::{Context, Result, bail};
use crossterm::style::Stylize;
use lyst_core::Config;
use lyst_core::io::ArtifactProbe;
use lyst_core::verify::{Severity, VerifyOptions, VerifyReport};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Check each output directory and print every finding.
///
/// Warnings (placeholder checksums, missing URLs) do not fail the command.
pub async fn verify(
    dirs: &[PathBuf],
    online: bool,
    concurrency: usize,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = Config::discover(config_path).context("Failed to load config")?;
    let http = lyst_core::http_client().context("Failed to create HTTP client")?;
    let probe = ArtifactProbe::new(http, Duration::from_secs(config.download_timeout_secs));
    let options = VerifyOptions {
        online,
        concurrency: concurrency.max(1),
    };
    let icons = Icons::default();

    let mut reports: Vec<(PathBuf, VerifyReport)> = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let report = lyst_core::verify::verify(dir, options, &probe)
            .await
            .with_context(|| format!("Failed to verify {}", dir.display()))?;

        for finding in &report.findings {
            let icon = match finding.severity {
                Severity::Error => icons.error.red(),
                Severity::Warning => icons.warning.yellow(),
            };
            println!(
                "{icon} {} {} {}",
                finding.path.display().to_string().dark_grey(),
                finding.subject.as_str().white().bold(),
                finding.message
            );
        }
        reports.push((dir.clone(), report));
    }

    println!("{}", summary::verify_table(&reports));

    let errors: usize = reports.iter().map(|(_, r)| r.errors().count()).sum();
    if errors > 0 {
        bail!("verification found {errors} error(s)");
    }
    Ok(())
}
