//! Build command

use crate::BuildArgs;
use crate::ui::{TerminalReporter, summary};
use anyhow::{Context, Result, anyhow, bail};
use lyst_core::client::OpenLystClient;
use lyst_core::hashing::HashCache;
use lyst_core::io::ArtifactProbe;
use lyst_core::{BuildContext, BuildOptions, Config, Reporter, TargetKind, TargetReport};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Fold command-line overrides into the loaded config.
fn apply_overrides(config: &mut Config, args: &BuildArgs) {
    if let Some(url) = &args.api_url {
        config.api_url.clone_from(url);
    }
    if let Some(url) = &args.repo_url {
        config.repo_url.clone_from(url);
    }
    if let Some(dir) = &args.altstore_output {
        config.outputs.altstore.clone_from(dir);
    }
    if let Some(dir) = &args.fdroid_output {
        config.outputs.fdroid.clone_from(dir);
    }
    if let Some(dir) = &args.homebrew_output {
        config.outputs.homebrew.clone_from(dir);
    }
    if let Some(dir) = &args.winget_output {
        config.outputs.winget.clone_from(dir);
    }
    if let Some(n) = args.concurrency {
        config.concurrency = n;
    }
}

fn build_options(config: &Config, args: &BuildArgs) -> BuildOptions {
    BuildOptions {
        calculate_sha256: args.calculate_sha256,
        calculate_info: args.calculate_info,
        ipa_permissions: !args.no_ipa_permissions,
        prune: args.prune,
        concurrency: config.concurrency.max(1),
        homebrew_platforms: args.platform.platforms(),
    }
}

/// Generate every requested target, then print a summary.
///
/// Targets run one after another; a failed target does not stop the rest.
pub async fn build(args: BuildArgs, config_path: Option<&Path>, verbose: bool) -> Result<()> {
    let mut config = Config::discover(config_path).context("Failed to load config")?;
    apply_overrides(&mut config, &args);
    let kinds = TargetKind::parse_list(&args.target).map_err(|e| anyhow!(e))?;
    let options = build_options(&config, &args);

    let http = lyst_core::http_client().context("Failed to create HTTP client")?;
    let client = OpenLystClient::new(http.clone(), config.api_base())
        .with_lang(config.lang.clone())
        .with_timeout(Duration::from_secs(config.api_timeout_secs));

    let mut artifacts = ArtifactProbe::new(http, Duration::from_secs(config.download_timeout_secs));
    if args.no_cache {
        tracing::debug!("Hash cache disabled");
    } else if let Some(path) = lyst_core::hash_cache_path() {
        let cache = HashCache::load(&path);
        tracing::debug!("Loaded {} cached hashes from {}", cache.len(), path.display());
        artifacts = artifacts.with_cache(cache);
    }

    let source_date_epoch = std::env::var("SOURCE_DATE_EPOCH").ok();
    let reporter = Arc::new(TerminalReporter::new(verbose));
    let ctx = BuildContext {
        client,
        artifacts,
        config,
        options,
        generated_at: lyst_core::generated_at(source_date_epoch.as_deref()),
        reporter: reporter.clone(),
    };

    tracing::info!(
        "Building {} from {}",
        kinds
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        ctx.config.api_base()
    );

    let mut results: Vec<(String, Result<TargetReport, String>)> = Vec::new();
    for kind in kinds {
        let target = kind.instantiate(&ctx.config.outputs);
        let result = match target.build(&ctx).await {
            Ok(report) => Ok(report),
            Err(e) => {
                reporter.error(&format!("{} failed: {e:#}", target.name()));
                Err(format!("{e:#}"))
            }
        };
        results.push((kind.as_str().to_string(), result));
    }

    if let Err(e) = ctx.artifacts.save_cache() {
        tracing::warn!("Failed to save hash cache: {e:#}");
    }

    println!();
    println!("{}", summary::build_table(&results));

    let failed = results
        .iter()
        .filter(|(_, r)| !r.as_ref().is_ok_and(TargetReport::success))
        .count();
    if failed > 0 {
        bail!("{failed} of {} targets failed", results.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cli, Commands};
    use clap::Parser;
    use lyst_schema::Platform;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> BuildArgs {
        let argv = ["lyst", "build"].into_iter().chain(args.iter().copied());
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Build(args) => args,
            other => panic!("expected build, got {other:?}"),
        }
    }

    #[test]
    fn flags_override_config() {
        let args = parse(&[
            "--api-url",
            "http://localhost:9/api",
            "--homebrew-output",
            "tap",
            "--concurrency",
            "8",
        ]);
        let mut config = Config::default();
        apply_overrides(&mut config, &args);

        assert_eq!(config.api_url, "http://localhost:9/api");
        assert_eq!(config.outputs.homebrew, PathBuf::from("tap"));
        assert_eq!(config.outputs.winget, PathBuf::from("winget-repo"));
        assert_eq!(config.concurrency, 8);
    }

    #[test]
    fn options_follow_switches() {
        let args = parse(&["--no-ipa-permissions", "--prune", "--platform", "Linux"]);
        let options = build_options(&Config::default(), &args);

        assert!(!options.ipa_permissions);
        assert!(options.prune);
        assert!(!options.calculate_sha256);
        assert_eq!(options.homebrew_platforms, vec![Platform::Linux]);
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let args = parse(&["--concurrency", "0"]);
        let mut config = Config::default();
        apply_overrides(&mut config, &args);
        assert_eq!(build_options(&config, &args).concurrency, 1);
    }
}
