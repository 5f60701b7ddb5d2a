//! Homebrew tap: one formula per app and platform under `Formula/`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use lyst_schema::{
    App, DigestError, ManifestEntry, Platform, SHA256_PLACEHOLDER, Sha256Digest,
};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use super::{BuildContext, Skip, Target, TargetReport, app_label, app_versions, list_apps};
use crate::io::OutputTree;
use crate::{naming, select};

const FORMULA_DIR: &str = "Formula";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormulaParseError {
    #[error("not a formula: no `class <Name> < Formula` line")]
    NotAFormula,

    #[error("missing `{0}` line")]
    MissingField(&'static str),

    #[error("malformed sha256: {0}")]
    Checksum(#[from] DigestError),
}

/// A rendered (or read back) Homebrew formula.
///
/// Only the fixed shape written by [`Formula::render`] is understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    pub class_name: String,
    pub entry: ManifestEntry,
}

impl Formula {
    pub fn new(entry: ManifestEntry) -> Self {
        Self {
            class_name: naming::class_name(&entry.name),
            entry,
        }
    }

    /// `Formula/<class name lowercase>.rb`, `-linux` for Linux builds.
    pub fn file_name(&self, platform: Platform) -> String {
        let suffix = if platform == Platform::Linux {
            "-linux"
        } else {
            ""
        };
        format!("{}{suffix}.rb", self.class_name.to_lowercase())
    }

    pub fn render(&self) -> String {
        let e = &self.entry;
        let sha256_line = match &e.sha256 {
            Some(digest) => format!("  sha256 \"{digest}\""),
            None => format!("  # sha256 \"{SHA256_PLACEHOLDER}\""),
        };
        format!(
            r#"class {class} < Formula
  desc "{desc}"
  homepage "{homepage}"
  url "{url}"
  version "{version}"
{sha256_line}

  def install
    prefix.install Dir["*"]
  end

  test do
    system "true"
  end
end
"#,
            class = self.class_name,
            desc = ruby_escape(&e.desc),
            homepage = ruby_escape(&e.homepage),
            url = ruby_escape(&e.url),
            version = ruby_escape(&e.version),
        )
    }

    /// Read a formula back. The class name stands in for the app name.
    ///
    /// A commented-out placeholder checksum parses as `sha256: None`.
    ///
    /// # Errors
    ///
    /// Returns [`FormulaParseError`] for text that is not a formula, lacks a
    /// required line, or declares a malformed checksum.
    pub fn parse(text: &str) -> Result<Self, FormulaParseError> {
        static CLASS: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(?m)^class\s+([A-Za-z0-9_]+)\s*<\s*Formula\s*$").expect("valid regex")
        });
        static FIELD: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r#"(?m)^\s*(desc|homepage|url|version|sha256)\s+"((?:[^"\\]|\\.)*)"\s*$"#)
                .expect("valid regex")
        });

        let class_name = CLASS
            .captures(text)
            .map(|c| c[1].to_string())
            .ok_or(FormulaParseError::NotAFormula)?;

        let mut fields = std::collections::HashMap::new();
        for caps in FIELD.captures_iter(text) {
            let key = caps.get(1).map_or("", |m| m.as_str());
            let value = caps.get(2).map_or("", |m| m.as_str());
            fields
                .entry(key)
                .or_insert_with(|| ruby_unescape(value));
        }

        let mut take = |key: &'static str| {
            fields
                .remove(key)
                .ok_or(FormulaParseError::MissingField(key))
        };
        let desc = take("desc").unwrap_or_default();
        let homepage = take("homepage").unwrap_or_default();
        let url = take("url")?;
        let version = take("version")?;
        let sha256 = match take("sha256") {
            Ok(hex) if hex == SHA256_PLACEHOLDER => None,
            Ok(hex) => Some(Sha256Digest::new(hex)?),
            Err(_) => None,
        };

        Ok(Self {
            entry: ManifestEntry {
                name: class_name.clone(),
                desc,
                homepage,
                url,
                version,
                sha256,
            },
            class_name,
        })
    }
}

/// Escape for a double-quoted Ruby literal; `#` too, so `#{...}` is not interpolated.
fn ruby_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('#', "\\#")
}

fn ruby_unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// `tap-info.json`.
#[derive(Debug, Serialize)]
struct TapInfo<'a> {
    name: &'static str,
    description: String,
    homepage: &'a str,
    generated_at: String,
    platforms: Vec<&'static str>,
    formulae_count: usize,
}

/// Homebrew tap builder.
#[derive(Debug, Clone)]
pub struct HomebrewTap {
    output: PathBuf,
}

impl HomebrewTap {
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            output: output.as_ref().to_path_buf(),
        }
    }

    async fn render_app(
        &self,
        ctx: &BuildContext,
        app: &App,
        platform: Platform,
    ) -> Result<(String, Formula), Skip> {
        let versions = app_versions(ctx, app).await?;
        let latest = &versions[0];
        if !latest.supports(platform) {
            return Err(Skip::unsupported(format!("does not support {platform}")));
        }
        let url = select::artifact_url(latest, platform)
            .ok_or_else(|| Skip::unsupported(format!("no {platform} download URL")))?;

        let name = app.name.clone().unwrap_or_default();
        let sha256 = if ctx.options.calculate_sha256 {
            match ctx.artifacts.checksum(&url).await {
                Ok(info) => Some(info.sha256),
                Err(e) => {
                    tracing::warn!("Failed to calculate SHA256 for {url}: {e}");
                    None
                }
            }
        } else {
            None
        };

        let entry = ManifestEntry {
            desc: app.subtitle.clone().unwrap_or_else(|| name.clone()),
            homepage: app
                .website
                .clone()
                .unwrap_or_else(|| ctx.config.homepage.clone()),
            url,
            version: latest.version.clone().unwrap_or_default(),
            sha256,
            name,
        };
        entry.validate().map_err(Skip::failed)?;

        let formula = Formula::new(entry);
        let rel = format!("{FORMULA_DIR}/{}", formula.file_name(platform));
        Ok((rel, formula))
    }

    async fn build_platform(
        &self,
        ctx: &BuildContext,
        tree: &OutputTree,
        platform: Platform,
        report: &mut TargetReport,
    ) -> Result<()> {
        ctx.reporter
            .info(&format!("Building Homebrew tap for {platform}"));
        let apps = list_apps(ctx, platform).await?;

        let futures: Vec<_> = apps
            .iter()
            .map(|app| async move { (app_label(app), self.render_app(ctx, app, platform).await) })
            .collect();
        let rendered: Vec<(String, Result<(String, Formula), Skip>)> = stream::iter(futures)
            .buffered(ctx.concurrency())
            .collect()
            .await;

        for (label, result) in rendered {
            let (rel, formula) = match result {
                Ok(ok) => ok,
                Err(skip) => {
                    report.record_skip(ctx.reporter.as_ref(), &label, &skip);
                    continue;
                }
            };
            if tree.was_written(&rel) {
                report.record_skip(
                    ctx.reporter.as_ref(),
                    &label,
                    &Skip::failed(format!("{rel} already written by another app")),
                );
                continue;
            }
            let outcome = tree
                .write(&rel, formula.render().as_bytes())
                .with_context(|| format!("Failed to write {rel}"))?;
            report.record_write(outcome);
            report.generated += 1;

            let detail = match &formula.entry.sha256 {
                Some(_) => format!("{rel} ({})", formula.entry.version),
                None => format!("{rel} ({}, no sha256)", formula.entry.version),
            };
            ctx.reporter.generated(self.name(), &label, &detail);
        }
        Ok(())
    }
}

#[async_trait]
impl Target for HomebrewTap {
    fn name(&self) -> &'static str {
        "homebrew"
    }

    async fn build(&self, ctx: &BuildContext) -> Result<TargetReport> {
        ctx.reporter.section("Homebrew Tap");
        let tree = OutputTree::new(&self.output)
            .with_context(|| format!("Failed to create {}", self.output.display()))?;
        let mut report = TargetReport::new(self.name());

        let mut platforms: Vec<&'static str> = Vec::new();
        let mut errors = Vec::new();
        for &platform in &ctx.options.homebrew_platforms {
            match self.build_platform(ctx, &tree, platform, &mut report).await {
                Ok(()) => platforms.push(platform.as_str()),
                Err(e) => {
                    ctx.reporter
                        .error(&format!("Homebrew {platform} failed: {e:#}"));
                    errors.push(e);
                }
            }
        }

        if platforms.is_empty() && !errors.is_empty() {
            return Err(errors.remove(0));
        }
        if !report.success() {
            ctx.reporter.error("No formulae were generated");
            return Ok(report);
        }

        let info = TapInfo {
            name: "OpenLyst Homebrew Tap",
            description: format!(
                "Homebrew formulae for {} applications from OpenLyst",
                platforms.join(" and ")
            ),
            homepage: &ctx.config.homepage,
            generated_at: ctx.timestamp(),
            platforms,
            formulae_count: report.generated,
        };
        report.record_write(tree.write_json("tap-info.json", &info)?);

        // A failed platform wrote nothing this run; pruning would drop its formulae.
        if errors.is_empty() {
            super::prune(&tree, ctx, &mut report, &[FORMULA_DIR])?;
        }

        tracing::info!(
            "Homebrew formulae: {} generated, {} skipped, {} failed",
            report.generated,
            report.skipped,
            report.failed
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::BuildOptions;
    use crate::targets::test_support::{context, mock_apps, mock_versions};
    use mockito::Server;
    use serde_json::json;

    fn entry() -> ManifestEntry {
        ManifestEntry {
            name: "Doggy Days".to_string(),
            desc: "A \"fun\" dog app".to_string(),
            homepage: "https://openlyst.ink".to_string(),
            url: "https://cdn.example/doggy.dmg".to_string(),
            version: "1.2.3".to_string(),
            sha256: None,
        }
    }

    #[test]
    fn render_with_placeholder() {
        let text = Formula::new(entry()).render();
        assert!(text.starts_with("class DoggyDays < Formula\n"));
        assert!(text.contains("  desc \"A \\\"fun\\\" dog app\"\n"));
        assert!(text.contains("  # sha256 \"REPLACE_WITH_ACTUAL_SHA256\"\n"));
        assert!(text.contains("    prefix.install Dir[\"*\"]\n"));
        assert!(text.contains("    system \"true\"\n"));
    }

    #[test]
    fn parse_reads_back_rendered_formula() {
        let mut e = entry();
        e.sha256 = Some(Sha256Digest::compute(b"dmg"));
        let parsed = Formula::parse(&Formula::new(e.clone()).render()).unwrap();

        assert_eq!(parsed.class_name, "DoggyDays");
        assert_eq!(parsed.entry.desc, e.desc);
        assert_eq!(parsed.entry.url, e.url);
        assert_eq!(parsed.entry.version, "1.2.3");
        assert_eq!(parsed.entry.sha256, e.sha256);
    }

    #[test]
    fn parse_placeholder_as_missing_checksum() {
        let parsed = Formula::parse(&Formula::new(entry()).render()).unwrap();
        assert_eq!(parsed.entry.sha256, None);
    }

    #[test]
    fn parse_rejects_malformed_checksum() {
        let text = Formula::new(entry())
            .render()
            .replace("# sha256 \"REPLACE_WITH_ACTUAL_SHA256\"", "sha256 \"abc\"");
        assert!(matches!(
            Formula::parse(&text),
            Err(FormulaParseError::Checksum(_))
        ));
    }

    #[test]
    fn parse_requires_version() {
        let text = "class Foo < Formula\n  url \"https://x/y\"\nend\n";
        assert_eq!(
            Formula::parse(text),
            Err(FormulaParseError::MissingField("version"))
        );
        assert_eq!(
            Formula::parse("puts 1"),
            Err(FormulaParseError::NotAFormula)
        );
    }

    #[test]
    fn render_does_not_interpolate() {
        let mut e = entry();
        e.desc = "pwn #{`id`} \\ done".to_string();
        let text = Formula::new(e.clone()).render();
        assert!(text.contains("  desc \"pwn \\#{`id`} \\\\ done\"\n"));
        assert!(!text.contains(" #{"));

        let parsed = Formula::parse(&text).unwrap();
        assert_eq!(parsed.entry.desc, e.desc);
    }

    #[test]
    fn linux_file_name_has_suffix() {
        let formula = Formula::new(entry());
        assert_eq!(formula.file_name(Platform::MacOs), "doggydays.rb");
        assert_eq!(formula.file_name(Platform::Linux), "doggydays-linux.rb");
    }

    #[tokio::test]
    async fn test_build_writes_formulae_and_is_idempotent() {
        let mut server = Server::new_async().await;
        let _apps = mock_apps(
            &mut server,
            "macOS",
            json!([
                {"slug": "doggy", "name": "Doggy Days", "subtitle": "Dogs"},
                {"slug": "winonly", "name": "Win Only"},
                {"name": "No Slug"}
            ]),
        )
        .await;
        let _doggy = mock_versions(
            &mut server,
            "doggy",
            json!([{
                "version": "1.2.3",
                "platforms": ["macOS"],
                "downloads": {"macOS": {"arm64": "https://cdn.example/doggy-arm64.dmg"}}
            }]),
        )
        .await;
        let _win = mock_versions(
            &mut server,
            "winonly",
            json!([{"version": "2.0", "platforms": ["Windows"]}]),
        )
        .await;

        let dir = tempfile::tempdir().unwrap();
        let options = BuildOptions {
            homebrew_platforms: vec![Platform::MacOs],
            ..BuildOptions::default()
        };
        let ctx = context(&server, options);
        let tap = HomebrewTap::new(dir.path());

        let report = tap.build(&ctx).await.unwrap();
        assert!(report.success());
        assert_eq!(report.generated, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.files.created, 2);

        let text = std::fs::read_to_string(dir.path().join("Formula/doggydays.rb")).unwrap();
        assert!(text.contains("url \"https://cdn.example/doggy-arm64.dmg\""));
        assert!(text.contains("homepage \"https://openlyst.ink\""));

        let info: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("tap-info.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(info["formulae_count"], 1);
        assert_eq!(info["platforms"], json!(["macOS"]));
        assert_eq!(info["generated_at"], "2023-11-14T22:13:20Z");

        let again = tap.build(&ctx).await.unwrap();
        assert_eq!(again.files.changed(), 0);
        assert_eq!(again.files.unchanged, 2);
    }

    #[tokio::test]
    async fn test_failed_platform_does_not_fail_the_tap() {
        let mut server = Server::new_async().await;
        let _mac = mock_apps(&mut server, "macOS", json!([{"slug": "doggy", "name": "Doggy Days"}]))
            .await;
        let _linux = server
            .mock("GET", "/apps")
            .match_query(mockito::Matcher::UrlEncoded(
                "platform".into(),
                "Linux".into(),
            ))
            .with_status(500)
            .create_async()
            .await;
        let _doggy = mock_versions(
            &mut server,
            "doggy",
            json!([{
                "version": "1.2.3",
                "platforms": ["macOS"],
                "downloads": {"macOS": "https://cdn.example/doggy.dmg"}
            }]),
        )
        .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Formula")).unwrap();
        std::fs::write(dir.path().join("Formula/cat-linux.rb"), "class Cat < Formula\nend\n").unwrap();
        let options = BuildOptions {
            prune: true,
            ..BuildOptions::default()
        };
        let ctx = context(&server, options);
        let report = HomebrewTap::new(dir.path()).build(&ctx).await.unwrap();

        assert!(report.success());
        assert_eq!(report.generated, 1);
        assert!(dir.path().join("Formula/doggydays.rb").exists());
        assert!(dir.path().join("Formula/cat-linux.rb").exists());

        let info: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("tap-info.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(info["platforms"], json!(["macOS"]));
        assert_eq!(info["formulae_count"], 1);
    }

    #[tokio::test]
    async fn test_build_fails_when_catalogue_unavailable() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/apps")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&server, BuildOptions::default());
        assert!(HomebrewTap::new(dir.path()).build(&ctx).await.is_err());
    }
}
