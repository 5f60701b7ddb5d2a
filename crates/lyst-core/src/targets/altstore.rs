//! AltStore source: `apps.json` plus a small `index.json` pointing at it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use lyst_schema::{App, AppVersion, Platform};
use serde::{Deserialize, Serialize};

use super::{BuildContext, Skip, Target, TargetReport, app_label, app_versions, list_apps};
use crate::io::OutputTree;
use crate::ipa::{self, AppPermissions};
use crate::select;

const MAX_VERSIONS: usize = 10;
const MAX_SCREENSHOTS: usize = 10;
const FEATURED: usize = 5;
const TINT: &str = "#dc2626";
const CATEGORIES: [&str; 8] = [
    "developer",
    "entertainment",
    "games",
    "lifestyle",
    "other",
    "photo-video",
    "social",
    "utilities",
];

/// AltStore category for an OpenLyst category; `other` when unknown.
pub fn category(category: Option<&str>) -> &'static str {
    let key = category.unwrap_or("other").to_lowercase().replace(' ', "-");
    CATEGORIES
        .into_iter()
        .find(|c| *c == key)
        .unwrap_or("other")
}

/// `apps.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub name: String,
    pub subtitle: String,
    pub description: String,
    #[serde(rename = "iconURL")]
    pub icon_url: String,
    #[serde(rename = "headerURL")]
    pub header_url: String,
    pub website: String,
    pub tint_color: String,
    pub featured_apps: Vec<String>,
    pub apps: Vec<SourceApp>,
    #[serde(default)]
    pub news: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceApp {
    pub name: String,
    pub bundle_identifier: String,
    pub developer_name: String,
    pub subtitle: String,
    pub localized_description: String,
    #[serde(rename = "iconURL")]
    pub icon_url: String,
    pub tint_color: String,
    pub category: String,
    pub versions: Vec<SourceVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_permissions: Option<AppPermissions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub screenshots: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceVersion {
    pub version: String,
    pub build_version: String,
    pub date: String,
    #[serde(rename = "downloadURL")]
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localized_description: Option<String>,
}

/// `index.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceIndex {
    #[serde(rename = "repositoryURL")]
    pub repository_url: String,
    pub name: String,
    pub subtitle: String,
    pub description: String,
    pub generated_at: String,
}

/// AltStore source builder.
#[derive(Debug, Clone)]
pub struct AltStoreSource {
    output: PathBuf,
}

impl AltStoreSource {
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            output: output.as_ref().to_path_buf(),
        }
    }

    async fn render_app(&self, ctx: &BuildContext, app: &App) -> Result<SourceApp, Skip> {
        let versions = app_versions(ctx, app).await?;

        let mut entries = Vec::new();
        for version in versions.iter().take(MAX_VERSIONS) {
            if let Some(entry) = self.render_version(ctx, version).await {
                entries.push(entry);
            } else {
                tracing::debug!(
                    "No IPA URL for {} version {:?}",
                    app_label(app),
                    version.version
                );
            }
        }
        let Some(latest) = entries.first() else {
            return Err(Skip::unsupported("no IPA versions"));
        };

        let app_permissions = if ctx.options.ipa_permissions {
            self.permissions(ctx, &latest.download_url).await
        } else {
            None
        };

        Ok(SourceApp {
            name: app
                .name
                .clone()
                .unwrap_or_else(|| "Unknown App".to_string()),
            bundle_identifier: app
                .bundle_identifier
                .clone()
                .or_else(|| app.slug.clone())
                .unwrap_or_default(),
            developer_name: app
                .developer_name
                .clone()
                .unwrap_or_else(|| "OpenLyst Developer".to_string()),
            subtitle: app
                .subtitle
                .clone()
                .unwrap_or_else(|| "An app from OpenLyst".to_string()),
            localized_description: app
                .long_description()
                .unwrap_or("A free and open source app")
                .to_string(),
            icon_url: app.icon_url.clone().unwrap_or_default(),
            tint_color: app.tint_color.clone().unwrap_or_else(|| TINT.to_string()),
            category: category(app.category.as_deref()).to_string(),
            versions: entries,
            app_permissions,
            screenshots: app
                .screenshots
                .iter()
                .map(|shot| shot.url().to_string())
                .take(MAX_SCREENSHOTS)
                .collect(),
        })
    }

    async fn render_version(
        &self,
        ctx: &BuildContext,
        version: &AppVersion,
    ) -> Option<SourceVersion> {
        let url = select::ipa_url(version)?;
        let size = ctx.artifacts.size(&url).await.filter(|size| *size > 0);
        Some(SourceVersion {
            version: version.version.clone().unwrap_or_else(|| "1.0".to_string()),
            build_version: version
                .build_version
                .clone()
                .unwrap_or_else(|| "1".to_string()),
            date: version.date.clone().unwrap_or_else(|| ctx.timestamp()),
            download_url: url,
            size,
            localized_description: version
                .localized_description
                .clone()
                .filter(|d| !d.is_empty()),
        })
    }

    /// Download the IPA and read its permissions. Failures only cost the
    /// `appPermissions` block.
    async fn permissions(&self, ctx: &BuildContext, url: &str) -> Option<AppPermissions> {
        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!("Could not create a temporary directory: {e}");
                return None;
            }
        };
        let path = dir.path().join("app.ipa");

        tracing::info!("Downloading IPA for permissions: {url}");
        if let Err(e) = ctx.artifacts.download_to(url, &path).await {
            tracing::info!("Could not download {url}: {e}");
            return None;
        }

        match tokio::task::spawn_blocking(move || ipa::read_permissions(&path)).await {
            Ok(Ok(perms)) => perms,
            Ok(Err(e)) => {
                tracing::info!("Could not extract permissions from IPA: {e:#}");
                None
            }
            Err(e) => {
                tracing::warn!("IPA inspection task failed: {e}");
                None
            }
        }
    }
}

fn join_url(base: &str, file: &str) -> String {
    format!("{}/{file}", base.trim_end_matches('/'))
}

#[async_trait]
impl Target for AltStoreSource {
    fn name(&self) -> &'static str {
        "altstore"
    }

    async fn build(&self, ctx: &BuildContext) -> Result<TargetReport> {
        ctx.reporter.section("AltStore Source");
        let tree = OutputTree::new(&self.output)
            .with_context(|| format!("Failed to create {}", self.output.display()))?;
        let mut report = TargetReport::new(self.name());

        let apps = list_apps(ctx, Platform::Ios).await?;
        let futures: Vec<_> = apps
            .iter()
            .map(|app| async move { (app_label(app), self.render_app(ctx, app).await) })
            .collect();
        let rendered: Vec<(String, Result<SourceApp, Skip>)> = stream::iter(futures)
            .buffered(ctx.concurrency())
            .collect()
            .await;

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for (label, result) in rendered {
            let entry = match result {
                Ok(entry) => entry,
                Err(skip) => {
                    report.record_skip(ctx.reporter.as_ref(), &label, &skip);
                    continue;
                }
            };
            if !seen.insert(entry.bundle_identifier.clone()) {
                report.record_skip(
                    ctx.reporter.as_ref(),
                    &label,
                    &Skip::failed(format!(
                        "bundle identifier {} already taken",
                        entry.bundle_identifier
                    )),
                );
                continue;
            }
            report.generated += 1;
            let detail = format!(
                "{} ({} version(s){})",
                entry.bundle_identifier,
                entry.versions.len(),
                if entry.app_permissions.is_some() {
                    ", permissions"
                } else {
                    ""
                }
            );
            ctx.reporter.generated(self.name(), &label, &detail);
            entries.push(entry);
        }

        if !report.success() {
            ctx.reporter.error("No valid app entries created");
            return Ok(report);
        }

        let repo_url = &ctx.config.repo_url;
        let source = Source {
            name: "OpenLyst iOS Apps".to_string(),
            subtitle: "Free and open source iOS applications".to_string(),
            description:
                "A curated collection of free and open source iOS applications from OpenLyst."
                    .to_string(),
            icon_url: join_url(repo_url, "icon.png"),
            header_url: join_url(repo_url, "header.png"),
            website: ctx.config.homepage.clone(),
            tint_color: TINT.to_string(),
            featured_apps: entries
                .iter()
                .take(FEATURED)
                .map(|app| app.bundle_identifier.clone())
                .collect(),
            apps: entries,
            news: Vec::new(),
        };
        report.record_write(tree.write_json("apps.json", &source)?);

        let index = SourceIndex {
            repository_url: join_url(repo_url, "apps.json"),
            name: source.name,
            subtitle: source.subtitle,
            description: source.description,
            generated_at: ctx.timestamp(),
        };
        report.record_write(tree.write_json("index.json", &index)?);

        tracing::info!("AltStore source built with {} apps", report.generated);
        Ok(report)
    }
}
