//! F-Droid repository: `metadata/<package>.yml` per app plus an
//! `index.json` listing every package.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use lyst_schema::{App, Platform};
use serde::{Deserialize, Serialize};

use super::{BuildContext, Skip, Target, TargetReport, app_label, app_versions, list_apps};
use crate::io::OutputTree;
use crate::{naming, select};

const METADATA_DIR: &str = "metadata";
const MAX_VERSIONS: usize = 5;
const SUMMARY_LIMIT: usize = 80;
const INDEX_VERSION: u32 = 21;
const MIN_SDK: u32 = 21;
const TARGET_SDK: u32 = 34;
const PREBUILT: &str = "Pre-built binary from OpenLyst";

/// F-Droid category for an OpenLyst category.
pub fn category(category: Option<&str>) -> &'static str {
    let key = category.unwrap_or("other").to_lowercase().replace(' ', "-");
    match key.as_str() {
        "entertainment" | "photo-video" => "Multimedia",
        "games" => "Games",
        "social" => "Internet",
        "developer" => "Development",
        _ => "System",
    }
}

/// `metadata/<package>.yml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Metadata {
    pub categories: Vec<String>,
    pub license: String,
    pub author_name: String,
    pub author_web_site: String,
    pub web_site: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_tracker: Option<String>,
    pub auto_name: String,
    pub summary: String,
    pub description: String,
    pub builds: Vec<Build>,
    pub auto_update_mode: String,
    pub update_check_mode: String,
    pub current_version: String,
    pub current_version_code: u64,
}

/// One entry of `Builds`. Binaries are not built from source, so every
/// entry is disabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub version_name: String,
    pub version_code: u64,
    pub disable: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub repo: RepoInfo,
    pub requests: Requests,
    pub apps: Vec<IndexApp>,
    pub packages: BTreeMap<String, Vec<Package>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub name: String,
    pub description: String,
    pub icon: String,
    pub address: String,
    pub timestamp: i64,
    pub version: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requests {
    pub install: Vec<String>,
    pub uninstall: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexApp {
    pub package_name: String,
    pub name: String,
    pub summary: String,
    pub icon: String,
    pub description: String,
    pub license: String,
    pub categories: Vec<String>,
    pub web_site: String,
    pub added: i64,
    pub last_updated: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub added: i64,
    pub apk_name: String,
    /// Lowercase hex SHA-256, empty when the APK was not downloaded.
    pub hash: String,
    pub hash_type: String,
    pub min_sdk_version: u32,
    pub package_name: String,
    pub size: u64,
    pub target_sdk_version: u32,
    pub version_code: u64,
    pub version_name: String,
    /// Where the APK is downloaded from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

/// One app's share of the repository.
#[derive(Debug)]
struct Rendered {
    package: String,
    metadata: Metadata,
    index_app: IndexApp,
    packages: Vec<Package>,
}

/// F-Droid repository builder.
#[derive(Debug, Clone)]
pub struct FDroidRepo {
    output: PathBuf,
}

impl FDroidRepo {
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            output: output.as_ref().to_path_buf(),
        }
    }

    async fn render_app(&self, ctx: &BuildContext, app: &App) -> Result<Rendered, Skip> {
        let versions = app_versions(ctx, app).await?;
        let apks: Vec<(String, String, u64)> = versions
            .iter()
            .filter_map(|v| {
                let url = select::apk_url(v)?;
                let name = v.version.clone().unwrap_or_else(|| "1.0".to_string());
                let code = naming::build_code(v.build_version.as_deref(), &name);
                Some((name, url, code))
            })
            .take(MAX_VERSIONS)
            .collect();
        let Some((current_version, _, current_code)) = apks.first().cloned() else {
            return Err(Skip::unsupported("no Android APK"));
        };

        let name = app.name.clone().unwrap_or_else(|| "Unknown".to_string());
        let package = naming::fdroid_package(app.bundle_identifier.as_deref(), &name);
        if !naming::is_valid_package(&package) {
            return Err(Skip::failed(format!("invalid package name '{package}'")));
        }
        let summary = app.subtitle.clone().unwrap_or_else(|| name.clone());
        let description = app
            .long_description()
            .unwrap_or("A free and open source app.")
            .to_string();
        let website = app
            .website
            .clone()
            .unwrap_or_else(|| ctx.config.homepage.clone());
        let categories = vec![category(app.category.as_deref()).to_string()];
        let stamp = ctx.timestamp_millis();

        let mut packages = Vec::with_capacity(apks.len());
        for (version_name, url, version_code) in &apks {
            let (hash, size) = self.apk_info(ctx, url).await;
            packages.push(Package {
                added: stamp,
                apk_name: format!("{package}-{version_name}.apk"),
                hash,
                hash_type: "sha256".to_string(),
                min_sdk_version: MIN_SDK,
                package_name: package.clone(),
                size,
                target_sdk_version: TARGET_SDK,
                version_code: *version_code,
                version_name: version_name.clone(),
                download_url: Some(url.clone()),
            });
        }

        let metadata = Metadata {
            categories: categories.clone(),
            license: "Unknown".to_string(),
            author_name: app
                .developer_name
                .clone()
                .unwrap_or_else(|| "OpenLyst Developer".to_string()),
            author_web_site: website.clone(),
            web_site: website.clone(),
            source_code: app.source_code.clone(),
            issue_tracker: app.issue_tracker.clone(),
            auto_name: name.clone(),
            summary: summary.chars().take(SUMMARY_LIMIT).collect(),
            description: description.clone(),
            builds: apks
                .iter()
                .map(|(version_name, _, version_code)| Build {
                    version_name: version_name.clone(),
                    version_code: *version_code,
                    disable: PREBUILT.to_string(),
                })
                .collect(),
            auto_update_mode: "None".to_string(),
            update_check_mode: "None".to_string(),
            current_version,
            current_version_code: current_code,
        };

        let index_app = IndexApp {
            package_name: package.clone(),
            name,
            summary,
            icon: app.icon_url.clone().unwrap_or_default(),
            description,
            license: "Unknown".to_string(),
            categories,
            web_site: website,
            added: stamp,
            last_updated: stamp,
        };

        Ok(Rendered {
            package,
            metadata,
            index_app,
            packages,
        })
    }

    /// Hash and size of an APK. Without `--calculate-info` only the size is
    /// probed and the hash is left empty.
    async fn apk_info(&self, ctx: &BuildContext, url: &str) -> (String, u64) {
        if ctx.options.calculate_info {
            match ctx.artifacts.checksum(url).await {
                Ok(info) => return (info.sha256.to_string(), info.size),
                Err(e) => tracing::warn!("Failed to get file info for {url}: {e}"),
            }
        }
        (String::new(), ctx.artifacts.size(url).await.unwrap_or(0))
    }
}

#[async_trait]
impl Target for FDroidRepo {
    fn name(&self) -> &'static str {
        "fdroid"
    }

    async fn build(&self, ctx: &BuildContext) -> Result<TargetReport> {
        ctx.reporter.section("F-Droid Repository");
        let tree = OutputTree::new(&self.output)
            .with_context(|| format!("Failed to create {}", self.output.display()))?;
        tree.ensure_dir(METADATA_DIR)?;
        tree.ensure_dir("repo")?;
        let mut report = TargetReport::new(self.name());

        let apps = list_apps(ctx, Platform::Android).await?;
        let futures: Vec<_> = apps
            .iter()
            .map(|app| async move { (app_label(app), self.render_app(ctx, app).await) })
            .collect();
        let rendered: Vec<(String, Result<Rendered, Skip>)> = stream::iter(futures)
            .buffered(ctx.concurrency())
            .collect()
            .await;

        let mut index_apps = Vec::new();
        let mut packages = BTreeMap::new();

        for (label, result) in rendered {
            let app = match result {
                Ok(app) => app,
                Err(skip) => {
                    report.record_skip(ctx.reporter.as_ref(), &label, &skip);
                    continue;
                }
            };
            if packages.contains_key(&app.package) {
                report.record_skip(
                    ctx.reporter.as_ref(),
                    &label,
                    &Skip::failed(format!("package {} already taken", app.package)),
                );
                continue;
            }

            let rel = format!("{METADATA_DIR}/{}.yml", app.package);
            let outcome = tree
                .write_yaml(&rel, &app.metadata)
                .with_context(|| format!("Failed to write {rel}"))?;
            report.record_write(outcome);
            report.generated += 1;
            ctx.reporter.generated(
                self.name(),
                &label,
                &format!("{} ({})", app.package, app.metadata.current_version),
            );

            index_apps.push(app.index_app);
            packages.insert(app.package, app.packages);
        }

        if !report.success() {
            ctx.reporter.error("No Android apps were added");
            return Ok(report);
        }

        let index = Index {
            repo: RepoInfo {
                name: "OpenLyst F-Droid Repository".to_string(),
                description: "Free and open source Android applications from OpenLyst".to_string(),
                icon: "icon.png".to_string(),
                address: ctx.config.fdroid_address(),
                timestamp: ctx.timestamp_millis(),
                version: INDEX_VERSION,
            },
            requests: Requests::default(),
            apps: index_apps,
            packages,
        };
        report.record_write(tree.write_json("index.json", &index)?);

        if let Some(icon) = &ctx.config.fdroid_icon {
            match tree.copy_in(icon, "icon.png") {
                Ok(outcome) => report.record_write(outcome),
                Err(e) => ctx
                    .reporter
                    .warning(&format!("Could not copy {}: {e}", icon.display())),
            }
        }

        super::prune(&tree, ctx, &mut report, &[METADATA_DIR])?;
        Ok(report)
    }
}
