//! Winget repository: the version, installer and default-locale manifests
//! of each app under `manifests/<Publisher>/<Name>/<version>/`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use lyst_schema::{App, Platform};
use serde::{Deserialize, Serialize};

use super::{
    BuildContext, Skip, Target, TargetReport, app_label, app_versions, list_apps, path_segment,
};
use crate::io::OutputTree;
use crate::{naming, paths, select};

pub const MANIFEST_VERSION: &str = "1.4.0";
pub const DEFAULT_LOCALE: &str = "en-US";
const MANIFEST_DIR: &str = "manifests";
const TAGS: [&str; 3] = ["opensource", "free", "openlyst"];

/// `<Id>.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionManifest {
    pub package_identifier: String,
    pub package_version: String,
    pub default_locale: String,
    pub manifest_type: String,
    pub manifest_version: String,
}

/// `<Id>.installer.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstallerManifest {
    pub package_identifier: String,
    pub package_version: String,
    pub installers: Vec<Installer>,
    pub manifest_type: String,
    pub manifest_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Installer {
    pub architecture: String,
    pub installer_type: String,
    pub installer_url: String,
    /// Uppercase hex, as Winget writes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer_switches: Option<InstallerSwitches>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstallerSwitches {
    pub silent: String,
    pub silent_with_progress: String,
}

/// `<Id>.locale.en-US.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocaleManifest {
    pub package_identifier: String,
    pub package_version: String,
    pub package_locale: String,
    pub publisher: String,
    pub package_name: String,
    pub license: String,
    pub short_description: String,
    pub description: String,
    pub package_url: String,
    pub tags: Vec<String>,
    pub manifest_type: String,
    pub manifest_version: String,
}

/// Installer type from the URL's file extension; `exe` when unknown.
pub fn installer_type(url: &str) -> &'static str {
    match paths::extension_from_url(url).as_deref() {
        Some("msi") => "msi",
        Some("msix") => "msix",
        Some("zip") => "zip",
        _ => "exe",
    }
}

/// The three manifests of one package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triad {
    pub version: VersionManifest,
    pub installer: InstallerManifest,
    pub locale: LocaleManifest,
}

impl Triad {
    /// Directory of this version, relative to the repository root.
    pub fn dir(&self) -> PathBuf {
        let id = &self.version.package_identifier;
        let (publisher, name) = id.split_once('.').unwrap_or(("OpenLyst", id.as_str()));
        Path::new(MANIFEST_DIR)
            .join(publisher)
            .join(name)
            .join(&self.version.package_version)
    }

    fn files(&self) -> Result<Vec<(PathBuf, String)>> {
        let id = &self.version.package_identifier;
        let dir = self.dir();
        Ok(vec![
            (
                dir.join(format!("{id}.installer.yaml")),
                serde_yaml::to_string(&self.installer)?,
            ),
            (
                dir.join(format!("{id}.locale.{DEFAULT_LOCALE}.yaml")),
                serde_yaml::to_string(&self.locale)?,
            ),
            (
                dir.join(format!("{id}.yaml")),
                serde_yaml::to_string(&self.version)?,
            ),
        ])
    }
}

/// `repo-info.json`.
#[derive(Debug, Serialize)]
struct RepoInfo<'a> {
    name: &'static str,
    description: &'static str,
    homepage: &'a str,
    generated_at: String,
    manifest_count: usize,
}

/// Winget repository builder.
#[derive(Debug, Clone)]
pub struct WingetRepo {
    output: PathBuf,
}

impl WingetRepo {
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            output: output.as_ref().to_path_buf(),
        }
    }

    async fn render_app(&self, ctx: &BuildContext, app: &App) -> Result<Triad, Skip> {
        let versions = app_versions(ctx, app).await?;
        let latest = &versions[0];
        if !latest.supports(Platform::Windows) {
            return Err(Skip::unsupported("does not support Windows"));
        }
        let url = select::windows_url(latest)
            .ok_or_else(|| Skip::unsupported("no Windows download URL"))?;
        let version = path_segment(latest.version.as_deref().unwrap_or_default())?.to_string();

        let name = app.name.clone().unwrap_or_default();
        let package_id = naming::winget_id(&ctx.config.publisher, &name);
        let kind = installer_type(&url);

        let installer_sha256 = if ctx.options.calculate_sha256 {
            match ctx.artifacts.checksum(&url).await {
                Ok(info) => Some(info.sha256.to_upper()),
                Err(e) => {
                    tracing::warn!("Failed to calculate SHA256 for {url}: {e}");
                    None
                }
            }
        } else {
            None
        };
        let installer_switches = (kind == "exe").then(|| InstallerSwitches {
            silent: "/S".to_string(),
            silent_with_progress: "/S".to_string(),
        });

        let short_description = app.subtitle.clone().unwrap_or_else(|| name.clone());
        Ok(Triad {
            version: VersionManifest {
                package_identifier: package_id.clone(),
                package_version: version.clone(),
                default_locale: DEFAULT_LOCALE.to_string(),
                manifest_type: "version".to_string(),
                manifest_version: MANIFEST_VERSION.to_string(),
            },
            installer: InstallerManifest {
                package_identifier: package_id.clone(),
                package_version: version.clone(),
                installers: vec![Installer {
                    architecture: "x64".to_string(),
                    installer_type: kind.to_string(),
                    installer_url: url,
                    installer_sha256,
                    installer_switches,
                }],
                manifest_type: "installer".to_string(),
                manifest_version: MANIFEST_VERSION.to_string(),
            },
            locale: LocaleManifest {
                package_identifier: package_id,
                package_version: version,
                package_locale: DEFAULT_LOCALE.to_string(),
                publisher: ctx.config.publisher.clone(),
                license: "Open Source".to_string(),
                description: app
                    .localized_description
                    .clone()
                    .unwrap_or_else(|| short_description.clone()),
                short_description,
                package_url: app
                    .website
                    .clone()
                    .unwrap_or_else(|| ctx.config.homepage.clone()),
                package_name: name,
                tags: TAGS.iter().map(ToString::to_string).collect(),
                manifest_type: "defaultLocale".to_string(),
                manifest_version: MANIFEST_VERSION.to_string(),
            },
        })
    }
}

#[async_trait]
impl Target for WingetRepo {
    fn name(&self) -> &'static str {
        "winget"
    }

    async fn build(&self, ctx: &BuildContext) -> Result<TargetReport> {
        ctx.reporter.section("Winget Repository");
        let tree = OutputTree::new(&self.output)
            .with_context(|| format!("Failed to create {}", self.output.display()))?;
        let mut report = TargetReport::new(self.name());

        let apps = list_apps(ctx, Platform::Windows).await?;
        let futures: Vec<_> = apps
            .iter()
            .map(|app| async move { (app_label(app), self.render_app(ctx, app).await) })
            .collect();
        let rendered: Vec<(String, Result<Triad, Skip>)> = stream::iter(futures)
            .buffered(ctx.concurrency())
            .collect()
            .await;

        for (label, result) in rendered {
            let triad = match result {
                Ok(triad) => triad,
                Err(skip) => {
                    report.record_skip(ctx.reporter.as_ref(), &label, &skip);
                    continue;
                }
            };
            let files = triad
                .files()
                .with_context(|| format!("Failed to serialize manifests for {label}"))?;
            if files.iter().any(|(rel, _)| tree.was_written(rel)) {
                report.record_skip(
                    ctx.reporter.as_ref(),
                    &label,
                    &Skip::failed(format!(
                        "{} already written by another app",
                        triad.dir().display()
                    )),
                );
                continue;
            }
            for (rel, yaml) in &files {
                let outcome = tree
                    .write(rel, yaml.as_bytes())
                    .with_context(|| format!("Failed to write {}", rel.display()))?;
                report.record_write(outcome);
            }
            report.generated += 1;
            ctx.reporter.generated(
                self.name(),
                &label,
                &format!(
                    "{} ({})",
                    triad.version.package_identifier, triad.version.package_version
                ),
            );
        }

        if !report.success() {
            ctx.reporter.error("No Winget manifests were generated");
            return Ok(report);
        }

        let info = RepoInfo {
            name: "OpenLyst Winget Repository",
            description: "Winget manifest files for Windows applications from OpenLyst",
            homepage: &ctx.config.homepage,
            generated_at: ctx.timestamp(),
            manifest_count: report.generated,
        };
        report.record_write(tree.write_json("repo-info.json", &info)?);

        super::prune(&tree, ctx, &mut report, &[MANIFEST_DIR])?;
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

    #[test]
    fn installer_type_from_suffix() {
        assert_eq!(installer_type("https://x/setup.MSI"), "msi");
        assert_eq!(installer_type("https://x/app.msix?sig=1"), "msix");
        assert_eq!(installer_type("https://x/app.zip"), "zip");
        assert_eq!(installer_type("https://x/app.exe"), "exe");
        assert_eq!(installer_type("https://x/download"), "exe");
    }

    #[tokio::test]
    async fn test_build_writes_triad() {
        let mut server = Server::new_async().await;
        let _apps = mock_apps(
            &mut server,
            "Windows",
            json!([{"slug": "doggy", "name": "Doggy Days", "subtitle": "Dogs"}]),
        )
        .await;
        let _versions = mock_versions(
            &mut server,
            "doggy",
            json!([{
                "version": "1.2.3",
                "platforms": ["Windows", "macOS"],
                "downloads": {"Windows": {"exe": {"x86_64": "https://cdn.example/doggy-setup.exe"}}}
            }]),
        )
        .await;

        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&server, BuildOptions::default());
        let report = WingetRepo::new(dir.path()).build(&ctx).await.unwrap();
        assert_eq!(report.generated, 1);

        let base = dir.path().join("manifests/OpenLyst/DoggyDays/1.2.3");
        let version: VersionManifest = serde_yaml::from_str(
            &std::fs::read_to_string(base.join("OpenLyst.DoggyDays.yaml")).unwrap(),
        )
        .unwrap();
        assert_eq!(version.manifest_type, "version");
        assert_eq!(version.default_locale, "en-US");

        let installer: InstallerManifest = serde_yaml::from_str(
            &std::fs::read_to_string(base.join("OpenLyst.DoggyDays.installer.yaml")).unwrap(),
        )
        .unwrap();
        assert_eq!(installer.manifest_type, "installer");
        let inst = &installer.installers[0];
        assert_eq!(inst.installer_type, "exe");
        assert_eq!(inst.installer_url, "https://cdn.example/doggy-setup.exe");
        assert_eq!(inst.installer_sha256, None);
        assert_eq!(inst.installer_switches.as_ref().unwrap().silent, "/S");

        let locale: LocaleManifest = serde_yaml::from_str(
            &std::fs::read_to_string(base.join("OpenLyst.DoggyDays.locale.en-US.yaml")).unwrap(),
        )
        .unwrap();
        assert_eq!(locale.manifest_type, "defaultLocale");
        assert_eq!(locale.short_description, "Dogs");
        assert!(dir.path().join("repo-info.json").exists());

        let again = WingetRepo::new(dir.path()).build(&ctx).await.unwrap();
        assert_eq!(again.files.changed(), 0);
        assert_eq!(again.files.unchanged, 4);
    }

    #[tokio::test]
    async fn test_installer_hash_is_uppercase() {
        let mut server = Server::new_async().await;
        let _apps = mock_apps(
            &mut server,
            "Windows",
            json!([{"slug": "doggy", "name": "Doggy"}]),
        )
        .await;
        let download = format!("{}/files/doggy.msi", server.url());
        let _versions = mock_versions(
            &mut server,
            "doggy",
            json!([{
                "version": "2.0",
                "platforms": ["Windows"],
                "downloads": {"Windows": {"msi": download}}
            }]),
        )
        .await;
        let _file = server
            .mock("GET", "/files/doggy.msi")
            .with_status(200)
            .with_body("msi bytes")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let options = BuildOptions {
            calculate_sha256: true,
            ..BuildOptions::default()
        };
        let ctx = context(&server, options);
        WingetRepo::new(dir.path()).build(&ctx).await.unwrap();

        let installer: InstallerManifest = serde_yaml::from_str(
            &std::fs::read_to_string(
                dir.path()
                    .join("manifests/OpenLyst/Doggy/2.0/OpenLyst.Doggy.installer.yaml"),
            )
            .unwrap(),
        )
        .unwrap();
        let inst = &installer.installers[0];
        assert_eq!(inst.installer_type, "msi");
        assert!(inst.installer_switches.is_none());
        let expected = lyst_schema::Sha256Digest::compute(b"msi bytes").to_upper();
        assert_eq!(inst.installer_sha256.as_deref(), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn test_prune_removes_old_versions() {
        let mut server = Server::new_async().await;
        let _apps = mock_apps(
            &mut server,
            "Windows",
            json!([{"slug": "doggy", "name": "Doggy"}]),
        )
        .await;
        let _versions = mock_versions(
            &mut server,
            "doggy",
            json!([{
                "version": "2.0",
                "platforms": ["Windows"],
                "downloads": {"Windows": {"exe": "https://cdn.example/doggy.exe"}}
            }]),
        )
        .await;

        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("manifests/OpenLyst/Doggy/1.0");
        std::fs::create_dir_all(&old).unwrap();
        std::fs::write(old.join("OpenLyst.Doggy.yaml"), "stale").unwrap();

        let options = BuildOptions {
            prune: true,
            ..BuildOptions::default()
        };
        let ctx = context(&server, options);
        let report = WingetRepo::new(dir.path()).build(&ctx).await.unwrap();

        assert_eq!(report.pruned, 1);
        assert!(!old.exists());
        assert!(dir.path().join("manifests/OpenLyst/Doggy/2.0").is_dir());
    }
}
