//! Checks over a generated manifest tree.
//!
//! Every manifest is reduced to a [`Declared`] record (what version, from
//! where, with which checksum) and then held to the same rules regardless
//! of the package manager it came from.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use lyst_schema::{SHA256_PLACEHOLDER, Sha256Digest, is_http_url};
use walkdir::WalkDir;

use crate::io::{ArtifactProbe, DownloadError};
use crate::targets::altstore::Source;
use crate::targets::fdroid::Index;
use crate::targets::homebrew::{Formula, FormulaParseError};
use crate::targets::winget::{InstallerManifest, VersionManifest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// One problem found in a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub path: PathBuf,
    /// Package the finding is about (formula class, package id, ...).
    pub subject: String,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct VerifyReport {
    /// Manifest records examined.
    pub checked: usize,
    pub findings: Vec<Finding>,
}

impl VerifyReport {
    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
    }

    /// No errors; warnings are allowed.
    pub fn is_ok(&self) -> bool {
        self.errors().next().is_none()
    }

    fn push(&mut self, path: &Path, subject: &str, severity: Severity, message: impl Into<String>) {
        self.findings.push(Finding {
            path: path.to_path_buf(),
            subject: subject.to_string(),
            severity,
            message: message.into(),
        });
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VerifyOptions {
    /// Also fetch every artifact.
    pub online: bool,
    pub concurrency: usize,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            online: false,
            concurrency: 4,
        }
    }
}

/// What a manifest says about its checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Checksum {
    /// The format has no checksum field.
    NotApplicable,
    Absent,
    Placeholder,
    Malformed(String),
    Declared(Sha256Digest),
}

impl Checksum {
    fn from_field(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => Checksum::Absent,
            Some(SHA256_PLACEHOLDER) => Checksum::Placeholder,
            Some(hex) => match Sha256Digest::new(hex) {
                Ok(digest) => Checksum::Declared(digest),
                Err(e) => Checksum::Malformed(e.to_string()),
            },
        }
    }
}

/// A single artifact a manifest promises.
#[derive(Debug, Clone)]
struct Declared {
    path: PathBuf,
    subject: String,
    version: String,
    url: Option<String>,
    checksum: Checksum,
}

/// Verify every manifest found under `root`.
///
/// # Errors
///
/// Returns an error only if `root` cannot be walked; problems inside
/// manifests are reported as findings.
pub async fn verify(
    root: &Path,
    options: VerifyOptions,
    probe: &ArtifactProbe,
) -> Result<VerifyReport> {
    if !root.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }

    let mut report = VerifyReport::default();
    let mut declared = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            continue;
        }

        let in_formula_dir = path
            .parent()
            .and_then(Path::file_name)
            .is_some_and(|dir| dir == "Formula");
        if in_formula_dir && name.ends_with(".rb") {
            read_formula(path, &mut report, &mut declared);
        } else if name.ends_with(".installer.yaml") {
            read_winget(path, &mut report, &mut declared);
        } else if name == "index.json" {
            read_fdroid(path, &mut report, &mut declared);
        } else if name == "apps.json" {
            read_altstore(path, &mut report, &mut declared);
        }
    }

    report.checked = declared.len();
    for record in &declared {
        check_offline(record, &mut report);
    }

    if options.online {
        let results: Vec<Option<Finding>> = stream::iter(&declared)
            .map(|record| check_online(record, probe))
            .buffered(options.concurrency.max(1))
            .collect()
            .await;
        report.findings.extend(results.into_iter().flatten());
    }

    report
        .findings
        .sort_by(|a, b| (&a.path, &a.subject).cmp(&(&b.path, &b.subject)));
    Ok(report)
}

fn read_formula(path: &Path, report: &mut VerifyReport, out: &mut Vec<Declared>) {
    let subject = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            report.push(path, &subject, Severity::Error, format!("unreadable: {e}"));
            return;
        }
    };
    match Formula::parse(&text) {
        Ok(formula) => out.push(Declared {
            path: path.to_path_buf(),
            subject: formula.class_name,
            version: formula.entry.version,
            url: Some(formula.entry.url),
            checksum: match formula.entry.sha256 {
                Some(digest) => Checksum::Declared(digest),
                None if text.contains(SHA256_PLACEHOLDER) => Checksum::Placeholder,
                None => Checksum::Absent,
            },
        }),
        Err(FormulaParseError::Checksum(e)) => {
            report.push(
                path,
                &subject,
                Severity::Error,
                format!("malformed checksum: {e}"),
            );
        }
        Err(e) => report.push(path, &subject, Severity::Error, e.to_string()),
    }
}

fn read_winget(path: &Path, report: &mut VerifyReport, out: &mut Vec<Declared>) {
    let subject = path
        .file_name()
        .map(|s| s.to_string_lossy().trim_end_matches(".installer.yaml").to_string())
        .unwrap_or_default();
    let manifest: InstallerManifest = match read_yaml(path) {
        Ok(m) => m,
        Err(e) => {
            report.push(path, &subject, Severity::Error, format!("{e:#}"));
            return;
        }
    };

    let version_path = path.with_file_name(format!("{}.yaml", manifest.package_identifier));
    match read_yaml::<VersionManifest>(&version_path) {
        Ok(version) if version.package_version != manifest.package_version => report.push(
            path,
            &manifest.package_identifier,
            Severity::Error,
            format!(
                "version manifest says {} but installer says {}",
                version.package_version, manifest.package_version
            ),
        ),
        Ok(_) => {}
        Err(e) => report.push(
            path,
            &manifest.package_identifier,
            Severity::Error,
            format!("missing or invalid version manifest: {e:#}"),
        ),
    }

    if manifest.installers.is_empty() {
        report.push(
            path,
            &manifest.package_identifier,
            Severity::Error,
            "no installers",
        );
    }
    for installer in manifest.installers {
        out.push(Declared {
            path: path.to_path_buf(),
            subject: manifest.package_identifier.clone(),
            version: manifest.package_version.clone(),
            url: Some(installer.installer_url),
            checksum: Checksum::from_field(installer.installer_sha256.as_deref()),
        });
    }
}

fn read_fdroid(path: &Path, report: &mut VerifyReport, out: &mut Vec<Declared>) {
    let value: serde_json::Value = match read_json(path) {
        Ok(v) => v,
        Err(e) => {
            report.push(path, "index", Severity::Error, format!("{e:#}"));
            return;
        }
    };
    // AltStore sources also ship an index.json.
    if value.get("packages").is_none() {
        return;
    }
    let index: Index = match serde_json::from_value(value) {
        Ok(index) => index,
        Err(e) => {
            report.push(path, "index", Severity::Error, e.to_string());
            return;
        }
    };
    for (package, versions) in index.packages {
        for pkg in versions {
            out.push(Declared {
                path: path.to_path_buf(),
                subject: package.clone(),
                version: pkg.version_name,
                url: pkg.download_url,
                checksum: Checksum::from_field(Some(pkg.hash.as_str())),
            });
        }
    }
}

fn read_altstore(path: &Path, report: &mut VerifyReport, out: &mut Vec<Declared>) {
    let source: Source = match read_json(path) {
        Ok(source) => source,
        Err(e) => {
            report.push(path, "source", Severity::Error, format!("{e:#}"));
            return;
        }
    };
    for app in source.apps {
        for version in app.versions {
            out.push(Declared {
                path: path.to_path_buf(),
                subject: app.bundle_identifier.clone(),
                version: version.version,
                url: Some(version.download_url),
                checksum: Checksum::NotApplicable,
            });
        }
    }
}

fn check_offline(record: &Declared, report: &mut VerifyReport) {
    let path = &record.path;
    let subject = &record.subject;

    if record.version.trim().is_empty() {
        report.push(path, subject, Severity::Error, "empty version");
    }
    match &record.url {
        Some(url) if !is_http_url(url) => report.push(
            path,
            subject,
            Severity::Error,
            format!("download URL '{url}' is not http(s)"),
        ),
        Some(_) => {}
        None => report.push(path, subject, Severity::Warning, "no download URL recorded"),
    }
    match &record.checksum {
        Checksum::Placeholder => report.push(
            path,
            subject,
            Severity::Warning,
            "checksum is a placeholder",
        ),
        Checksum::Absent => report.push(path, subject, Severity::Warning, "no checksum"),
        Checksum::Malformed(e) => report.push(
            path,
            subject,
            Severity::Error,
            format!("malformed checksum: {e}"),
        ),
        Checksum::NotApplicable | Checksum::Declared(_) => {}
    }
}

async fn check_online(record: &Declared, probe: &ArtifactProbe) -> Option<Finding> {
    let url = record.url.as_deref().filter(|url| is_http_url(url))?;
    let finding = |message: String| Finding {
        path: record.path.clone(),
        subject: record.subject.clone(),
        severity: Severity::Error,
        message,
    };

    if let Checksum::Declared(expected) = &record.checksum {
        return match probe.verify(url, expected).await {
            Ok(_) => None,
            Err(e @ DownloadError::HashMismatch { .. }) => {
                Some(finding(format!("{url}: {e}")))
            }
            Err(e) => Some(finding(format!("{url} is not reachable: {e}"))),
        };
    }
    match probe.reachable(url).await {
        Ok(()) => None,
        Err(e) => Some(finding(format!("{url} is not reachable: {e}"))),
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}
