//! IPA inspection for AltStore `appPermissions`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use zip::ZipArchive;

const ENTITLEMENT_FILES: [&str; 2] = ["archived-expanded-entitlements.xcent", "entitlements.plist"];
const IGNORED_ENTITLEMENTS: [&str; 2] = [
    "com.apple.developer.team-identifier",
    "application-identifier",
];

/// Permissions an app declares, as AltStore displays them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppPermissions {
    /// Entitlement keys, sorted.
    pub entitlements: Vec<String>,
    /// `NS*UsageDescription` key to the text shown to the user.
    pub privacy: BTreeMap<String, String>,
}

impl AppPermissions {
    pub fn is_empty(&self) -> bool {
        self.entitlements.is_empty() && self.privacy.is_empty()
    }
}

/// Read the permissions of the IPA at `path`.
///
/// Returns `Ok(None)` when the archive has no `Payload/*.app` bundle or
/// declares nothing worth showing.
///
/// # Errors
///
/// Returns an error if the file is not a readable zip archive.
pub fn read_permissions(path: &Path) -> Result<Option<AppPermissions>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("{} is not a zip archive", path.display()))?;
    permissions_from_archive(&mut archive)
}

fn permissions_from_archive<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Option<AppPermissions>> {
    let Some(app_dir) = find_app_dir(archive) else {
        tracing::warn!("IPA does not contain a Payload .app directory");
        return Ok(None);
    };

    let mut permissions = AppPermissions::default();

    if let Some(info) = read_plist(archive, &format!("{app_dir}Info.plist")) {
        for (key, value) in info {
            if !key.ends_with("UsageDescription") {
                continue;
            }
            if let Some(text) = value.into_string() {
                permissions.privacy.insert(key, text);
            }
        }
    }

    // Only the first entitlements file present is consulted.
    let entitlements_path = ENTITLEMENT_FILES
        .iter()
        .map(|name| format!("{app_dir}{name}"))
        .find(|candidate| archive.index_for_name(candidate).is_some());
    if let Some(ents) = entitlements_path.and_then(|p| read_plist(archive, &p)) {
        permissions.entitlements = ents
            .keys()
            .filter(|key| !IGNORED_ENTITLEMENTS.contains(&key.as_str()))
            .cloned()
            .collect();
        permissions.entitlements.sort();
    }

    if permissions.is_empty() {
        Ok(None)
    } else {
        Ok(Some(permissions))
    }
}

/// `Payload/<Name>.app/`, taken from the first entry inside a bundle.
fn find_app_dir<R: Read + Seek>(archive: &ZipArchive<R>) -> Option<String> {
    archive.file_names().find_map(|name| {
        let rest = name.strip_prefix("Payload/")?;
        let bundle = rest.split('/').next()?;
        bundle
            .ends_with(".app")
            .then(|| format!("Payload/{bundle}/"))
    })
}

fn read_plist<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Option<plist::Dictionary> {
    let mut entry = archive.by_name(name).ok()?;
    let mut buf = Vec::new();
    if let Err(e) = entry.read_to_end(&mut buf) {
        tracing::debug!("Failed reading {name}: {e}");
        return None;
    }
    match plist::Value::from_reader(Cursor::new(buf)) {
        Ok(value) => value.into_dictionary(),
        Err(e) => {
            tracing::debug!("Failed parsing {name}: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const INFO_PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>CFBundleName</key>
    <string>Doggy</string>
    <key>NSCameraUsageDescription</key>
    <string>Take photos of dogs</string>
    <key>NSLocationWhenInUseUsageDescription</key>
    <string>Find dog parks</string>
</dict>
</plist>"#;

    const ENTITLEMENTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
    <key>application-identifier</key>
    <string>ABC.ink.openlyst.doggy</string>
    <key>com.apple.developer.team-identifier</key>
    <string>ABC</string>
    <key>get-task-allow</key>
    <true/>
    <key>aps-environment</key>
    <string>production</string>
</dict>
</plist>"#;

    fn write_ipa(path: &Path, files: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (name, contents) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn reads_usage_descriptions_and_entitlements() {
        let dir = tempfile::tempdir().unwrap();
        let ipa = dir.path().join("doggy.ipa");
        write_ipa(
            &ipa,
            &[
                ("Payload/Doggy.app/Info.plist", INFO_PLIST),
                (
                    "Payload/Doggy.app/archived-expanded-entitlements.xcent",
                    ENTITLEMENTS,
                ),
            ],
        );

        let perms = read_permissions(&ipa).unwrap().unwrap();
        assert_eq!(perms.entitlements, vec!["aps-environment", "get-task-allow"]);
        assert_eq!(perms.privacy.len(), 2);
        assert_eq!(
            perms.privacy["NSCameraUsageDescription"],
            "Take photos of dogs"
        );
    }

    #[test]
    fn empty_bundle_has_no_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let ipa = dir.path().join("plain.ipa");
        write_ipa(
            &ipa,
            &[(
                "Payload/Plain.app/Info.plist",
                r#"<?xml version="1.0" encoding="UTF-8"?><plist version="1.0"><dict><key>CFBundleName</key><string>Plain</string></dict></plist>"#,
            )],
        );

        assert_eq!(read_permissions(&ipa).unwrap(), None);
    }

    #[test]
    fn archive_without_payload() {
        let dir = tempfile::tempdir().unwrap();
        let ipa = dir.path().join("odd.ipa");
        write_ipa(&ipa, &[("README", "hi")]);

        assert_eq!(read_permissions(&ipa).unwrap(), None);
    }

    #[test]
    fn not_a_zip_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ipa = dir.path().join("bad.ipa");
        std::fs::write(&ipa, "nope").unwrap();

        assert!(read_permissions(&ipa).is_err());
    }
}
