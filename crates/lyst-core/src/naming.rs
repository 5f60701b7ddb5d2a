//! Identifier sanitization for the various package managers.

/// Ruby class name for a Homebrew formula.
///
/// Every alphabetic run starts uppercase and continues lowercase, then
/// everything that is not ASCII alphanumeric is dropped: `"doggy days 2go"`
/// becomes `DoggyDays2Go`. Names starting with a digit get an `App` prefix.
pub fn class_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_word = false;
    for c in name.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            in_word = false;
            out.push(c);
        }
    }
    out.retain(|c| c.is_ascii_alphanumeric());

    match out.chars().next() {
        None => "App".to_string(),
        Some(first) if !first.is_ascii_alphabetic() => format!("App{out}"),
        Some(_) => out,
    }
}

/// Lowercase package/bundle id: keeps `[a-z0-9.]`.
pub fn package_id(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
        .collect()
}

/// Lowercase file-safe name: spaces become dashes, keeps `[a-z0-9_-]`.
pub fn file_name(name: &str) -> String {
    name.to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Winget `PackageIdentifier`: `<Publisher>.<ClassName>`.
pub fn winget_id(publisher: &str, name: &str) -> String {
    let publisher: String = publisher
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    let name: String = class_name(name);
    format!("{publisher}.{name}")
}

/// F-Droid package name: the bundle identifier, or `ink.openlyst.<name>`.
pub fn fdroid_package(bundle_identifier: Option<&str>, name: &str) -> String {
    match bundle_identifier.map(str::trim) {
        Some(bundle) if !bundle.is_empty() && bundle != "unknown" => bundle.to_string(),
        _ => {
            let clean: String = name
                .to_lowercase()
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .collect();
            format!("ink.openlyst.{clean}")
        }
    }
}

/// Whether `id` is usable as an F-Droid package name and file stem:
/// `[A-Za-z0-9._]+`, not starting with a dot.
pub fn is_valid_package(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
}

/// Integer version code derived from a dotted version string.
///
/// `major * 10000 + minor * 100 + patch`, ignoring anything that is not a
/// digit or a dot. Unparseable input yields `1`.
pub fn version_code(version: &str) -> u64 {
    let clean: String = version
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let mut parts = clean.split('.').map(|p| {
        if p.is_empty() {
            Some(0)
        } else {
            p.parse::<u64>().ok()
        }
    });

    let mut next = || parts.next().unwrap_or(Some(0));
    match (next(), next(), next()) {
        (Some(major), Some(minor), Some(patch)) => major
            .checked_mul(10_000)
            .zip(minor.checked_mul(100))
            .and_then(|(m, n)| m.checked_add(n))
            .and_then(|v| v.checked_add(patch))
            .unwrap_or(1),
        _ => 1,
    }
}

/// Version code for a build: `buildVersion` when it is an integer, else
/// derived from the version name.
pub fn build_code(build_version: Option<&str>, version: &str) -> u64 {
    build_version
        .and_then(|b| b.trim().parse::<u64>().ok())
        .unwrap_or_else(|| version_code(version))
}
