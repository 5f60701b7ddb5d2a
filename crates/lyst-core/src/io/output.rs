//! Idempotent output tree.
//!
//! Files are only rewritten when their bytes change, and every write lands
//! through a temporary sibling plus `rename` so a reader never observes a
//! half-written manifest.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use serde::Serialize;
use walkdir::WalkDir;

/// `rel` if it stays below the tree root: no `..`, root or prefix components.
fn contained(rel: &Path) -> io::Result<&Path> {
    let escapes = rel.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes || rel.as_os_str().is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} escapes the output tree", rel.display()),
        ));
    }
    Ok(rel)
}

/// What [`OutputTree::write`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Per-outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl WriteStats {
    pub fn record(&mut self, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Created => self.created += 1,
            WriteOutcome::Updated => self.updated += 1,
            WriteOutcome::Unchanged => self.unchanged += 1,
        }
    }

    /// Files whose content changed on disk.
    pub fn changed(&self) -> usize {
        self.created + self.updated
    }
}

/// A directory that a target owns and writes into.
#[derive(Debug)]
pub struct OutputTree {
    root: PathBuf,
    written: Mutex<BTreeSet<PathBuf>>,
}

impl OutputTree {
    /// Open (and create) the output root.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            written: Mutex::new(BTreeSet::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a subdirectory (e.g. F-Droid's `repo/`).
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn ensure_dir(&self, rel: impl AsRef<Path>) -> io::Result<()> {
        fs::create_dir_all(self.root.join(contained(rel.as_ref())?))
    }

    /// Whether `rel` was already written during this run.
    pub fn was_written(&self, rel: impl AsRef<Path>) -> bool {
        self.lock().contains(rel.as_ref())
    }

    /// Relative paths written during this run, sorted.
    pub fn written(&self) -> Vec<PathBuf> {
        self.lock().iter().cloned().collect()
    }

    /// Write `contents` to `rel` unless the file already holds exactly those bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `rel` is not a plain relative path, or if the file
    /// or its parent directories cannot be written.
    pub fn write(&self, rel: impl AsRef<Path>, contents: &[u8]) -> io::Result<WriteOutcome> {
        let rel = contained(rel.as_ref())?;
        let path = self.root.join(rel);
        let parent = path
            .parent()
            .ok_or_else(|| io::Error::other(format!("no parent for {}", path.display())))?;
        fs::create_dir_all(parent)?;

        self.lock().insert(rel.to_path_buf());

        let outcome = match fs::read(&path) {
            Ok(existing) if existing == contents => return Ok(WriteOutcome::Unchanged),
            Ok(_) => WriteOutcome::Updated,
            Err(e) if e.kind() == io::ErrorKind::NotFound => WriteOutcome::Created,
            Err(e) => return Err(e),
        };

        let file_name = path
            .file_name()
            .ok_or_else(|| io::Error::other(format!("no file name in {}", path.display())))?;
        let tmp = parent.join(format!(".{}.tmp", file_name.to_string_lossy()));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(contents)?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            fs::remove_file(&tmp).ok();
            return Err(e);
        }

        tracing::debug!("{outcome:?}: {}", path.display());
        Ok(outcome)
    }

    /// Pretty JSON (two-space indent) with a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an error on serialization or IO failure.
    pub fn write_json<T: Serialize + ?Sized>(
        &self,
        rel: impl AsRef<Path>,
        value: &T,
    ) -> Result<WriteOutcome> {
        let mut json = serde_json::to_string_pretty(value)?;
        json.push('\n');
        Ok(self.write(rel, json.as_bytes())?)
    }

    /// YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error on serialization or IO failure.
    pub fn write_yaml<T: Serialize + ?Sized>(
        &self,
        rel: impl AsRef<Path>,
        value: &T,
    ) -> Result<WriteOutcome> {
        let yaml = serde_yaml::to_string(value)?;
        Ok(self.write(rel, yaml.as_bytes())?)
    }

    /// Copy an existing file into the tree, idempotently.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or the copy written.
    pub fn copy_in(&self, src: &Path, rel: impl AsRef<Path>) -> io::Result<WriteOutcome> {
        let contents = fs::read(src)?;
        self.write(rel, &contents)
    }

    /// Remove files under `subdir` that were not written during this run.
    ///
    /// Directories emptied by the removal are deleted too. Returns the
    /// removed files, relative to the root.
    ///
    /// # Errors
    ///
    /// Returns an error if a stale file cannot be removed.
    pub fn prune(&self, subdir: impl AsRef<Path>) -> io::Result<Vec<PathBuf>> {
        let base = self.root.join(subdir.as_ref());
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let written = self.lock().clone();
        let mut removed = Vec::new();

        for entry in WalkDir::new(&base).into_iter().filter_map(|entry| entry.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            if !written.contains(rel) {
                fs::remove_file(entry.path())?;
                tracing::info!("Pruned stale file {}", entry.path().display());
                removed.push(rel.to_path_buf());
            }
        }

        // Deepest first so parents empty out before they are visited.
        for entry in WalkDir::new(&base)
            .contents_first(true)
            .min_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
        {
            if entry.file_type().is_dir() {
                // Fails harmlessly when the directory still has content.
                fs::remove_dir(entry.path()).ok();
            }
        }

        Ok(removed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<PathBuf>> {
        self.written.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_identical_write_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let tree = OutputTree::new(dir.path()).unwrap();

        assert_eq!(
            tree.write("Formula/doggy.rb", b"class Doggy\n").unwrap(),
            WriteOutcome::Created
        );
        assert_eq!(
            tree.write("Formula/doggy.rb", b"class Doggy\n").unwrap(),
            WriteOutcome::Unchanged
        );
        assert_eq!(
            tree.write("Formula/doggy.rb", b"class Doggy2\n").unwrap(),
            WriteOutcome::Updated
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("Formula/doggy.rb")).unwrap(),
            "class Doggy2\n"
        );
    }

    #[test]
    fn paths_outside_the_root_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("a/fdroid-repo");
        let tree = OutputTree::new(&root).unwrap();

        for rel in ["metadata/../../escaped.yml", "../escaped.yml", "/tmp/escaped.yml", ""] {
            let err = tree.write(rel, b"x").unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{rel}");
        }
        assert!(tree.ensure_dir("../sibling").is_err());
        assert!(!dir.path().join("a/escaped.yml").exists());
        assert!(!dir.path().join("a/sibling").exists());
        assert!(tree.written().is_empty());
    }

    #[test]
    fn json_has_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let tree = OutputTree::new(dir.path()).unwrap();
        tree.write_json("index.json", &serde_json::json!({"a": 1}))
            .unwrap();

        let text = fs::read_to_string(dir.path().join("index.json")).unwrap();
        assert_eq!(text, "{\n  \"a\": 1\n}\n");
    }

    #[test]
    fn prune_removes_only_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("manifests/OpenLyst/Old/1.0")).unwrap();
        fs::write(dir.path().join("manifests/OpenLyst/Old/1.0/x.yaml"), "old").unwrap();
        fs::write(dir.path().join("README.md"), "keep").unwrap();

        let tree = OutputTree::new(dir.path()).unwrap();
        tree.write("manifests/OpenLyst/New/2.0/y.yaml", b"new")
            .unwrap();

        let removed = tree.prune("manifests").unwrap();
        assert_eq!(
            removed,
            vec![PathBuf::from("manifests/OpenLyst/Old/1.0/x.yaml")]
        );
        assert!(!dir.path().join("manifests/OpenLyst/Old").exists());
        assert!(dir.path().join("manifests/OpenLyst/New/2.0/y.yaml").exists());
        assert!(dir.path().join("README.md").exists());
    }
}
