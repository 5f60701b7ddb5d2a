//! Hash command

use anyhow::{Context, Result};
use lyst_schema::Sha256Digest;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Print `<sha256> <path>` for each file, as used in formulae and manifests.
pub fn hash(files: &[PathBuf]) -> Result<()> {
    for file in files {
        let digest = compute_file_hash(file)?;
        println!("{digest} {}", file.display());
    }
    Ok(())
}

/// Compute SHA256 hash of a file (streaming)
fn compute_file_hash(path: &Path) -> Result<Sha256Digest> {
    let mut file =
        std::fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 65536];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(Sha256Digest::from_hasher(hasher))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn hashes_file_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();

        let digest = compute_file_hash(&path).unwrap();
        assert_eq!(
            digest.as_str(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = compute_file_hash(Path::new("/nonexistent/lyst.bin")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/lyst.bin"));
    }
}
