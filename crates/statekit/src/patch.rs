//! Detection of operator-supplied overrides in a state directory.

use crate::error::Result;
use crate::ownership;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Finds user-managed files. Read-only.
#[derive(Debug, Default)]
pub struct PatchDetector;

impl PatchDetector {
    pub fn new() -> Self {
        Self
    }

    /// Sorted paths, relative to `dir`, of every user-managed file.
    pub fn find(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        let walker = WalkDir::new(dir).min_depth(1).into_iter().filter_entry(|e| {
            e.path()
                .strip_prefix(dir)
                .map(|rel| !ownership::is_managed_dir(rel))
                .unwrap_or(true)
        });

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(dir) else {
                continue;
            };
            if ownership::is_user_managed(relative) {
                found.push(relative.to_path_buf());
            }
        }

        found.sort();
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, relative: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_finds_overrides_sorted() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        for f in [
            "terraform/my-extra.tf",
            "cloud-config/my-ops.yml",
            "create-director-override.sh",
            "vars/my.tfvars",
            "terraform/bbl-template.tf",
            "vars/bbl.tfvars",
            "cloud-config/ops.yml",
            "bosh-deployment/extra.yml",
            "README.md",
        ] {
            touch(dir, f);
        }

        let found = PatchDetector::new().find(dir).unwrap();

        assert_eq!(
            found,
            vec![
                PathBuf::from("cloud-config/my-ops.yml"),
                PathBuf::from("create-director-override.sh"),
                PathBuf::from("terraform/my-extra.tf"),
                PathBuf::from("vars/my.tfvars"),
            ]
        );
    }

    #[test]
    fn test_does_not_mutate() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "terraform/my-extra.tf");

        PatchDetector::new().find(temp.path()).unwrap();

        assert!(temp.path().join("terraform/my-extra.tf").exists());
    }

    #[test]
    fn test_missing_dir_finds_nothing() {
        let temp = TempDir::new().unwrap();
        let found = PatchDetector::new().find(&temp.path().join("none")).unwrap();
        assert!(found.is_empty());
    }
}
