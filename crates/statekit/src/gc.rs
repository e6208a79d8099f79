//! Removal of bbl-managed artifacts from a state directory.

use crate::error::{Error, Result};
use crate::ownership::{self, BBL_MANAGED_DIRS, BBL_SUBDIRS};
use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Deletes exactly the files bbl owns, leaving operator files in place.
#[derive(Debug, Default)]
pub struct GarbageCollector;

impl GarbageCollector {
    pub fn new() -> Self {
        Self
    }

    /// Clean `dir`.
    ///
    /// Managed directories go first, then managed files, then whichever of
    /// the bbl subdirectories are left empty, then `dir` itself if empty.
    pub fn remove(&self, dir: &Path) -> Result<()> {
        if !dir.exists() {
            return Ok(());
        }

        for managed in BBL_MANAGED_DIRS {
            remove_dir_all(&dir.join(managed))?;
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).into_iter().filter_entry(|e| {
            e.path()
                .strip_prefix(dir)
                .map(|rel| !ownership::is_managed_dir(rel))
                .unwrap_or(true)
        }) {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(dir) else {
                continue;
            };
            if ownership::is_bbl_managed(relative) {
                files.push(entry.path().to_path_buf());
            }
        }

        for file in files {
            log::debug!("removing {}", file.display());
            remove_file(&file)?;
        }

        for subdir in BBL_SUBDIRS {
            remove_if_empty(&dir.join(subdir))?;
        }
        remove_if_empty(dir)
    }
}

fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

fn remove_dir_all(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            log::debug!("removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

fn remove_if_empty(path: &Path) -> Result<()> {
    let mut entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::io(path, e)),
    };
    if entries.next().is_some() {
        return Ok(());
    }
    fs::remove_dir(path).map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, relative: &str) {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_removes_everything_bbl_owns() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("env");
        for f in [
            "bbl-state.json",
            "create-jumpbox.sh",
            "delete-director.sh",
            "vars/bbl.tfvars",
            "vars/terraform.tfstate",
            "vars/jumpbox-vars-store.yml",
            "terraform/bbl-template.tf",
            "terraform/.terraform/plugins/p",
            "cloud-config/cloud-config.yml",
            "cloud-config/ops.yml",
            "runtime-config/runtime-config.yml",
            "jumpbox-deployment/jumpbox.yml",
            "bosh-deployment/gcp/cpi.yml",
            "bbl-ops-files/gcp/ops.yml",
        ] {
            touch(&dir, f);
        }

        GarbageCollector::new().remove(&dir).unwrap();

        assert!(!dir.exists());
    }

    #[test]
    fn test_leaves_user_and_unknown_files() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        for f in [
            "bbl-state.json",
            "vars/bbl.tfvars",
            "vars/extra.tfvars",
            "terraform/bbl-template.tf",
            "terraform/extra.tf",
            "cloud-config/ops.yml",
            "cloud-config/my-ops.yml",
            "create-director-override.sh",
            "README.md",
        ] {
            touch(dir, f);
        }

        GarbageCollector::new().remove(dir).unwrap();

        assert!(!dir.join("bbl-state.json").exists());
        assert!(!dir.join("vars/bbl.tfvars").exists());
        assert!(!dir.join("cloud-config/ops.yml").exists());
        assert!(dir.join("vars/extra.tfvars").exists());
        assert!(dir.join("terraform/extra.tf").exists());
        assert!(dir.join("cloud-config/my-ops.yml").exists());
        assert!(dir.join("create-director-override.sh").exists());
        assert!(dir.join("README.md").exists());
    }

    #[test]
    fn test_empty_subdirs_removed_but_populated_kept() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        touch(dir, "vars/bbl.tfvars");
        touch(dir, "terraform/extra.tf");
        fs::create_dir_all(dir.join("runtime-config")).unwrap();

        GarbageCollector::new().remove(dir).unwrap();

        assert!(!dir.join("vars").exists());
        assert!(!dir.join("runtime-config").exists());
        assert!(dir.join("terraform").is_dir());
        assert!(dir.exists());
    }

    #[test]
    fn test_missing_directory_is_ok() {
        let temp = TempDir::new().unwrap();
        GarbageCollector::new()
            .remove(&temp.path().join("gone"))
            .unwrap();
    }

    #[test]
    fn test_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        touch(dir, "bbl-state.json");
        touch(dir, "notes.txt");

        let gc = GarbageCollector::new();
        gc.remove(dir).unwrap();
        gc.remove(dir).unwrap();

        assert!(dir.join("notes.txt").exists());
    }
}
