//! State directory layout and persistence of `bbl-state.json`.

use crate::error::{Error, Result};
use crate::gc::GarbageCollector;
use crate::types::{STATE_SCHEMA, State};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};

/// Name of the state document inside the state directory.
pub const STATE_FILE: &str = "bbl-state.json";

/// Legacy hidden directory used before schema 14.
pub const LEGACY_BBL_DIR: &str = ".bbl";

/// Owner of a state directory.
///
/// All layout paths are derived from the directory alone; none depend on
/// the environment's `id`.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
    bbl_version: String,
}

impl Store {
    /// Create a store for `dir`, stamping `bbl_version` on every write.
    pub fn new(dir: impl Into<PathBuf>, bbl_version: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            bbl_version: bbl_version.into(),
        }
    }

    /// Root of the state directory (not created).
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of `bbl-state.json`.
    pub fn state_file(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    /// Persist `state`.
    ///
    /// The all-default document removes the bbl-managed contents of the state
    /// directory instead of being written. Otherwise `version`, `bblVersion`
    /// and (on first write) `id` are stamped into `state` before it is
    /// written atomically with mode 0644.
    pub fn set(&self, state: &mut State) -> Result<()> {
        if !self.dir.is_dir() {
            return Err(Error::StateDirMissing(self.dir.clone()));
        }

        if state.is_empty() {
            log::debug!("empty state, removing bbl files from {}", self.dir.display());
            return GarbageCollector::new().remove(&self.dir);
        }

        state.version = STATE_SCHEMA;
        state.bbl_version = self.bbl_version.clone();
        if state.id.is_empty() {
            state.id = uuid::Uuid::new_v4().to_string();
        }

        let content = to_tab_indented_json(state)?;
        let path = self.state_file();
        let tmp = self.dir.join(format!(".{STATE_FILE}.tmp"));

        fs::write(&tmp, content).map_err(|e| Error::io(&tmp, e))?;
        #[cfg(unix)]
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o644))
            .map_err(|e| Error::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| Error::io(&path, e))?;

        log::debug!("saved state to {}", path.display());
        Ok(())
    }

    /// The state directory itself, created if absent.
    pub fn state_dir(&self) -> Result<PathBuf> {
        ensure_dir(self.dir.clone())
    }

    pub fn vars_dir(&self) -> Result<PathBuf> {
        ensure_dir(self.dir.join("vars"))
    }

    pub fn terraform_dir(&self) -> Result<PathBuf> {
        ensure_dir(self.dir.join("terraform"))
    }

    pub fn cloud_config_dir(&self) -> Result<PathBuf> {
        ensure_dir(self.dir.join("cloud-config"))
    }

    pub fn runtime_config_dir(&self) -> Result<PathBuf> {
        ensure_dir(self.dir.join("runtime-config"))
    }

    pub fn jumpbox_deployment_dir(&self) -> Result<PathBuf> {
        ensure_dir(self.dir.join("jumpbox-deployment"))
    }

    pub fn director_deployment_dir(&self) -> Result<PathBuf> {
        ensure_dir(self.dir.join("bosh-deployment"))
    }

    pub fn ops_files_dir(&self) -> Result<PathBuf> {
        ensure_dir(self.dir.join("bbl-ops-files"))
    }

    /// Pre-schema-14 `.bbl/` directory. Never created.
    pub fn legacy_bbl_dir(&self) -> PathBuf {
        self.dir.join(LEGACY_BBL_DIR)
    }
}

/// Serialize with tab indentation to match historical state files.
fn to_tab_indented_json(state: &State) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    serde::Serialize::serialize(state, &mut serializer).map_err(Error::Serialize)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Create `path` (and parents) with mode 0755 unless it is already a
/// directory.
fn ensure_dir(path: PathBuf) -> Result<PathBuf> {
    if path.is_dir() {
        return Ok(path);
    }
    if path.exists() {
        return Err(Error::NotADirectory(path));
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o755);
    builder.create(&path).map_err(|e| Error::io(&path, e))?;
    Ok(path)
}
