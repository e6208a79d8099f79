//! Loading and version-gating of `bbl-state.json`.

use crate::error::{Error, Result};
use crate::store::STATE_FILE;
use crate::types::{FALLBACK_BBL_VERSION, MIN_STATE_SCHEMA, STATE_SCHEMA, State};
use std::fs;
use std::io;
use std::path::Path;

/// Read the state document from `dir`.
///
/// A missing file yields the empty document. Documents outside the supported
/// schema range are refused without touching the file.
pub fn load(dir: &Path) -> Result<State> {
    let path = dir.join(STATE_FILE);

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("no state file at {}", path.display());
            return Ok(State::default());
        }
        Err(e) => return Err(Error::io(&path, e)),
    };

    let mut state: State = serde_json::from_str(&content).map_err(|source| Error::Parse {
        path: path.clone(),
        source,
    })?;

    if state.bbl_version.is_empty() {
        state.bbl_version = FALLBACK_BBL_VERSION.to_string();
    }

    if state.version < MIN_STATE_SCHEMA {
        return Err(Error::Incompatible);
    }

    if state.version > STATE_SCHEMA {
        return Err(Error::UpgradeRequired {
            bbl_version: state.bbl_version,
        });
    }

    if state.version < STATE_SCHEMA {
        log::warn!(
            "state file {} uses schema {}; the next `bbl up` will rewrite it as schema {}",
            path.display(),
            state.version,
            STATE_SCHEMA
        );
    }

    Ok(state)
}
