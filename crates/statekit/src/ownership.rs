//! Which files in a state directory belong to bbl and which to the operator.
//!
//! This table is the single source of truth for the garbage collector and the
//! patch detector. A path is bbl-managed if it matches any [`BBL_MANAGED`]
//! pattern (or lies inside a [`BBL_MANAGED_DIRS`] directory). It is
//! user-managed if it matches a [`USER_MANAGED`] pattern and is not
//! bbl-managed. Everything else is unknown.
//!
//! Patterns are matched against `/`-separated paths relative to the state
//! directory, with `*` never crossing a `/`.

use glob::{MatchOptions, Pattern};
use std::path::{Component, Path};
use std::sync::LazyLock;

/// Files regenerated on every run.
pub const BBL_MANAGED: &[&str] = &[
    "bbl-state.json",
    "create-jumpbox.sh",
    "create-director.sh",
    "delete-jumpbox.sh",
    "delete-director.sh",
    "vars/bbl.tfvars",
    "vars/*-state.json",
    "vars/*-vars-file.yml",
    "vars/*-vars-store.yml",
    "vars/cloud-config-vars.yml",
    "vars/terraform.tfstate*",
    "terraform/bbl-template.tf",
    "cloud-config/cloud-config.yml",
    "cloud-config/ops.yml",
    "runtime-config/runtime-config.yml",
];

/// Directories owned by bbl in their entirety.
pub const BBL_MANAGED_DIRS: &[&str] = &[
    "jumpbox-deployment",
    "bosh-deployment",
    "bbl-ops-files",
    "terraform/.terraform",
];

/// Operator overrides that must survive garbage collection.
pub const USER_MANAGED: &[&str] = &[
    "create-*-override.sh",
    "delete-*-override.sh",
    "vars/*.tfvars",
    "terraform/*.tf",
    "cloud-config/*.yml",
];

/// Subdirectories that bbl creates and removes once they are empty.
pub const BBL_SUBDIRS: &[&str] = &["vars", "terraform", "cloud-config", "runtime-config"];

/// Owner of a path in the state directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    BblManaged,
    UserManaged,
    Unknown,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

struct Table {
    managed: Vec<Pattern>,
    user: Vec<Pattern>,
}

static TABLE: LazyLock<Table> = LazyLock::new(|| Table {
    managed: compile(BBL_MANAGED),
    user: compile(USER_MANAGED),
});

fn compile(patterns: &[&str]) -> Vec<Pattern> {
    patterns
        .iter()
        .filter_map(|p| match Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                log::error!("invalid ownership pattern {p}: {e}");
                None
            }
        })
        .collect()
}

/// Render a relative path with `/` separators, or `None` if it escapes the
/// state directory.
fn normalize(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Whether `relative` is one of the wholly bbl-owned directories.
pub fn is_managed_dir(relative: &Path) -> bool {
    normalize(relative).is_some_and(|p| BBL_MANAGED_DIRS.contains(&p.as_str()))
}

/// Whether `relative` matches the bbl-managed table.
pub fn is_bbl_managed(relative: &Path) -> bool {
    let Some(path) = normalize(relative) else {
        return false;
    };

    if BBL_MANAGED_DIRS
        .iter()
        .any(|dir| path == *dir || path.starts_with(&format!("{dir}/")))
    {
        return true;
    }

    TABLE
        .managed
        .iter()
        .any(|p| p.matches_with(&path, MATCH_OPTIONS))
}

/// Whether `relative` is an operator override.
pub fn is_user_managed(relative: &Path) -> bool {
    let Some(path) = normalize(relative) else {
        return false;
    };

    TABLE.user.iter().any(|p| p.matches_with(&path, MATCH_OPTIONS)) && !is_bbl_managed(relative)
}

/// Classify a path relative to the state directory.
pub fn classify(relative: &Path) -> Ownership {
    if is_bbl_managed(relative) {
        Ownership::BblManaged
    } else if is_user_managed(relative) {
        Ownership::UserManaged
    } else {
        Ownership::Unknown
    }
}
