//! Forward-only migration of older state documents and directory layouts.
//!
//! Every step is idempotent: running it against an already-migrated
//! directory is a no-op. Failures are wrapped with a stable step prefix.

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::State;
use std::fs;
use std::path::Path;

/// A single migration step.
type Step = fn(State, &Store) -> Result<State>;

const STEPS: &[(&str, Step)] = &[
    ("migrating terraform state", migrate_terraform_state),
    ("migrating jumpbox variables", migrate_jumpbox_vars),
    ("migrating director variables", migrate_director_vars),
    ("migrating jumpbox state", migrate_jumpbox_state),
    ("migrating director state", migrate_director_state),
    ("migrating jumpbox vars-file", migrate_jumpbox_vars_file),
    ("migrating director vars-file", migrate_director_vars_file),
    ("migrating terraform vars", migrate_terraform_vars),
    ("migrating cloud config", migrate_cloud_config_dir),
    ("migrating terraform template", migrate_terraform_template),
];

/// Runs every migration step and persists the result once.
pub struct Migrator<'a> {
    store: &'a Store,
}

impl<'a> Migrator<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Migrate `state`. The empty document is returned unchanged.
    pub fn migrate(&self, state: State) -> Result<State> {
        if state.is_empty() {
            return Ok(state);
        }

        let mut state = state;
        for &(step, run) in STEPS {
            log::debug!("{step}");
            state = run(state, self.store).map_err(|e| Error::migration(step, e))?;
        }

        self.store.set(&mut state)?;
        Ok(state)
    }
}

// ============================================================================
// Steps
// ============================================================================

fn migrate_terraform_state(mut state: State, store: &Store) -> Result<State> {
    if state.tf_state.is_empty() {
        return Ok(state);
    }
    let path = store.vars_dir()?.join("terraform.tfstate");
    write(&path, state.tf_state.as_bytes())?;
    state.tf_state.clear();
    Ok(state)
}

fn migrate_jumpbox_vars(mut state: State, store: &Store) -> Result<State> {
    let vars = store.vars_dir()?;
    let target = vars.join("jumpbox-vars-store.yml");
    if !state.jumpbox.variables.is_empty() {
        write(&target, state.jumpbox.variables.as_bytes())?;
        state.jumpbox.variables.clear();
    } else {
        rename_if_exists(&vars.join("jumpbox-variables.yml"), &target)?;
    }
    Ok(state)
}

fn migrate_director_vars(mut state: State, store: &Store) -> Result<State> {
    let vars = store.vars_dir()?;
    let target = vars.join("director-vars-store.yml");
    if !state.bosh.variables.is_empty() {
        write(&target, state.bosh.variables.as_bytes())?;
        state.bosh.variables.clear();
    } else {
        rename_if_exists(&vars.join("director-variables.yml"), &target)?;
    }
    Ok(state)
}

fn migrate_jumpbox_state(mut state: State, store: &Store) -> Result<State> {
    if let Some(inline) = state.jumpbox.state.take() {
        let path = store.vars_dir()?.join("jumpbox-state.json");
        let json = serde_json::to_vec_pretty(&inline).map_err(Error::Serialize)?;
        write(&path, &json)?;
    }
    Ok(state)
}

fn migrate_director_state(mut state: State, store: &Store) -> Result<State> {
    if let Some(inline) = state.bosh.state.take() {
        let path = store.vars_dir()?.join("bosh-state.json");
        let json = serde_json::to_vec_pretty(&inline).map_err(Error::Serialize)?;
        write(&path, &json)?;
    }
    Ok(state)
}

fn migrate_jumpbox_vars_file(state: State, store: &Store) -> Result<State> {
    let vars = store.vars_dir()?;
    rename_if_exists(
        &vars.join("jumpbox-deployment-vars.yml"),
        &vars.join("jumpbox-vars-file.yml"),
    )?;
    Ok(state)
}

fn migrate_director_vars_file(state: State, store: &Store) -> Result<State> {
    let vars = store.vars_dir()?;
    rename_if_exists(
        &vars.join("director-deployment-vars.yml"),
        &vars.join("director-vars-file.yml"),
    )?;
    Ok(state)
}

fn migrate_terraform_vars(state: State, store: &Store) -> Result<State> {
    let vars = store.vars_dir()?;
    rename_if_exists(&vars.join("terraform.tfvars"), &vars.join("bbl.tfvars"))?;
    Ok(state)
}

fn migrate_cloud_config_dir(state: State, store: &Store) -> Result<State> {
    let legacy = store.legacy_bbl_dir();
    let legacy_cloud_config = legacy.join("cloudconfig");

    if legacy_cloud_config.is_dir() {
        let target = store.cloud_config_dir()?;
        let entries =
            fs::read_dir(&legacy_cloud_config).map_err(|e| Error::io(&legacy_cloud_config, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&legacy_cloud_config, e))?;
            let source = entry.path();
            if !source.is_file() {
                continue;
            }
            let dest = target.join(entry.file_name());
            fs::copy(&source, &dest).map_err(|e| Error::io(&dest, e))?;
        }
    }

    if legacy.exists() {
        fs::remove_dir_all(&legacy).map_err(|e| Error::io(&legacy, e))?;
    }
    Ok(state)
}

fn migrate_terraform_template(state: State, store: &Store) -> Result<State> {
    let terraform = store.terraform_dir()?;
    rename_if_exists(
        &terraform.join("template.tf"),
        &terraform.join("bbl-template.tf"),
    )?;
    Ok(state)
}

// ============================================================================
// Helpers
// ============================================================================

fn write(path: &Path, content: &[u8]) -> Result<()> {
    fs::write(path, content).map_err(|e| Error::io(path, e))
}

fn rename_if_exists(from: &Path, to: &Path) -> Result<()> {
    if !from.exists() {
        return Ok(());
    }
    log::debug!("renaming {} to {}", from.display(), to.display());
    fs::rename(from, to).map_err(|e| Error::io(from, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap;
    use crate::types::{Iaas, IaasConfig, STATE_SCHEMA};
    use serde_json::json;
    use tempfile::TempDir;

    fn legacy_state() -> State {
        let mut state = State {
            version: 8,
            iaas: Some(IaasConfig::empty(Iaas::Gcp)),
            env_id: "legacy".to_string(),
            tf_state: "{\"tf\":true}".to_string(),
            ..State::default()
        };
        state.jumpbox.variables = "jumpbox_ssh: key".to_string();
        state.bosh.variables = "admin_password: pw".to_string();
        state.jumpbox.state = json!({"current_vm_cid": "vm-1"}).as_object().cloned();
        state.bosh.state = json!({"current_vm_cid": "vm-2"}).as_object().cloned();
        state
    }

    #[test]
    fn test_empty_state_is_untouched() {
        let temp = TempDir::new().unwrap();
        let store = Store::new(temp.path(), "7.0.0");

        let state = Migrator::new(&store).migrate(State::default()).unwrap();

        assert!(state.is_empty());
        assert!(!temp.path().join("vars").exists());
        assert!(!temp.path().join("bbl-state.json").exists());
    }

    #[test]
    fn test_inline_fields_move_to_vars() {
        let temp = TempDir::new().unwrap();
        let store = Store::new(temp.path(), "7.0.0");

        let state = Migrator::new(&store).migrate(legacy_state()).unwrap();
        let vars = temp.path().join("vars");

        assert_eq!(
            fs::read_to_string(vars.join("terraform.tfstate")).unwrap(),
            "{\"tf\":true}"
        );
        assert_eq!(
            fs::read_to_string(vars.join("jumpbox-vars-store.yml")).unwrap(),
            "jumpbox_ssh: key"
        );
        assert_eq!(
            fs::read_to_string(vars.join("director-vars-store.yml")).unwrap(),
            "admin_password: pw"
        );
        let bosh_state: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(vars.join("bosh-state.json")).unwrap())
                .unwrap();
        assert_eq!(bosh_state["current_vm_cid"], "vm-2");
        assert!(vars.join("jumpbox-state.json").exists());

        assert!(state.tf_state.is_empty());
        assert!(state.jumpbox.variables.is_empty());
        assert!(state.bosh.variables.is_empty());
        assert!(state.jumpbox.state.is_none());
        assert!(state.bosh.state.is_none());
        assert_eq!(state.version, STATE_SCHEMA);

        let persisted = bootstrap::load(temp.path()).unwrap();
        assert_eq!(persisted, state);
    }

    #[test]
    fn test_legacy_file_names_are_renamed() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        fs::create_dir_all(dir.join("vars")).unwrap();
        fs::create_dir_all(dir.join("terraform")).unwrap();
        for f in [
            "vars/jumpbox-variables.yml",
            "vars/director-variables.yml",
            "vars/jumpbox-deployment-vars.yml",
            "vars/director-deployment-vars.yml",
            "vars/terraform.tfvars",
            "terraform/template.tf",
        ] {
            fs::write(dir.join(f), f).unwrap();
        }
        let store = Store::new(dir, "7.0.0");
        let state = State {
            version: 12,
            env_id: "renames".to_string(),
            ..State::default()
        };

        Migrator::new(&store).migrate(state).unwrap();

        for (gone, present, content) in [
            (
                "vars/jumpbox-variables.yml",
                "vars/jumpbox-vars-store.yml",
                "vars/jumpbox-variables.yml",
            ),
            (
                "vars/director-variables.yml",
                "vars/director-vars-store.yml",
                "vars/director-variables.yml",
            ),
            (
                "vars/jumpbox-deployment-vars.yml",
                "vars/jumpbox-vars-file.yml",
                "vars/jumpbox-deployment-vars.yml",
            ),
            (
                "vars/director-deployment-vars.yml",
                "vars/director-vars-file.yml",
                "vars/director-deployment-vars.yml",
            ),
            ("vars/terraform.tfvars", "vars/bbl.tfvars", "vars/terraform.tfvars"),
            (
                "terraform/template.tf",
                "terraform/bbl-template.tf",
                "terraform/template.tf",
            ),
        ] {
            assert!(!dir.join(gone).exists(), "{gone} still exists");
            assert_eq!(fs::read_to_string(dir.join(present)).unwrap(), content);
        }
    }

    #[test]
    fn test_legacy_cloud_config_dir() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        fs::create_dir_all(dir.join(".bbl/cloudconfig")).unwrap();
        fs::write(dir.join(".bbl/cloudconfig/cloud-config.yml"), "azs: []").unwrap();
        fs::write(dir.join(".bbl/cloudconfig/ops.yml"), "[]").unwrap();
        let store = Store::new(dir, "7.0.0");
        let state = State {
            version: 10,
            env_id: "cc".to_string(),
            ..State::default()
        };

        Migrator::new(&store).migrate(state).unwrap();

        assert!(!dir.join(".bbl").exists());
        assert_eq!(
            fs::read_to_string(dir.join("cloud-config/cloud-config.yml")).unwrap(),
            "azs: []"
        );
        assert!(dir.join("cloud-config/ops.yml").exists());
    }

    #[test]
    fn test_migration_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = Store::new(temp.path(), "7.0.0");
        let migrator = Migrator::new(&store);

        let once = migrator.migrate(legacy_state()).unwrap();
        let tfstate = fs::read_to_string(temp.path().join("vars/terraform.tfstate")).unwrap();
        let twice = migrator.migrate(once.clone()).unwrap();

        assert_eq!(once, twice);
        assert_eq!(
            fs::read_to_string(temp.path().join("vars/terraform.tfstate")).unwrap(),
            tfstate
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_carries_step_prefix() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("vars"), "not a directory").unwrap();
        let store = Store::new(temp.path(), "7.0.0");

        let err = Migrator::new(&store).migrate(legacy_state()).unwrap_err();

        assert!(err.to_string().starts_with("migrating terraform state: "));
    }
}
