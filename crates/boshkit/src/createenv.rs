//! Creating and deleting the jumpbox and director with `bosh create-env`.
//!
//! [`CreateEnv`] writes the wrapper scripts and their inputs, runs them
//! through a [`ScriptRunner`], and records the results in the state.

use crate::deployments;
use crate::error::{Error, Result};
use crate::scripts::{self, Script};
use crate::vars::{self, Target};
use statekit::{Bosh, Jumpbox, Secret, State, Store};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use tfkit::{Outputs, TailBuffer};

/// How much of a failed script's output is kept in the error.
const DETAIL_CAPACITY: usize = 16 * 1024;

/// Runs one create-env wrapper script.
pub trait ScriptRunner {
    /// Run `script` with the state directory as working directory and `env`
    /// added to the environment.
    fn run(&self, script: &Path, dir: &Path, env: &[(String, Secret)]) -> Result<()>;
}

// ============================================================================
// ShellRunner
// ============================================================================

/// Executes scripts directly. Output is shown only with `debug`.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    debug: bool,
}

impl ShellRunner {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }
}

impl ScriptRunner for ShellRunner {
    fn run(&self, script: &Path, dir: &Path, env: &[(String, Secret)]) -> Result<()> {
        let name = script
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::debug!("running {}", script.display());

        let mut cmd = Command::new(script);
        cmd.current_dir(dir)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.expose())))
            .stdin(Stdio::null());

        let spawn_error = |source| Error::Spawn {
            script: name.clone(),
            source,
        };

        let (code, detail) = if self.debug {
            let status = cmd.status().map_err(spawn_error)?;
            (status.code(), String::new())
        } else {
            let output = cmd.output().map_err(spawn_error)?;
            let mut tail = TailBuffer::new(DETAIL_CAPACITY);
            tail.push(&output.stdout);
            tail.push(&output.stderr);
            (output.status.code(), tail.contents().trim_end().to_string())
        };

        if code == Some(0) {
            Ok(())
        } else {
            Err(Error::Script {
                script: name,
                code,
                detail,
            })
        }
    }
}

// ============================================================================
// MockScriptRunner
// ============================================================================

/// One invocation seen by [`MockScriptRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptCall {
    /// File name of the script that ran, e.g. `create-jumpbox.sh`
    pub script: String,
    /// Names of the environment variables passed
    pub env: Vec<String>,
}

#[derive(Debug, Default)]
struct MockInner {
    calls: Vec<ScriptCall>,
    failures: HashMap<String, i32>,
    writes: HashMap<String, Vec<(String, String)>>,
}

/// Records script invocations instead of running them.
#[derive(Debug, Clone, Default)]
pub struct MockScriptRunner {
    inner: Arc<Mutex<MockInner>>,
}

impl MockScriptRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `script` (a file name) exit with `code`.
    pub fn fail(&self, script: &str, code: i32) -> &Self {
        self.lock().failures.insert(script.to_string(), code);
        self
    }

    /// When `script` runs, write `contents` to `relative` under the state
    /// directory, the way create-env writes its state and vars-store.
    pub fn writes(&self, script: &str, relative: &str, contents: &str) -> &Self {
        self.lock()
            .writes
            .entry(script.to_string())
            .or_default()
            .push((relative.to_string(), contents.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<ScriptCall> {
        self.lock().calls.clone()
    }

    /// File names of the scripts run, in order.
    pub fn scripts(&self) -> Vec<String> {
        self.lock().calls.iter().map(|c| c.script.clone()).collect()
    }
}

impl ScriptRunner for MockScriptRunner {
    fn run(&self, script: &Path, dir: &Path, env: &[(String, Secret)]) -> Result<()> {
        let name = script
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut inner = self.lock();
        inner.calls.push(ScriptCall {
            script: name.clone(),
            env: env.iter().map(|(k, _)| k.clone()).collect(),
        });

        for (relative, contents) in inner.writes.get(&name).into_iter().flatten() {
            let path = dir.join(relative);
            fs::write(&path, contents).map_err(|e| Error::io(&path, e))?;
        }

        match inner.failures.get(&name) {
            Some(&code) => Err(Error::Script {
                script: name,
                code: Some(code),
                detail: String::new(),
            }),
            None => Ok(()),
        }
    }
}

// ============================================================================
// CreateEnv
// ============================================================================

/// Where each VM's create-env inputs and outputs live under `vars/`.
struct Files {
    vars_file: &'static str,
    vars_store: &'static str,
    state_file: &'static str,
}

const JUMPBOX_FILES: Files = Files {
    vars_file: "jumpbox-vars-file.yml",
    vars_store: "jumpbox-vars-store.yml",
    state_file: "jumpbox-state.json",
};

const DIRECTOR_FILES: Files = Files {
    vars_file: "director-vars-file.yml",
    vars_store: "director-vars-store.yml",
    state_file: "bosh-state.json",
};

/// Runs the jumpbox and director scripts in order.
pub struct CreateEnv {
    runner: Box<dyn ScriptRunner>,
    store: Store,
}

impl CreateEnv {
    pub fn new(runner: Box<dyn ScriptRunner>, store: Store) -> Self {
        Self { runner, store }
    }

    /// Write the scripts and the vendored deployments.
    pub fn initialize(&self, state: &State) -> Result<()> {
        let iaas = state.iaas_kind().ok_or(Error::NoIaas)?;
        deployments::write(&self.store, iaas)?;
        scripts::write_all(&self.store.state_dir()?, iaas)
    }

    /// Deploy (or converge) the jumpbox and record its address.
    pub fn create_jumpbox(&self, state: &mut State, outputs: &Outputs) -> Result<()> {
        self.write_vars_file(state, outputs, Target::Jumpbox)?;
        self.run(state, Script::CreateJumpbox)?;

        state.jumpbox.url = outputs.get_string("jumpbox_url")?;
        log::info!("jumpbox available at {}", state.jumpbox.url);
        Ok(())
    }

    /// Deploy (or converge) the director and record its credentials.
    pub fn create_director(&self, state: &mut State, outputs: &Outputs) -> Result<()> {
        if state.no_director {
            log::info!("no-director is set, skipping create-director");
            return Ok(());
        }

        self.write_vars_file(state, outputs, Target::Director)?;
        self.run(state, Script::CreateDirector)?;

        let store_path = self.vars_path(DIRECTOR_FILES.vars_store)?;
        let director_vars = vars::read_store(&store_path)?;
        state.bosh.director_name = state.director_name();
        state.bosh.director_address = outputs.get_string("director_address")?;
        state.bosh.director_username = "admin".to_string();
        state.bosh.director_password =
            vars::require(&director_vars, "admin_password", &store_path)?;
        state.bosh.director_ssl_ca =
            vars::require(&director_vars, "director_ssl.ca", &store_path)?;
        state.bosh.director_ssl_certificate =
            vars::require(&director_vars, "director_ssl.certificate", &store_path)?;
        state.bosh.director_ssl_private_key =
            vars::require(&director_vars, "director_ssl.private_key", &store_path)?;
        Ok(())
    }

    /// Delete the director. Nothing happens when it was never created.
    pub fn delete_director(&self, state: &mut State) -> Result<()> {
        if state.no_director {
            return Ok(());
        }
        if !self.vars_path(DIRECTOR_FILES.state_file)?.exists() && !state.bosh.is_deployed() {
            log::info!("no director to delete");
            return Ok(());
        }

        self.run(state, Script::DeleteDirector)?;
        state.bosh = Bosh::default();
        Ok(())
    }

    /// Delete the jumpbox. Nothing happens when it was never created.
    pub fn delete_jumpbox(&self, state: &mut State) -> Result<()> {
        if !self.vars_path(JUMPBOX_FILES.state_file)?.exists() && state.jumpbox.url.is_empty() {
            log::info!("no jumpbox to delete");
            return Ok(());
        }

        self.run(state, Script::DeleteJumpbox)?;
        state.jumpbox = Jumpbox::default();
        Ok(())
    }

    /// Drop the jumpbox SSH key from the vars-store and re-run
    /// create-jumpbox so a new one is generated.
    pub fn rotate_jumpbox_key(&self, state: &mut State, outputs: &Outputs) -> Result<()> {
        let store_path = self.vars_path(JUMPBOX_FILES.vars_store)?;
        if !vars::remove_key(&store_path, "jumpbox_ssh")? {
            log::warn!("no jumpbox_ssh key in {}", store_path.display());
        }
        self.create_jumpbox(state, outputs)
    }

    fn write_vars_file(&self, state: &State, outputs: &Outputs, target: Target) -> Result<()> {
        let files = files(target);
        let mapping = vars::vars_file(state, outputs, target);
        vars::write_mapping(&self.vars_path(files.vars_file)?, &mapping)
    }

    fn run(&self, state: &State, script: Script) -> Result<()> {
        let dir = self.store.state_dir()?;
        let files = if script.is_director() {
            &DIRECTOR_FILES
        } else {
            &JUMPBOX_FILES
        };

        let mut env = vec![
            path_env("BBL_STATE_DIR", &dir),
            path_env("BBL_VARS_FILE", &self.vars_path(files.vars_file)?),
            path_env("BBL_VARS_STORE", &self.vars_path(files.vars_store)?),
            path_env("BBL_STATE_FILE", &self.vars_path(files.state_file)?),
        ];
        env.extend(scripts::credential_env(state));

        let path = scripts::resolve(&dir, script);
        self.runner.run(&path, &dir, &env)
    }

    fn vars_path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.store.vars_dir()?.join(name))
    }
}

fn files(target: Target) -> &'static Files {
    match target {
        Target::Jumpbox => &JUMPBOX_FILES,
        Target::Director => &DIRECTOR_FILES,
    }
}

fn path_env(name: &str, path: &Path) -> (String, Secret) {
    (name.to_string(), Secret::new(path.display().to_string()))
}
