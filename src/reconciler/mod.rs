//! The verbs that change an environment.
//!
//! Each verb is a fixed sequence of stages. State is persisted after every
//! stage that changes it, and after any failed terraform run, so re-running
//! a verb resumes instead of starting over and `bbl latest-error` shows what
//! terraform printed.
//!
//! 1. `plan` - pick the env-id, write scripts, deployments, cloud-config and
//!    terraform inputs, `terraform init`
//! 2. `up` - plan, apply, create-jumpbox, create-director, cloud-config
//! 3. `rotate` - new jumpbox key, re-converge the director
//! 4. `down` / `destroy` - delete-director, delete-jumpbox, destroy, clean up
//! 5. `create-lbs` / `update-lbs` / `delete-lbs` - change `lb`, re-apply

mod down;
mod lbs;
mod plan;
mod up;

use crate::cloud::{CliConnector, CloudConnector};
use crate::envid::{EnvIdGenerator, EnvIdManager, Generate};
use crate::progress;
use anyhow::{Result, bail};
use boshkit::{
    BoshConnector, CloudConfigManager, CreateEnv, DirectorConnector, ScriptRunner, ShellRunner,
};
use statekit::{Migrator, State, Store, bootstrap};
use tfkit::{BinaryPath, CliExecutor, Executor};

/// Version stamped into `bbl-state.json`.
pub const BBL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Drives terraform, create-env and the director for one state directory.
pub struct Reconciler {
    store: Store,
    terraform: tfkit::Manager,
    create_env: CreateEnv,
    cloud_config: CloudConfigManager,
    env_ids: EnvIdManager,
    /// Show spinners for long stages
    progress: bool,
}

/// The external tools a [`Reconciler`] drives.
pub struct Tools {
    pub terraform: Box<dyn Executor>,
    pub scripts: Box<dyn ScriptRunner>,
    pub director: Box<dyn DirectorConnector>,
    pub clouds: Box<dyn CloudConnector>,
    pub generator: Box<dyn Generate>,
}

impl Tools {
    /// The real binaries and CLIs.
    pub fn system(debug: bool) -> Self {
        Self {
            terraform: Box::new(CliExecutor::new(BinaryPath::new(), debug)),
            scripts: Box::new(ShellRunner::new(debug)),
            director: Box::new(BoshConnector::new(debug)),
            clouds: Box::new(CliConnector),
            generator: Box::new(EnvIdGenerator::from_env()),
        }
    }
}

impl Reconciler {
    pub fn new(store: Store, tools: Tools, debug: bool, progress: bool) -> Self {
        Self {
            terraform: tfkit::Manager::new(tools.terraform, store.clone(), debug),
            create_env: CreateEnv::new(tools.scripts, store.clone()),
            cloud_config: CloudConfigManager::new(tools.director, store.clone()),
            env_ids: EnvIdManager::new(tools.generator, tools.clouds),
            store,
            progress,
        }
    }

    /// Read and migrate `bbl-state.json`.
    pub fn load(&self) -> Result<State> {
        let state = bootstrap::load(self.store.dir())?;
        Ok(Migrator::new(&self.store).migrate(state)?)
    }

    /// Current terraform outputs, empty before the first apply.
    pub fn outputs(&self) -> Result<tfkit::Outputs> {
        Ok(self.terraform.outputs()?)
    }

    fn persist(&self, state: &mut State) -> Result<()> {
        self.store.set(state)?;
        Ok(())
    }

    /// Run `f` under a spinner when progress is enabled.
    fn stage<T, E>(&self, msg: &str, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        progress::stage(self.progress, msg, f)
    }

    /// `terraform apply`, persisting the state whether or not it succeeds.
    fn apply_infrastructure(&self, state: &mut State) -> Result<()> {
        let result = self.stage("applying terraform", || self.terraform.apply(state));
        self.persist(state)?;
        Ok(result?)
    }
}

/// Verbs other than `plan` and `up` need an environment to act on.
pub fn require_environment(state: &State, store: &Store) -> Result<()> {
    if state.is_empty() || state.env_id.is_empty() {
        bail!(
            "bbl-state.json not found in {}, ensure you're running this command in the proper \
             state directory or create a new environment with bbl up",
            store.dir().display()
        );
    }
    Ok(())
}

// ============================================================================
// Test fixture
// ============================================================================
