use super::{Reconciler, require_environment};
use anyhow::{Context, Result};
use statekit::{GarbageCollector, State};
use std::fs;

impl Reconciler {
    /// Delete the director, the jumpbox and the infrastructure, then remove
    /// bbl's files. `bbl-state.json` is kept so `up` recreates the same
    /// environment.
    pub fn down(&self, state: State) -> Result<State> {
        let mut state = self.teardown(state)?;

        let dir = self.store.dir();
        GarbageCollector::new().remove(dir)?;
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to recreate {}", dir.display()))?;
        self.persist(&mut state)?;
        Ok(state)
    }

    /// [`Reconciler::down`], then delete the state document too.
    pub fn destroy(&self, state: State) -> Result<()> {
        self.teardown(state)?;
        self.persist(&mut State::default())
    }

    fn teardown(&self, state: State) -> Result<State> {
        require_environment(&state, &self.store)?;
        let mut state = state;

        // Scripts may have been removed by hand since the last run.
        self.create_env.initialize(&state)?;

        self.stage("deleting director", || {
            self.create_env.delete_director(&mut state)
        })?;
        self.persist(&mut state)?;

        self.stage("deleting jumpbox", || {
            self.create_env.delete_jumpbox(&mut state)
        })?;
        self.persist(&mut state)?;

        let result = self.stage("destroying infrastructure", || {
            self.terraform.destroy(&mut state)
        });
        self.persist(&mut state)?;
        result?;
        Ok(state)
    }
}
