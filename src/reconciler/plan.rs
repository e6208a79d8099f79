use super::Reconciler;
use crate::cli::UpArgs;
use crate::{config, ui};
use anyhow::{Result, bail};
use statekit::{PatchDetector, State};

impl Reconciler {
    /// Lay out everything `up` would use without creating anything.
    pub fn plan(&self, state: State, args: &UpArgs) -> Result<State> {
        let mut state = self.prepare(state, args)?;
        self.write_plan(&mut state)?;
        Ok(state)
    }

    /// Merge flags, validate credentials and settle the env-id. Nothing is
    /// written, so a rejected name leaves the directory untouched.
    pub(super) fn prepare(&self, mut state: State, args: &UpArgs) -> Result<State> {
        config::apply_flags(&mut state, &args.iaas)?;
        config::validate(&state)?;

        if args.no_director && !state.no_director {
            if state.bosh.is_deployed() {
                bail!(
                    "Director already exists, you must re-create your environment to use \
                     \"--no-director\""
                );
            }
            state.no_director = true;
        }

        if !state.env_id.is_empty() && !args.name.is_empty() && args.name != state.env_id {
            bail!(
                "The director name cannot be changed for an existing environment. \
                 Current name is {}.",
                state.env_id
            );
        }

        state.env_id = self.env_ids.sync(&state, &args.name)?;
        log::debug!("using env-id {}", state.env_id);
        Ok(state)
    }

    /// Write scripts, deployments, cloud-config and terraform inputs, then
    /// `terraform init`. Safe to repeat.
    pub(super) fn write_plan(&self, state: &mut State) -> Result<()> {
        ui::patches(&PatchDetector::new().find(self.store.dir())?);

        self.persist(state)?;
        self.create_env.initialize(state)?;
        self.cloud_config.initialize(state)?;
        let init = self.stage("initializing terraform", || self.terraform.init(state));
        self.persist(state)?;
        Ok(init?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixture::{Fixture, gcp_args};
    use crate::cloud::mock::MockCloud;
    use statekit::STATE_SCHEMA;

    #[test]
    fn test_plan_lays_out_state_dir() {
        let fixture = Fixture::new();
        let reconciler = fixture.reconciler();

        let state = reconciler
            .plan(reconciler.load().unwrap(), &gcp_args("demo"))
            .unwrap();

        assert_eq!(state.env_id, "demo");
        assert_eq!(state.version, STATE_SCHEMA);
        assert!(!state.id.is_empty());
        for file in [
            "bbl-state.json",
            "create-jumpbox.sh",
            "create-director.sh",
            "delete-jumpbox.sh",
            "delete-director.sh",
            "vars/bbl.tfvars",
            "terraform/bbl-template.tf",
            "cloud-config/cloud-config.yml",
            "cloud-config/ops.yml",
            "runtime-config/runtime-config.yml",
        ] {
            assert!(fixture.path(file).exists(), "{file} missing");
        }
        assert_eq!(fixture.terraform.subcommands(), vec!["init"]);
        assert!(fixture.scripts.calls().is_empty());
    }

    #[test]
    fn test_plan_is_idempotent() {
        let fixture = Fixture::new();
        let args = gcp_args("demo");

        let reconciler = fixture.reconciler();
        reconciler.plan(reconciler.load().unwrap(), &args).unwrap();
        let first = fixture.snapshot();

        let reconciler = fixture.reconciler();
        reconciler.plan(reconciler.load().unwrap(), &args).unwrap();

        assert_eq!(fixture.snapshot(), first);
    }

    #[test]
    fn test_plan_keeps_user_files() {
        let fixture = Fixture::new();
        let reconciler = fixture.reconciler();
        reconciler.plan(reconciler.load().unwrap(), &gcp_args("demo")).unwrap();

        std::fs::write(fixture.path("cloud-config/my-ops.yml"), "- type: remove\n").unwrap();
        std::fs::write(fixture.path("create-jumpbox-override.sh"), "#!/bin/sh\n").unwrap();

        let reconciler = fixture.reconciler();
        reconciler.plan(reconciler.load().unwrap(), &gcp_args("demo")).unwrap();

        assert!(fixture.path("cloud-config/my-ops.yml").exists());
        assert!(fixture.path("create-jumpbox-override.sh").exists());
    }

    #[test]
    fn test_name_cannot_change() {
        let fixture = Fixture::new();
        let reconciler = fixture.reconciler();
        reconciler.plan(reconciler.load().unwrap(), &gcp_args("demo")).unwrap();

        let reconciler = fixture.reconciler();
        let err = reconciler
            .plan(reconciler.load().unwrap(), &gcp_args("other"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "The director name cannot be changed for an existing environment. \
             Current name is demo."
        );
    }

    #[test]
    fn test_collision_writes_nothing() {
        let fixture = Fixture::with_cloud(MockCloud::new().with_existing("existing-network"));
        let reconciler = fixture.reconciler();

        let err = reconciler
            .plan(reconciler.load().unwrap(), &gcp_args("existing"))
            .unwrap_err();

        assert!(err.to_string().contains("already exists with the name 'existing'"));
        assert!(fixture.terraform.calls().is_empty());
        assert!(fixture.snapshot().is_empty());
    }

    #[test]
    fn test_generated_name() {
        let fixture = Fixture::new();
        let reconciler = fixture.reconciler();

        let state = reconciler
            .plan(reconciler.load().unwrap(), &gcp_args(""))
            .unwrap();

        assert!(state.env_id.starts_with("bbl-env-"));
        assert!(crate::envid::is_valid(&state.env_id));
    }
}
