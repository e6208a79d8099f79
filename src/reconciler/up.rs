use super::{Reconciler, require_environment};
use crate::cli::UpArgs;
use anyhow::{Result, bail};
use statekit::State;

impl Reconciler {
    /// Create or converge the whole environment.
    pub fn up(&self, state: State, args: &UpArgs) -> Result<State> {
        let mut state = self.prepare(state, args)?;
        let version = match self.terraform.validate_version(&mut state) {
            Ok(version) => version,
            Err(e) => {
                self.persist(&mut state)?;
                return Err(e.into());
            }
        };
        log::debug!("terraform {version}");

        self.write_plan(&mut state)?;
        self.apply_infrastructure(&mut state)?;
        self.converge_vms(&mut state)?;
        Ok(state)
    }

    /// Generate a new jumpbox SSH key and re-deploy the director through it.
    pub fn rotate(&self, state: State) -> Result<State> {
        require_environment(&state, &self.store)?;
        if state.jumpbox.url.is_empty() {
            bail!("There is no jumpbox to rotate, run `bbl up` first");
        }

        let mut state = state;
        let outputs = self.terraform.outputs()?;
        self.create_env.initialize(&state)?;

        self.stage("rotating jumpbox ssh key", || {
            self.create_env.rotate_jumpbox_key(&mut state, &outputs)
        })?;
        self.persist(&mut state)?;

        self.stage("re-deploying director", || {
            self.create_env.create_director(&mut state, &outputs)
        })?;
        self.persist(&mut state)?;
        Ok(state)
    }

    /// create-jumpbox, create-director and the cloud-config, against the
    /// current terraform outputs.
    fn converge_vms(&self, state: &mut State) -> Result<()> {
        let outputs = self.terraform.outputs()?;

        self.stage("creating jumpbox", || {
            self.create_env.create_jumpbox(state, &outputs)
        })?;
        self.persist(state)?;

        if state.no_director {
            log::info!("no-director is set, skipping director and cloud-config");
            return Ok(());
        }

        self.stage("creating director", || {
            self.create_env.create_director(state, &outputs)
        })?;
        self.persist(state)?;

        self.stage("updating cloud-config", || {
            self.cloud_config.update(state, &outputs)
        })?;
        Ok(())
    }

    /// Re-apply terraform and, when a director exists, its cloud-config.
    /// Used when the load balancers change.
    pub(super) fn reapply(&self, state: &mut State) -> Result<()> {
        self.write_plan(state)?;
        self.apply_infrastructure(state)?;

        if state.no_director || !state.bosh.is_deployed() {
            return Ok(());
        }
        let outputs = self.terraform.outputs()?;
        self.stage("updating cloud-config", || {
            self.cloud_config.update(state, &outputs)
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixture::{Fixture, gcp_args};
    use boshkit::DirectorCall;
    use statekit::{STATE_SCHEMA, bootstrap};
    use std::fs;
    use tfkit::MockResponse;

    #[test]
    fn test_fresh_up() {
        let fixture = Fixture::new();

        let state = fixture.up(&gcp_args("demo")).unwrap();

        let saved = bootstrap::load(fixture.dir()).unwrap();
        assert_eq!(saved, state);
        assert_eq!(saved.version, STATE_SCHEMA);
        assert_eq!(saved.env_id, "demo");
        assert_eq!(saved.iaas_kind().map(|i| i.as_str()), Some("gcp"));
        assert!(uuid_like(&saved.id));
        assert_eq!(saved.jumpbox.url, "34.1.2.3:22");
        assert_eq!(saved.bosh.director_address, "https://10.0.0.6:25555");
        assert_eq!(saved.bosh.director_password, "admin-pw");

        assert!(fixture.path("vars/bbl.tfvars").exists());
        assert!(fixture.path("create-jumpbox.sh").exists());
        assert!(fixture.path("create-director.sh").exists());

        assert_eq!(
            fixture.terraform.subcommands(),
            vec!["version", "init", "init", "apply", "output"]
        );
        assert_eq!(
            fixture.scripts.scripts(),
            vec!["create-jumpbox.sh", "create-director.sh"]
        );
        let calls = fixture.director.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], DirectorCall::UpdateCloudConfig { .. }));
        assert!(matches!(
            &calls[1],
            DirectorCall::UpdateRuntimeConfig { name, .. } if name == "dns"
        ));
        assert!(fixture.path("vars/cloud-config-vars.yml").exists());
    }

    fn uuid_like(id: &str) -> bool {
        id.len() == 36 && id.chars().filter(|c| *c == '-').count() == 4
    }

    #[test]
    fn test_up_no_director() {
        let fixture = Fixture::new();
        let mut args = gcp_args("demo");
        args.no_director = true;

        let state = fixture.up(&args).unwrap();

        assert!(state.no_director);
        assert_eq!(fixture.scripts.scripts(), vec!["create-jumpbox.sh"]);
        assert!(fixture.director.calls().is_empty());
        assert!(!state.bosh.is_deployed());
    }

    #[test]
    fn test_failed_apply_persists_and_resumes() {
        let fixture = Fixture::new();
        fixture.terraform.respond(
            "apply",
            MockResponse::failure(1, "Error: quota exceeded").tf_state("half-done"),
        );

        let err = fixture.up(&gcp_args("demo")).unwrap_err();
        assert!(err.downcast_ref::<tfkit::Error>().is_some());

        let saved = bootstrap::load(fixture.dir()).unwrap();
        assert_eq!(saved.env_id, "demo");
        assert_eq!(saved.latest_tf_output, "Error: quota exceeded");
        assert!(saved.tf_state.is_empty());
        assert_eq!(
            fs::read_to_string(fixture.path("vars/terraform.tfstate")).unwrap(),
            "half-done"
        );
        assert!(fixture.scripts.calls().is_empty());

        fixture
            .terraform
            .respond("apply", MockResponse::success("Apply complete!"));
        let state = fixture.up(&gcp_args("")).unwrap();

        assert_eq!(state.env_id, "demo");
        assert_eq!(state.latest_tf_output, "Apply complete!");
        assert_eq!(state.bosh.director_address, "https://10.0.0.6:25555");
        assert_eq!(fixture.cloud.lookups(), vec!["demo-network"]);
    }

    #[test]
    fn test_failed_init_records_output() {
        let fixture = Fixture::new();
        fixture.terraform.respond(
            "init",
            MockResponse::failure(1, "Error: Failed to query available provider packages"),
        );

        let err = fixture.up(&gcp_args("demo")).unwrap_err();
        assert!(err.to_string().contains("terraform init exited with status 1"));

        let saved = bootstrap::load(fixture.dir()).unwrap();
        assert_eq!(saved.env_id, "demo");
        assert_eq!(
            saved.latest_tf_output,
            "Error: Failed to query available provider packages"
        );
        assert_eq!(fixture.terraform.subcommands(), vec!["version", "init"]);
        assert!(fixture.scripts.calls().is_empty());
    }

    #[test]
    fn test_failed_director_keeps_jumpbox() {
        let fixture = Fixture::new();
        fixture.scripts.fail("create-director.sh", 1);

        let err = fixture.up(&gcp_args("demo")).unwrap_err();
        assert!(err.downcast_ref::<boshkit::Error>().is_some());

        let saved = bootstrap::load(fixture.dir()).unwrap();
        assert_eq!(saved.jumpbox.url, "34.1.2.3:22");
        assert!(!saved.bosh.is_deployed());
        assert!(fixture.director.calls().is_empty());
    }

    #[test]
    fn test_unreachable_director_fails_cloud_config() {
        let fixture = Fixture::new();
        fixture.director.unreachable();

        let err = fixture.up(&gcp_args("demo")).unwrap_err();
        assert!(err.to_string().starts_with("failed to update cloud-config"));

        let saved = bootstrap::load(fixture.dir()).unwrap();
        assert!(saved.bosh.is_deployed());
    }

    #[test]
    fn test_rotate() {
        let fixture = Fixture::new();
        fixture.up(&gcp_args("demo")).unwrap();

        let reconciler = fixture.reconciler();
        let state = reconciler.rotate(reconciler.load().unwrap()).unwrap();

        assert_eq!(state.jumpbox.url, "34.1.2.3:22");
        assert_eq!(
            fixture.scripts.scripts(),
            vec![
                "create-jumpbox.sh",
                "create-director.sh",
                "create-jumpbox.sh",
                "create-director.sh"
            ]
        );
    }

    #[test]
    fn test_rotate_requires_environment() {
        let fixture = Fixture::new();
        let reconciler = fixture.reconciler();
        let err = reconciler.rotate(reconciler.load().unwrap()).unwrap_err();
        assert!(err.to_string().starts_with("bbl-state.json not found"));
    }
}
