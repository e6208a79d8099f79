//! Environment names.
//!
//! An env-id is chosen once, on the first `plan` or `up`, and never changes.
//! Before it is accepted the IaaS is asked whether resources with that name
//! already exist.

use crate::cloud::{CloudClients, CloudConnector};
use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use regex::Regex;
use statekit::{Iaas, State};
use std::sync::LazyLock;

/// Replaces `bbl-env` in generated names.
pub const PREFIX_ENV: &str = "BBL_TEST_ENV_ID_PREFIX";

const DEFAULT_PREFIX: &str = "bbl-env";

static NAME_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]([-a-zA-Z0-9]*[a-zA-Z0-9])?$").ok());

const LAKES: [&str; 35] = [
    "caspian",
    "superior",
    "victoria",
    "huron",
    "michigan",
    "tanganyika",
    "baikal",
    "malawi",
    "great-bear",
    "great-slave",
    "erie",
    "winnipeg",
    "ontario",
    "ladoga",
    "balkhash",
    "vostok",
    "onega",
    "titicaca",
    "nicaragua",
    "athabasca",
    "taymyr",
    "turkana",
    "reindeer",
    "issyk-kul",
    "urmia",
    "vanern",
    "winnipegosis",
    "albert",
    "mweru",
    "nettilling",
    "nipigon",
    "manitoba",
    "great-salt",
    "qinghai",
    "saimaa",
];

/// Whether `name` can be used as an env-id.
pub fn is_valid(name: &str) -> bool {
    NAME_PATTERN.as_ref().is_some_and(|re| re.is_match(name))
}

/// Produces fresh env-ids.
pub trait Generate {
    fn generate(&self) -> Result<String>;
}

/// `<prefix>-<lake>-<YYYY-MM-DDtHH-MMz>`
#[derive(Debug, Clone)]
pub struct EnvIdGenerator {
    prefix: String,
}

impl EnvIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Use `BBL_TEST_ENV_ID_PREFIX` when set.
    pub fn from_env() -> Self {
        match std::env::var(PREFIX_ENV) {
            Ok(prefix) if !prefix.is_empty() => Self::new(prefix),
            _ => Self::new(DEFAULT_PREFIX),
        }
    }

    fn name_at(&self, lake: &str, now: DateTime<Utc>) -> String {
        format!("{}-{lake}-{}", self.prefix, now.format("%Y-%m-%dt%H-%Mz"))
    }
}

impl Generate for EnvIdGenerator {
    fn generate(&self) -> Result<String> {
        let lake = LAKES.choose(&mut rand::rng()).copied().unwrap_or(LAKES[0]);
        Ok(self.name_at(lake, Utc::now()))
    }
}

/// Resolves the env-id for an environment.
pub struct EnvIdManager {
    generator: Box<dyn Generate>,
    clouds: Box<dyn CloudConnector>,
}

impl EnvIdManager {
    pub fn new(generator: Box<dyn Generate>, clouds: Box<dyn CloudConnector>) -> Self {
        Self { generator, clouds }
    }

    /// The env-id to use: the existing one, `name`, or a generated name.
    /// New names are checked against the IaaS first.
    pub fn sync(&self, state: &State, name: &str) -> Result<String> {
        if !state.env_id.is_empty() {
            return Ok(state.env_id.clone());
        }

        if !name.is_empty() && !is_valid(name) {
            bail!("Names must start with a letter and be alphanumeric or hyphenated.");
        }

        let clients = self.clouds.connect(state);
        if !name.is_empty() {
            check_fast_fail(state.iaas_kind(), &clients, name)?;
            return Ok(name.to_string());
        }

        let generated = self.generator.generate()?;
        check_fast_fail(state.iaas_kind(), &clients, &generated)?;
        Ok(generated)
    }
}

fn check_fast_fail(iaas: Option<Iaas>, clients: &CloudClients, name: &str) -> Result<()> {
    let taken = match iaas {
        Some(Iaas::Gcp) => match &clients.networks {
            Some(networks) => !networks.get_networks(&format!("{name}-network"))?.is_empty(),
            None => false,
        },
        Some(Iaas::Aws) => {
            let stack = match &clients.stacks {
                Some(stacks) => stacks.stack_exists(&format!("stack-{name}"))?,
                None => false,
            };
            let vpc = match &clients.vpcs {
                Some(vpcs) => vpcs.check_exists(&format!("{name}-vpc"))?,
                None => false,
            };
            stack || vpc
        }
        // Reserved: Azure has no probe.
        Some(Iaas::Azure) => false,
        _ => false,
    };

    if taken {
        bail!(
            "It looks like a bbl environment already exists with the name '{name}'. \
             Please provide a different name."
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::mock::MockCloud;
    use chrono::TimeZone;
    use statekit::IaasConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct CountingGenerator {
        calls: Arc<AtomicUsize>,
    }

    impl Generate for CountingGenerator {
        fn generate(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("generated-name".to_string())
        }
    }

    fn state(iaas: Iaas) -> State {
        State {
            iaas: Some(IaasConfig::empty(iaas)),
            ..State::default()
        }
    }

    fn manager(cloud: &MockCloud, generator: &CountingGenerator) -> EnvIdManager {
        EnvIdManager::new(Box::new(generator.clone()), Box::new(cloud.clone()))
    }

    #[test]
    fn test_generated_name_format() {
        let generator = EnvIdGenerator::new("bbl-env");
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 14, 5, 0).unwrap();
        let name = generator.name_at("great-bear", now);

        assert_eq!(name, "bbl-env-great-bear-2026-10-19t14-05z");
        assert!(is_valid(&name));
    }

    #[test]
    fn test_generate_uses_a_lake() {
        let name = EnvIdGenerator::new("test-prefix").generate().unwrap();
        assert!(name.starts_with("test-prefix-"));
        assert!(LAKES.iter().any(|lake| name.contains(&format!("-{lake}-"))));
        assert!(is_valid(&name));
    }

    #[test]
    fn test_name_validation() {
        for name in ["demo", "a", "my-env-1", "Env2"] {
            assert!(is_valid(name), "{name}");
        }
        for name in ["", "1demo", "-demo", "demo-", "has_underscore", "has space"] {
            assert!(!is_valid(name), "{name}");
        }
    }

    #[test]
    fn test_existing_env_id_is_kept() {
        let cloud = MockCloud::new();
        let generator = CountingGenerator::default();
        let mut state = state(Iaas::Gcp);
        state.env_id = "already".to_string();

        assert_eq!(manager(&cloud, &generator).sync(&state, "other").unwrap(), "already");
        assert!(cloud.lookups().is_empty());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_name_rejected() {
        let cloud = MockCloud::new();
        let generator = CountingGenerator::default();
        let err = manager(&cloud, &generator)
            .sync(&state(Iaas::Aws), "_bad")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Names must start with a letter and be alphanumeric or hyphenated."
        );
        assert!(cloud.lookups().is_empty());
    }

    #[test]
    fn test_gcp_collision() {
        let cloud = MockCloud::new().with_existing("existing-network");
        let generator = CountingGenerator::default();

        let err = manager(&cloud, &generator)
            .sync(&state(Iaas::Gcp), "existing")
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "It looks like a bbl environment already exists with the name 'existing'. \
             Please provide a different name."
        );
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(cloud.lookups(), vec!["existing-network"]);
    }

    #[test]
    fn test_aws_checks_stack_and_vpc() {
        let cloud = MockCloud::new().with_existing("taken-vpc");
        let generator = CountingGenerator::default();
        let manager = manager(&cloud, &generator);

        assert!(manager.sync(&state(Iaas::Aws), "taken").is_err());
        assert_eq!(manager.sync(&state(Iaas::Aws), "free").unwrap(), "free");
        assert_eq!(
            cloud.lookups(),
            vec!["stack-taken", "taken-vpc", "stack-free", "free-vpc"]
        );
    }

    #[test]
    fn test_generated_name_is_checked() {
        let cloud = MockCloud::new();
        let generator = CountingGenerator::default();

        let name = manager(&cloud, &generator).sync(&state(Iaas::Gcp), "").unwrap();
        assert_eq!(name, "generated-name");
        assert_eq!(cloud.lookups(), vec!["generated-name-network"]);
    }

    #[test]
    fn test_other_iaases_are_not_probed() {
        let cloud = MockCloud::new().with_existing("demo-network");
        let generator = CountingGenerator::default();
        let manager = manager(&cloud, &generator);

        for iaas in [Iaas::Azure, Iaas::Vsphere, Iaas::Openstack, Iaas::Cloudstack] {
            assert_eq!(manager.sync(&state(iaas), "demo").unwrap(), "demo");
        }
        assert!(cloud.lookups().is_empty());
    }
}
