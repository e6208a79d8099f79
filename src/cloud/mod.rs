//! Read-only probes against the IaaS, used to refuse env-ids that are
//! already taken.
//!
//! Each probe is a trait so the env-id manager can be tested without cloud
//! credentials. The real implementations shell out to `gcloud` and `aws`.

pub mod aws;
pub mod gcp;

use anyhow::Result;
use statekit::{IaasConfig, State};

/// Lists GCP networks.
pub trait NetworkClient {
    /// Names of networks called `name` (empty when there are none).
    fn get_networks(&self, name: &str) -> Result<Vec<String>>;
}

/// Looks up CloudFormation stacks.
pub trait StackManager {
    fn stack_exists(&self, name: &str) -> Result<bool>;
}

/// Looks up AWS VPCs by `Name` tag.
pub trait VpcChecker {
    fn check_exists(&self, name: &str) -> Result<bool>;
}

/// The probes for one environment. Probes that do not apply to the IaaS
/// are `None`.
#[derive(Default)]
pub struct CloudClients {
    pub networks: Option<Box<dyn NetworkClient>>,
    pub stacks: Option<Box<dyn StackManager>>,
    pub vpcs: Option<Box<dyn VpcChecker>>,
}

/// Builds [`CloudClients`] from the credentials in the state.
pub trait CloudConnector {
    fn connect(&self, state: &State) -> CloudClients;
}

/// Connects with the `gcloud` and `aws` CLIs.
#[derive(Debug, Clone, Copy, Default)]
pub struct CliConnector;

impl CloudConnector for CliConnector {
    fn connect(&self, state: &State) -> CloudClients {
        match &state.iaas {
            Some(IaasConfig::Gcp(c)) => CloudClients {
                networks: Some(Box::new(gcp::GcloudNetworkClient::new(c))),
                ..CloudClients::default()
            },
            Some(IaasConfig::Aws(c)) => CloudClients {
                stacks: Some(Box::new(aws::AwsCli::new(c))),
                vpcs: Some(Box::new(aws::AwsCli::new(c))),
                ..CloudClients::default()
            },
            _ => CloudClients::default(),
        }
    }
}
