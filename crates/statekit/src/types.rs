//! The bbl state document.
//!
//! [`State`] is the in-memory form. The IaaS and its credentials are a single
//! sum type ([`IaasConfig`]) so that exactly one credential record can ever be
//! populated. On disk the document keeps its historical shape: an `iaas`
//! string plus one sub-record keyed by the IaaS name. The private
//! [`StateDocument`] mirror converts between the two.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Current schema generation written by this version of bbl.
pub const STATE_SCHEMA: u32 = 14;

/// Oldest schema generation that can still be migrated in place.
pub const MIN_STATE_SCHEMA: u32 = 3;

/// `bblVersion` assumed for state files written before the field existed.
pub const FALLBACK_BBL_VERSION: &str = "5.1.0";

// ============================================================================
// Secret
// ============================================================================

/// A credential value that never shows up in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for handing to child processes.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(\"\")")
        } else {
            f.write_str("Secret(<redacted>)")
        }
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// IaaS
// ============================================================================

/// Supported infrastructure providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Iaas {
    Aws,
    Azure,
    Gcp,
    Vsphere,
    Openstack,
    Cloudstack,
}

impl Iaas {
    /// All providers, in the order they are listed to users.
    pub fn all() -> &'static [Iaas] {
        &[
            Self::Aws,
            Self::Azure,
            Self::Gcp,
            Self::Vsphere,
            Self::Openstack,
            Self::Cloudstack,
        ]
    }

    /// Lower-case name used on disk and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Azure => "azure",
            Self::Gcp => "gcp",
            Self::Vsphere => "vsphere",
            Self::Openstack => "openstack",
            Self::Cloudstack => "cloudstack",
        }
    }

    /// Whether terraform-managed load balancers exist for this provider.
    pub fn supports_lbs(&self) -> bool {
        matches!(self, Self::Aws | Self::Azure | Self::Gcp)
    }
}

impl fmt::Display for Iaas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an IaaS name is not one of [`Iaas::all`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{name:?} is not a valid iaas, must be one of: {}", valid_iaas_list())]
pub struct ParseIaasError {
    pub name: String,
}

fn valid_iaas_list() -> String {
    Iaas::all()
        .iter()
        .map(Iaas::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl FromStr for Iaas {
    type Err = ParseIaasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Iaas::all()
            .iter()
            .copied()
            .find(|iaas| iaas.as_str() == s)
            .ok_or_else(|| ParseIaasError {
                name: s.to_string(),
            })
    }
}

/// AWS credentials and placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsCredentials {
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: Secret,
    #[serde(default)]
    pub region: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub assume_role_arn: String,
}

/// GCP credentials and placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpCredentials {
    /// Service account key JSON contents
    #[serde(default)]
    pub service_account_key: Secret,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub zones: Vec<String>,
}

/// Azure credentials and placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureCredentials {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Secret,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub subscription_id: String,
    #[serde(default)]
    pub tenant_id: String,
}

/// vSphere connection details and placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VsphereCredentials {
    #[serde(default)]
    pub vcenter_user: String,
    #[serde(default)]
    pub vcenter_password: Secret,
    #[serde(default, rename = "vcenterIP")]
    pub vcenter_ip: String,
    #[serde(default, rename = "vcenterDC")]
    pub vcenter_dc: String,
    #[serde(default)]
    pub vcenter_cluster: String,
    #[serde(default, rename = "vcenterRP")]
    pub vcenter_rp: String,
    #[serde(default)]
    pub network: String,
    #[serde(default, rename = "vcenterDS")]
    pub vcenter_ds: String,
    #[serde(default)]
    pub subnet_cidr: String,
    #[serde(default)]
    pub vcenter_disks: String,
    #[serde(default)]
    pub vcenter_templates: String,
    #[serde(default, rename = "vcenterVMs")]
    pub vcenter_vms: String,
}

/// OpenStack credentials and placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenstackCredentials {
    #[serde(default)]
    pub internal_cidr: String,
    #[serde(default)]
    pub external_ip: String,
    #[serde(default)]
    pub auth_url: String,
    #[serde(default)]
    pub az: String,
    #[serde(default)]
    pub default_key_name: String,
    #[serde(default)]
    pub default_security_group: String,
    #[serde(default)]
    pub network_id: String,
    #[serde(default)]
    pub network_name: String,
    #[serde(default)]
    pub password: Secret,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub private_key: Secret,
}

/// CloudStack credentials and placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudstackCredentials {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_access_key: Secret,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub network_vpc_offering: String,
    #[serde(default)]
    pub compute_offering: String,
    #[serde(default)]
    pub iso_segment: bool,
}

/// The IaaS an environment runs on, with its credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IaasConfig {
    Aws(AwsCredentials),
    Azure(AzureCredentials),
    Gcp(GcpCredentials),
    Vsphere(VsphereCredentials),
    Openstack(OpenstackCredentials),
    Cloudstack(CloudstackCredentials),
}

impl IaasConfig {
    /// An IaaS with empty credentials.
    pub fn empty(iaas: Iaas) -> Self {
        match iaas {
            Iaas::Aws => Self::Aws(AwsCredentials::default()),
            Iaas::Azure => Self::Azure(AzureCredentials::default()),
            Iaas::Gcp => Self::Gcp(GcpCredentials::default()),
            Iaas::Vsphere => Self::Vsphere(VsphereCredentials::default()),
            Iaas::Openstack => Self::Openstack(OpenstackCredentials::default()),
            Iaas::Cloudstack => Self::Cloudstack(CloudstackCredentials::default()),
        }
    }

    pub fn kind(&self) -> Iaas {
        match self {
            Self::Aws(_) => Iaas::Aws,
            Self::Azure(_) => Iaas::Azure,
            Self::Gcp(_) => Iaas::Gcp,
            Self::Vsphere(_) => Iaas::Vsphere,
            Self::Openstack(_) => Iaas::Openstack,
            Self::Cloudstack(_) => Iaas::Cloudstack,
        }
    }

    /// Region for providers that have one.
    pub fn region(&self) -> Option<&str> {
        match self {
            Self::Aws(c) => Some(&c.region),
            Self::Azure(c) => Some(&c.region),
            Self::Gcp(c) => Some(&c.region),
            Self::Openstack(c) => Some(&c.region),
            Self::Vsphere(_) | Self::Cloudstack(_) => None,
        }
    }
}

// ============================================================================
// Jumpbox / BOSH / LB records
// ============================================================================

/// Jumpbox record.
///
/// `variables` and `state` are only populated in documents written before
/// schema 14; the migrator moves them into `vars/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Jumpbox {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub variables: String,
    #[serde(default)]
    pub manifest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Map<String, Value>>,
}

/// Director record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bosh {
    #[serde(default, rename = "directorName")]
    pub director_name: String,
    #[serde(default, rename = "directorUsername")]
    pub director_username: String,
    #[serde(default, rename = "directorPassword")]
    pub director_password: String,
    #[serde(default, rename = "directorAddress")]
    pub director_address: String,
    #[serde(default, rename = "directorSSLCA")]
    pub director_ssl_ca: String,
    #[serde(default, rename = "directorSSLCertificate")]
    pub director_ssl_certificate: String,
    #[serde(default, rename = "directorSSLPrivateKey")]
    pub director_ssl_private_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub variables: String,
    #[serde(default)]
    pub manifest: String,
    #[serde(default, rename = "userOpsFile")]
    pub user_ops_file: String,
}

impl Bosh {
    /// Whether a director has been recorded.
    pub fn is_deployed(&self) -> bool {
        !self.director_address.is_empty()
    }
}

/// Kind of load balancer set provisioned by terraform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LbType {
    #[default]
    #[serde(alias = "")]
    None,
    Cf,
    Concourse,
}

impl LbType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Cf => "cf",
            Self::Concourse => "concourse",
        }
    }
}

impl fmt::Display for LbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LbType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "none" => Ok(Self::None),
            "cf" => Ok(Self::Cf),
            "concourse" => Ok(Self::Concourse),
            other => Err(format!(
                "{other:?} is not a valid lb type, must be one of: cf, concourse"
            )),
        }
    }
}

/// Load balancer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lb {
    #[serde(default, rename = "type")]
    pub lb_type: LbType,
    #[serde(default)]
    pub cert: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub chain: String,
    #[serde(default)]
    pub domain: String,
}

impl Lb {
    pub fn is_present(&self) -> bool {
        self.lb_type != LbType::None
    }
}

// ============================================================================
// State
// ============================================================================

/// The versioned record of one environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StateDocument", into = "StateDocument")]
pub struct State {
    pub version: u32,
    pub bbl_version: String,
    pub iaas: Option<IaasConfig>,
    pub id: String,
    pub env_id: String,
    pub no_director: bool,
    pub jumpbox: Jumpbox,
    pub bosh: Bosh,
    pub lb: Lb,
    /// Inline terraform state from schema < 14, migrated into `vars/`
    pub tf_state: String,
    pub latest_tf_output: String,
}

impl State {
    /// Whether this is the all-default document.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The IaaS kind, if one has been chosen.
    pub fn iaas_kind(&self) -> Option<Iaas> {
        self.iaas.as_ref().map(IaasConfig::kind)
    }

    /// Region of the IaaS, or empty when not applicable.
    pub fn region(&self) -> &str {
        self.iaas
            .as_ref()
            .and_then(IaasConfig::region)
            .unwrap_or_default()
    }

    /// Director name derived from the env-id.
    pub fn director_name(&self) -> String {
        format!("bosh-{}", self.env_id)
    }
}

/// On-disk shape of [`State`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StateDocument {
    #[serde(default)]
    version: u32,
    #[serde(default, rename = "bblVersion")]
    bbl_version: String,
    #[serde(default)]
    iaas: String,
    #[serde(default)]
    id: String,
    #[serde(default, rename = "envID")]
    env_id: String,
    #[serde(default, rename = "noDirector")]
    no_director: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aws: Option<AwsCredentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    azure: Option<AzureCredentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gcp: Option<GcpCredentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vsphere: Option<VsphereCredentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    openstack: Option<OpenstackCredentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cloudstack: Option<CloudstackCredentials>,
    #[serde(default)]
    jumpbox: Jumpbox,
    #[serde(default)]
    bosh: Bosh,
    #[serde(default)]
    lb: Lb,
    #[serde(default, rename = "tfState", skip_serializing_if = "String::is_empty")]
    tf_state: String,
    #[serde(default, rename = "latestTFOutput")]
    latest_tf_output: String,
}

impl TryFrom<StateDocument> for State {
    type Error = ParseIaasError;

    fn try_from(doc: StateDocument) -> Result<Self, Self::Error> {
        let iaas = if doc.iaas.is_empty() {
            None
        } else {
            Some(match doc.iaas.parse::<Iaas>()? {
                Iaas::Aws => IaasConfig::Aws(doc.aws.unwrap_or_default()),
                Iaas::Azure => IaasConfig::Azure(doc.azure.unwrap_or_default()),
                Iaas::Gcp => IaasConfig::Gcp(doc.gcp.unwrap_or_default()),
                Iaas::Vsphere => IaasConfig::Vsphere(doc.vsphere.unwrap_or_default()),
                Iaas::Openstack => IaasConfig::Openstack(doc.openstack.unwrap_or_default()),
                Iaas::Cloudstack => IaasConfig::Cloudstack(doc.cloudstack.unwrap_or_default()),
            })
        };

        Ok(Self {
            version: doc.version,
            bbl_version: doc.bbl_version,
            iaas,
            id: doc.id,
            env_id: doc.env_id,
            no_director: doc.no_director,
            jumpbox: doc.jumpbox,
            bosh: doc.bosh,
            lb: doc.lb,
            tf_state: doc.tf_state,
            latest_tf_output: doc.latest_tf_output,
        })
    }
}

impl From<State> for StateDocument {
    fn from(state: State) -> Self {
        let mut doc = Self {
            version: state.version,
            bbl_version: state.bbl_version,
            iaas: state
                .iaas
                .as_ref()
                .map(|i| i.kind().to_string())
                .unwrap_or_default(),
            id: state.id,
            env_id: state.env_id,
            no_director: state.no_director,
            jumpbox: state.jumpbox,
            bosh: state.bosh,
            lb: state.lb,
            tf_state: state.tf_state,
            latest_tf_output: state.latest_tf_output,
            ..Self::default()
        };

        match state.iaas {
            Some(IaasConfig::Aws(c)) => doc.aws = Some(c),
            Some(IaasConfig::Azure(c)) => doc.azure = Some(c),
            Some(IaasConfig::Gcp(c)) => doc.gcp = Some(c),
            Some(IaasConfig::Vsphere(c)) => doc.vsphere = Some(c),
            Some(IaasConfig::Openstack(c)) => doc.openstack = Some(c),
            Some(IaasConfig::Cloudstack(c)) => doc.cloudstack = Some(c),
            None => {}
        }

        doc
    }
}

// ============================================================================
// Tests
// ============================================================================
