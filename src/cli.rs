use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use statekit::{Iaas, LbType};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bbl")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Bootstrap and manage a BOSH director and jumpbox", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory containing bbl-state.json
    #[arg(short, long, env = "BBL_STATE_DIRECTORY", default_value = ".", global = true)]
    pub state_dir: String,

    /// Print terraform and create-env output as it happens
    #[arg(short, long, env = "BBL_DEBUG", global = true)]
    pub debug: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write the state directory without creating anything
    Plan(UpArgs),

    /// Create or converge the environment
    Up(UpArgs),

    /// Replace the jumpbox SSH key
    Rotate,

    /// Tear down the director, jumpbox and infrastructure, keeping bbl-state.json
    Down,

    /// Tear down everything and delete the state
    Destroy(DestroyArgs),

    /// Attach load balancers
    CreateLbs(LbArgs),

    /// Update the certificate or domain of existing load balancers
    UpdateLbs(LbArgs),

    /// Remove load balancers
    DeleteLbs,

    /// Print load balancer details
    Lbs,

    /// Print terraform outputs as JSON
    Outputs,

    /// Print the director address
    DirectorAddress,

    /// Print the director username
    DirectorUsername,

    /// Print the director password
    DirectorPassword,

    /// Print the director CA certificate
    #[command(name = "director-ca-cert")]
    DirectorCaCert,

    /// Print the jumpbox address
    JumpboxAddress,

    /// Print the environment name
    #[command(name = "env-id")]
    EnvId,

    /// Print the jumpbox SSH private key
    SshKey,

    /// Print the director SSH private key
    DirectorSshKey,

    /// Print shell exports for the bosh and credhub CLIs
    PrintEnv,

    /// Print the director vars-file
    BoshDeploymentVars,

    /// Print the jumpbox vars-file
    JumpboxDeploymentVars,

    /// Print the output of the last terraform run
    LatestError,

    /// Print the bbl version
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Up / Plan
// ============================================================================

#[derive(Args, Debug, Clone, Default)]
pub struct UpArgs {
    /// Name for the environment (generated when omitted)
    #[arg(short, long, default_value = "")]
    pub name: String,

    /// Create only the infrastructure and jumpbox
    #[arg(long)]
    pub no_director: bool,

    #[command(flatten)]
    pub iaas: IaasArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DestroyArgs {
    /// Do not ask for confirmation
    #[arg(long)]
    pub no_confirm: bool,

    /// Exit successfully when there is no bbl-state.json
    #[arg(long)]
    pub skip_if_missing: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct LbArgs {
    /// Load balancer type: cf or concourse
    #[arg(long = "lb-type")]
    pub lb_type: Option<LbType>,

    /// Path to the load balancer certificate
    #[arg(long = "lb-cert")]
    pub cert: Option<PathBuf>,

    /// Path to the load balancer private key
    #[arg(long = "lb-key")]
    pub key: Option<PathBuf>,

    /// Path to the certificate chain (AWS only)
    #[arg(long = "lb-chain")]
    pub chain: Option<PathBuf>,

    /// System domain for the cf router
    #[arg(long = "lb-domain")]
    pub domain: Option<String>,
}

// ============================================================================
// IaaS flags
// ============================================================================

/// Credentials and placement. Flags override the matching `BBL_*`
/// environment variables.
#[derive(Args, Debug, Clone, Default)]
pub struct IaasArgs {
    /// IaaS to deploy to
    #[arg(long, env = "BBL_IAAS")]
    pub iaas: Option<Iaas>,

    // AWS
    #[arg(long, env = "BBL_AWS_ACCESS_KEY_ID")]
    pub aws_access_key_id: Option<String>,
    #[arg(long, env = "BBL_AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub aws_secret_access_key: Option<String>,
    #[arg(long, env = "BBL_AWS_REGION")]
    pub aws_region: Option<String>,
    #[arg(long, env = "BBL_AWS_ASSUME_ROLE")]
    pub aws_assume_role: Option<String>,

    // GCP
    /// Path to (or contents of) the service account key
    #[arg(long, env = "BBL_GCP_SERVICE_ACCOUNT_KEY", hide_env_values = true)]
    pub gcp_service_account_key: Option<String>,
    #[arg(long, env = "BBL_GCP_PROJECT_ID")]
    pub gcp_project_id: Option<String>,
    #[arg(long, env = "BBL_GCP_REGION")]
    pub gcp_region: Option<String>,
    #[arg(long, env = "BBL_GCP_ZONE")]
    pub gcp_zone: Option<String>,

    // Azure
    #[arg(long, env = "BBL_AZURE_CLIENT_ID")]
    pub azure_client_id: Option<String>,
    #[arg(long, env = "BBL_AZURE_CLIENT_SECRET", hide_env_values = true)]
    pub azure_client_secret: Option<String>,
    #[arg(long, env = "BBL_AZURE_REGION")]
    pub azure_region: Option<String>,
    #[arg(long, env = "BBL_AZURE_SUBSCRIPTION_ID")]
    pub azure_subscription_id: Option<String>,
    #[arg(long, env = "BBL_AZURE_TENANT_ID")]
    pub azure_tenant_id: Option<String>,

    // vSphere
    #[arg(long, env = "BBL_VSPHERE_VCENTER_USER")]
    pub vsphere_vcenter_user: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_VCENTER_PASSWORD", hide_env_values = true)]
    pub vsphere_vcenter_password: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_VCENTER_IP")]
    pub vsphere_vcenter_ip: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_VCENTER_DC")]
    pub vsphere_vcenter_dc: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_VCENTER_CLUSTER")]
    pub vsphere_vcenter_cluster: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_VCENTER_RP")]
    pub vsphere_vcenter_rp: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_NETWORK")]
    pub vsphere_network: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_VCENTER_DS")]
    pub vsphere_vcenter_ds: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_SUBNET_CIDR")]
    pub vsphere_subnet_cidr: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_VCENTER_DISKS")]
    pub vsphere_vcenter_disks: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_VCENTER_TEMPLATES")]
    pub vsphere_vcenter_templates: Option<String>,
    #[arg(long, env = "BBL_VSPHERE_VCENTER_VMS")]
    pub vsphere_vcenter_vms: Option<String>,

    // OpenStack
    #[arg(long, env = "BBL_OPENSTACK_INTERNAL_CIDR")]
    pub openstack_internal_cidr: Option<String>,
    #[arg(long, env = "BBL_OPENSTACK_EXTERNAL_IP")]
    pub openstack_external_ip: Option<String>,
    #[arg(long, env = "BBL_OPENSTACK_AUTH_URL")]
    pub openstack_auth_url: Option<String>,
    #[arg(long, env = "BBL_OPENSTACK_AZ")]
    pub openstack_az: Option<String>,
    #[arg(long, env = "BBL_OPENSTACK_DEFAULT_KEY_NAME")]
    pub openstack_default_key_name: Option<String>,
    #[arg(long, env = "BBL_OPENSTACK_DEFAULT_SECURITY_GROUP")]
    pub openstack_default_security_group: Option<String>,
    #[arg(long, env = "BBL_OPENSTACK_NETWORK_ID")]
    pub openstack_network_id: Option<String>,
    #[arg(long, env = "BBL_OPENSTACK_NETWORK_NAME")]
    pub openstack_network_name: Option<String>,
    #[arg(long, env = "BBL_OPENSTACK_PASSWORD", hide_env_values = true)]
    pub openstack_password: Option<String>,
    #[arg(long, env = "BBL_OPENSTACK_USERNAME")]
    pub openstack_username: Option<String>,
    #[arg(long, env = "BBL_OPENSTACK_PROJECT")]
    pub openstack_project: Option<String>,
    #[arg(long, env = "BBL_OPENSTACK_DOMAIN")]
    pub openstack_domain: Option<String>,
    #[arg(long, env = "BBL_OPENSTACK_REGION")]
    pub openstack_region: Option<String>,
    /// Path to (or contents of) the private key for `default_key_name`
    #[arg(long, env = "BBL_OPENSTACK_PRIVATE_KEY", hide_env_values = true)]
    pub openstack_private_key: Option<String>,

    // CloudStack
    #[arg(long, env = "BBL_CLOUDSTACK_ENDPOINT")]
    pub cloudstack_endpoint: Option<String>,
    #[arg(long, env = "BBL_CLOUDSTACK_API_KEY")]
    pub cloudstack_api_key: Option<String>,
    #[arg(long, env = "BBL_CLOUDSTACK_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub cloudstack_secret_access_key: Option<String>,
    #[arg(long, env = "BBL_CLOUDSTACK_ZONE")]
    pub cloudstack_zone: Option<String>,
    #[arg(long, env = "BBL_CLOUDSTACK_NETWORK_VPC_OFFERING")]
    pub cloudstack_network_vpc_offering: Option<String>,
    #[arg(long, env = "BBL_CLOUDSTACK_COMPUTE_OFFERING")]
    pub cloudstack_compute_offering: Option<String>,
    #[arg(long, env = "BBL_CLOUDSTACK_ISO_SEGMENT")]
    pub cloudstack_iso_segment: bool,
}
