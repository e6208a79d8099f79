//! Configuration: command-line flags and `BBL_*` environment merged into the
//! persisted state.
//!
//! bbl has no config file. The state document is the configuration; flags
//! fill in or update credentials but cannot move an environment to another
//! IaaS or region.

use crate::cli::IaasArgs;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use statekit::{Iaas, IaasConfig, Secret, State};
use std::fs;
use std::path::{Path, PathBuf};

/// Expand `~` in the `--state-dir` value.
pub fn state_dir(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Create the state directory for verbs that write to it.
pub fn ensure_state_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create state directory {}", dir.display()))
}

// ============================================================================
// Merging flags into state
// ============================================================================

/// Apply flags to `state`. An environment keeps its IaaS and region.
pub fn apply_flags(state: &mut State, args: &IaasArgs) -> Result<()> {
    match (state.iaas_kind(), args.iaas) {
        (Some(current), Some(requested)) if current != requested => bail!(
            "The iaas type cannot be changed for an existing environment. \
             The current iaas type is {current}."
        ),
        (None, Some(requested)) => state.iaas = Some(IaasConfig::empty(requested)),
        (None, None) => bail!(
            "--iaas [{}] must be provided or BBL_IAAS must be set",
            Iaas::all()
                .iter()
                .map(Iaas::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        _ => {}
    }

    let current_region = state.region().to_string();

    match state.iaas.as_mut() {
        Some(IaasConfig::Aws(c)) => {
            set(&mut c.access_key_id, &args.aws_access_key_id);
            set_secret(&mut c.secret_access_key, &args.aws_secret_access_key);
            set(&mut c.region, &args.aws_region);
            set(&mut c.assume_role_arn, &args.aws_assume_role);
        }
        Some(IaasConfig::Gcp(c)) => {
            if let Some(key) = &args.gcp_service_account_key {
                let key = read_path_or_contents(key)?;
                let project_id = project_id_from_key(&key)?;
                if c.project_id.is_empty() && args.gcp_project_id.is_none() {
                    c.project_id = project_id;
                }
                c.service_account_key = Secret::new(key);
            }
            set(&mut c.project_id, &args.gcp_project_id);
            set(&mut c.region, &args.gcp_region);
            set(&mut c.zone, &args.gcp_zone);
            if c.zone.is_empty() && !c.region.is_empty() {
                c.zone = format!("{}-b", c.region);
            }
            if c.zones.is_empty() && !c.zone.is_empty() {
                c.zones = vec![c.zone.clone()];
            }
        }
        Some(IaasConfig::Azure(c)) => {
            set(&mut c.client_id, &args.azure_client_id);
            set_secret(&mut c.client_secret, &args.azure_client_secret);
            set(&mut c.region, &args.azure_region);
            set(&mut c.subscription_id, &args.azure_subscription_id);
            set(&mut c.tenant_id, &args.azure_tenant_id);
        }
        Some(IaasConfig::Vsphere(c)) => {
            set(&mut c.vcenter_user, &args.vsphere_vcenter_user);
            set_secret(&mut c.vcenter_password, &args.vsphere_vcenter_password);
            set(&mut c.vcenter_ip, &args.vsphere_vcenter_ip);
            set(&mut c.vcenter_dc, &args.vsphere_vcenter_dc);
            set(&mut c.vcenter_cluster, &args.vsphere_vcenter_cluster);
            set(&mut c.vcenter_rp, &args.vsphere_vcenter_rp);
            set(&mut c.network, &args.vsphere_network);
            set(&mut c.vcenter_ds, &args.vsphere_vcenter_ds);
            set(&mut c.subnet_cidr, &args.vsphere_subnet_cidr);
            set(&mut c.vcenter_disks, &args.vsphere_vcenter_disks);
            set(&mut c.vcenter_templates, &args.vsphere_vcenter_templates);
            set(&mut c.vcenter_vms, &args.vsphere_vcenter_vms);
        }
        Some(IaasConfig::Openstack(c)) => {
            set(&mut c.internal_cidr, &args.openstack_internal_cidr);
            set(&mut c.external_ip, &args.openstack_external_ip);
            set(&mut c.auth_url, &args.openstack_auth_url);
            set(&mut c.az, &args.openstack_az);
            set(&mut c.default_key_name, &args.openstack_default_key_name);
            set(&mut c.default_security_group, &args.openstack_default_security_group);
            set(&mut c.network_id, &args.openstack_network_id);
            set(&mut c.network_name, &args.openstack_network_name);
            set_secret(&mut c.password, &args.openstack_password);
            set(&mut c.username, &args.openstack_username);
            set(&mut c.project, &args.openstack_project);
            set(&mut c.domain, &args.openstack_domain);
            set(&mut c.region, &args.openstack_region);
            if let Some(key) = &args.openstack_private_key {
                c.private_key = Secret::new(read_path_or_contents(key)?);
            }
        }
        Some(IaasConfig::Cloudstack(c)) => {
            set(&mut c.endpoint, &args.cloudstack_endpoint);
            set(&mut c.api_key, &args.cloudstack_api_key);
            set_secret(&mut c.secret_access_key, &args.cloudstack_secret_access_key);
            set(&mut c.zone, &args.cloudstack_zone);
            set(&mut c.network_vpc_offering, &args.cloudstack_network_vpc_offering);
            set(&mut c.compute_offering, &args.cloudstack_compute_offering);
            c.iso_segment |= args.cloudstack_iso_segment;
        }
        None => {}
    }

    if !current_region.is_empty() && state.region() != current_region {
        bail!(
            "The region cannot be changed for an existing environment. \
             The current region is {current_region}."
        );
    }
    Ok(())
}

fn set(field: &mut String, flag: &Option<String>) {
    if let Some(value) = flag {
        field.clone_from(value);
    }
}

fn set_secret(field: &mut Secret, flag: &Option<String>) {
    if let Some(value) = flag {
        *field = Secret::new(value.as_str());
    }
}

/// Flags like `--gcp-service-account-key` accept a file path or the value
/// itself.
fn read_path_or_contents(value: &str) -> Result<String> {
    let path = Path::new(value);
    if value.len() < 4096 && path.is_file() {
        return fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    Ok(value.to_string())
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    #[serde(default)]
    project_id: String,
}

fn project_id_from_key(key: &str) -> Result<String> {
    let parsed: ServiceAccountKey = serde_json::from_str(key)
        .context("GCP service account key must be valid JSON")?;
    Ok(parsed.project_id)
}

// ============================================================================
// Validation
// ============================================================================

/// Require the settings terraform and create-env need for the IaaS.
pub fn validate(state: &State) -> Result<()> {
    let required: Vec<(&str, bool)> = match &state.iaas {
        Some(IaasConfig::Aws(c)) => vec![
            ("--aws-access-key-id", c.access_key_id.is_empty()),
            ("--aws-secret-access-key", c.secret_access_key.is_empty()),
            ("--aws-region", c.region.is_empty()),
        ],
        Some(IaasConfig::Gcp(c)) => vec![
            ("--gcp-service-account-key", c.service_account_key.is_empty()),
            ("--gcp-project-id", c.project_id.is_empty()),
            ("--gcp-region", c.region.is_empty()),
        ],
        Some(IaasConfig::Azure(c)) => vec![
            ("--azure-client-id", c.client_id.is_empty()),
            ("--azure-client-secret", c.client_secret.is_empty()),
            ("--azure-region", c.region.is_empty()),
            ("--azure-subscription-id", c.subscription_id.is_empty()),
            ("--azure-tenant-id", c.tenant_id.is_empty()),
        ],
        Some(IaasConfig::Vsphere(c)) => vec![
            ("--vsphere-vcenter-user", c.vcenter_user.is_empty()),
            ("--vsphere-vcenter-password", c.vcenter_password.is_empty()),
            ("--vsphere-vcenter-ip", c.vcenter_ip.is_empty()),
            ("--vsphere-vcenter-dc", c.vcenter_dc.is_empty()),
            ("--vsphere-vcenter-cluster", c.vcenter_cluster.is_empty()),
            ("--vsphere-vcenter-rp", c.vcenter_rp.is_empty()),
            ("--vsphere-network", c.network.is_empty()),
            ("--vsphere-vcenter-ds", c.vcenter_ds.is_empty()),
            ("--vsphere-subnet-cidr", c.subnet_cidr.is_empty()),
        ],
        Some(IaasConfig::Openstack(c)) => vec![
            ("--openstack-internal-cidr", c.internal_cidr.is_empty()),
            ("--openstack-external-ip", c.external_ip.is_empty()),
            ("--openstack-auth-url", c.auth_url.is_empty()),
            ("--openstack-az", c.az.is_empty()),
            ("--openstack-default-key-name", c.default_key_name.is_empty()),
            ("--openstack-default-security-group", c.default_security_group.is_empty()),
            ("--openstack-network-id", c.network_id.is_empty()),
            ("--openstack-password", c.password.is_empty()),
            ("--openstack-username", c.username.is_empty()),
            ("--openstack-project", c.project.is_empty()),
            ("--openstack-domain", c.domain.is_empty()),
            ("--openstack-private-key", c.private_key.is_empty()),
        ],
        Some(IaasConfig::Cloudstack(c)) => vec![
            ("--cloudstack-endpoint", c.endpoint.is_empty()),
            ("--cloudstack-api-key", c.api_key.is_empty()),
            ("--cloudstack-secret-access-key", c.secret_access_key.is_empty()),
            ("--cloudstack-zone", c.zone.is_empty()),
            ("--cloudstack-network-vpc-offering", c.network_vpc_offering.is_empty()),
            ("--cloudstack-compute-offering", c.compute_offering.is_empty()),
        ],
        None => bail!("an iaas must be configured"),
    };

    let missing: Vec<String> = required
        .into_iter()
        .filter(|(_, is_missing)| *is_missing)
        .map(|(flag, _)| format!("{flag} (or {})", env_name(flag)))
        .collect();
    if !missing.is_empty() {
        bail!("Missing required flags:\n  {}", missing.join("\n  "));
    }
    Ok(())
}

/// `--aws-region` -> `BBL_AWS_REGION`
fn env_name(flag: &str) -> String {
    format!(
        "BBL_{}",
        flag.trim_start_matches("--").to_uppercase().replace('-', "_")
    )
}
