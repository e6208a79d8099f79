//! Terraform inputs derived from the state document.
//!
//! Non-secret inputs go to `vars/bbl.tfvars`. Credentials are only ever
//! passed as `TF_VAR_*` environment variables so they never touch disk
//! outside `bbl-state.json`.

use crate::error::{Error, Result};
use serde_json::{Value, json};
use statekit::{IaasConfig, LbType, Secret, State};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Non-secret variables for `state`.
pub fn variables(state: &State) -> Result<BTreeMap<&'static str, Value>> {
    let iaas = state.iaas.as_ref().ok_or(Error::NoIaas)?;

    let mut vars = BTreeMap::new();
    vars.insert("env_id", json!(state.env_id));

    match iaas {
        IaasConfig::Aws(c) => {
            vars.insert("region", json!(c.region));
        }
        IaasConfig::Azure(c) => {
            vars.insert("region", json!(c.region));
            vars.insert("client_id", json!(c.client_id));
            vars.insert("subscription_id", json!(c.subscription_id));
            vars.insert("tenant_id", json!(c.tenant_id));
        }
        IaasConfig::Gcp(c) => {
            vars.insert("project_id", json!(c.project_id));
            vars.insert("region", json!(c.region));
            vars.insert("zone", json!(c.zone));
        }
        IaasConfig::Vsphere(c) => {
            vars.insert("vsphere_subnet_cidr", json!(c.subnet_cidr));
            vars.insert("vsphere_network", json!(c.network));
            vars.insert("vcenter_cluster", json!(c.vcenter_cluster));
            vars.insert("vcenter_ip", json!(c.vcenter_ip));
            vars.insert("vcenter_dc", json!(c.vcenter_dc));
            vars.insert("vcenter_ds", json!(c.vcenter_ds));
            vars.insert("vcenter_rp", json!(c.vcenter_rp));
            vars.insert("vcenter_disks", json!(c.vcenter_disks));
            vars.insert("vcenter_templates", json!(c.vcenter_templates));
            vars.insert("vcenter_vms", json!(c.vcenter_vms));
        }
        IaasConfig::Openstack(c) => {
            vars.insert("auth_url", json!(c.auth_url));
            vars.insert("az", json!(c.az));
            vars.insert("region", json!(c.region));
            vars.insert("user_name", json!(c.username));
            vars.insert("tenant_name", json!(c.project));
            vars.insert("domain_name", json!(c.domain));
            vars.insert("ext_net_name", json!(c.network_name));
            vars.insert("ext_net_id", json!(c.network_id));
            if !c.internal_cidr.is_empty() {
                vars.insert("subnet_cidr", json!(c.internal_cidr));
            }
        }
        IaasConfig::Cloudstack(c) => {
            vars.insert("cloudstack_endpoint", json!(c.endpoint));
            vars.insert("cloudstack_zone", json!(c.zone));
            vars.insert("network_vpc_offering", json!(c.network_vpc_offering));
            vars.insert("compute_offering", json!(c.compute_offering));
        }
    }

    if state.lb.lb_type == LbType::Cf {
        vars.insert("lb_cert", json!(state.lb.cert));
        vars.insert("system_domain", json!(state.lb.domain));
        if matches!(iaas, IaasConfig::Aws(_)) {
            vars.insert("lb_chain", json!(state.lb.chain));
        }
    }

    Ok(vars)
}

/// Render `vars/bbl.tfvars`.
pub fn tfvars(state: &State) -> Result<String> {
    Ok(hcl::to_string(&variables(state)?)?)
}

/// Secret variables for `state`, as `TF_VAR_*` environment entries.
pub fn credential_env(state: &State) -> Vec<(String, Secret)> {
    let mut env: Vec<(&str, Secret)> = match &state.iaas {
        Some(IaasConfig::Aws(c)) => vec![
            ("access_key", Secret::new(c.access_key_id.clone())),
            ("secret_key", c.secret_access_key.clone()),
        ],
        Some(IaasConfig::Azure(c)) => vec![("client_secret", c.client_secret.clone())],
        Some(IaasConfig::Gcp(c)) => vec![("credentials", c.service_account_key.clone())],
        Some(IaasConfig::Openstack(c)) => vec![("password", c.password.clone())],
        Some(IaasConfig::Cloudstack(c)) => vec![
            ("cloudstack_api_key", Secret::new(c.api_key.clone())),
            ("cloudstack_secret_access_key", c.secret_access_key.clone()),
        ],
        Some(IaasConfig::Vsphere(_)) | None => Vec::new(),
    };

    if state.lb.lb_type == LbType::Cf {
        env.push(("lb_key", Secret::new(state.lb.key.clone())));
    }

    env.into_iter()
        .map(|(name, value)| (format!("TF_VAR_{name}"), value))
        .collect()
}

/// Operator-supplied `vars/*.tfvars` other than `bbl.tfvars`, sorted.
pub fn user_var_files(vars_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(vars_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(vars_dir, e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::io(vars_dir, e))?.path();
        let is_tfvars = path.extension().is_some_and(|ext| ext == "tfvars");
        let is_bbl = path.file_name().is_some_and(|name| name == "bbl.tfvars");
        if path.is_file() && is_tfvars && !is_bbl {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
