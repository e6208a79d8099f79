//! Cloud-config and runtime-config for the deployed director.

use crate::director::DirectorConnector;
use crate::error::{Error, Result};
use crate::vars;
use serde_yaml::{Mapping, Value};
use statekit::{Iaas, State, Store};
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tfkit::Outputs;

const CLOUD_CONFIG_FILE: &str = "cloud-config.yml";
const OPS_FILE: &str = "ops.yml";
const RUNTIME_CONFIG_FILE: &str = "runtime-config.yml";
const VARS_FILE: &str = "cloud-config-vars.yml";
const RUNTIME_CONFIG_NAME: &str = "dns";

const BASE: &str = include_str!("../assets/cloud-config/cloud-config.yml");
const RUNTIME_CONFIG: &str = include_str!("../assets/runtime-config/runtime-config.yml");

fn iaas_ops(iaas: Iaas) -> &'static str {
    match iaas {
        Iaas::Aws => include_str!("../assets/cloud-config/aws-ops.yml"),
        Iaas::Azure => include_str!("../assets/cloud-config/azure-ops.yml"),
        Iaas::Gcp => include_str!("../assets/cloud-config/gcp-ops.yml"),
        Iaas::Vsphere => include_str!("../assets/cloud-config/vsphere-ops.yml"),
        Iaas::Openstack => include_str!("../assets/cloud-config/openstack-ops.yml"),
        Iaas::Cloudstack => include_str!("../assets/cloud-config/cloudstack-ops.yml"),
    }
}

/// Terraform outputs each IaaS ops file interpolates.
fn iaas_outputs(iaas: Iaas) -> &'static [&'static str] {
    match iaas {
        Iaas::Aws => &["az", "subnet_id", "default_security_groups"],
        Iaas::Azure => &["vnet_name", "subnet_name", "default_security_group"],
        Iaas::Gcp => &["zone", "network", "subnetwork", "internal_tag_name"],
        Iaas::Vsphere => &["vcenter_cluster", "vcenter_rp", "network_name"],
        Iaas::Openstack => &["az", "net_id", "default_security_groups"],
        Iaas::Cloudstack => &["zone", "network_name", "compute_offering"],
    }
}

/// Writes and applies the cloud-config in `<state-dir>/cloud-config`.
pub struct CloudConfigManager {
    connector: Box<dyn DirectorConnector>,
    store: Store,
}

impl CloudConfigManager {
    pub fn new(connector: Box<dyn DirectorConnector>, store: Store) -> Self {
        Self { connector, store }
    }

    /// Write the base cloud-config, the IaaS ops file and the runtime-config.
    /// User ops files alongside them are left alone.
    pub fn initialize(&self, state: &State) -> Result<()> {
        let iaas = state.iaas_kind().ok_or(Error::NoIaas)?;
        let dir = self.store.cloud_config_dir()?;
        write(&dir.join(CLOUD_CONFIG_FILE), BASE)?;
        write(&dir.join(OPS_FILE), iaas_ops(iaas))?;

        let runtime_dir = self.store.runtime_config_dir()?;
        write(&runtime_dir.join(RUNTIME_CONFIG_FILE), RUNTIME_CONFIG)
    }

    pub fn is_present_cloud_config(&self) -> Result<bool> {
        let dir = self.store.cloud_config_dir()?;
        Ok(dir.join(CLOUD_CONFIG_FILE).is_file() && dir.join(OPS_FILE).is_file())
    }

    pub fn is_present_cloud_config_vars(&self) -> Result<bool> {
        Ok(self.store.vars_dir()?.join(VARS_FILE).is_file())
    }

    /// Values for the `((vars))` in the base cloud-config and the IaaS ops.
    pub fn generate_vars(&self, state: &State, outputs: &Outputs) -> Result<Mapping> {
        let iaas = state.iaas_kind().ok_or(Error::NoIaas)?;

        let cidr = outputs.get_string("internal_cidr")?;
        let network = Network::parse(&cidr)?;
        let gateway = match outputs.get("internal_gw").and_then(|v| v.as_str()) {
            Some(gw) => gw.to_string(),
            None => network.host(1).to_string(),
        };

        let mut mapping = Mapping::new();
        mapping.insert("internal_cidr".into(), cidr.into());
        mapping.insert("internal_gw".into(), gateway.into());
        mapping.insert("reserved_range".into(), network.reserved_range().into());
        mapping.insert("static_range".into(), network.static_range().into());

        for &name in iaas_outputs(iaas) {
            let value = outputs
                .get(name)
                .ok_or_else(|| tfkit::Error::MissingOutput(name.to_string()))?;
            let value = serde_yaml::to_value(value).unwrap_or(Value::Null);
            mapping.insert(name.into(), value);
        }
        Ok(mapping)
    }

    /// Regenerate the vars and push cloud-config and runtime-config to the
    /// director.
    pub fn update(&self, state: &State, outputs: &Outputs) -> Result<()> {
        let cli = self
            .connector
            .connect(state, &self.store)
            .map_err(|e| Error::CloudConfig(Box::new(e)))?;

        let vars_path = self.store.vars_dir()?.join(VARS_FILE);
        let mapping = self.generate_vars(state, outputs)?;
        vars::write_mapping(&vars_path, &mapping)?;

        let dir = self.store.cloud_config_dir()?;
        let ops = ops_files(&dir)?;
        log::info!("updating cloud-config with {} ops file(s)", ops.len());
        cli.update_cloud_config(&dir.join(CLOUD_CONFIG_FILE), &ops, &vars_path)
            .map_err(|e| Error::CloudConfig(Box::new(e)))?;

        let runtime_config = self.store.runtime_config_dir()?.join(RUNTIME_CONFIG_FILE);
        cli.update_runtime_config(&runtime_config, RUNTIME_CONFIG_NAME)
            .map_err(|e| Error::RuntimeConfig(Box::new(e)))
    }
}

/// `ops.yml` first, then every other `*.yml` except the base, sorted.
fn ops_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut extra = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(".yml") || name == CLOUD_CONFIG_FILE || name == OPS_FILE {
            continue;
        }
        if entry.path().is_file() {
            extra.push(entry.path());
        }
    }
    extra.sort();

    let mut ops = vec![dir.join(OPS_FILE)];
    ops.extend(extra);
    Ok(ops)
}

fn write(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|e| Error::io(path, e))
}

/// An IPv4 network from a terraform `internal_cidr` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Network {
    base: u32,
    size: u32,
}

impl Network {
    /// Smallest network with room for bbl's reserved and static ranges.
    const MAX_PREFIX: u32 = 24;

    fn parse(cidr: &str) -> Result<Self> {
        let invalid = || Error::InvalidCidr(cidr.to_string());
        let (addr, prefix) = cidr.split_once('/').ok_or_else(invalid)?;
        let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
        let prefix: u32 = prefix.parse().map_err(|_| invalid())?;
        if !(8..=Self::MAX_PREFIX).contains(&prefix) {
            return Err(invalid());
        }

        let size = 1u32 << (32 - prefix);
        Ok(Self {
            base: u32::from(addr) & !(size - 1),
            size,
        })
    }

    fn host(self, offset: u32) -> Ipv4Addr {
        Ipv4Addr::from(self.base + offset)
    }

    /// Gateway neighbours plus the jumpbox and director addresses.
    fn reserved_range(self) -> String {
        format!("{}-{}", self.host(2), self.host(10))
    }

    /// The top of the network, below the broadcast address.
    fn static_range(self) -> String {
        format!("{}-{}", self.host(self.size - 66), self.host(self.size - 2))
    }
}
