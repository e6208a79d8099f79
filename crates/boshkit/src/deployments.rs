//! Vendored create-env manifests and bbl ops files.
//!
//! These trees are wholly bbl-managed: they are rewritten on every plan and
//! removed by the garbage collector.

use crate::error::{Error, Result};
use statekit::{Iaas, Store};
use std::fs;
use std::path::Path;

struct Asset {
    path: &'static str,
    contents: &'static str,
}

macro_rules! asset {
    ($path:literal) => {
        Asset {
            path: $path,
            contents: include_str!(concat!("../assets/", $path)),
        }
    };
}

const JUMPBOX_DEPLOYMENT: &[Asset] = &[
    asset!("jumpbox-deployment/jumpbox.yml"),
    asset!("jumpbox-deployment/aws/cpi.yml"),
    asset!("jumpbox-deployment/azure/cpi.yml"),
    asset!("jumpbox-deployment/gcp/cpi.yml"),
    asset!("jumpbox-deployment/vsphere/cpi.yml"),
    asset!("jumpbox-deployment/openstack/cpi.yml"),
    asset!("jumpbox-deployment/cloudstack/cpi.yml"),
];

const BOSH_DEPLOYMENT: &[Asset] = &[
    asset!("bosh-deployment/bosh.yml"),
    asset!("bosh-deployment/jumpbox-user.yml"),
    asset!("bosh-deployment/uaa.yml"),
    asset!("bosh-deployment/credhub.yml"),
    asset!("bosh-deployment/aws/cpi.yml"),
    asset!("bosh-deployment/azure/cpi.yml"),
    asset!("bosh-deployment/gcp/cpi.yml"),
    asset!("bosh-deployment/vsphere/cpi.yml"),
    asset!("bosh-deployment/openstack/cpi.yml"),
    asset!("bosh-deployment/cloudstack/cpi.yml"),
];

const OPS_FILES: &[Asset] = &[
    asset!("bbl-ops-files/aws/bosh-director-network-ops.yml"),
    asset!("bbl-ops-files/aws/jumpbox-network-ops.yml"),
    asset!("bbl-ops-files/azure/bosh-director-network-ops.yml"),
    asset!("bbl-ops-files/azure/jumpbox-network-ops.yml"),
    asset!("bbl-ops-files/gcp/bosh-director-ephemeral-ip-ops.yml"),
    asset!("bbl-ops-files/gcp/jumpbox-network-ops.yml"),
    asset!("bbl-ops-files/vsphere/bosh-director-network-ops.yml"),
    asset!("bbl-ops-files/vsphere/jumpbox-network-ops.yml"),
    asset!("bbl-ops-files/openstack/bosh-director-network-ops.yml"),
    asset!("bbl-ops-files/openstack/jumpbox-network-ops.yml"),
    asset!("bbl-ops-files/cloudstack/bosh-director-network-ops.yml"),
    asset!("bbl-ops-files/cloudstack/jumpbox-network-ops.yml"),
];

/// Ops files for the jumpbox, relative to the state directory.
pub fn jumpbox_ops(iaas: Iaas) -> Vec<&'static str> {
    ops_for(iaas, "jumpbox-")
}

/// Ops files for the director, relative to the state directory.
pub fn director_ops(iaas: Iaas) -> Vec<&'static str> {
    ops_for(iaas, "bosh-director-")
}

fn ops_for(iaas: Iaas, prefix: &str) -> Vec<&'static str> {
    let dir = format!("bbl-ops-files/{iaas}/");
    OPS_FILES
        .iter()
        .filter(|a| {
            a.path
                .strip_prefix(dir.as_str())
                .is_some_and(|name| name.starts_with(prefix))
        })
        .map(|a| a.path)
        .collect()
}

/// Write the vendored deployments and the ops files for `iaas`.
pub fn write(store: &Store, iaas: Iaas) -> Result<()> {
    store.jumpbox_deployment_dir()?;
    store.director_deployment_dir()?;
    store.ops_files_dir()?;

    let dir = format!("bbl-ops-files/{iaas}/");
    let assets = JUMPBOX_DEPLOYMENT
        .iter()
        .chain(BOSH_DEPLOYMENT)
        .chain(OPS_FILES.iter().filter(|a| a.path.starts_with(dir.as_str())));

    for asset in assets {
        write_asset(store.dir(), asset)?;
    }
    Ok(())
}

fn write_asset(root: &Path, asset: &Asset) -> Result<()> {
    let path = root.join(asset.path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(&path, asset.contents).map_err(|e| Error::io(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_deployments_and_iaas_ops() {
        let temp = TempDir::new().unwrap();
        let store = Store::new(temp.path(), "7.0.0");

        write(&store, Iaas::Gcp).unwrap();

        assert!(temp.path().join("jumpbox-deployment/jumpbox.yml").exists());
        assert!(temp.path().join("jumpbox-deployment/gcp/cpi.yml").exists());
        assert!(temp.path().join("bosh-deployment/bosh.yml").exists());
        assert!(temp.path().join("bosh-deployment/aws/cpi.yml").exists());
        assert!(
            temp.path()
                .join("bbl-ops-files/gcp/bosh-director-ephemeral-ip-ops.yml")
                .exists()
        );
        assert!(!temp.path().join("bbl-ops-files/aws").exists());
    }

    #[test]
    fn test_ops_selection() {
        assert_eq!(
            jumpbox_ops(Iaas::Aws),
            vec!["bbl-ops-files/aws/jumpbox-network-ops.yml"]
        );
        assert_eq!(
            director_ops(Iaas::Gcp),
            vec!["bbl-ops-files/gcp/bosh-director-ephemeral-ip-ops.yml"]
        );
    }

    #[test]
    fn test_every_asset_is_valid_yaml() {
        for asset in JUMPBOX_DEPLOYMENT.iter().chain(BOSH_DEPLOYMENT).chain(OPS_FILES) {
            serde_yaml::from_str::<serde_yaml::Value>(asset.contents)
                .unwrap_or_else(|e| panic!("{}: {e}", asset.path));
        }
    }
}
