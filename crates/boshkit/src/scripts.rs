//! create-env / delete-env wrapper scripts.
//!
//! The scripts are rendered from templates into the state directory so an
//! operator can read (and re-run) exactly what bbl runs. IaaS credentials
//! are referenced as environment variables, never written.

use crate::deployments;
use crate::error::{Error, Result};
use minijinja::{Environment, context};
use serde::Serialize;
use statekit::{Iaas, IaasConfig, Secret, State};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const SCRIPT_MODE: u32 = 0o700;

/// One of the four scripts bbl writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    CreateJumpbox,
    DeleteJumpbox,
    CreateDirector,
    DeleteDirector,
}

impl Script {
    pub const ALL: [Self; 4] = [
        Self::CreateJumpbox,
        Self::DeleteJumpbox,
        Self::CreateDirector,
        Self::DeleteDirector,
    ];

    /// Base name without extension, e.g. `create-jumpbox`.
    pub fn name(self) -> &'static str {
        match self {
            Self::CreateJumpbox => "create-jumpbox",
            Self::DeleteJumpbox => "delete-jumpbox",
            Self::CreateDirector => "create-director",
            Self::DeleteDirector => "delete-director",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.sh", self.name())
    }

    /// User-supplied replacement, e.g. `create-jumpbox-override.sh`.
    pub fn override_name(self) -> String {
        format!("{}-override.sh", self.name())
    }

    pub fn is_director(self) -> bool {
        matches!(self, Self::CreateDirector | Self::DeleteDirector)
    }

    fn template(self) -> &'static str {
        match self {
            Self::CreateJumpbox => include_str!("../assets/scripts/create-jumpbox.sh"),
            Self::DeleteJumpbox => include_str!("../assets/scripts/delete-jumpbox.sh"),
            Self::CreateDirector => include_str!("../assets/scripts/create-director.sh"),
            Self::DeleteDirector => include_str!("../assets/scripts/delete-director.sh"),
        }
    }

    fn ops(self, iaas: Iaas) -> Vec<&'static str> {
        if self.is_director() {
            deployments::director_ops(iaas)
        } else {
            deployments::jumpbox_ops(iaas)
        }
    }
}

/// A create-env variable supplied from the environment.
#[derive(Debug, Clone, Serialize)]
struct Credential {
    name: &'static str,
    env: &'static str,
}

const fn cred(name: &'static str, env: &'static str) -> Credential {
    Credential { name, env }
}

/// Each create-env credential variable paired with its value from `config`.
fn credentials(config: &IaasConfig) -> Vec<(Credential, Secret)> {
    let plain = |value: &String| Secret::new(value.as_str());
    match config {
        IaasConfig::Aws(c) => vec![
            (cred("access_key_id", "BBL_AWS_ACCESS_KEY_ID"), plain(&c.access_key_id)),
            (
                cred("secret_access_key", "BBL_AWS_SECRET_ACCESS_KEY"),
                c.secret_access_key.clone(),
            ),
        ],
        IaasConfig::Gcp(c) => vec![(
            cred("gcp_credentials_json", "BBL_GCP_SERVICE_ACCOUNT_KEY"),
            c.service_account_key.clone(),
        )],
        IaasConfig::Azure(c) => vec![
            (cred("client_id", "BBL_AZURE_CLIENT_ID"), plain(&c.client_id)),
            (cred("client_secret", "BBL_AZURE_CLIENT_SECRET"), c.client_secret.clone()),
            (cred("subscription_id", "BBL_AZURE_SUBSCRIPTION_ID"), plain(&c.subscription_id)),
            (cred("tenant_id", "BBL_AZURE_TENANT_ID"), plain(&c.tenant_id)),
        ],
        IaasConfig::Vsphere(c) => vec![
            (cred("vcenter_user", "BBL_VSPHERE_VCENTER_USER"), plain(&c.vcenter_user)),
            (
                cred("vcenter_password", "BBL_VSPHERE_VCENTER_PASSWORD"),
                c.vcenter_password.clone(),
            ),
        ],
        IaasConfig::Openstack(c) => vec![
            (cred("openstack_username", "BBL_OPENSTACK_USERNAME"), plain(&c.username)),
            (cred("openstack_password", "BBL_OPENSTACK_PASSWORD"), c.password.clone()),
            (cred("openstack_domain", "BBL_OPENSTACK_DOMAIN"), plain(&c.domain)),
            (cred("openstack_project", "BBL_OPENSTACK_PROJECT"), plain(&c.project)),
        ],
        IaasConfig::Cloudstack(c) => vec![
            (cred("cloudstack_api_key", "BBL_CLOUDSTACK_API_KEY"), plain(&c.api_key)),
            (
                cred("cloudstack_secret_access_key", "BBL_CLOUDSTACK_SECRET_ACCESS_KEY"),
                c.secret_access_key.clone(),
            ),
        ],
    }
}

fn credential_names(iaas: Iaas) -> Vec<Credential> {
    credentials(&IaasConfig::empty(iaas))
        .into_iter()
        .map(|(credential, _)| credential)
        .collect()
}

/// The environment variables the scripts read credentials from, with their
/// values taken from the state.
pub fn credential_env(state: &State) -> Vec<(String, Secret)> {
    state.iaas.as_ref().map_or_else(Vec::new, |config| {
        credentials(config)
            .into_iter()
            .map(|(credential, value)| (credential.env.to_string(), value))
            .collect()
    })
}

/// Render `script` for `iaas`.
pub fn render(script: Script, iaas: Iaas) -> Result<String> {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    let name = script.file_name();
    let to_error = |source| Error::Template {
        name: name.clone(),
        source,
    };

    env.add_template(script.name(), script.template())
        .map_err(to_error)?;
    let template = env.get_template(script.name()).map_err(to_error)?;
    template
        .render(context! {
            iaas => iaas.as_str(),
            ops => script.ops(iaas),
            credentials => credential_names(iaas),
        })
        .map_err(to_error)
}

/// Write all four scripts into `dir` with mode 0700.
pub fn write_all(dir: &Path, iaas: Iaas) -> Result<()> {
    for script in Script::ALL {
        let path = dir.join(script.file_name());
        fs::write(&path, render(script, iaas)?).map_err(|e| Error::io(&path, e))?;
        #[cfg(unix)]
        fs::set_permissions(&path, fs::Permissions::from_mode(SCRIPT_MODE))
            .map_err(|e| Error::io(&path, e))?;
    }
    Ok(())
}

/// The script to execute: the user's override when present, otherwise
/// bbl's own.
pub fn resolve(dir: &Path, script: Script) -> PathBuf {
    let custom = dir.join(script.override_name());
    if custom.is_file() {
        log::info!("using {}", script.override_name());
        custom
    } else {
        dir.join(script.file_name())
    }
}
