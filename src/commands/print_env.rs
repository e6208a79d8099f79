//! `bbl print-env`: shell exports that target the director with the `bosh`
//! and `credhub` CLIs.

use anyhow::{Context as _, Result, bail};
use boshkit::director::proxy_url;
use boshkit::vars;
use statekit::State;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use super::info::jumpbox_private_key;
use super::load_state;
use crate::Context;
use crate::ui;

const CREDHUB_PORT: u16 = 8844;
const CREDHUB_CLIENT: &str = "credhub-admin";

pub fn run(ctx: &Context) -> Result<()> {
    let state = load_state(ctx)?;
    for (name, value) in exports(&state, &ctx.state_dir, &std::env::temp_dir())? {
        println!("export {name}={}", ui::shell_quote(&value));
    }
    Ok(())
}

/// Variables to export. The jumpbox key is written under `key_root` and
/// outlives this process, since the proxy URL points at it.
fn exports(state: &State, state_dir: &Path, key_root: &Path) -> Result<Vec<(&'static str, String)>> {
    if state.no_director || !state.bosh.is_deployed() {
        bail!("No director has been deployed for this bbl environment");
    }

    let mut env = vec![
        ("BOSH_CLIENT", state.bosh.director_username.clone()),
        ("BOSH_CLIENT_SECRET", state.bosh.director_password.clone()),
        ("BOSH_ENVIRONMENT", state.bosh.director_address.clone()),
        ("BOSH_CA_CERT", state.bosh.director_ssl_ca.clone()),
    ];

    let mut proxy = None;
    if !state.jumpbox.url.is_empty() {
        let key = jumpbox_private_key(state_dir)?;
        let key_path = write_key(key_root, &state.env_id, &key)?;
        let url = proxy_url(&state.jumpbox.url, &key_path);
        env.push(("JUMPBOX_PRIVATE_KEY", key_path.display().to_string()));
        env.push(("BOSH_ALL_PROXY", url.clone()));
        proxy = Some(url);
    }

    let store_path = state_dir.join("vars").join("director-vars-store.yml");
    let store = vars::read_store(&store_path)?;
    match vars::lookup(&store, "credhub_admin_client_secret") {
        Some(secret) => {
            let mut ca = vars::lookup(&store, "credhub_tls.ca").unwrap_or_default().to_string();
            if let Some(uaa_ca) = vars::lookup(&store, "uaa_ssl.ca") {
                if !ca.is_empty() && !ca.ends_with('\n') {
                    ca.push('\n');
                }
                ca.push_str(uaa_ca);
            }
            env.push((
                "CREDHUB_SERVER",
                format!("https://{}:{CREDHUB_PORT}", director_host(&state.bosh.director_address)),
            ));
            env.push(("CREDHUB_CA_CERT", ca));
            env.push(("CREDHUB_CLIENT", CREDHUB_CLIENT.to_string()));
            env.push(("CREDHUB_SECRET", secret.to_string()));
            if let Some(url) = proxy {
                env.push(("CREDHUB_PROXY", url));
            }
        }
        None => log::debug!("no credhub credentials in {}", store_path.display()),
    }
    Ok(env)
}

/// `https://10.0.0.6:25555` -> `10.0.0.6`
fn director_host(address: &str) -> &str {
    let without_scheme = address
        .strip_prefix("https://")
        .or_else(|| address.strip_prefix("http://"))
        .unwrap_or(address);
    without_scheme.split([':', '/']).next().unwrap_or(without_scheme)
}

/// `<key_root>/bbl-jumpbox-<env-id>/jumpbox.key`, mode 0600.
fn write_key(key_root: &Path, env_id: &str, key: &str) -> Result<PathBuf> {
    let dir = key_root.join(format!("bbl-jumpbox-{env_id}"));
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    #[cfg(unix)]
    fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))
        .with_context(|| format!("Failed to restrict {}", dir.display()))?;

    let path = dir.join("jumpbox.key");
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options
        .open(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    file.write_all(key.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use statekit::Bosh;
    use tempfile::TempDir;

    const DIRECTOR_STORE: &str = "credhub_admin_client_secret: ch-secret\n\
        credhub_tls:\n  ca: CREDHUB-CA\n\
        uaa_ssl:\n  ca: UAA-CA\n";

    fn state() -> State {
        State {
            env_id: "demo".to_string(),
            bosh: Bosh {
                director_username: "admin".to_string(),
                director_password: "pw".to_string(),
                director_address: "https://10.0.0.6:25555".to_string(),
                director_ssl_ca: "CA".to_string(),
                ..Bosh::default()
            },
            ..State::default()
        }
    }

    fn lookup<'a>(env: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
        env.iter().find(|(n, _)| *n == name).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_director_only() {
        let temp = TempDir::new().unwrap();
        let env = exports(&state(), temp.path(), temp.path()).unwrap();

        assert_eq!(lookup(&env, "BOSH_CLIENT"), Some("admin"));
        assert_eq!(lookup(&env, "BOSH_ENVIRONMENT"), Some("https://10.0.0.6:25555"));
        assert!(lookup(&env, "BOSH_ALL_PROXY").is_none());
        assert!(lookup(&env, "CREDHUB_SERVER").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_jumpbox_and_credhub() {
        let temp = TempDir::new().unwrap();
        let state_dir = temp.path().join("env");
        let key_root = temp.path().join("keys");
        fs::create_dir_all(state_dir.join("vars")).unwrap();
        fs::write(
            state_dir.join("vars/jumpbox-vars-store.yml"),
            "jumpbox_ssh:\n  private_key: KEY\n",
        )
        .unwrap();
        fs::write(state_dir.join("vars/director-vars-store.yml"), DIRECTOR_STORE).unwrap();

        let mut state = state();
        state.jumpbox.url = "34.1.2.3:22".to_string();
        let env = exports(&state, &state_dir, &key_root).unwrap();

        let key_path = key_root.join("bbl-jumpbox-demo/jumpbox.key");
        assert_eq!(fs::read_to_string(&key_path).unwrap(), "KEY");
        assert_eq!(
            fs::metadata(&key_path).unwrap().permissions().mode() & 0o777,
            0o600
        );
        let proxy = format!("ssh+socks5://jumpbox@34.1.2.3:22?private-key={}", key_path.display());
        assert_eq!(lookup(&env, "BOSH_ALL_PROXY"), Some(proxy.as_str()));
        assert_eq!(lookup(&env, "CREDHUB_PROXY"), Some(proxy.as_str()));
        assert_eq!(lookup(&env, "CREDHUB_SERVER"), Some("https://10.0.0.6:8844"));
        assert_eq!(lookup(&env, "CREDHUB_CA_CERT"), Some("CREDHUB-CA\nUAA-CA"));
        assert_eq!(lookup(&env, "CREDHUB_CLIENT"), Some("credhub-admin"));
        assert_eq!(lookup(&env, "CREDHUB_SECRET"), Some("ch-secret"));
    }

    #[test]
    fn test_requires_director() {
        let temp = TempDir::new().unwrap();
        let mut state = state();
        state.bosh = Bosh::default();
        assert!(exports(&state, temp.path(), temp.path()).is_err());
    }

    #[test]
    fn test_director_host() {
        assert_eq!(director_host("https://10.0.0.6:25555"), "10.0.0.6");
        assert_eq!(director_host("10.0.0.6"), "10.0.0.6");
    }
}
