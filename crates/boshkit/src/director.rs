//! Talking to a deployed director through the `bosh` CLI.
//!
//! [`DirectorConnector`] builds an authenticated [`DirectorCli`] from the
//! state. The real implementation shells out to `bosh` and tunnels through
//! the jumpbox with `BOSH_ALL_PROXY`.

use crate::error::{Error, Result};
use crate::vars;
use statekit::{Secret, State, Store};
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use tfkit::TailBuffer;

/// How much of a failed `bosh` invocation's output is kept in the error.
const DETAIL_CAPACITY: usize = 8 * 1024;

/// Operations bbl performs against a running director.
pub trait DirectorCli {
    /// `bosh update-cloud-config <base> -o <ops>... --vars-file <vars>`
    fn update_cloud_config(&self, base: &Path, ops: &[PathBuf], vars: &Path) -> Result<()>;

    /// `bosh update-runtime-config <path> --name <name>`
    fn update_runtime_config(&self, path: &Path, name: &str) -> Result<()>;
}

/// Builds an authenticated [`DirectorCli`] for an environment.
pub trait DirectorConnector {
    fn connect(&self, state: &State, store: &Store) -> Result<Box<dyn DirectorCli>>;
}

// ============================================================================
// bosh CLI
// ============================================================================

/// Credentials and routing for one director.
#[derive(Debug, Clone, Default)]
pub struct Connection {
    pub address: String,
    pub username: String,
    pub password: Secret,
    pub ca_cert: String,
    /// `ssh+socks5://` proxy through the jumpbox
    pub all_proxy: Option<String>,
}

impl Connection {
    fn env(&self) -> Vec<(&'static str, &str)> {
        let mut env = vec![
            ("BOSH_ENVIRONMENT", self.address.as_str()),
            ("BOSH_CLIENT", self.username.as_str()),
            ("BOSH_CLIENT_SECRET", self.password.expose()),
            ("BOSH_CA_CERT", self.ca_cert.as_str()),
        ];
        if let Some(proxy) = &self.all_proxy {
            env.push(("BOSH_ALL_PROXY", proxy.as_str()));
        }
        env
    }
}

/// Jumpbox private key written out for the proxy; removed on drop.
#[derive(Debug)]
struct KeyFile(PathBuf);

impl KeyFile {
    fn write(path: PathBuf, key: &str) -> Result<Self> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&path).map_err(|e| Error::io(&path, e))?;
        file.write_all(key.as_bytes())
            .map_err(|e| Error::io(&path, e))?;
        // An existing file keeps its old mode through `open`.
        #[cfg(unix)]
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::io(&path, e))?;
        Ok(Self(path))
    }
}

impl Drop for KeyFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

/// `ssh+socks5://jumpbox@<url>?private-key=<path>`
pub fn proxy_url(jumpbox_url: &str, key_path: &Path) -> String {
    format!(
        "ssh+socks5://jumpbox@{jumpbox_url}?private-key={}",
        key_path.display()
    )
}

/// Runs the `bosh` binary from `PATH`.
#[derive(Debug)]
pub struct BoshCli {
    connection: Connection,
    debug: bool,
    _key: Option<KeyFile>,
}

impl BoshCli {
    pub fn new(connection: Connection, debug: bool) -> Self {
        Self {
            connection,
            debug,
            _key: None,
        }
    }

    fn run(&self, args: &[String]) -> Result<()> {
        let command = args.first().cloned().unwrap_or_default();
        log::debug!("running bosh {}", args.join(" "));

        let mut cmd = Command::new("bosh");
        cmd.arg("-n")
            .args(args)
            .envs(self.connection.env())
            .stdin(Stdio::null());

        let spawn_error = |source| Error::Spawn {
            script: "bosh".to_string(),
            source,
        };

        let (code, detail) = if self.debug {
            let status = cmd.status().map_err(spawn_error)?;
            (status.code(), String::new())
        } else {
            let output = cmd.output().map_err(spawn_error)?;
            let mut tail = TailBuffer::new(DETAIL_CAPACITY);
            tail.push(&output.stdout);
            tail.push(&output.stderr);
            (output.status.code(), tail.contents().trim_end().to_string())
        };

        if code == Some(0) {
            Ok(())
        } else {
            Err(Error::Director {
                command,
                code,
                detail,
            })
        }
    }
}

impl DirectorCli for BoshCli {
    fn update_cloud_config(&self, base: &Path, ops: &[PathBuf], vars: &Path) -> Result<()> {
        let mut args = vec![
            "update-cloud-config".to_string(),
            base.display().to_string(),
        ];
        for op in ops {
            args.push("-o".to_string());
            args.push(op.display().to_string());
        }
        args.push("--vars-file".to_string());
        args.push(vars.display().to_string());
        self.run(&args)
    }

    fn update_runtime_config(&self, path: &Path, name: &str) -> Result<()> {
        self.run(&[
            "update-runtime-config".to_string(),
            path.display().to_string(),
            "--name".to_string(),
            name.to_string(),
        ])
    }
}

/// Connects with the `bosh` CLI, proxying through the jumpbox when one has
/// been deployed.
#[derive(Debug, Clone, Default)]
pub struct BoshConnector {
    debug: bool,
}

impl BoshConnector {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }
}

impl DirectorConnector for BoshConnector {
    fn connect(&self, state: &State, store: &Store) -> Result<Box<dyn DirectorCli>> {
        if !state.bosh.is_deployed() {
            return Err(Error::NoDirector);
        }

        let mut cli = BoshCli::new(
            Connection {
                address: state.bosh.director_address.clone(),
                username: state.bosh.director_username.clone(),
                password: Secret::new(state.bosh.director_password.as_str()),
                ca_cert: state.bosh.director_ssl_ca.clone(),
                all_proxy: None,
            },
            self.debug,
        );

        if !state.jumpbox.url.is_empty() {
            let store_path = store.vars_dir()?.join("jumpbox-vars-store.yml");
            let jumpbox_vars = vars::read_store(&store_path)?;
            let key = vars::require(&jumpbox_vars, "jumpbox_ssh.private_key", &store_path)?;
            let key_path = std::env::temp_dir().join(format!(
                "bbl-jumpbox-{}-{}.key",
                state.env_id,
                std::process::id()
            ));
            let key_file = KeyFile::write(key_path, &key)?;
            cli.connection.all_proxy = Some(proxy_url(&state.jumpbox.url, &key_file.0));
            cli._key = Some(key_file);
        }

        Ok(Box::new(cli))
    }
}

// ============================================================================
// Mock
// ============================================================================

/// A call recorded by [`MockDirectorCli`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectorCall {
    UpdateCloudConfig {
        base: PathBuf,
        ops: Vec<PathBuf>,
        vars: PathBuf,
    },
    UpdateRuntimeConfig {
        path: PathBuf,
        name: String,
    },
}

#[derive(Debug, Default)]
struct MockInner {
    calls: Vec<DirectorCall>,
    connections: usize,
    fail_cloud_config: bool,
    fail_runtime_config: bool,
    unreachable: bool,
}

/// In-memory director for tests. Acts as its own connector.
#[derive(Debug, Clone, Default)]
pub struct MockDirectorCli {
    inner: Arc<Mutex<MockInner>>,
}

impl MockDirectorCli {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail_cloud_config(&self) -> &Self {
        self.lock().fail_cloud_config = true;
        self
    }

    pub fn fail_runtime_config(&self) -> &Self {
        self.lock().fail_runtime_config = true;
        self
    }

    /// Make [`DirectorConnector::connect`] fail as if the director were down.
    pub fn unreachable(&self) -> &Self {
        self.lock().unreachable = true;
        self
    }

    pub fn calls(&self) -> Vec<DirectorCall> {
        self.lock().calls.clone()
    }

    pub fn connections(&self) -> usize {
        self.lock().connections
    }

    fn failure(command: &str) -> Error {
        Error::Director {
            command: command.to_string(),
            code: Some(1),
            detail: String::new(),
        }
    }
}

impl DirectorCli for MockDirectorCli {
    fn update_cloud_config(&self, base: &Path, ops: &[PathBuf], vars: &Path) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(DirectorCall::UpdateCloudConfig {
            base: base.to_path_buf(),
            ops: ops.to_vec(),
            vars: vars.to_path_buf(),
        });
        if inner.fail_cloud_config {
            return Err(Self::failure("update-cloud-config"));
        }
        Ok(())
    }

    fn update_runtime_config(&self, path: &Path, name: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(DirectorCall::UpdateRuntimeConfig {
            path: path.to_path_buf(),
            name: name.to_string(),
        });
        if inner.fail_runtime_config {
            return Err(Self::failure("update-runtime-config"));
        }
        Ok(())
    }
}

impl DirectorConnector for MockDirectorCli {
    fn connect(&self, state: &State, _store: &Store) -> Result<Box<dyn DirectorCli>> {
        let mut inner = self.lock();
        if inner.unreachable {
            return Err(Self::failure("env"));
        }
        if !state.bosh.is_deployed() {
            return Err(Error::NoDirector);
        }
        inner.connections += 1;
        Ok(Box::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_proxy_url() {
        assert_eq!(
            proxy_url("34.1.2.3:22", Path::new("/tmp/key")),
            "ssh+socks5://jumpbox@34.1.2.3:22?private-key=/tmp/key"
        );
    }

    #[test]
    fn test_connection_env() {
        let connection = Connection {
            address: "https://10.0.0.6:25555".to_string(),
            username: "admin".to_string(),
            password: Secret::new("pw"),
            ca_cert: "CA".to_string(),
            all_proxy: Some("ssh+socks5://jumpbox@host:22".to_string()),
        };
        let env = connection.env();
        assert!(env.contains(&("BOSH_ENVIRONMENT", "https://10.0.0.6:25555")));
        assert!(env.contains(&("BOSH_CLIENT_SECRET", "pw")));
        assert!(env.contains(&("BOSH_ALL_PROXY", "ssh+socks5://jumpbox@host:22")));
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_removed_on_drop() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("jumpbox.key");
        {
            let key = KeyFile::write(path.clone(), "PRIVATE").unwrap();
            let mode = fs::metadata(&key.0).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_connector_requires_director() {
        let temp = TempDir::new().unwrap();
        let store = Store::new(temp.path(), "7.0.0");
        let result = BoshConnector::new(false).connect(&State::default(), &store);
        assert!(matches!(result, Err(Error::NoDirector)));
    }

    #[test]
    fn test_connector_reads_jumpbox_key() {
        let temp = TempDir::new().unwrap();
        let store = Store::new(temp.path(), "7.0.0");
        fs::create_dir_all(temp.path().join("vars")).unwrap();
        fs::write(
            temp.path().join("vars/jumpbox-vars-store.yml"),
            "jumpbox_ssh:\n  private_key: KEY\n",
        )
        .unwrap();

        let mut state = State::default();
        state.env_id = "proxy-test".to_string();
        state.jumpbox.url = "1.2.3.4:22".to_string();
        state.bosh.director_address = "https://10.0.0.6:25555".to_string();

        assert!(BoshConnector::new(false).connect(&state, &store).is_ok());
    }

    #[test]
    fn test_mock_records_calls() {
        let mock = MockDirectorCli::new();
        mock.fail_runtime_config();

        mock.update_cloud_config(Path::new("base.yml"), &[], Path::new("vars.yml"))
            .unwrap();
        assert!(mock.update_runtime_config(Path::new("rc.yml"), "dns").is_err());
        assert_eq!(mock.calls().len(), 2);
    }
}
