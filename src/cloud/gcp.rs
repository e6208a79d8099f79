use super::NetworkClient;
use crate::runner;
use anyhow::{Context, Result, bail};
use statekit::{GcpCredentials, Secret};
use std::fs;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

/// `gcloud compute networks list`, authenticated with the service account
/// key from the state.
pub struct GcloudNetworkClient {
    project_id: String,
    key: Secret,
}

impl GcloudNetworkClient {
    pub fn new(credentials: &GcpCredentials) -> Self {
        Self {
            project_id: credentials.project_id.clone(),
            key: credentials.service_account_key.clone(),
        }
    }
}

/// Service account key on disk for the duration of one `gcloud` call.
struct KeyFile(PathBuf);

impl KeyFile {
    fn write(key: &Secret) -> Result<Self> {
        let path = std::env::temp_dir().join(format!("bbl-gcp-key-{}.json", std::process::id()));
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        file.write_all(key.expose().as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(Self(path))
    }
}

impl Drop for KeyFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

impl NetworkClient for GcloudNetworkClient {
    fn get_networks(&self, name: &str) -> Result<Vec<String>> {
        if !runner::on_path("gcloud") {
            log::warn!("gcloud not found on PATH, not checking whether network {name} exists");
            return Ok(Vec::new());
        }

        let key = KeyFile::write(&self.key)?;
        let key_path = key.0.display().to_string();
        let filter = format!("name={name}");
        let captured = runner::run_capture(
            "gcloud",
            &[
                "compute",
                "networks",
                "list",
                "--project",
                &self.project_id,
                "--filter",
                &filter,
                "--format",
                "value(name)",
            ],
            &[("CLOUDSDK_AUTH_CREDENTIAL_FILE_OVERRIDE", key_path.as_str())],
        )?;

        if !captured.success {
            bail!("Failed to list GCP networks: {}", captured.stderr);
        }
        Ok(parse_names(&captured.stdout))
    }
}

fn parse_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert!(parse_names("").is_empty());
        assert_eq!(parse_names("demo-network\n"), vec!["demo-network"]);
    }

    #[test]
    fn test_key_file_is_private_and_removed() {
        use std::os::unix::fs::PermissionsExt;

        let path = {
            let key = KeyFile::write(&Secret::new("{}")).unwrap();
            let mode = fs::metadata(&key.0).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
            key.0.clone()
        };
        assert!(!path.exists());
    }
}
