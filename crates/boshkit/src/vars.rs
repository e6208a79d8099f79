//! Vars-files generated from terraform outputs and vars-stores written by
//! `bosh create-env`.

use crate::error::{Error, Result};
use serde_yaml::{Mapping, Value};
use statekit::{IaasConfig, State};
use std::fs;
use std::io;
use std::path::Path;
use tfkit::Outputs;

/// Which VM a vars-file is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Jumpbox,
    Director,
}

impl Target {
    /// Prefix of terraform outputs specific to this VM.
    fn output_prefix(self) -> &'static str {
        match self {
            Self::Jumpbox => "jumpbox__",
            Self::Director => "director__",
        }
    }

    fn other_prefix(self) -> &'static str {
        match self {
            Self::Jumpbox => "director__",
            Self::Director => "jumpbox__",
        }
    }
}

/// Build the vars-file for `target`.
///
/// Every terraform output is passed through, with `<target>__name` outputs
/// renamed to `name` and the other VM's outputs dropped. Non-secret IaaS
/// settings and `director_name` are added. Credentials are never included.
pub fn vars_file(state: &State, outputs: &Outputs, target: Target) -> Mapping {
    let mut vars = Mapping::new();
    for (name, value) in outputs.iter() {
        if name.starts_with(target.other_prefix()) {
            continue;
        }
        let key = name.strip_prefix(target.output_prefix()).unwrap_or(name);
        vars.insert(Value::from(key), json_to_yaml(value));
    }

    vars.insert("director_name".into(), state.director_name().into());

    match &state.iaas {
        Some(IaasConfig::Aws(c)) => {
            vars.insert("region".into(), c.region.as_str().into());
        }
        Some(IaasConfig::Azure(c)) => {
            vars.insert("region".into(), c.region.as_str().into());
        }
        Some(IaasConfig::Gcp(c)) => {
            vars.insert("project_id".into(), c.project_id.as_str().into());
            vars.insert("zone".into(), c.zone.as_str().into());
        }
        Some(IaasConfig::Openstack(c)) => {
            vars.insert("auth_url".into(), c.auth_url.as_str().into());
            vars.insert("az".into(), c.az.as_str().into());
            vars.insert("region".into(), c.region.as_str().into());
            vars.insert("default_key_name".into(), c.default_key_name.as_str().into());
        }
        Some(IaasConfig::Vsphere(_) | IaasConfig::Cloudstack(_)) | None => {}
    }

    vars
}

fn json_to_yaml(value: &serde_json::Value) -> Value {
    serde_yaml::to_value(value).unwrap_or(Value::Null)
}

/// Write a YAML mapping to `path`.
pub fn write_mapping(path: &Path, mapping: &Mapping) -> Result<()> {
    let yaml = serde_yaml::to_string(mapping).map_err(|e| Error::yaml(path, e))?;
    fs::write(path, yaml).map_err(|e| Error::io(path, e))
}

/// Read a vars-store. A missing file is an empty store.
pub fn read_store(path: &Path) -> Result<Mapping> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Mapping::new()),
        Err(e) => return Err(Error::io(path, e)),
    };
    if content.trim().is_empty() {
        return Ok(Mapping::new());
    }
    serde_yaml::from_str(&content).map_err(|e| Error::yaml(path, e))
}

/// Look up `a.b.c` in a vars-store.
pub fn lookup<'a>(store: &'a Mapping, dotted: &str) -> Option<&'a str> {
    let mut parts = dotted.split('.');
    let mut current = store.get(parts.next()?)?;
    for part in parts {
        current = current.get(part)?;
    }
    current.as_str()
}

/// Like [`lookup`], but missing keys are an error naming `path`.
pub fn require(store: &Mapping, dotted: &str, path: &Path) -> Result<String> {
    lookup(store, dotted)
        .map(str::to_string)
        .ok_or_else(|| Error::MissingVar {
            key: dotted.to_string(),
            path: path.to_path_buf(),
        })
}

/// Remove a top-level key from the vars-store at `path`. Returns whether
/// the key was present.
pub fn remove_key(path: &Path, key: &str) -> Result<bool> {
    let mut store = read_store(path)?;
    if store.remove(key).is_none() {
        return Ok(false);
    }
    write_mapping(path, &store)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use statekit::{GcpCredentials, Secret};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn outputs() -> Outputs {
        let mut map = BTreeMap::new();
        map.insert("internal_cidr".to_string(), json!("10.0.0.0/16"));
        map.insert("jumpbox__internal_ip".to_string(), json!("10.0.0.5"));
        map.insert("director__internal_ip".to_string(), json!("10.0.0.6"));
        map.insert("director__tags".to_string(), json!(["bosh"]));
        Outputs::new(map)
    }

    fn state() -> State {
        State {
            iaas: Some(IaasConfig::Gcp(GcpCredentials {
                service_account_key: Secret::new("secret-key"),
                project_id: "proj".to_string(),
                zone: "us-east1-b".to_string(),
                ..GcpCredentials::default()
            })),
            env_id: "demo".to_string(),
            ..State::default()
        }
    }

    #[test]
    fn test_jumpbox_vars_file() {
        let vars = vars_file(&state(), &outputs(), Target::Jumpbox);

        assert_eq!(vars.get("internal_ip").and_then(Value::as_str), Some("10.0.0.5"));
        assert_eq!(vars.get("internal_cidr").and_then(Value::as_str), Some("10.0.0.0/16"));
        assert_eq!(vars.get("project_id").and_then(Value::as_str), Some("proj"));
        assert!(vars.get("tags").is_none());
    }

    #[test]
    fn test_director_vars_file_has_no_secrets() {
        let vars = vars_file(&state(), &outputs(), Target::Director);
        let yaml = serde_yaml::to_string(&vars).unwrap();

        assert_eq!(vars.get("internal_ip").and_then(Value::as_str), Some("10.0.0.6"));
        assert_eq!(vars.get("director_name").and_then(Value::as_str), Some("bosh-demo"));
        assert!(vars.get("tags").is_some_and(Value::is_sequence));
        assert!(!yaml.contains("secret-key"));
    }

    #[test]
    fn test_store_lookup_and_remove() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vars-store.yml");
        fs::write(
            &path,
            "admin_password: pw\ndirector_ssl:\n  ca: CA\njumpbox_ssh:\n  private_key: KEY\n",
        )
        .unwrap();

        let store = read_store(&path).unwrap();
        assert_eq!(lookup(&store, "admin_password"), Some("pw"));
        assert_eq!(lookup(&store, "director_ssl.ca"), Some("CA"));
        assert_eq!(lookup(&store, "director_ssl.certificate"), None);
        assert!(require(&store, "nope", &path).is_err());

        assert!(remove_key(&path, "jumpbox_ssh").unwrap());
        assert!(!remove_key(&path, "jumpbox_ssh").unwrap());
        let store = read_store(&path).unwrap();
        assert_eq!(lookup(&store, "admin_password"), Some("pw"));
        assert_eq!(lookup(&store, "jumpbox_ssh.private_key"), None);
    }

    #[test]
    fn test_missing_store_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(read_store(&temp.path().join("none.yml")).unwrap().is_empty());
    }
}
