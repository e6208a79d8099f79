//! Parsed `terraform output -json`.

use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct RawOutput {
    value: Value,
}

/// Terraform outputs by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outputs {
    values: BTreeMap<String, Value>,
}

impl Outputs {
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    /// Parse the `{"name": {"value": ..., "type": ..., "sensitive": ...}}`
    /// document printed by `terraform output -json`. Blank input (no state
    /// yet) is an empty set.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: BTreeMap<String, RawOutput> =
            serde_json::from_str(json).map_err(Error::Outputs)?;
        Ok(Self {
            values: raw.into_iter().map(|(k, v)| (k, v.value)).collect(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// A string output, or [`Error::MissingOutput`].
    pub fn get_string(&self, name: &str) -> Result<String> {
        match self.values.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.to_string()),
            None => Err(Error::MissingOutput(name.to_string())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn into_map(self) -> BTreeMap<String, Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: &str = r#"{
        "director_address": {"sensitive": false, "type": "string", "value": "https://10.0.0.6:25555"},
        "jumpbox__tags": {"sensitive": false, "type": ["list", "string"], "value": ["a", "b"]}
    }"#;

    #[test]
    fn test_parse_outputs() {
        let outputs = Outputs::from_json(JSON).unwrap();
        assert_eq!(
            outputs.get_string("director_address").unwrap(),
            "https://10.0.0.6:25555"
        );
        assert_eq!(outputs.get("jumpbox__tags").unwrap()[1], "b");
    }

    #[test]
    fn test_missing_output() {
        let outputs = Outputs::from_json(JSON).unwrap();
        let err = outputs.get_string("jumpbox_url").unwrap_err();
        assert_eq!(err.to_string(), "missing terraform output: jumpbox_url");
    }

    #[test]
    fn test_blank_is_empty() {
        assert!(Outputs::from_json("  \n").unwrap().is_empty());
        assert!(Outputs::from_json("{}").unwrap().is_empty());
    }
}
