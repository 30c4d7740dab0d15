//! Read-only secrets
//!
//! Secrets are looked up by dotted name (`warehouse.database`). A YAML
//! secrets file is flattened into that form; environment variables map
//! `kbc_url` to `KBC_URL` and `warehouse.database` to `WAREHOUSE_DATABASE`.

use crate::error::{Error, Result};
use serde_yaml::Value as YamlValue;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Source of secret values
pub trait SecretsProvider: Send + Sync {
    /// Look up a secret by name
    fn secret(&self, name: &str) -> Option<String>;

    /// Look up a secret that must exist and be non-empty
    fn require(&self, name: &str) -> Result<String> {
        self.secret(name)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::missing_field(name))
    }
}

/// Secrets held in memory, usually loaded from a YAML file
#[derive(Clone, Default)]
pub struct Secrets {
    values: BTreeMap<String, String>,
}

impl Secrets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Parse a YAML secrets document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let doc: YamlValue = serde_yaml::from_str(yaml)?;
        let mut values = BTreeMap::new();
        match doc {
            YamlValue::Null => {}
            YamlValue::Mapping(_) => flatten("", &doc, &mut values),
            _ => return Err(Error::config("Secrets file must be a mapping")),
        }
        Ok(Self { values })
    }

    /// Load a YAML secrets file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read secrets file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Secret names, without values
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SecretsProvider for Secrets {
    fn secret(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("names", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn flatten(prefix: &str, value: &YamlValue, out: &mut BTreeMap<String, String>) {
    let scalar = match value {
        YamlValue::Mapping(map) => {
            for (key, nested) in map {
                let Some(key) = yaml_key(key) else { continue };
                let name = if prefix.is_empty() {
                    key
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&name, nested, out);
            }
            return;
        }
        YamlValue::Null => return,
        YamlValue::String(s) => s.clone(),
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Sequence(_) | YamlValue::Tagged(_) => match serde_yaml::to_string(value) {
            Ok(s) => s.trim_end().to_string(),
            Err(_) => return,
        },
    };
    out.insert(prefix.to_string(), scalar);
}

fn yaml_key(key: &YamlValue) -> Option<String> {
    match key {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Secrets read from environment variables
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecrets;

impl EnvSecrets {
    /// Environment variable name for a secret
    pub fn var_name(name: &str) -> String {
        name.replace(['.', '-'], "_").to_ascii_uppercase()
    }
}

impl SecretsProvider for EnvSecrets {
    fn secret(&self, name: &str) -> Option<String> {
        std::env::var(Self::var_name(name)).ok()
    }
}

/// Look secrets up in several providers, first hit wins
#[derive(Default)]
pub struct LayeredSecrets {
    layers: Vec<Box<dyn SecretsProvider>>,
}

impl LayeredSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider with lower precedence than the ones already added
    #[must_use]
    pub fn layer(mut self, provider: impl SecretsProvider + 'static) -> Self {
        self.layers.push(Box::new(provider));
        self
    }
}

impl SecretsProvider for LayeredSecrets {
    fn secret(&self, name: &str) -> Option<String> {
        self.layers.iter().find_map(|p| p.secret(name))
    }
}
