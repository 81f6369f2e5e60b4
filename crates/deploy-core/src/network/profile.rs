//! Perfiles de red (`deployflow.toml`).
//!
//! ```toml
//! [networks.development]
//! chain_id = 5777
//! rpc_url = "http://127.0.0.1:7545"
//! account = "0x627306090abab3a6e1400e9345bc60c78a8bef57"
//!
//! [networks.development.vars]
//! base_uri = "ipfs://"
//! ```
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::NetworkId;
use crate::errors::MigrationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkProfile {
    #[serde(default)]
    pub name: String,
    pub chain_id: u64,
    #[serde(default)]
    pub rpc_url: Option<String>,
    /// Cuenta operadora (`from` de los despliegues).
    pub account: String,
    /// Cuentas adicionales disponibles (`accounts.<i>`).
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub vars: IndexMap<String, Value>,
}

impl NetworkProfile {
    pub fn new(name: impl Into<String>, chain_id: u64, account: impl Into<String>) -> Self {
        Self { name: name.into(),
               chain_id,
               rpc_url: None,
               account: account.into(),
               accounts: Vec::new(),
               vars: IndexMap::new() }
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> NetworkId {
        if self.name.is_empty() {
            NetworkId::from_chain_id(self.chain_id)
        } else {
            NetworkId::new(self.name.clone())
        }
    }

    /// Valor para un binding `Env(key)`.
    ///
    /// Claves reservadas: `network`, `chain_id`, `rpc_url`, `account`,
    /// `accounts.<i>` (índice 0 = cuenta operadora). El resto se busca en
    /// `vars`.
    pub fn env_value(&self, key: &str) -> Option<Value> {
        match key {
            "network" => Some(Value::from(self.id().to_string())),
            "chain_id" => Some(Value::from(self.chain_id)),
            "rpc_url" => self.rpc_url.clone().map(Value::from),
            "account" => Some(Value::from(self.account.clone())),
            k => {
                if let Some(idx) = k.strip_prefix("accounts.").and_then(|i| i.parse::<usize>().ok()) {
                    return if idx == 0 {
                        Some(Value::from(self.account.clone()))
                    } else {
                        self.accounts.get(idx - 1).cloned().map(Value::from)
                    };
                }
                self.vars.get(k).cloned()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProfilesFile {
    #[serde(default)]
    networks: IndexMap<String, NetworkProfile>,
}

/// Conjunto de perfiles en orden de declaración.
#[derive(Debug, Clone, Default)]
pub struct NetworkProfiles {
    networks: IndexMap<String, NetworkProfile>,
}

impl NetworkProfiles {
    pub fn from_toml_str(raw: &str) -> Result<Self, MigrationError> {
        let parsed: ProfilesFile =
            toml::from_str(raw).map_err(|e| MigrationError::Config(format!("networks file: {e}")))?;
        let networks = parsed.networks
                             .into_iter()
                             .map(|(name, mut profile)| {
                                 if profile.name.is_empty() {
                                     profile.name = name.clone();
                                 }
                                 (name, profile)
                             })
                             .collect();
        Ok(Self { networks })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, MigrationError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
                                                    MigrationError::Config(format!("read {}: {e}", path.display()))
                                                })?;
        Self::from_toml_str(&raw)
    }

    pub fn insert(&mut self, profile: NetworkProfile) {
        self.networks.insert(profile.name.clone(), profile);
    }

    pub fn get(&self, name: &str) -> Option<&NetworkProfile> {
        self.networks.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.networks.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"
[networks.development]
chain_id = 5777
rpc_url = "http://127.0.0.1:7545"
account = "0x627306090abab3a6e1400e9345bc60c78a8bef57"
accounts = ["0xf17f52151ebef6c7334fad080c5704d77216b732"]

[networks.development.vars]
base_uri = "ipfs://puml/"

[networks.mainnet]
chain_id = 1
account = "0x0000000000000000000000000000000000000001"
"#;

    #[test]
    fn parses_profiles_in_declaration_order() {
        let profiles = NetworkProfiles::from_toml_str(SAMPLE).expect("parse");
        assert_eq!(profiles.names().collect::<Vec<_>>(), vec!["development", "mainnet"]);
        let dev = profiles.get("development").unwrap();
        assert_eq!(dev.id(), NetworkId::from("development"));
        assert_eq!(dev.env_value("chain_id"), Some(json!(5777)));
        assert_eq!(dev.env_value("base_uri"), Some(json!("ipfs://puml/")));
        assert_eq!(dev.env_value("accounts.1"),
                   Some(json!("0xf17f52151ebef6c7334fad080c5704d77216b732")));
        assert_eq!(dev.env_value("accounts.0"), dev.env_value("account"));
        assert_eq!(dev.env_value("missing"), None);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let err = NetworkProfiles::from_toml_str("[networks.x]\nchain_id = \"nope\"").unwrap_err();
        assert!(matches!(err, MigrationError::Config(_)));
    }
}
