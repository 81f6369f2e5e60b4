//! Registry de artifacts compilados en formato Truffle.
//!
//! Cada archivo `<dir>/<Name>.json` aporta `contractName`, `abi` y
//! `bytecode`. Del ABI sólo se extrae la firma del constructor; el resto se
//! conserva como JSON opaco para el transport.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use deploy_core::registry::{ArtifactRegistry, RegistryError};
use deploy_core::{ArtifactDescriptor, ParamSpec, ParamType};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactLoadError {
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse {origin}: {source}")]
    Parse { origin: String, source: serde_json::Error },
    #[error("artifact '{0}' has no bytecode (interface or abstract contract)")]
    NotDeployable(String),
    #[error("artifact '{0}' is defined more than once")]
    Duplicate(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TruffleArtifact {
    contract_name: String,
    #[serde(default)]
    abi: Vec<Value>,
    #[serde(default)]
    bytecode: String,
}

#[derive(Deserialize)]
struct AbiInput {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

/// Parsea un artifact Truffle. `origin` sólo se usa en mensajes de error.
pub fn parse_artifact(json: &str, origin: &str) -> Result<ArtifactDescriptor, ArtifactLoadError> {
    let raw: TruffleArtifact = serde_json::from_str(json).map_err(|source| ArtifactLoadError::Parse { origin: origin.to_string(),
                                                                                                     source })?;
    let code = raw.bytecode.trim();
    if code.is_empty() || code == "0x" {
        return Err(ArtifactLoadError::NotDeployable(raw.contract_name));
    }
    let constructor = raw.abi
                         .iter()
                         .find(|item| item.get("type").and_then(Value::as_str) == Some("constructor"))
                         .and_then(|item| item.get("inputs"))
                         .cloned()
                         .map(serde_json::from_value::<Vec<AbiInput>>)
                         .transpose()
                         .map_err(|source| ArtifactLoadError::Parse { origin: origin.to_string(),
                                                                      source })?
                         .unwrap_or_default()
                         .into_iter()
                         .map(|input| ParamSpec::new(input.name, ParamType::from_solidity(&input.ty)))
                         .collect();
    Ok(ArtifactDescriptor::new(raw.contract_name,
                               constructor,
                               code.to_string(),
                               Value::Array(raw.abi)))
}

/// Registry respaldado por un directorio de build (`build/contracts`).
#[derive(Debug, Default, Clone)]
pub struct DirectoryArtifactRegistry {
    root: PathBuf,
    artifacts: BTreeMap<String, Arc<ArtifactDescriptor>>,
    skipped: Vec<String>,
}

impl DirectoryArtifactRegistry {
    /// Carga todos los `*.json` del directorio. Los artifacts sin bytecode se
    /// omiten (quedan en `skipped`); pedirlos luego produce `UnknownArtifact`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ArtifactLoadError> {
        let root = dir.as_ref().to_path_buf();
        let io_err = |source| ArtifactLoadError::Io { path: root.clone(),
                                                      source };
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&root).map_err(io_err)?
                                                              .filter_map(|e| e.ok().map(|e| e.path()))
                                                              .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                                                              .collect();
        paths.sort();

        let mut registry = Self { root: root.clone(),
                                  ..Self::default() };
        for path in paths {
            let json = std::fs::read_to_string(&path).map_err(|source| ArtifactLoadError::Io { path: path.clone(),
                                                                                              source })?;
            match parse_artifact(&json, &path.display().to_string()) {
                Ok(descriptor) => registry.insert(descriptor)?,
                Err(ArtifactLoadError::NotDeployable(name)) => {
                    log::debug!("skipping non-deployable artifact {name}");
                    registry.skipped.push(name);
                }
                Err(other) => return Err(other),
            }
        }
        log::info!("loaded {} artifact(s) from {}", registry.artifacts.len(), root.display());
        Ok(registry)
    }

    fn insert(&mut self, descriptor: ArtifactDescriptor) -> Result<(), ArtifactLoadError> {
        if self.artifacts.contains_key(&descriptor.name) {
            return Err(ArtifactLoadError::Duplicate(descriptor.name));
        }
        self.artifacts.insert(descriptor.name.clone(), Arc::new(descriptor));
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Artifacts encontrados pero no desplegables.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }
}

impl ArtifactRegistry for DirectoryArtifactRegistry {
    fn lookup(&self, name: &str) -> Result<Arc<ArtifactDescriptor>, RegistryError> {
        self.artifacts
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownArtifact(name.to_string()))
    }

    fn names(&self) -> Vec<String> {
        self.artifacts.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKET: &str = r#"{
        "contractName": "PumlNFTMarket",
        "abi": [{ "type": "function", "name": "listItem", "inputs": [] }],
        "bytecode": "0x6080604052"
    }"#;

    const NFT: &str = r#"{
        "contractName": "PumlNFT",
        "abi": [{ "type": "constructor", "inputs": [{ "name": "baseURI", "type": "string" }] }],
        "bytecode": "0x60806040"
    }"#;

    #[test]
    fn constructor_signature_is_extracted() {
        let nft = parse_artifact(NFT, "PumlNFT.json").unwrap();
        assert_eq!(nft.name, "PumlNFT");
        assert_eq!(nft.constructor, vec![ParamSpec::new("baseURI", ParamType::String)]);
        let market = parse_artifact(MARKET, "PumlNFTMarket.json").unwrap();
        assert!(market.constructor.is_empty());
    }

    #[test]
    fn interfaces_are_not_deployable() {
        let json = r#"{ "contractName": "IERC721", "abi": [], "bytecode": "0x" }"#;
        assert!(matches!(parse_artifact(json, "IERC721.json"),
                         Err(ArtifactLoadError::NotDeployable(name)) if name == "IERC721"));
    }

    #[test]
    fn loads_directory_and_skips_interfaces() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("PumlNFT.json"), NFT).unwrap();
        std::fs::write(dir.path().join("PumlNFTMarket.json"), MARKET).unwrap();
        std::fs::write(dir.path().join("IERC721.json"),
                       r#"{ "contractName": "IERC721", "abi": [], "bytecode": "" }"#).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let registry = DirectoryArtifactRegistry::load(dir.path()).unwrap();
        assert_eq!(registry.names(), vec!["PumlNFT".to_string(), "PumlNFTMarket".to_string()]);
        assert_eq!(registry.skipped(), ["IERC721".to_string()]);
        assert!(matches!(registry.lookup("IERC721"), Err(RegistryError::UnknownArtifact(_))));
        assert_eq!(registry.lookup("PumlNFT").unwrap().bytecode, "0x60806040");
    }
}
