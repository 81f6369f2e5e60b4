//! Migración de referencia: `PumlNFT("")` seguido de `PumlNFTMarket()`.
//!
//! Sirve como plan por defecto del CLI y de la demo cuando no se indica un
//! plan ni un directorio de artifacts.

use deploy_core::{ArgBinding, ArtifactDescriptor, InMemoryArtifactRegistry, MigrationPlan, ParamSpec, ParamType,
                  PlanError};
use serde_json::json;

pub const NFT: &str = "PumlNFT";
pub const MARKET: &str = "PumlNFTMarket";

/// Plan de dos steps; el NFT recibe una base URI vacía.
pub fn plan() -> Result<MigrationPlan, PlanError> {
    MigrationPlan::builder().deploy(NFT, [ArgBinding::lit("")])
                            .deploy(MARKET, [])
                            .build()
}

/// Descriptores en memoria equivalentes a los artifacts compilados.
pub fn registry() -> InMemoryArtifactRegistry {
    let nft_abi = json!([{ "type": "constructor", "inputs": [{ "name": "baseURI", "type": "string" }] }]);
    InMemoryArtifactRegistry::new().with(ArtifactDescriptor::new(NFT,
                                                                 vec![ParamSpec::new("baseURI", ParamType::String)],
                                                                 "0x608060405234801561001057600080fd5b50",
                                                                 nft_abi))
                                   .with(ArtifactDescriptor::new(MARKET,
                                                                 vec![],
                                                                 "0x6080604052348015600f57600080fd5b50",
                                                                 json!([])))
}
