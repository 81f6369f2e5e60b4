//! deployflow
//!
//! Fachada del workspace: re-exporta el core, los adapters y la persistencia
//! y ofrece la migración PumlNFT / PumlNFTMarket lista para ejecutar contra
//! cualquier `LedgerStore` y `DeployTransport`.

use std::sync::Arc;

pub use deploy_adapters;
pub use deploy_core;
pub use deploy_persistence;

use deploy_adapters::puml;
use deploy_core::constants::DEFAULT_NETWORK;
use deploy_core::{DeployTransport, LedgerStore, MigrationError, MigrationRunner, NetworkContext, NetworkProfile,
                  NetworkProfiles, RunOptions, RunReport};

/// Cuenta y chain id de la red local de desarrollo.
pub const DEV_ACCOUNT: &str = "0x627306090abab3a6e1400e9345bc60c78a8bef57";
pub const DEV_CHAIN_ID: u64 = 5777;

/// Perfiles con sólo la red `development`.
pub fn development_profiles() -> NetworkProfiles {
    let mut profiles = NetworkProfiles::default();
    profiles.insert(NetworkProfile::new(DEFAULT_NETWORK, DEV_CHAIN_ID, DEV_ACCOUNT));
    profiles
}

/// Ejecuta la migración PumlNFT / PumlNFTMarket sobre `network`.
pub async fn run_puml_migration(network: &str,
                                profiles: &NetworkProfiles,
                                store: &dyn LedgerStore,
                                transport: Arc<dyn DeployTransport>,
                                options: &RunOptions)
                                -> Result<RunReport, MigrationError> {
    let plan = puml::plan()?;
    let ctx = NetworkContext::resolve(network, profiles, store, transport)?;
    MigrationRunner::new(puml::registry()).run(&plan, &ctx, options).await
}
