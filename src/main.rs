//! Demo: ejecuta dos veces la migración PumlNFT / PumlNFTMarket sobre
//! `development` y muestra que la segunda pasada no redespliega nada.
//!
//! Sin features el ledger vive en memoria. Con `--features pg_demo` se usa
//! Postgres (`DATABASE_URL`) y el ledger sobrevive entre ejecuciones.

use std::sync::Arc;

use deploy_adapters::puml;
use deploy_adapters::SimulatedTransport;
use deploy_core::constants::DEFAULT_NETWORK;
use deploy_core::{LedgerStore, RunOptions};
use deployflow::{development_profiles, run_puml_migration};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
                             .init();

    #[cfg(feature = "pg_demo")]
    let store = {
        let pool = deploy_persistence::build_dev_pool_from_env()?;
        deploy_persistence::PgLedgerStore::from_pool(pool)
    };
    #[cfg(not(feature = "pg_demo"))]
    let store = deploy_core::InMemoryLedgerStore::default();

    run_demo(&store).await
}

async fn run_demo(store: &dyn LedgerStore) -> anyhow::Result<()> {
    let profiles = development_profiles();
    let transport = Arc::new(SimulatedTransport::named("demo"));
    let options = RunOptions::new();

    let first = run_puml_migration(DEFAULT_NETWORK, &profiles, store, transport.clone(), &options).await?;
    println!("{first}");
    let second = run_puml_migration(DEFAULT_NETWORK, &profiles, store, transport.clone(), &options).await?;
    println!("{second}");

    tracing::info!("second pass executed {} step(s); transport saw {} deployment(s)",
                   second.executed_count(),
                   transport.deploy_count());
    if let (Some(nft), Some(market)) = (second.address_of(puml::NFT), second.address_of(puml::MARKET)) {
        println!("{} -> {nft}\n{} -> {market}", puml::NFT, puml::MARKET);
    }
    Ok(())
}
