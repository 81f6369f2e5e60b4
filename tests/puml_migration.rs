use std::sync::Arc;

use deploy_adapters::{puml, SimulatedTransport};
use deploy_core::constants::DEFAULT_NETWORK;
use deploy_core::{InMemoryLedgerStore, LedgerSnapshot, LedgerStore, MigrationError, NetworkId, RunOptions,
                  StepOutcome, StepStatus};
use deploy_persistence::FileLedgerStore;
use deployflow::{development_profiles, run_puml_migration};

#[tokio::test]
async fn fresh_network_deploys_nft_then_market() {
    let store = InMemoryLedgerStore::default();
    let transport = Arc::new(SimulatedTransport::new());
    let report = run_puml_migration(DEFAULT_NETWORK,
                                    &development_profiles(),
                                    &store,
                                    transport.clone(),
                                    &RunOptions::new()).await
                                                       .unwrap();
    assert!(report.is_success());
    assert_eq!(report.executed_count(), 2);
    let order: Vec<String> = transport.deployments().into_iter().map(|d| d.artifact).collect();
    assert_eq!(order, vec![puml::NFT.to_string(), puml::MARKET.to_string()]);
    assert_ne!(report.address_of(puml::NFT), report.address_of(puml::MARKET));

    let net = NetworkId::from(DEFAULT_NETWORK);
    let snapshot = LedgerSnapshot::replay(net.clone(), &store.list(&net).unwrap());
    assert_eq!(snapshot.status(0), Some(StepStatus::Succeeded));
    assert_eq!(snapshot.status(1), Some(StepStatus::Succeeded));
}

#[tokio::test]
async fn rerun_against_file_ledger_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(SimulatedTransport::new());
    let first = {
        let store = FileLedgerStore::open(dir.path()).unwrap();
        run_puml_migration(DEFAULT_NETWORK, &development_profiles(), &store, transport.clone(), &RunOptions::new()).await
                                                                                                                  .unwrap()
    };
    let reopened = FileLedgerStore::open(dir.path()).unwrap();
    let second = run_puml_migration(DEFAULT_NETWORK,
                                    &development_profiles(),
                                    &reopened,
                                    transport.clone(),
                                    &RunOptions::new()).await
                                                       .unwrap();

    assert_eq!(transport.deploy_count(), 2);
    assert_eq!(second.executed_count(), 0);
    assert!(second.steps
                  .iter()
                  .all(|s| matches!(s.outcome, StepOutcome::AlreadyApplied { drifted: false, .. })));
    assert_eq!(first.address_of(puml::MARKET), second.address_of(puml::MARKET));
}

#[tokio::test]
async fn unknown_network_is_rejected() {
    let store = InMemoryLedgerStore::default();
    let err = run_puml_migration("mainnet",
                                 &development_profiles(),
                                 &store,
                                 Arc::new(SimulatedTransport::new()),
                                 &RunOptions::new()).await
                                                    .unwrap_err();
    assert_eq!(err, MigrationError::UnknownNetwork("mainnet".into()));
    assert!(store.networks().unwrap().is_empty());
}
