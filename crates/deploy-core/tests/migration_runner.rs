use std::sync::Arc;
use std::time::Duration;

use deploy_adapters::SimulatedTransport;
use deploy_core::{ArgBinding, ArtifactDescriptor, DeploymentStep, InMemoryArtifactRegistry, InMemoryLedgerStore,
                  InvokeAction, LedgerEventKind, LedgerStore, MigrationError, MigrationPlan, MigrationRunner,
                  NetworkContext, NetworkProfile, ParamSpec, ParamType, Reconciler, Resolution, RunOptions, StepOutcome,
                  StepPhase, StepStatus, TransportError};
use serde_json::json;

const ACCOUNT: &str = "0x627306090abab3a6e1400e9345bc60c78a8bef57";

fn registry() -> InMemoryArtifactRegistry {
    InMemoryArtifactRegistry::new().with(ArtifactDescriptor::new("A",
                                                                 vec![ParamSpec::new("baseURI", ParamType::String)],
                                                                 "0x6001",
                                                                 json!([])))
                                   .with(ArtifactDescriptor::new("B", vec![], "0x6002", json!([])))
                                   .with(ArtifactDescriptor::new("Market",
                                                                 vec![ParamSpec::new("nft", ParamType::Address)],
                                                                 "0x6003",
                                                                 json!([])))
}

fn profile(name: &str) -> NetworkProfile {
    NetworkProfile::new(name, 5777, ACCOUNT)
}

fn plan_ab() -> MigrationPlan {
    MigrationPlan::builder().deploy("A", [ArgBinding::lit("baseURI")])
                            .deploy("B", [])
                            .build()
                            .unwrap()
}

fn plan_a_market() -> MigrationPlan {
    MigrationPlan::builder().deploy("A", [ArgBinding::lit("baseURI")])
                            .deploy("Market", [ArgBinding::address_of("A")])
                            .build()
                            .unwrap()
}

#[tokio::test]
async fn second_run_is_a_no_op() {
    let store = InMemoryLedgerStore::default();
    let sim = Arc::new(SimulatedTransport::new());
    let ctx = NetworkContext::new(profile("development"), &store, sim.clone());
    let runner = MigrationRunner::new(registry());
    let plan = plan_ab();

    let first = runner.run(&plan, &ctx, &RunOptions::new()).await.unwrap();
    assert!(first.is_success());
    assert_eq!(first.executed_count(), 2);
    assert_eq!(sim.deploy_count(), 2);
    let events_after_first = ctx.ledger().events().unwrap();
    let snapshot_after_first = ctx.ledger().snapshot().unwrap();

    let second = runner.run(&plan, &ctx, &RunOptions::new()).await.unwrap();
    assert!(second.is_success());
    assert_eq!(second.executed_count(), 0);
    assert_eq!(sim.deploy_count(), 2);
    assert!(second.steps
                  .iter()
                  .all(|s| matches!(s.outcome, StepOutcome::AlreadyApplied { drifted: false, .. })));
    assert_eq!(ctx.ledger().events().unwrap(), events_after_first);
    assert_eq!(ctx.ledger().snapshot().unwrap(), snapshot_after_first);
    assert_eq!(second.address_of("A"), first.address_of("A"));
}

#[tokio::test]
async fn failure_halts_before_later_steps() {
    let store = InMemoryLedgerStore::default();
    let sim = Arc::new(SimulatedTransport::new());
    sim.fail_on("A", TransportError::Reverted("constructor reverted".into()));
    let ctx = NetworkContext::new(profile("development"), &store, sim.clone());
    let runner = MigrationRunner::new(registry());

    let report = runner.run(&plan_a_market(), &ctx, &RunOptions::new()).await.unwrap();
    assert!(!report.is_success());
    let halt = report.halted.clone().unwrap();
    assert_eq!(halt.ordinal, 0);
    assert!(matches!(halt.error, MigrationError::Transport { ref step, .. } if step == "A"));
    assert!(matches!(report.steps[0].outcome,
                     StepOutcome::Failed { phase: StepPhase::Deploy, .. }));
    assert_eq!(report.steps[1].outcome, StepOutcome::Blocked);

    let snapshot = ctx.ledger().snapshot().unwrap();
    assert_eq!(snapshot.status(0), Some(StepStatus::Failed));
    assert!(snapshot.entry(1).is_none());
    assert_eq!(sim.deploy_count(), 0);
}

#[tokio::test]
async fn resume_runs_only_failed_and_later_steps() {
    let store = InMemoryLedgerStore::default();
    let sim = Arc::new(SimulatedTransport::new());
    sim.fail_on("Market", TransportError::InsufficientFunds("0 ETH".into()));
    let ctx = NetworkContext::new(profile("development"), &store, sim.clone());
    let runner = MigrationRunner::new(registry());
    let plan = plan_a_market();

    let first = runner.run(&plan, &ctx, &RunOptions::new()).await.unwrap();
    assert_eq!(first.halted.as_ref().map(|h| h.ordinal), Some(1));
    let nft = first.address_of("A").unwrap().to_string();

    sim.clear_failures();
    let second = runner.run(&plan, &ctx, &RunOptions::new()).await.unwrap();
    assert!(second.is_success());
    assert!(matches!(second.steps[0].outcome, StepOutcome::AlreadyApplied { .. }));
    assert!(matches!(second.steps[1].outcome, StepOutcome::Executed { .. }));
    assert_eq!(sim.deploy_count(), 2);
    let market = &sim.deployments()[1];
    assert_eq!(market.constructor_args, vec![json!(nft)]);

    let entry = ctx.ledger().snapshot().unwrap().entry(1).cloned().unwrap();
    assert_eq!(entry.attempts, 2);
    assert_eq!(entry.status, StepStatus::Succeeded);
}

#[tokio::test]
async fn unknown_artifact_leaves_ledger_untouched() {
    let store = InMemoryLedgerStore::default();
    let sim = Arc::new(SimulatedTransport::new());
    let ctx = NetworkContext::new(profile("development"), &store, sim.clone());
    let plan = MigrationPlan::builder().deploy("A", [ArgBinding::lit("x")])
                                       .deploy("Ghost", [])
                                       .build()
                                       .unwrap();

    let err = MigrationRunner::new(registry()).run(&plan, &ctx, &RunOptions::new())
                                              .await
                                              .unwrap_err();
    assert_eq!(err,
               MigrationError::UnknownArtifact { step: "Ghost".into(),
                                                 artifact: "Ghost".into() });
    assert!(ctx.ledger().events().unwrap().is_empty());
    assert_eq!(sim.deploy_count(), 0);
}

#[tokio::test]
async fn networks_do_not_share_ledger_state() {
    let store = InMemoryLedgerStore::default();
    let dev = NetworkContext::new(profile("development"), &store, Arc::new(SimulatedTransport::new()));
    let staging = NetworkContext::new(NetworkProfile::new("staging", 4, ACCOUNT),
                                      &store,
                                      Arc::new(SimulatedTransport::new()));
    let runner = MigrationRunner::new(registry());
    let plan = plan_a_market();
    let options = RunOptions::new();

    let (a, b) = tokio::join!(runner.run(&plan, &dev, &options), runner.run(&plan, &staging, &options));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(a.is_success() && b.is_success());
    assert_ne!(a.address_of("A"), b.address_of("A"));

    for ctx in [&dev, &staging] {
        let events = ctx.ledger().events().unwrap();
        assert!(events.iter().all(|e| &e.network == ctx.id()));
        let snapshot = ctx.ledger().snapshot().unwrap();
        assert_eq!(snapshot.succeeded().count(), 2);
    }
    assert_eq!(store.networks().unwrap().len(), 2);

    // Un ledger vacío en otra red no ve nada de lo anterior.
    let fresh = NetworkContext::new(profile("mainnet"), &store, Arc::new(SimulatedTransport::new()));
    assert!(fresh.ledger().snapshot().unwrap().entries.is_empty());
}

#[tokio::test]
async fn concurrent_run_on_same_network_is_rejected() {
    let store = InMemoryLedgerStore::default();
    let ctx = NetworkContext::new(profile("development"), &store, Arc::new(SimulatedTransport::new()));
    let held = ctx.ledger().lock().unwrap();

    let err = MigrationRunner::new(registry()).run(&plan_ab(), &ctx, &RunOptions::new())
                                              .await
                                              .unwrap_err();
    assert_eq!(err, MigrationError::NetworkLocked(ctx.id().clone()));
    assert!(ctx.ledger().events().unwrap().is_empty());

    drop(held);
    let report = MigrationRunner::new(registry()).run(&plan_ab(), &ctx, &RunOptions::new())
                                                 .await
                                                 .unwrap();
    assert!(report.is_success());
}

#[tokio::test]
async fn timeout_leaves_unknown_entry_that_blocks_resume() {
    let store = InMemoryLedgerStore::default();
    let sim = Arc::new(SimulatedTransport::new());
    sim.hang_on("A");
    let ctx = NetworkContext::new(profile("development"), &store, sim.clone());
    let runner = MigrationRunner::new(registry());
    let plan = plan_ab();
    let options = RunOptions::new().with_timeout(Duration::from_millis(50));

    let first = runner.run(&plan, &ctx, &options).await.unwrap();
    assert!(matches!(first.steps[0].outcome, StepOutcome::Ambiguous { .. }));
    assert!(matches!(first.halted.as_ref().map(|h| &h.error),
                     Some(MigrationError::AmbiguousOutcome { ordinal: 0, .. })));
    assert_eq!(first.steps[1].outcome, StepOutcome::Blocked);
    assert_eq!(ctx.ledger().snapshot().unwrap().status(0), Some(StepStatus::Unknown));

    // Sin reconciliar, la reanudación no asume éxito ni redespliega.
    sim.clear_failures();
    let second = runner.run(&plan, &ctx, &options).await.unwrap();
    assert!(matches!(second.steps[0].outcome, StepOutcome::Ambiguous { .. }));
    assert_eq!(sim.deploy_count(), 0);

    let reconciler = Reconciler::new(&ctx);
    assert_eq!(reconciler.pending().unwrap().len(), 1);
    let entry = reconciler.reconcile_with_transport(&plan, 0).await.unwrap();
    assert_eq!(entry.status, StepStatus::Failed);

    let third = runner.run(&plan, &ctx, &options).await.unwrap();
    assert!(third.is_success());
    assert_eq!(sim.deploy_count(), 2);
}

#[tokio::test]
async fn interrupted_step_blocks_forced_resume_until_reconciled() {
    let store = InMemoryLedgerStore::default();
    let sim = Arc::new(SimulatedTransport::new());
    let ctx = NetworkContext::new(profile("development"), &store, sim.clone());
    let runner = MigrationRunner::new(registry());
    let plan = plan_ab();
    // Proceso anterior murió entre StepStarted y su resultado.
    store.append(ctx.id(),
                 LedgerEventKind::StepStarted { ordinal: 0,
                                                step_id: "A".into(),
                                                artifact: "A".into(),
                                                fingerprint: "fp".into(),
                                                forced: false })
         .unwrap();

    let report = runner.run(&plan, &ctx, &RunOptions::new().force_all()).await.unwrap();
    assert!(matches!(report.halted.as_ref().map(|h| &h.error),
                     Some(MigrationError::AmbiguousOutcome { ordinal: 0, .. })));
    assert!(matches!(report.steps[0].outcome, StepOutcome::Ambiguous { .. }));
    assert_eq!(report.steps[1].outcome, StepOutcome::Blocked);
    assert_eq!(sim.deploy_count(), 0);
    assert_eq!(ctx.ledger().snapshot().unwrap().status(0), Some(StepStatus::Pending));

    Reconciler::new(&ctx).resolve(0, Resolution::NotApplied).unwrap();
    let resumed = runner.run(&plan, &ctx, &RunOptions::new()).await.unwrap();
    assert!(resumed.is_success());
    assert_eq!(sim.deploy_count(), 2);
}

#[tokio::test]
async fn applied_but_unconfirmed_deploy_is_reconciled_as_applied() {
    let store = InMemoryLedgerStore::default();
    let sim = Arc::new(SimulatedTransport::new());
    sim.hang_after_apply("A");
    let ctx = NetworkContext::new(profile("development"), &store, sim.clone());
    let runner = MigrationRunner::new(registry());
    let plan = plan_a_market();
    let options = RunOptions::new().with_timeout(Duration::from_millis(50));

    let first = runner.run(&plan, &ctx, &options).await.unwrap();
    assert!(first.halted.is_some());
    assert_eq!(sim.deploy_count(), 1);

    let resolution = Reconciler::new(&ctx).query(&plan, 0).await.unwrap();
    let applied = sim.deployments()[0].receipt.clone();
    assert_eq!(resolution, Resolution::Applied(applied.clone()));
    Reconciler::new(&ctx).resolve(0, resolution).unwrap();

    sim.clear_failures();
    let second = runner.run(&plan, &ctx, &options).await.unwrap();
    assert!(second.is_success());
    assert_eq!(second.address_of("A"), Some(applied.address.as_str()));
    assert_eq!(sim.deploy_count(), 2);
    assert_eq!(sim.deployments()[1].constructor_args, vec![json!(applied.address)]);
}

#[tokio::test]
async fn forced_step_is_redeployed() {
    let store = InMemoryLedgerStore::default();
    let sim = Arc::new(SimulatedTransport::new());
    let ctx = NetworkContext::new(profile("development"), &store, sim.clone());
    let runner = MigrationRunner::new(registry());
    let plan = plan_ab();
    let first = runner.run(&plan, &ctx, &RunOptions::new()).await.unwrap();

    let forced = runner.run(&plan, &ctx, &RunOptions::new().forcing([0])).await.unwrap();
    assert!(matches!(forced.steps[0].outcome, StepOutcome::Executed { forced: true, .. }));
    assert!(matches!(forced.steps[1].outcome, StepOutcome::AlreadyApplied { .. }));
    assert_ne!(forced.address_of("A"), first.address_of("A"));
    assert_eq!(sim.deploy_count(), 3);

    let all = runner.run(&plan, &ctx, &RunOptions::new().force_all()).await.unwrap();
    assert_eq!(all.executed_count(), 2);
    assert_eq!(sim.deploy_count(), 5);
}

#[tokio::test]
async fn start_from_skips_earlier_steps() {
    let store = InMemoryLedgerStore::default();
    let sim = Arc::new(SimulatedTransport::new());
    let ctx = NetworkContext::new(profile("development"), &store, sim.clone());
    let runner = MigrationRunner::new(registry());

    let report = runner.run(&plan_ab(), &ctx, &RunOptions::new().starting_at(1)).await.unwrap();
    assert_eq!(report.steps[0].outcome, StepOutcome::NotSelected { applied: false });
    assert!(matches!(report.steps[1].outcome, StepOutcome::Executed { .. }));
    assert!(report.halted.is_none());
    assert!(!report.is_success());
    assert_eq!(sim.deployments()[0].step_id, "B");
}

#[tokio::test]
async fn start_from_past_unapplied_dependency_is_rejected() {
    let store = InMemoryLedgerStore::default();
    let ctx = NetworkContext::new(profile("development"), &store, Arc::new(SimulatedTransport::new()));
    let err = MigrationRunner::new(registry()).run(&plan_a_market(), &ctx, &RunOptions::new().starting_at(1))
                                              .await
                                              .unwrap_err();
    assert_eq!(err,
               MigrationError::UnresolvedDependency { step: "Market".into(),
                                                      depends_on: "A".into() });
    assert!(ctx.ledger().events().unwrap().is_empty());
}

#[tokio::test]
async fn post_action_failure_does_not_redeploy_on_resume() {
    let store = InMemoryLedgerStore::default();
    let sim = Arc::new(SimulatedTransport::new());
    sim.fail_invoke("setBaseURI", TransportError::Reverted("not owner".into()));
    let ctx = NetworkContext::new(profile("development"), &store, sim.clone());
    let runner = MigrationRunner::new(registry());
    let plan = MigrationPlan::builder().deploy("A", [ArgBinding::lit("")])
                                       .then(InvokeAction::new("setBaseURI", vec![ArgBinding::lit("ipfs://puml/")]))
                                       .build()
                                       .unwrap();

    let first = runner.run(&plan, &ctx, &RunOptions::new()).await.unwrap();
    assert!(matches!(first.steps[0].outcome,
                     StepOutcome::Failed { phase: StepPhase::PostAction, .. }));
    assert_eq!(sim.deploy_count(), 1);
    let entry = ctx.ledger().snapshot().unwrap().entry(0).cloned().unwrap();
    assert!(entry.has_reusable_deployment());

    sim.clear_failures();
    let second = runner.run(&plan, &ctx, &RunOptions::new()).await.unwrap();
    assert!(second.is_success());
    assert!(matches!(second.steps[0].outcome,
                     StepOutcome::Executed { reused_deployment: true, .. }));
    assert_eq!(sim.deploy_count(), 1);
    let calls = sim.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].to, entry.address().unwrap());
    assert_eq!(calls[0].args, vec![json!("ipfs://puml/")]);
}

#[tokio::test]
async fn reset_forgets_applied_steps() {
    let store = InMemoryLedgerStore::default();
    let sim = Arc::new(SimulatedTransport::new());
    let ctx = NetworkContext::new(profile("development"), &store, sim.clone());
    let runner = MigrationRunner::new(registry());
    let plan = plan_ab();
    runner.run(&plan, &ctx, &RunOptions::new()).await.unwrap();
    let before = ctx.ledger().events().unwrap().len();

    Reconciler::new(&ctx).reset("chain was wiped").unwrap();
    assert!(ctx.ledger().snapshot().unwrap().entries.is_empty());

    let again = runner.run(&plan, &ctx, &RunOptions::new()).await.unwrap();
    assert_eq!(again.executed_count(), 2);
    assert_eq!(sim.deploy_count(), 4);
    let events = ctx.ledger().events().unwrap();
    assert!(events.len() > before + 1);
    assert!(matches!(events[before].kind, LedgerEventKind::LedgerReset { .. }));
}

#[tokio::test]
async fn changed_arguments_are_reported_as_drift() {
    let store = InMemoryLedgerStore::default();
    let sim = Arc::new(SimulatedTransport::new());
    let ctx = NetworkContext::new(profile("development"), &store, sim.clone());
    let runner = MigrationRunner::new(registry());
    runner.run(&plan_ab(), &ctx, &RunOptions::new()).await.unwrap();

    let changed = MigrationPlan::builder().deploy("A", [ArgBinding::lit("ipfs://other/")])
                                          .deploy("B", [])
                                          .build()
                                          .unwrap();
    let report = runner.run(&changed, &ctx, &RunOptions::new()).await.unwrap();
    assert!(matches!(report.steps[0].outcome, StepOutcome::AlreadyApplied { drifted: true, .. }));
    assert_eq!(sim.deploy_count(), 2);
}

#[tokio::test]
async fn reordered_plan_is_a_ledger_mismatch() {
    let store = InMemoryLedgerStore::default();
    let ctx = NetworkContext::new(profile("development"), &store, Arc::new(SimulatedTransport::new()));
    let runner = MigrationRunner::new(registry());
    runner.run(&plan_ab(), &ctx, &RunOptions::new()).await.unwrap();

    let swapped = MigrationPlan::new(vec![DeploymentStep::new(0, "B", vec![]),
                                          DeploymentStep::new(1, "A", vec![ArgBinding::lit("baseURI")])]).unwrap();
    let err = runner.run(&swapped, &ctx, &RunOptions::new()).await.unwrap_err();
    assert!(matches!(err, MigrationError::LedgerMismatch { ordinal: 0, .. }));
}

#[tokio::test]
async fn env_bindings_resolve_from_profile() {
    let store = InMemoryLedgerStore::default();
    let sim = Arc::new(SimulatedTransport::new());
    let plan = MigrationPlan::builder().deploy("A", [ArgBinding::env("baseURI")])
                                       .build()
                                       .unwrap();
    let runner = MigrationRunner::new(registry());

    let bare = NetworkContext::new(profile("development"), &store, sim.clone());
    let err = runner.run(&plan, &bare, &RunOptions::new()).await.unwrap_err();
    assert_eq!(err,
               MigrationError::MissingEnv { step: "A".into(),
                                            key: "baseURI".into() });
    assert!(bare.ledger().events().unwrap().is_empty());

    let configured = NetworkContext::new(profile("staging").with_var("baseURI", "ipfs://puml/"), &store, sim.clone());
    let report = runner.run(&plan, &configured, &RunOptions::new()).await.unwrap();
    assert!(report.is_success());
    assert_eq!(sim.deployments()[0].constructor_args, vec![json!("ipfs://puml/")]);
}
