//! Core MigrationRunner implementation

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{info, warn};
use uuid::Uuid;

use super::report::{RunHalt, RunReport, StepOutcome, StepReport};
use super::resolve::resolve_bindings;
use super::RunOptions;
use crate::constants::ENGINE_VERSION;
use crate::errors::MigrationError;
use crate::event::{LedgerEventKind, StepPhase};
use crate::model::{ArgBinding, ArtifactDescriptor, StepFingerprintInput};
use crate::network::{NetworkContext, NetworkLedger};
use crate::registry::ArtifactRegistry;
use crate::repo::{LedgerEntry, LedgerSnapshot};
use crate::step::{ActionContext, DeploymentStep, MigrationPlan, StepStatus};
use crate::transport::{DeployReceipt, DeployRequest, TransportError};

/// Dirección usada para comprobar, antes de desplegar, que los bindings de
/// una post-action son resolubles.
const PLACEHOLDER_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Motor de ejecución de migraciones.
///
/// Recorre el plan en orden ascendente de ordinal contra el ledger de una red:
/// salta lo ya `Succeeded`, ejecuta lo demás y persiste cada transición antes
/// de avanzar. Se detiene en el primer fallo (stop-on-failure).
#[derive(Debug)]
pub struct MigrationRunner<G>
    where G: ArtifactRegistry
{
    registry: G,
}

/// Resultado de ejecutar un step: su outcome y, si detuvo la ejecución, el
/// error.
type StepExecution = (StepOutcome, Option<MigrationError>);

impl<G> MigrationRunner<G> where G: ArtifactRegistry
{
    pub fn new(registry: G) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &G {
        &self.registry
    }

    /// Ejecuta `plan` contra la red de `ctx`.
    ///
    /// Errores de validación (`UnknownArtifact`, `UnresolvedDependency`,
    /// `NetworkLocked`...) se devuelven como `Err` sin tocar el ledger. Los
    /// fallos de runtime quedan en el ledger y en `RunReport::halted`.
    pub async fn run(&self,
                     plan: &MigrationPlan,
                     ctx: &NetworkContext<'_>,
                     options: &RunOptions)
                     -> Result<RunReport, MigrationError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let descriptors = plan.validate_against(&self.registry)?;

        let ledger = ctx.ledger();
        let _lock = ledger.lock()?;
        let snapshot = ledger.snapshot()?;
        preflight(plan, &snapshot, ctx, options)?;

        info!("run {run_id}: network={} steps={} transport={}",
              ctx.id(),
              plan.len(),
              ctx.transport().name());
        if !snapshot.initialized {
            ledger.append(LedgerEventKind::LedgerInitialized { definition_hash: plan.definition_hash().to_string(),
                                                               step_count: plan.len() })?;
        } else if snapshot.definition_hash.as_deref() != Some(plan.definition_hash()) {
            warn!("run {run_id}: plan definition changed since the ledger of {} was initialized",
                  ctx.id());
        }

        let mut outputs: HashMap<String, DeployReceipt> =
            plan.steps()
                .iter()
                .filter_map(|s| {
                    snapshot.entry(s.ordinal)
                            .filter(|e| e.status == StepStatus::Succeeded)
                            .and_then(|e| e.receipt.clone())
                            .map(|r| (s.id.clone(), r))
                })
                .collect();

        let mut steps = Vec::with_capacity(plan.len());
        let mut halted: Option<RunHalt> = None;
        for (step, descriptor) in plan.steps().iter().zip(descriptors) {
            let entry = snapshot.entry(step.ordinal);
            let outcome = if !options.selects(step.ordinal) {
                StepOutcome::NotSelected { applied: entry.is_some_and(|e| e.status == StepStatus::Succeeded) }
            } else if halted.is_some() {
                StepOutcome::Blocked
            } else {
                let (outcome, halt) = self.run_step(run_id, step, descriptor, entry, &mut outputs, ctx, options)
                                          .await?;
                if let Some(error) = halt {
                    halted = Some(RunHalt { ordinal: step.ordinal,
                                            step_id: step.id.clone(),
                                            error });
                }
                outcome
            };
            steps.push(StepReport { ordinal: step.ordinal,
                                    step_id: step.id.clone(),
                                    artifact: step.artifact.clone(),
                                    outcome });
        }

        let report = RunReport { run_id,
                                 network: ctx.id().clone(),
                                 definition_hash: plan.definition_hash().to_string(),
                                 steps,
                                 halted,
                                 started_at,
                                 finished_at: Utc::now() };
        match &report.halted {
            Some(h) => warn!("run {run_id}: halted at #{} {}: {}", h.ordinal, h.step_id, h.error),
            None => info!("run {run_id}: finished, {} deploy(s) executed", report.executed_count()),
        }
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_step(&self,
                      run_id: Uuid,
                      step: &DeploymentStep,
                      descriptor: Arc<ArtifactDescriptor>,
                      entry: Option<&LedgerEntry>,
                      outputs: &mut HashMap<String, DeployReceipt>,
                      ctx: &NetworkContext<'_>,
                      options: &RunOptions)
                      -> Result<StepExecution, MigrationError> {
        let forced = options.force.includes(step.ordinal);
        if let Some(e) = entry {
            if e.status.is_ambiguous() {
                let reason = e.note
                              .clone()
                              .unwrap_or_else(|| "entry left pending by an interrupted run".to_string());
                warn!("run {run_id}: step '{}' (#{}) is {:?}; reconcile before resuming",
                      step.id,
                      step.ordinal,
                      e.status);
                let error = MigrationError::AmbiguousOutcome { step: step.id.clone(),
                                                               ordinal: step.ordinal,
                                                               reason: reason.clone() };
                return Ok((StepOutcome::Ambiguous { reason }, Some(error)));
            }
            if e.status == StepStatus::Succeeded && !forced {
                if let Some(receipt) = e.receipt.clone() {
                    let drifted = resolve_bindings(&step.id, &step.args, outputs, ctx.profile())
                        .map(|args| Some(fingerprint(step, &descriptor, &args)) != e.fingerprint)
                        .unwrap_or(false);
                    if drifted {
                        warn!("run {run_id}: step '{}' already applied but its inputs changed", step.id);
                    }
                    return Ok((StepOutcome::AlreadyApplied { receipt, drifted }, None));
                }
            }
        }

        let args = resolve_bindings(&step.id, &step.args, outputs, ctx.profile())?;
        descriptor.check_args(&args)
                  .map_err(|detail| MigrationError::ArgumentMismatch { step: step.id.clone(),
                                                                       detail })?;
        if let Some(action) = &step.post_action {
            let mut preview = outputs.clone();
            preview.insert(step.id.clone(),
                           DeployReceipt { address: PLACEHOLDER_ADDRESS.to_string(),
                                           tx_hash: String::new() });
            resolve_bindings(&step.id, action.bindings(), &preview, ctx.profile())?;
        }

        let fp = fingerprint(step, &descriptor, &args);
        let reuse = entry.filter(|e| !forced && e.has_reusable_deployment() && e.fingerprint.as_deref() == Some(fp.as_str()))
                         .and_then(|e| e.receipt.clone());
        if forced && entry.is_some_and(|e| e.status == StepStatus::Succeeded) {
            warn!("run {run_id}: forcing re-run of step '{}' (#{}) on {}",
                  step.id,
                  step.ordinal,
                  ctx.id());
        }

        let ledger = ctx.ledger();
        ledger.append(LedgerEventKind::StepStarted { ordinal: step.ordinal,
                                                     step_id: step.id.clone(),
                                                     artifact: step.artifact.clone(),
                                                     fingerprint: fp.clone(),
                                                     forced })?;
        info!("run {run_id}: step '{}' (#{}) started", step.id, step.ordinal);

        let reused_deployment = reuse.is_some();
        let receipt = match reuse {
            Some(r) => {
                info!("run {run_id}: reusing deployment of '{}' at {}", step.id, r.address);
                r
            }
            None => {
                let request = DeployRequest { network: ctx.id().clone(),
                                              chain_id: ctx.profile().chain_id,
                                              from: ctx.profile().account.clone(),
                                              step_id: step.id.clone(),
                                              descriptor,
                                              constructor_args: args,
                                              fingerprint: fp.clone() };
                match bounded(options.step_timeout, ctx.transport().deploy(&request)).await {
                    Ok(Ok(r)) => {
                        ledger.append(LedgerEventKind::StepDeployed { ordinal: step.ordinal,
                                                                      step_id: step.id.clone(),
                                                                      receipt: r.clone() })?;
                        r
                    }
                    Ok(Err(error)) => return mark_failed(ledger, step, StepPhase::Deploy, error),
                    Err(limit) => return mark_unknown(ledger, step, format!("deploy timed out after {limit:?}")),
                }
            }
        };

        if let Some(action) = &step.post_action {
            let mut scoped = outputs.clone();
            scoped.insert(step.id.clone(), receipt.clone());
            let action_args = resolve_bindings(&step.id, action.bindings(), &scoped, ctx.profile())?;
            let actx = ActionContext { network: ctx.id(),
                                       profile: ctx.profile(),
                                       step_id: &step.id,
                                       deployed: &receipt,
                                       args: &action_args,
                                       outputs: &scoped,
                                       transport: ctx.transport() };
            match bounded(options.step_timeout, action.run(&actx)).await {
                Ok(Ok(tx)) => info!("run {run_id}: post-action {} of '{}' done (tx {:?})",
                                    action.name(),
                                    step.id,
                                    tx),
                Ok(Err(error)) => return mark_failed(ledger, step, StepPhase::PostAction, error),
                Err(limit) => {
                    return mark_unknown(ledger,
                                        step,
                                        format!("post-action {} timed out after {limit:?}", action.name()))
                }
            }
        }

        ledger.append(LedgerEventKind::StepSucceeded { ordinal: step.ordinal,
                                                       step_id: step.id.clone(),
                                                       receipt: receipt.clone(),
                                                       fingerprint: fp })?;
        info!("run {run_id}: step '{}' succeeded at {}", step.id, receipt.address);
        outputs.insert(step.id.clone(), receipt.clone());
        Ok((StepOutcome::Executed { receipt,
                                    forced,
                                    reused_deployment },
            None))
    }
}

/// Validaciones que dependen del ledger. Ninguna muta estado.
fn preflight(plan: &MigrationPlan,
             snapshot: &LedgerSnapshot,
             ctx: &NetworkContext<'_>,
             options: &RunOptions)
             -> Result<(), MigrationError> {
    for step in plan.steps() {
        if let Some(entry) = snapshot.entry(step.ordinal) {
            if entry.step_id != step.id {
                return Err(MigrationError::LedgerMismatch { ordinal: step.ordinal,
                                                            recorded: entry.step_id.clone(),
                                                            declared: step.id.clone() });
            }
        }
        if !options.selects(step.ordinal) {
            continue;
        }
        let refs = step.references().chain(step.action_references().into_iter().filter(|r| *r != step.id));
        for reference in refs {
            let Some(dep) = plan.step(reference) else {
                continue;
            };
            let succeeded = snapshot.status(dep.ordinal) == Some(StepStatus::Succeeded);
            if !options.selects(dep.ordinal) && !succeeded {
                return Err(MigrationError::UnresolvedDependency { step: step.id.clone(),
                                                                  depends_on: reference.to_string() });
            }
        }
        let action_bindings = step.post_action.as_ref().map(|a| a.bindings()).unwrap_or_default();
        for binding in step.args.iter().chain(action_bindings) {
            if let ArgBinding::Env(key) = binding {
                if ctx.profile().env_value(key).is_none() {
                    return Err(MigrationError::MissingEnv { step: step.id.clone(),
                                                            key: key.clone() });
                }
            }
        }
    }
    Ok(())
}

fn fingerprint(step: &DeploymentStep, descriptor: &ArtifactDescriptor, args: &[serde_json::Value]) -> String {
    StepFingerprintInput { engine_version: ENGINE_VERSION,
                           step_id: &step.id,
                           artifact: &step.artifact,
                           bytecode_hash: descriptor.bytecode_hash(),
                           args }.fingerprint()
}

/// Aplica el límite de tiempo opcional. `Err` lleva el límite excedido.
async fn bounded<F: Future>(limit: Option<Duration>, fut: F) -> Result<F::Output, Duration> {
    match limit {
        Some(d) => tokio::time::timeout(d, fut).await.map_err(|_| d),
        None => Ok(fut.await),
    }
}

fn mark_failed(ledger: NetworkLedger<'_>,
               step: &DeploymentStep,
               phase: StepPhase,
               error: TransportError)
               -> Result<StepExecution, MigrationError> {
    warn!("step '{}' (#{}) failed in {:?}: {}", step.id, step.ordinal, phase, error);
    ledger.append(LedgerEventKind::StepFailed { ordinal: step.ordinal,
                                                step_id: step.id.clone(),
                                                phase,
                                                error: error.clone() })?;
    let halt = MigrationError::Transport { step: step.id.clone(),
                                           source: error.clone() };
    Ok((StepOutcome::Failed { phase, error }, Some(halt)))
}

fn mark_unknown(ledger: NetworkLedger<'_>, step: &DeploymentStep, reason: String) -> Result<StepExecution, MigrationError> {
    warn!("step '{}' (#{}) outcome unknown: {}", step.id, step.ordinal, reason);
    ledger.append(LedgerEventKind::StepOutcomeUnknown { ordinal: step.ordinal,
                                                        step_id: step.id.clone(),
                                                        reason: reason.clone() })?;
    let halt = MigrationError::AmbiguousOutcome { step: step.id.clone(),
                                                  ordinal: step.ordinal,
                                                  reason: reason.clone() };
    Ok((StepOutcome::Ambiguous { reason }, Some(halt)))
}
