//! Reconciliación de steps con resultado ambiguo (Pending/Unknown) y reset
//! explícito del ledger de una red.
use log::{info, warn};

use crate::errors::MigrationError;
use crate::event::{LedgerEventKind, Resolution};
use crate::model::is_address;
use crate::network::NetworkContext;
use crate::repo::{LedgerEntry, LedgerSnapshot};
use crate::step::{MigrationPlan, StepStatus};
use crate::transport::DeploymentQuery;

/// Operaciones de operador sobre el ledger de una red.
pub struct Reconciler<'c, 's> {
    ctx: &'c NetworkContext<'s>,
}

impl<'c, 's> Reconciler<'c, 's> {
    pub fn new(ctx: &'c NetworkContext<'s>) -> Self {
        Self { ctx }
    }

    /// Entradas que bloquean la reanudación.
    pub fn pending(&self) -> Result<Vec<LedgerEntry>, MigrationError> {
        let snapshot = self.ctx.ledger().snapshot()?;
        Ok(snapshot.entries
                   .into_values()
                   .filter(|e| e.status.is_ambiguous())
                   .collect())
    }

    /// Registra la resolución de un step ambiguo.
    ///
    /// `Applied` deja la entrada `Succeeded` con el recibo dado; `NotApplied`
    /// la deja `Failed` sin recibo, de modo que la próxima ejecución la
    /// reintenta.
    pub fn resolve(&self, ordinal: usize, resolution: Resolution) -> Result<LedgerEntry, MigrationError> {
        let ledger = self.ctx.ledger();
        let _lock = ledger.lock()?;
        let snapshot = ledger.snapshot()?;
        self.record(&snapshot, ordinal, resolution)
    }

    /// Valida la resolución contra `snapshot` y la agrega al ledger. El
    /// llamador debe tener el lock de la red.
    fn record(&self,
              snapshot: &LedgerSnapshot,
              ordinal: usize,
              resolution: Resolution)
              -> Result<LedgerEntry, MigrationError> {
        let entry = snapshot.entry(ordinal)
                            .ok_or_else(|| MigrationError::NotReconcilable { ordinal,
                                                                             reason: "no ledger entry".into() })?;
        if !entry.status.is_ambiguous() {
            return Err(MigrationError::NotReconcilable { ordinal,
                                                         reason: format!("entry is {:?}", entry.status) });
        }
        if let Resolution::Applied(receipt) = &resolution {
            if !is_address(&receipt.address) {
                return Err(MigrationError::NotReconcilable { ordinal,
                                                             reason: format!("'{}' is not an address",
                                                                             receipt.address) });
            }
        }
        let ledger = self.ctx.ledger();
        let step_id = entry.step_id.clone();
        ledger.append(LedgerEventKind::StepReconciled { ordinal,
                                                        step_id: step_id.clone(),
                                                        resolution: resolution.clone() })?;
        info!("reconciled step '{}' (#{}) on {}: {:?}", step_id, ordinal, self.ctx.id(), resolution);
        let updated = ledger.snapshot()?;
        updated.entry(ordinal)
               .cloned()
               .ok_or_else(|| MigrationError::NotReconcilable { ordinal,
                                                                reason: "entry vanished after reconcile".into() })
    }

    /// Pregunta a la red si el despliegue de un step ambiguo llegó a aplicarse.
    ///
    /// Sólo aplica a steps sin post-action: el efecto de una post-action no es
    /// observable a través del transport y requiere resolución manual.
    pub async fn query(&self, plan: &MigrationPlan, ordinal: usize) -> Result<Resolution, MigrationError> {
        let snapshot = self.ctx.ledger().snapshot()?;
        self.query_snapshot(&snapshot, plan, ordinal).await
    }

    async fn query_snapshot(&self,
                            snapshot: &LedgerSnapshot,
                            plan: &MigrationPlan,
                            ordinal: usize)
                            -> Result<Resolution, MigrationError> {
        let entry = snapshot.entry(ordinal)
                            .ok_or_else(|| MigrationError::NotReconcilable { ordinal,
                                                                             reason: "no ledger entry".into() })?;
        if !entry.status.is_ambiguous() {
            return Err(MigrationError::NotReconcilable { ordinal,
                                                         reason: format!("entry is {:?}", entry.status) });
        }
        let step = plan.step_at(ordinal)
                       .ok_or_else(|| MigrationError::NotReconcilable { ordinal,
                                                                        reason: "step not in plan".into() })?;
        if step.post_action.is_some() {
            return Err(MigrationError::NotReconcilable { ordinal,
                                                         reason: "step has a post-action; resolve it manually".into() });
        }
        if let Some(receipt) = entry.receipt.clone() {
            return Ok(Resolution::Applied(receipt));
        }
        let fingerprint = entry.fingerprint
                               .clone()
                               .ok_or_else(|| MigrationError::NotReconcilable { ordinal,
                                                                                reason: "entry has no fingerprint".into() })?;
        let query = DeploymentQuery { network: self.ctx.id().clone(),
                                      chain_id: self.ctx.profile().chain_id,
                                      from: self.ctx.profile().account.clone(),
                                      artifact: entry.artifact.clone(),
                                      fingerprint };
        let found = self.ctx
                        .transport()
                        .find_deployment(&query)
                        .await
                        .map_err(|source| MigrationError::Transport { step: entry.step_id.clone(),
                                                                      source })?;
        Ok(match found {
            Some(receipt) => Resolution::Applied(receipt),
            None => Resolution::NotApplied,
        })
    }

    /// `query` seguido de `resolve`, con el lock de la red tomado durante
    /// ambos sobre un único snapshot.
    pub async fn reconcile_with_transport(&self,
                                          plan: &MigrationPlan,
                                          ordinal: usize)
                                          -> Result<LedgerEntry, MigrationError> {
        let ledger = self.ctx.ledger();
        let _lock = ledger.lock()?;
        let snapshot = ledger.snapshot()?;
        let resolution = self.query_snapshot(&snapshot, plan, ordinal).await?;
        self.record(&snapshot, ordinal, resolution)
    }

    /// Reset explícito: agrega `LedgerReset` y el replay parte de cero. Los
    /// eventos previos se conservan.
    pub fn reset(&self, reason: impl Into<String>) -> Result<(), MigrationError> {
        let reason = reason.into();
        let ledger = self.ctx.ledger();
        let _lock = ledger.lock()?;
        let before = ledger.snapshot()?;
        let applied = before.entries
                            .values()
                            .filter(|e| e.status == StepStatus::Succeeded)
                            .count();
        warn!("resetting ledger of {} ({} applied step(s) forgotten): {}",
              self.ctx.id(),
              applied,
              reason);
        ledger.append(LedgerEventKind::LedgerReset { reason })?;
        Ok(())
    }
}
