//! Proyección del ledger: estado reconstruido (`LedgerSnapshot`) a partir de
//! los eventos de una red.
//!
//! El replay es lineal: consume eventos en orden y actualiza la entrada del
//! ordinal afectado. `LedgerReset` descarta todo lo anterior, de modo que el
//! log sigue siendo append-only aunque el ledger visible quede vacío.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{LedgerEvent, LedgerEventKind, Resolution, StepPhase};
use crate::network::NetworkId;
use crate::step::StepStatus;
use crate::transport::{DeployReceipt, TransportError};

/// Entrada del ledger para un ordinal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub ordinal: usize,
    pub step_id: String,
    pub artifact: String,
    pub status: StepStatus,
    /// Despliegue confirmado (también presente mientras la post-action está
    /// pendiente o falló).
    pub receipt: Option<DeployReceipt>,
    pub fingerprint: Option<String>,
    pub attempts: u32,
    pub forced: bool,
    pub failed_phase: Option<StepPhase>,
    pub last_error: Option<TransportError>,
    pub note: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    pub fn address(&self) -> Option<&str> {
        self.receipt.as_ref().map(|r| r.address.as_str())
    }

    /// Un intento previo desplegó la unidad pero su post-action falló: el
    /// reintento puede reutilizar la dirección en vez de redesplegar.
    pub fn has_reusable_deployment(&self) -> bool {
        self.status == StepStatus::Failed && self.failed_phase == Some(StepPhase::PostAction) && self.receipt.is_some()
    }
}

/// Estado del ledger de una red.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub network: NetworkId,
    pub initialized: bool,
    pub definition_hash: Option<String>,
    pub entries: BTreeMap<usize, LedgerEntry>,
    /// Último `seq` consumido (incluye eventos anteriores a un reset).
    pub last_seq: Option<u64>,
}

impl LedgerSnapshot {
    pub fn empty(network: NetworkId) -> Self {
        Self { network,
               initialized: false,
               definition_hash: None,
               entries: BTreeMap::new(),
               last_seq: None }
    }

    pub fn entry(&self, ordinal: usize) -> Option<&LedgerEntry> {
        self.entries.get(&ordinal)
    }

    pub fn status(&self, ordinal: usize) -> Option<StepStatus> {
        self.entry(ordinal).map(|e| e.status)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values().filter(|e| e.status == StepStatus::Succeeded)
    }

    /// Reconstruye el estado consumiendo los eventos en orden.
    pub fn replay(network: NetworkId, events: &[LedgerEvent]) -> Self {
        let mut snap = Self::empty(network);
        for ev in events {
            snap.apply(ev);
        }
        snap
    }

    fn apply(&mut self, ev: &LedgerEvent) {
        self.last_seq = Some(ev.seq);
        match &ev.kind {
            LedgerEventKind::LedgerInitialized { definition_hash, .. } => {
                self.initialized = true;
                self.definition_hash = Some(definition_hash.clone());
            }
            LedgerEventKind::LedgerReset { .. } => {
                self.initialized = false;
                self.definition_hash = None;
                self.entries.clear();
            }
            LedgerEventKind::StepStarted { ordinal,
                                           step_id,
                                           artifact,
                                           fingerprint,
                                           forced, } => {
                let entry = self.entries.entry(*ordinal).or_insert_with(|| LedgerEntry { ordinal: *ordinal,
                                                                                         step_id: step_id.clone(),
                                                                                         artifact: artifact.clone(),
                                                                                         status: StepStatus::Pending,
                                                                                         receipt: None,
                                                                                         fingerprint: None,
                                                                                         attempts: 0,
                                                                                         forced: false,
                                                                                         failed_phase: None,
                                                                                         last_error: None,
                                                                                         note: None,
                                                                                         started_at: None,
                                                                                         finished_at: None });
                // Sólo un reintento no forzado con el mismo fingerprint, tras
                // fallo de post-action, conserva el recibo del despliegue.
                let same_inputs = entry.fingerprint.as_deref() == Some(fingerprint.as_str());
                if *forced || !same_inputs || !entry.has_reusable_deployment() {
                    entry.receipt = None;
                }
                entry.step_id = step_id.clone();
                entry.artifact = artifact.clone();
                entry.status = StepStatus::Pending;
                entry.fingerprint = Some(fingerprint.clone());
                entry.forced = *forced;
                entry.attempts += 1;
                entry.failed_phase = None;
                entry.last_error = None;
                entry.note = None;
                entry.started_at = Some(ev.ts);
                entry.finished_at = None;
            }
            LedgerEventKind::StepDeployed { ordinal, receipt, .. } => {
                if let Some(entry) = self.entries.get_mut(ordinal) {
                    entry.receipt = Some(receipt.clone());
                }
            }
            LedgerEventKind::StepSucceeded { ordinal,
                                             receipt,
                                             fingerprint,
                                             .. } => {
                if let Some(entry) = self.entries.get_mut(ordinal) {
                    entry.status = StepStatus::Succeeded;
                    entry.receipt = Some(receipt.clone());
                    entry.fingerprint = Some(fingerprint.clone());
                    entry.finished_at = Some(ev.ts);
                }
            }
            LedgerEventKind::StepFailed { ordinal, phase, error, .. } => {
                if let Some(entry) = self.entries.get_mut(ordinal) {
                    entry.status = StepStatus::Failed;
                    entry.failed_phase = Some(*phase);
                    entry.last_error = Some(error.clone());
                    entry.finished_at = Some(ev.ts);
                }
            }
            LedgerEventKind::StepOutcomeUnknown { ordinal, reason, .. } => {
                if let Some(entry) = self.entries.get_mut(ordinal) {
                    entry.status = StepStatus::Unknown;
                    entry.note = Some(reason.clone());
                }
            }
            LedgerEventKind::StepReconciled { ordinal, resolution, .. } => {
                if let Some(entry) = self.entries.get_mut(ordinal) {
                    match resolution {
                        Resolution::Applied(receipt) => {
                            entry.status = StepStatus::Succeeded;
                            entry.receipt = Some(receipt.clone());
                            entry.note = Some("reconciled: applied".into());
                        }
                        Resolution::NotApplied => {
                            entry.status = StepStatus::Failed;
                            entry.receipt = None;
                            entry.failed_phase = Some(StepPhase::Deploy);
                            entry.note = Some("reconciled: not applied".into());
                        }
                    }
                    entry.finished_at = Some(ev.ts);
                }
            }
        }
    }
}
