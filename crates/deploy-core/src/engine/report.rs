//! Resultado de una ejecución: un registro por step, en orden.
use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::MigrationError;
use crate::event::StepPhase;
use crate::network::NetworkId;
use crate::transport::{DeployReceipt, TransportError};

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Desplegado en esta ejecución.
    Executed {
        receipt: DeployReceipt,
        forced: bool,
        reused_deployment: bool,
    },
    /// Ya estaba `Succeeded` en el ledger. `drifted` indica que el
    /// fingerprint actual difiere del registrado.
    AlreadyApplied { receipt: DeployReceipt, drifted: bool },
    Failed { phase: StepPhase, error: TransportError },
    /// Pending/Unknown: requiere reconciliación.
    Ambiguous { reason: String },
    /// No se intentó porque un step anterior detuvo la ejecución.
    Blocked,
    /// Anterior a `start_from`. `applied` refleja el ledger.
    NotSelected { applied: bool },
}

impl StepOutcome {
    /// El step está `Succeeded` tras esta ejecución (ahora o antes).
    pub fn is_applied(&self) -> bool {
        matches!(self,
                 Self::Executed { .. } | Self::AlreadyApplied { .. } | Self::NotSelected { applied: true })
    }

    pub fn receipt(&self) -> Option<&DeployReceipt> {
        match self {
            Self::Executed { receipt, .. } | Self::AlreadyApplied { receipt, .. } => Some(receipt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub ordinal: usize,
    pub step_id: String,
    pub artifact: String,
    pub outcome: StepOutcome,
}

/// Primer step que detuvo la ejecución.
#[derive(Debug, Clone, PartialEq)]
pub struct RunHalt {
    pub ordinal: usize,
    pub step_id: String,
    pub error: MigrationError,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub network: NetworkId,
    pub definition_hash: String,
    pub steps: Vec<StepReport>,
    pub halted: Option<RunHalt>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Éxito sólo si todos los steps quedaron `Succeeded`.
    pub fn is_success(&self) -> bool {
        self.halted.is_none() && self.steps.iter().all(|s| s.outcome.is_applied())
    }

    /// Cantidad de despliegues realizados en esta ejecución.
    pub fn executed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Executed { reused_deployment: false, .. }))
            .count()
    }

    pub fn step(&self, step_id: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    pub fn address_of(&self, step_id: &str) -> Option<&str> {
        self.step(step_id)
            .and_then(|s| s.outcome.receipt())
            .map(|r| r.address.as_str())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run {} on {}", self.run_id, self.network)?;
        for s in &self.steps {
            let detail = match &s.outcome {
                StepOutcome::Executed { receipt, forced, reused_deployment } => {
                    let mut d = format!("deployed at {} (tx {})", receipt.address, receipt.tx_hash);
                    if *forced {
                        d.push_str(" [forced]");
                    }
                    if *reused_deployment {
                        d.push_str(" [reused deployment]");
                    }
                    d
                }
                StepOutcome::AlreadyApplied { receipt, drifted } => {
                    let mut d = format!("already applied at {}", receipt.address);
                    if *drifted {
                        d.push_str(" [drifted]");
                    }
                    d
                }
                StepOutcome::Failed { phase, error } => format!("FAILED in {phase:?}: {error}"),
                StepOutcome::Ambiguous { reason } => format!("AMBIGUOUS: {reason}"),
                StepOutcome::Blocked => "blocked".to_string(),
                StepOutcome::NotSelected { applied } => format!("not selected (applied: {applied})"),
            };
            writeln!(f, "  #{} {} ({}): {}", s.ordinal, s.step_id, s.artifact, detail)?;
        }
        match &self.halted {
            Some(h) => write!(f, "halted at #{} {}: {}", h.ordinal, h.step_id, h.error),
            None if self.is_success() => write!(f, "ok"),
            None => write!(f, "incomplete"),
        }
    }
}
