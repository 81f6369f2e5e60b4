//! Tipos de evento del ledger y estructura `LedgerEvent`.
//!
//! Rol en la migración:
//! - Cada transición de step emite un evento a un `LedgerStore` append-only,
//!   particionado por red.
//! - `LedgerSnapshot::replay` reconstruye las entradas del ledger a partir de
//!   estos eventos; nunca se actualizan ni borran filas.
//! - El enum `LedgerEventKind` es el contrato observable y estable del runner
//!   (se persiste como JSON completo).
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::network::NetworkId;
use crate::transport::{DeployReceipt, TransportError};

/// Fase de un step en la que ocurrió un fallo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepPhase {
    Deploy,
    PostAction,
}

/// Resultado de reconciliar un step con resultado ambiguo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// El despliegue sí se aplicó en la red.
    Applied(DeployReceipt),
    /// Confirmado que no se aplicó; el step vuelve a ser ejecutable.
    NotApplied,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerEventKind {
    /// Primer evento de una red (o el primero tras un reset). Fija la
    /// `definition_hash` del plan que la inicializó.
    LedgerInitialized { definition_hash: String, step_count: usize },
    /// Un step comenzó; su entrada pasa a Pending. Se persiste ANTES de llamar
    /// al transport para detectar crashes a mitad de step.
    StepStarted {
        ordinal: usize,
        step_id: String,
        artifact: String,
        fingerprint: String,
        forced: bool,
    },
    /// El transport confirmó el despliegue; la post-action (si existe) aún no
    /// terminó. La entrada sigue Pending.
    StepDeployed {
        ordinal: usize,
        step_id: String,
        receipt: DeployReceipt,
    },
    /// El step completó (despliegue + post-action).
    StepSucceeded {
        ordinal: usize,
        step_id: String,
        receipt: DeployReceipt,
        fingerprint: String,
    },
    /// Fallo terminal del transport. La migración no continúa
    /// (stop-on-failure).
    StepFailed {
        ordinal: usize,
        step_id: String,
        phase: StepPhase,
        error: TransportError,
    },
    /// Timeout: no se sabe si la acción llegó a aplicarse.
    StepOutcomeUnknown { ordinal: usize, step_id: String, reason: String },
    /// Resolución (operador o consulta a la red) de un step Pending/Unknown.
    StepReconciled {
        ordinal: usize,
        step_id: String,
        resolution: Resolution,
    },
    /// Reset explícito: el replay descarta todo lo anterior.
    LedgerReset { reason: String },
}

impl LedgerEventKind {
    /// Nombre estable en minúsculas (columna `event_type` en Postgres).
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::LedgerInitialized { .. } => "ledgerinitialized",
            Self::StepStarted { .. } => "stepstarted",
            Self::StepDeployed { .. } => "stepdeployed",
            Self::StepSucceeded { .. } => "stepsucceeded",
            Self::StepFailed { .. } => "stepfailed",
            Self::StepOutcomeUnknown { .. } => "stepoutcomeunknown",
            Self::StepReconciled { .. } => "stepreconciled",
            Self::LedgerReset { .. } => "ledgerreset",
        }
    }

    /// Ordinal del step afectado, si el evento es de step.
    pub fn ordinal(&self) -> Option<usize> {
        match self {
            Self::StepStarted { ordinal, .. }
            | Self::StepDeployed { ordinal, .. }
            | Self::StepSucceeded { ordinal, .. }
            | Self::StepFailed { ordinal, .. }
            | Self::StepOutcomeUnknown { ordinal, .. }
            | Self::StepReconciled { ordinal, .. } => Some(*ordinal),
            Self::LedgerInitialized { .. } | Self::LedgerReset { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub seq: u64, // asignado por el store (orden de append)
    pub network: NetworkId,
    pub kind: LedgerEventKind,
    pub ts: DateTime<Utc>, // metadato (no entra en fingerprint)
}
