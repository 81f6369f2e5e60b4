//! Errores del core.
//!
//! Dos familias:
//! - Validación (`UnknownArtifact`, `UnresolvedDependency`, `InvalidPlan`,
//!   `ArgumentMismatch`, `MissingEnv`...): se detectan antes de mutar el
//!   ledger y se devuelven como `Err` desde `MigrationRunner::run`.
//! - Runtime (`Transport`, `AmbiguousOutcome`): el ledger ya refleja el fallo
//!   (Failed/Unknown) y el error viaja en `RunReport::halted`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::LedgerError;
use crate::network::NetworkId;
use crate::transport::TransportError;

/// Errores estructurales del plan, detectados al construirlo.
#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum PlanError {
    #[error("duplicate ordinal {0}")]
    DuplicateOrdinal(usize),
    #[error("duplicate step id '{0}'")]
    DuplicateStepId(String),
    #[error("step '{step}' references unknown step '{reference}'")]
    UnknownStepReference { step: String, reference: String },
    #[error("step '{step}' references later step '{reference}'")]
    ForwardReference { step: String, reference: String },
    #[error("step '{0}' references its own output in constructor args")]
    SelfReference(String),
    #[error("post-action declared before any deploy step")]
    DanglingPostAction,
}

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum MigrationError {
    #[error("step '{step}': unknown artifact '{artifact}'")]
    UnknownArtifact { step: String, artifact: String },
    #[error("step '{step}' depends on '{depends_on}' which has not succeeded")]
    UnresolvedDependency { step: String, depends_on: String },
    #[error("step '{step}': transport error: {source}")]
    Transport { step: String, source: TransportError },
    #[error("step '{step}' (ordinal {ordinal}) has an ambiguous outcome: {reason}")]
    AmbiguousOutcome { step: String, ordinal: usize, reason: String },
    #[error("invalid plan: {0}")]
    InvalidPlan(#[from] PlanError),
    #[error("step '{step}': argument mismatch: {detail}")]
    ArgumentMismatch { step: String, detail: String },
    #[error("step '{step}': missing environment value '{key}'")]
    MissingEnv { step: String, key: String },
    #[error("ledger entry {ordinal} was recorded for '{recorded}' but the plan declares '{declared}'")]
    LedgerMismatch { ordinal: usize, recorded: String, declared: String },
    #[error("unknown network '{0}'")]
    UnknownNetwork(String),
    #[error("network '{0}' is locked by another run")]
    NetworkLocked(NetworkId),
    #[error("ordinal {ordinal} cannot be reconciled: {reason}")]
    NotReconcilable { ordinal: usize, reason: String },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("ledger: {0}")]
    Ledger(LedgerError),
}

impl From<LedgerError> for MigrationError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Locked(network) => Self::NetworkLocked(network),
            other => Self::Ledger(other),
        }
    }
}

impl MigrationError {
    /// `true` para errores detectados antes de tocar el ledger.
    pub fn is_validation(&self) -> bool {
        !matches!(self,
                  Self::Transport { .. } | Self::AmbiguousOutcome { .. } | Self::Ledger(_))
    }
}
