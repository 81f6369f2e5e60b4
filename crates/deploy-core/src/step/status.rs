use serde::{Deserialize, Serialize};

/// Estado de la entrada de un step en el ledger de una red.
///
/// Transiciones válidas:
/// - (ausente) | `Failed` -> `Pending` (StepStarted)
/// - `Pending` -> `Succeeded` | `Failed` | `Unknown`
/// - `Pending` | `Unknown` -> `Succeeded` | `Failed` (sólo por reconciliación)
/// - `Succeeded` -> `Pending` (sólo con re-ejecución forzada)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    /// El step comenzó y aún no hay resultado confirmado.
    Pending,
    /// El step completó; nunca se re-ejecuta sin `force`.
    Succeeded,
    /// El step falló; la próxima ejecución lo reintenta.
    Failed,
    /// Timeout: requiere reconciliación antes de continuar.
    Unknown,
}

impl StepStatus {
    /// `true` si el resultado no está confirmado (Pending/Unknown).
    pub fn is_ambiguous(self) -> bool {
        matches!(self, Self::Pending | Self::Unknown)
    }
}
