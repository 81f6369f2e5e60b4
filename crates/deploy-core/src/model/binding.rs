//! Bindings de argumentos de un step.
//!
//! Cada argumento de constructor (o de post-action) se declara como:
//! - `Literal`: valor JSON fijo.
//! - `StepOutput`: salida de un step anterior (sólo referencias hacia atrás).
//! - `Env`: valor provisto por el contexto de red (`account`, `chain_id`...).
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Campo de la salida de un step que puede referenciarse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputField {
    Address,
    TxHash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgBinding {
    Literal(Value),
    StepOutput { step: String, field: OutputField },
    Env(String),
}

impl ArgBinding {
    pub fn lit(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Dirección desplegada por el step `step`.
    pub fn address_of(step: impl Into<String>) -> Self {
        Self::StepOutput { step: step.into(),
                           field: OutputField::Address }
    }

    pub fn tx_of(step: impl Into<String>) -> Self {
        Self::StepOutput { step: step.into(),
                           field: OutputField::TxHash }
    }

    pub fn env(key: impl Into<String>) -> Self {
        Self::Env(key.into())
    }

    /// Step referenciado, si el binding es una referencia.
    pub fn referenced_step(&self) -> Option<&str> {
        match self {
            Self::StepOutput { step, .. } => Some(step.as_str()),
            _ => None,
        }
    }
}
