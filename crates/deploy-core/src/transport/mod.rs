//! Contrato del Deploy Transport (colaborador externo).
//!
//! El core nunca firma ni difunde transacciones: delega en un
//! `DeployTransport` inyectable. Separar "qué desplegar" (steps) de "cómo
//! desplegar" (transport) permite sustituir red real, simulación o dry-run
//! sin tocar la declaración del plan.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::ArtifactDescriptor;
use crate::network::NetworkId;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum TransportError {
    #[error("transaction reverted: {0}")]
    Reverted(String),
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("network unavailable: {0}")]
    Unavailable(String),
    #[error("transport error: {0}")]
    Other(String),
}

/// Recibo de un despliegue confirmado.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployReceipt {
    pub address: String,
    pub tx_hash: String,
}

/// Solicitud de despliegue ya resuelta (descriptor + argumentos finales).
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub network: NetworkId,
    pub chain_id: u64,
    pub from: String,
    pub step_id: String,
    pub descriptor: Arc<ArtifactDescriptor>,
    pub constructor_args: Vec<Value>,
    /// Fingerprint del step; permite a un transport localizar el despliegue
    /// durante la reconciliación.
    pub fingerprint: String,
}

/// Llamada a un método de una unidad ya desplegada (post-actions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeCall {
    pub network: NetworkId,
    pub chain_id: u64,
    pub from: String,
    pub to: String,
    pub method: String,
    pub args: Vec<Value>,
}

/// Consulta usada para reconciliar un step Pending/Unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentQuery {
    pub network: NetworkId,
    pub chain_id: u64,
    pub from: String,
    pub artifact: String,
    pub fingerprint: String,
}

#[async_trait]
pub trait DeployTransport: Send + Sync {
    /// Nombre del transport para logs (`simulated`, `dry-run`...).
    fn name(&self) -> &str;

    /// Despliega la unidad y espera su confirmación.
    async fn deploy(&self, request: &DeployRequest) -> Result<DeployReceipt, TransportError>;

    /// Ejecuta un método sobre una unidad desplegada. Devuelve el tx hash.
    async fn invoke(&self, call: &InvokeCall) -> Result<String, TransportError>;

    /// Busca en la red un despliegue posiblemente aplicado. `Ok(None)` significa
    /// "confirmado que no existe".
    async fn find_deployment(&self, query: &DeploymentQuery) -> Result<Option<DeployReceipt>, TransportError>;
}
