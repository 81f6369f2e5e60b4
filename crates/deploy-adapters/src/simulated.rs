//! Transport simulado para dry-runs y redes locales de prueba.
//!
//! Las direcciones son deterministas: `sha256(chain_id ‖ sender ‖ nonce)`,
//! con un nonce por (chain, sender). Permite inyectar fallos y bloqueos por
//! step o artifact y registra cada llamada.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use deploy_core::{DeployReceipt, DeployRequest, DeployTransport, DeploymentQuery, InvokeCall, NetworkId, TransportError};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Despliegue aplicado por el transport simulado.
#[derive(Debug, Clone, PartialEq)]
pub struct SimDeployment {
    pub network: NetworkId,
    pub step_id: String,
    pub artifact: String,
    pub fingerprint: String,
    pub constructor_args: Vec<Value>,
    pub receipt: DeployReceipt,
}

/// Comportamiento inyectado para un step (por id) o artifact (por nombre).
#[derive(Debug, Clone)]
enum Fault {
    Fail(TransportError),
    /// No responde nunca; el despliegue no se aplica.
    Hang,
    /// Aplica el despliegue y luego no responde.
    HangAfterApply,
}

#[derive(Default)]
struct SimState {
    nonces: HashMap<(u64, String), u64>,
    deployments: Vec<SimDeployment>,
    calls: Vec<InvokeCall>,
}

#[derive(Default)]
pub struct SimulatedTransport {
    name: String,
    state: Mutex<SimState>,
    faults: DashMap<String, Fault>,
    invoke_faults: DashMap<String, TransportError>,
    latency: Option<Duration>,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self { name: "simulated".to_string(),
               ..Self::default() }
    }

    /// Nombre alternativo para logs (p.ej. `dry-run`).
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(),
               ..Self::default() }
    }

    /// Demora artificial en cada deploy/invoke.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// El deploy de `key` (step id o artifact) falla con `error`.
    pub fn fail_on(&self, key: impl Into<String>, error: TransportError) {
        self.faults.insert(key.into(), Fault::Fail(error));
    }

    /// El deploy de `key` nunca responde y no se aplica.
    pub fn hang_on(&self, key: impl Into<String>) {
        self.faults.insert(key.into(), Fault::Hang);
    }

    /// El deploy de `key` se aplica pero la respuesta nunca llega.
    pub fn hang_after_apply(&self, key: impl Into<String>) {
        self.faults.insert(key.into(), Fault::HangAfterApply);
    }

    /// Las invocaciones de `method` fallan con `error`.
    pub fn fail_invoke(&self, method: impl Into<String>, error: TransportError) {
        self.invoke_faults.insert(method.into(), error);
    }

    pub fn clear_failures(&self) {
        self.faults.clear();
        self.invoke_faults.clear();
    }

    pub fn deploy_count(&self) -> usize {
        self.state().deployments.len()
    }

    pub fn deployments(&self) -> Vec<SimDeployment> {
        self.state().deployments.clone()
    }

    pub fn deployments_on(&self, network: &NetworkId) -> Vec<SimDeployment> {
        self.state()
            .deployments
            .iter()
            .filter(|d| &d.network == network)
            .cloned()
            .collect()
    }

    pub fn calls(&self) -> Vec<InvokeCall> {
        self.state().calls.clone()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fault_for(&self, request: &DeployRequest) -> Option<Fault> {
        self.faults
            .get(&request.step_id)
            .or_else(|| self.faults.get(&request.descriptor.name))
            .map(|f| f.value().clone())
    }

    fn apply(&self, request: &DeployRequest) -> DeployReceipt {
        let mut state = self.state();
        let nonce = state.nonces
                         .entry((request.chain_id, request.from.to_lowercase()))
                         .or_insert(0);
        let address = derive_address(request.chain_id, &request.from, *nonce);
        *nonce += 1;
        let receipt = DeployReceipt { tx_hash: tx_hash(&[address.as_bytes(), request.fingerprint.as_bytes()]),
                                      address };
        state.deployments.push(SimDeployment { network: request.network.clone(),
                                               step_id: request.step_id.clone(),
                                               artifact: request.descriptor.name.clone(),
                                               fingerprint: request.fingerprint.clone(),
                                               constructor_args: request.constructor_args.clone(),
                                               receipt: receipt.clone() });
        receipt
    }

    async fn delay(&self) {
        if let Some(d) = self.latency {
            tokio::time::sleep(d).await;
        }
    }
}

/// Últimos 20 bytes de `sha256(chain_id ‖ sender ‖ nonce)`.
pub fn derive_address(chain_id: u64, sender: &str, nonce: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chain_id.to_be_bytes());
    hasher.update(sender.to_lowercase().as_bytes());
    hasher.update(nonce.to_be_bytes());
    let hex = format!("{:x}", hasher.finalize());
    format!("0x{}", &hex[hex.len() - 40..])
}

fn tx_hash(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for p in parts {
        hasher.update(p);
    }
    format!("0x{:x}", hasher.finalize())
}

#[async_trait]
impl DeployTransport for SimulatedTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deploy(&self, request: &DeployRequest) -> Result<DeployReceipt, TransportError> {
        self.delay().await;
        match self.fault_for(request) {
            Some(Fault::Fail(error)) => Err(error),
            Some(Fault::Hang) => std::future::pending().await,
            Some(Fault::HangAfterApply) => {
                let receipt = self.apply(request);
                log::debug!("simulated deploy of {} applied at {}, withholding receipt",
                            request.step_id,
                            receipt.address);
                std::future::pending().await
            }
            None => {
                let receipt = self.apply(request);
                log::debug!("simulated deploy of {} at {}", request.step_id, receipt.address);
                Ok(receipt)
            }
        }
    }

    async fn invoke(&self, call: &InvokeCall) -> Result<String, TransportError> {
        self.delay().await;
        if let Some(error) = self.invoke_faults.get(&call.method) {
            return Err(error.value().clone());
        }
        let mut state = self.state();
        let seq = state.calls.len() as u64;
        state.calls.push(call.clone());
        Ok(tx_hash(&[call.to.as_bytes(), call.method.as_bytes(), &seq.to_be_bytes()]))
    }

    async fn find_deployment(&self, query: &DeploymentQuery) -> Result<Option<DeployReceipt>, TransportError> {
        Ok(self.state()
               .deployments
               .iter()
               .rev()
               .find(|d| d.network == query.network && d.fingerprint == query.fingerprint)
               .map(|d| d.receipt.clone()))
    }
}
