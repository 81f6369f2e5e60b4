use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{LedgerEvent, LedgerEventKind};
use crate::network::NetworkId;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum LedgerError {
    #[error("network '{0}' is locked by another run")]
    Locked(NetworkId),
    #[error("corrupt ledger for '{network}': {detail}")]
    Corrupt { network: NetworkId, detail: String },
    #[error("storage error: {0}")]
    Storage(String),
}

/// Guard del lock exclusivo por red. Libera el lock al hacer drop.
pub struct LedgerLock {
    network: NetworkId,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl LedgerLock {
    pub fn new(network: NetworkId, release: impl FnOnce() + Send + 'static) -> Self {
        Self { network,
               release: Some(Box::new(release)) }
    }

    pub fn network(&self) -> &NetworkId {
        &self.network
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for LedgerLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerLock").field("network", &self.network).finish_non_exhaustive()
    }
}

/// Almacenamiento de eventos append-only particionado por red.
///
/// Contrato:
/// - `append` asigna `seq` creciente por red y es durable al retornar.
/// - `list` devuelve los eventos de UNA red en orden ascendente de `seq`.
/// - `lock` otorga exclusividad de escritura por red durante una migración;
///   un segundo intento concurrente falla con `LedgerError::Locked`.
pub trait LedgerStore: Send + Sync {
    /// Agrega un evento a partir de su kind y devuelve el evento completo.
    fn append(&self, network: &NetworkId, kind: LedgerEventKind) -> Result<LedgerEvent, LedgerError>;
    /// Lista eventos de una red (orden ascendente por seq).
    fn list(&self, network: &NetworkId) -> Result<Vec<LedgerEvent>, LedgerError>;
    /// Adquiere el lock exclusivo de la red.
    fn lock(&self, network: &NetworkId) -> Result<LedgerLock, LedgerError>;
    /// Redes con al menos un evento.
    fn networks(&self) -> Result<Vec<NetworkId>, LedgerError>;
}

/// Store en memoria. Cada red tiene su propio vector; el `DashMap` aísla
/// las escrituras por red.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    inner: Arc<DashMap<NetworkId, Vec<LedgerEvent>>>,
    locks: Arc<DashMap<NetworkId, ()>>,
}

impl InMemoryLedgerStore {
    /// Store pre-cargado con eventos existentes (p.ej. copia de un ledger
    /// persistente para un dry-run). Re-numera `seq` desde 0.
    pub fn seeded(network: &NetworkId, events: Vec<LedgerEvent>) -> Self {
        let store = Self::default();
        let copied = events.into_iter()
                           .enumerate()
                           .map(|(i, ev)| LedgerEvent { seq: i as u64,
                                                        network: network.clone(),
                                                        ..ev })
                           .collect();
        store.inner.insert(network.clone(), copied);
        store
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn append(&self, network: &NetworkId, kind: LedgerEventKind) -> Result<LedgerEvent, LedgerError> {
        let mut events = self.inner.entry(network.clone()).or_default();
        let ev = LedgerEvent { seq: events.len() as u64,
                               network: network.clone(),
                               kind,
                               ts: Utc::now() };
        events.push(ev.clone());
        Ok(ev)
    }

    fn list(&self, network: &NetworkId) -> Result<Vec<LedgerEvent>, LedgerError> {
        Ok(self.inner.get(network).map(|v| v.clone()).unwrap_or_default())
    }

    fn lock(&self, network: &NetworkId) -> Result<LedgerLock, LedgerError> {
        use dashmap::mapref::entry::Entry;
        match self.locks.entry(network.clone()) {
            Entry::Occupied(_) => Err(LedgerError::Locked(network.clone())),
            Entry::Vacant(slot) => {
                slot.insert(());
                let locks = Arc::clone(&self.locks);
                let key = network.clone();
                Ok(LedgerLock::new(network.clone(), move || {
                    locks.remove(&key);
                }))
            }
        }
    }

    fn networks(&self) -> Result<Vec<NetworkId>, LedgerError> {
        let mut nets: Vec<NetworkId> = self.inner.iter().map(|e| e.key().clone()).collect();
        nets.sort();
        Ok(nets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_contiguous_per_network() {
        let store = InMemoryLedgerStore::default();
        let dev = NetworkId::from("development");
        let other = NetworkId::from("rinkeby");
        for i in 0..3 {
            store.append(&dev, LedgerEventKind::LedgerReset { reason: format!("r{i}") }).unwrap();
        }
        store.append(&other, LedgerEventKind::LedgerReset { reason: "x".into() }).unwrap();
        let seqs: Vec<u64> = store.list(&dev).unwrap().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(store.list(&other).unwrap()[0].seq, 0);
        assert_eq!(store.networks().unwrap(), vec![dev, other]);
    }

    #[test]
    fn lock_is_exclusive_and_released_on_drop() {
        let store = InMemoryLedgerStore::default();
        let net = NetworkId::from("development");
        let guard = store.lock(&net).expect("first lock");
        assert_eq!(store.lock(&net).unwrap_err(), LedgerError::Locked(net.clone()));
        // otra red no se ve afectada
        assert!(store.lock(&NetworkId::from("mainnet")).is_ok());
        drop(guard);
        assert!(store.lock(&net).is_ok());
    }
}
