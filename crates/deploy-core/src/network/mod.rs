//! Network Context: identidad de red, perfiles y acceso al ledger por red.
//!
//! Garantía central: toda lectura/escritura del ledger pasa por un
//! `NetworkLedger` atado a exactamente un `NetworkId`, por lo que un despliegue
//! en una red de pruebas nunca se confunde con uno de producción.

mod profile;

pub use profile::{NetworkProfile, NetworkProfiles};

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::MigrationError;
use crate::event::{LedgerError, LedgerEvent, LedgerEventKind, LedgerLock, LedgerStore};
use crate::repo::LedgerSnapshot;
use crate::transport::DeployTransport;

/// Clave estable que particiona el ledger (`development`, `mainnet`,
/// `chain-5777`...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(String);

impl NetworkId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Identidad derivada de un chain id cuando la red no tiene nombre.
    pub fn from_chain_id(chain_id: u64) -> Self {
        Self(format!("chain-{chain_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NetworkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NetworkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accesor del ledger limitado a una red.
#[derive(Clone, Copy)]
pub struct NetworkLedger<'s> {
    network: &'s NetworkId,
    store: &'s dyn LedgerStore,
}

impl<'s> NetworkLedger<'s> {
    pub fn network(&self) -> &NetworkId {
        self.network
    }

    pub fn append(&self, kind: LedgerEventKind) -> Result<LedgerEvent, LedgerError> {
        log::debug!("ledger append network={} kind={}", self.network, kind.event_type());
        self.store.append(self.network, kind)
    }

    pub fn events(&self) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.store.list(self.network)
    }

    /// Replay de los eventos de la red.
    pub fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        Ok(LedgerSnapshot::replay(self.network.clone(), &self.events()?))
    }

    pub fn lock(&self) -> Result<LedgerLock, LedgerError> {
        self.store.lock(self.network)
    }
}

/// Contexto de ejecución de una migración sobre una red: perfil, ledger y
/// transport.
pub struct NetworkContext<'s> {
    id: NetworkId,
    profile: NetworkProfile,
    store: &'s dyn LedgerStore,
    transport: Arc<dyn DeployTransport>,
}

impl<'s> NetworkContext<'s> {
    pub fn new(profile: NetworkProfile, store: &'s dyn LedgerStore, transport: Arc<dyn DeployTransport>) -> Self {
        Self { id: profile.id(),
               profile,
               store,
               transport }
    }

    /// Resuelve un nombre lógico de red contra los perfiles configurados.
    pub fn resolve(name: &str,
                   profiles: &NetworkProfiles,
                   store: &'s dyn LedgerStore,
                   transport: Arc<dyn DeployTransport>)
                   -> Result<Self, MigrationError> {
        let profile = profiles.get(name)
                              .cloned()
                              .ok_or_else(|| MigrationError::UnknownNetwork(name.to_string()))?;
        Ok(Self::new(profile, store, transport))
    }

    pub fn id(&self) -> &NetworkId {
        &self.id
    }

    pub fn profile(&self) -> &NetworkProfile {
        &self.profile
    }

    pub fn ledger(&self) -> NetworkLedger<'_> {
        NetworkLedger { network: &self.id,
                        store: self.store }
    }

    pub fn transport(&self) -> &dyn DeployTransport {
        self.transport.as_ref()
    }
}
