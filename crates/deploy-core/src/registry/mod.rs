//! Artifact Registry: nombre lógico -> `ArtifactDescriptor`.
//!
//! Lookup puro y de sólo lectura. El core trae una implementación en memoria;
//! `deploy-adapters` aporta una que lee artifacts de build desde disco.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::model::ArtifactDescriptor;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RegistryError {
    #[error("unknown artifact '{0}'")]
    UnknownArtifact(String),
}

pub trait ArtifactRegistry: Send + Sync {
    fn lookup(&self, name: &str) -> Result<Arc<ArtifactDescriptor>, RegistryError>;

    /// Nombres disponibles, ordenados.
    fn names(&self) -> Vec<String>;
}

impl<T: ArtifactRegistry + ?Sized> ArtifactRegistry for Arc<T> {
    fn lookup(&self, name: &str) -> Result<Arc<ArtifactDescriptor>, RegistryError> {
        (**self).lookup(name)
    }

    fn names(&self) -> Vec<String> {
        (**self).names()
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryArtifactRegistry {
    artifacts: BTreeMap<String, Arc<ArtifactDescriptor>>,
}

impl InMemoryArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra (o reemplaza) un descriptor bajo su nombre.
    pub fn register(&mut self, descriptor: ArtifactDescriptor) {
        self.artifacts.insert(descriptor.name.clone(), Arc::new(descriptor));
    }

    pub fn with(mut self, descriptor: ArtifactDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl ArtifactRegistry for InMemoryArtifactRegistry {
    fn lookup(&self, name: &str) -> Result<Arc<ArtifactDescriptor>, RegistryError> {
        self.artifacts
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownArtifact(name.to_string()))
    }

    fn names(&self) -> Vec<String> {
        self.artifacts.keys().cloned().collect()
    }
}
