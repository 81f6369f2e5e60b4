//! Configuración desde variables de entorno (y `.env` si existe).
//!
//! - `DATABASE_URL`, `DATABASE_MIN_CONNECTIONS`, `DATABASE_MAX_CONNECTIONS`:
//!   ledger en Postgres.
//! - `DEPLOYFLOW_LEDGER_DIR`: directorio del ledger en archivos JSONL cuando
//!   no hay base de datos.

use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

use crate::error::PersistenceError;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

pub const DEFAULT_LEDGER_DIR: &str = ".deployflow/ledger";

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, PersistenceError> {
        init_dotenv();
        let url = env::var("DATABASE_URL").map_err(|_| PersistenceError::Config("DATABASE_URL is not set".into()))?;
        let min_connections = parse_var("DATABASE_MIN_CONNECTIONS").unwrap_or(2);
        let max_connections = parse_var("DATABASE_MAX_CONNECTIONS").unwrap_or(16);
        Ok(Self { url,
                  min_connections,
                  max_connections })
    }

    /// `Some` si `DATABASE_URL` está definido.
    pub fn from_env_opt() -> Option<Self> {
        Self::from_env().ok()
    }
}

fn parse_var(key: &str) -> Option<u32> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Directorio del ledger JSONL (`DEPLOYFLOW_LEDGER_DIR` o el default).
pub fn ledger_dir_from_env() -> PathBuf {
    init_dotenv();
    env::var("DEPLOYFLOW_LEDGER_DIR").map(PathBuf::from)
                                     .unwrap_or_else(|_| PathBuf::from(DEFAULT_LEDGER_DIR))
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
