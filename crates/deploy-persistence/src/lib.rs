//! deploy-persistence
//!
//! Implementaciones durables de `LedgerStore`:
//! - `pg`: Postgres vía Diesel + r2d2, con migraciones embebidas y advisory
//!   locks por red.
//! - `file`: archivos JSON-lines con lock `fs2`, para uso local sin base de
//!   datos.
//!
//! Módulos de soporte:
//! - `config`: carga de configuración desde `.env` / entorno.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `schema`: tablas Diesel declaradas para compilar queries.

pub mod config;
pub mod error;
pub mod file;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, ledger_dir_from_env, DbConfig};
pub use error::PersistenceError;
pub use file::FileLedgerStore;
pub use pg::{build_dev_pool_from_env, build_pool, ConnectionProvider, PgLedgerStore, PgPool, PoolProvider};
