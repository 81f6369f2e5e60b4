//! Implementación Postgres (Diesel) de `LedgerStore`.
//!
//! - `ledger_events` es append-only (un trigger rechaza UPDATE/DELETE); el
//!   orden total lo da `seq` (BIGSERIAL).
//! - `list` filtra por red y ordena por `seq`, con la misma semántica que el
//!   store en memoria; el replay lo hace `LedgerSnapshot` en el core.
//! - El lock por red es un advisory lock de sesión de 64 bits
//!   (`pg_try_advisory_lock(hashtextextended(lock_key, 0))`, ver `lock_key`)
//!   tomado sobre una conexión del pool que el guard retiene hasta su drop.
//! - Errores transitorios se reintentan con backoff corto (`with_retry`).

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use diesel::sql_types::{Bool, Text};
use log::{debug, warn};
use serde_json::Value;

use deploy_core::{LedgerError, LedgerEvent, LedgerEventKind, LedgerLock, LedgerStore, NetworkId};

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::ledger_events;

/// Alias de tipo para el pool r2d2 de conexiones Postgres.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Permite inyectar un pool real o, en tests, un proveedor que falle de forma
/// controlada.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError>;
}

/// `ConnectionProvider` respaldado por un `PgPool`.
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = ledger_events)]
pub struct NewLedgerRow<'a> {
    pub network: &'a str,
    pub event_type: &'a str,
    pub payload: &'a Value,
}

/// Fila de `ledger_events`. `payload` guarda el `LedgerEventKind` completo;
/// `event_type` es la pista en minúsculas validada por CHECK.
#[derive(Queryable, Debug)]
pub struct LedgerRow {
    pub seq: i64,
    pub network: String,
    pub ts: DateTime<Utc>,
    pub event_type: String,
    pub payload: Value,
}

#[derive(QueryableByName)]
struct AdvisoryLock {
    #[diesel(sql_type = Bool)]
    locked: bool,
}

fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict | PersistenceError::TransientIo(_) => true,
        // Algunos fallos de conexión llegan como Unknown con texto.
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected")
            || m.contains("terminating connection due to administrator command")
            || m.contains("connection closed")
            || m.contains("connection refused")
            || m.contains("timeout")
        }
        _ => false,
    }
}

/// Retry simple con backoff lineal (hasta 3 reintentos: 15, 30, 45 ms).
pub(crate) fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms",
                      attempts + 1,
                      e,
                      delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

/// Texto hasheado a la clave del advisory lock. El prefijo separa estas
/// claves de otros advisory locks de la misma base.
fn lock_key(network: &NetworkId) -> String {
    format!("deployflow.ledger:{network}")
}

fn row_to_event(row: LedgerRow) -> Result<LedgerEvent, LedgerError> {
    let network = NetworkId::new(row.network);
    let kind: LedgerEventKind = serde_json::from_value(row.payload).map_err(|e| {
                                                                     LedgerError::Corrupt { network: network.clone(),
                                                                                            detail: format!("seq {} ({}): {e}",
                                                                                                            row.seq,
                                                                                                            row.event_type) }
                                                                 })?;
    Ok(LedgerEvent { seq: row.seq as u64,
                     network,
                     kind,
                     ts: row.ts })
}

/// `LedgerStore` sobre Postgres.
pub struct PgLedgerStore<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgLedgerStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl PgLedgerStore<PoolProvider> {
    pub fn from_pool(pool: PgPool) -> Self {
        Self::new(PoolProvider { pool })
    }
}

impl<P: ConnectionProvider> LedgerStore for PgLedgerStore<P> {
    fn append(&self, network: &NetworkId, kind: LedgerEventKind) -> Result<LedgerEvent, LedgerError> {
        let event_type = kind.event_type();
        let payload = serde_json::to_value(&kind).map_err(PersistenceError::from)?;
        debug!("append:start network={network} kind={event_type}");
        let (seq, ts): (i64, DateTime<Utc>) = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(ledger_events::table).values(NewLedgerRow { network: network.as_str(),
                                                                            event_type,
                                                                            payload: &payload })
                                                     .returning((ledger_events::seq, ledger_events::ts))
                                                     .get_result(&mut conn)
                                                     .map_err(PersistenceError::from)
        })?;
        debug!("append:done network={network} seq={seq}");
        Ok(LedgerEvent { seq: seq as u64,
                         network: network.clone(),
                         kind,
                         ts })
    }

    fn list(&self, network: &NetworkId) -> Result<Vec<LedgerEvent>, LedgerError> {
        let rows: Vec<LedgerRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            ledger_events::table.filter(ledger_events::network.eq(network.as_str()))
                                .order(ledger_events::seq.asc())
                                .load(&mut conn)
                                .map_err(PersistenceError::from)
        })?;
        debug!("list network={network} count={}", rows.len());
        rows.into_iter().map(row_to_event).collect()
    }

    fn lock(&self, network: &NetworkId) -> Result<LedgerLock, LedgerError> {
        let mut conn = self.provider.connection()?;
        let key = lock_key(network);
        let row: AdvisoryLock = diesel::sql_query("SELECT pg_try_advisory_lock(hashtextextended($1, 0)) AS locked")
            .bind::<Text, _>(key.as_str())
            .get_result(&mut conn)
            .map_err(PersistenceError::from)?;
        if !row.locked {
            return Err(LedgerError::Locked(network.clone()));
        }
        debug!("advisory lock acquired network={network}");
        let net = network.clone();
        Ok(LedgerLock::new(network.clone(), move || {
            let released = diesel::sql_query("SELECT pg_advisory_unlock(hashtextextended($1, 0)) AS locked")
                .bind::<Text, _>(key.as_str())
                .get_result::<AdvisoryLock>(&mut conn);
            match released {
                Ok(row) if row.locked => debug!("advisory lock released network={net}"),
                Ok(_) => warn!("advisory lock for {net} was not held at release"),
                Err(e) => warn!("advisory unlock failed network={net}: {e}"),
            }
        }))
    }

    fn networks(&self) -> Result<Vec<NetworkId>, LedgerError> {
        let names: Vec<String> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            ledger_events::table.select(ledger_events::network)
                                .distinct()
                                .order(ledger_events::network.asc())
                                .load(&mut conn)
                                .map_err(PersistenceError::from)
        })?;
        Ok(names.into_iter().map(NetworkId::new).collect())
    }
}

/// Construye un pool Postgres r2d2 y corre las migraciones pendientes.
///
/// Si `min_size > max_size` se usa `min_size = max_size`; tamaños 0 se
/// elevan a 1.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = min_size.max(1);
    let validated_max = max_size.max(1);
    if validated_min > validated_max {
        warn!("min_size > max_size ({validated_min} > {validated_max}), ajustando min=max");
    }
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(validated_min.min(validated_max)))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Carga `.env`, lee `DbConfig` y construye un pool ya migrado.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    let cfg = crate::config::DbConfig::from_env()?;
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_keys_are_namespaced_per_network() {
        let dev = lock_key(&NetworkId::from("development"));
        assert_eq!(dev, "deployflow.ledger:development");
        assert_ne!(dev, lock_key(&NetworkId::from("mainnet")));
    }
}
