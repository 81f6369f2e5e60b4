//! Resolución de colaboradores a partir de flags y entorno.
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use deploy_adapters::{load_plan, puml, DirectoryArtifactRegistry};
use deploy_core::constants::DEFAULT_NETWORK;
use deploy_core::registry::ArtifactRegistry;
use deploy_core::{LedgerSnapshot, LedgerStore, MigrationPlan, NetworkProfile, NetworkProfiles};
use deploy_persistence::{build_pool, ledger_dir_from_env, DbConfig, FileLedgerStore, PgLedgerStore, PoolProvider};

const NETWORKS_FILE: &str = "deployflow.toml";
// Primera cuenta de una red local de desarrollo (ganache).
const DEV_ACCOUNT: &str = "0x627306090abab3a6e1400e9345bc60c78a8bef57";
const DEV_CHAIN_ID: u64 = 5777;

pub enum LedgerBackend {
    Postgres(PgLedgerStore<PoolProvider>),
    Files(FileLedgerStore),
}

impl LedgerBackend {
    /// Postgres si hay `DATABASE_URL`; si no, JSONL en disco.
    pub fn from_env() -> anyhow::Result<Self> {
        match DbConfig::from_env_opt() {
            Some(cfg) => {
                let pool = build_pool(&cfg.url, cfg.min_connections, cfg.max_connections).context("postgres ledger")?;
                tracing::info!("ledger: postgres");
                Ok(Self::Postgres(PgLedgerStore::from_pool(pool)))
            }
            None => {
                let dir = ledger_dir_from_env();
                tracing::info!("ledger: files under {}", dir.display());
                Ok(Self::Files(FileLedgerStore::open(&dir).with_context(|| format!("ledger dir {}", dir.display()))?))
            }
        }
    }

    pub fn store(&self) -> &dyn LedgerStore {
        match self {
            Self::Postgres(s) => s,
            Self::Files(s) => s,
        }
    }
}

pub struct PlanSource {
    pub plan: MigrationPlan,
    pub registry: Arc<dyn ArtifactRegistry>,
}

impl PlanSource {
    pub fn load(plan: Option<&Path>, artifacts: Option<&Path>) -> anyhow::Result<Self> {
        let plan = match plan {
            Some(path) => load_plan(path).with_context(|| format!("plan {}", path.display()))?,
            None => puml::plan()?,
        };
        let registry: Arc<dyn ArtifactRegistry> = match artifacts {
            Some(dir) => Arc::new(DirectoryArtifactRegistry::load(dir)?),
            None => Arc::new(puml::registry()),
        };
        Ok(Self { plan, registry })
    }
}

/// `--networks`, luego `DEPLOYFLOW_NETWORKS`, luego `deployflow.toml`. Sin
/// archivo, sólo existe la red local `development`.
pub fn load_profiles(flag: Option<&Path>) -> anyhow::Result<NetworkProfiles> {
    let path = flag.map(Path::to_path_buf)
                   .or_else(|| std::env::var("DEPLOYFLOW_NETWORKS").ok().map(PathBuf::from))
                   .unwrap_or_else(|| PathBuf::from(NETWORKS_FILE));
    if path.exists() {
        return Ok(NetworkProfiles::load(&path)?);
    }
    if flag.is_some() {
        anyhow::bail!("networks file {} not found", path.display());
    }
    tracing::debug!("{} not found; using built-in {DEFAULT_NETWORK} profile", path.display());
    let mut profiles = NetworkProfiles::default();
    profiles.insert(NetworkProfile::new(DEFAULT_NETWORK, DEV_CHAIN_ID, DEV_ACCOUNT));
    Ok(profiles)
}

pub fn render_status(snapshot: &LedgerSnapshot) -> String {
    let mut out = format!("network {}", snapshot.network);
    if !snapshot.initialized && snapshot.entries.is_empty() {
        out.push_str(": no migrations recorded");
        return out;
    }
    if let Some(hash) = &snapshot.definition_hash {
        let _ = write!(out, " (plan {})", &hash[..hash.len().min(12)]);
    }
    for e in snapshot.entries.values() {
        let _ = write!(out,
                       "\n  #{} {} ({}): {:?} {} attempts={}",
                       e.ordinal,
                       e.step_id,
                       e.artifact,
                       e.status,
                       e.address().unwrap_or("-"),
                       e.attempts);
        if let Some(err) = &e.last_error {
            let _ = write!(out, " error=\"{err}\"");
        }
        if let Some(note) = &e.note {
            let _ = write!(out, " note=\"{note}\"");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use deploy_core::{DeployReceipt, InMemoryLedgerStore, LedgerEventKind, NetworkId};

    #[test]
    fn status_lists_entries_in_order() {
        let net = NetworkId::from("development");
        let store = InMemoryLedgerStore::default();
        let receipt = DeployReceipt { address: "0x00000000000000000000000000000000000000aa".into(),
                                      tx_hash: "0x01".into() };
        for kind in [LedgerEventKind::LedgerInitialized { definition_hash: "abcdef0123456789".into(),
                                                          step_count: 2 },
                     LedgerEventKind::StepStarted { ordinal: 0,
                                                    step_id: "PumlNFT".into(),
                                                    artifact: "PumlNFT".into(),
                                                    fingerprint: "fp".into(),
                                                    forced: false },
                     LedgerEventKind::StepSucceeded { ordinal: 0,
                                                      step_id: "PumlNFT".into(),
                                                      receipt,
                                                      fingerprint: "fp".into() }]
        {
            store.append(&net, kind).unwrap();
        }
        let snapshot = LedgerSnapshot::replay(net.clone(), &store.list(&net).unwrap());
        let text = render_status(&snapshot);
        assert!(text.starts_with("network development (plan abcdef012345)"));
        assert!(text.contains("#0 PumlNFT (PumlNFT): Succeeded 0x00000000000000000000000000000000000000aa attempts=1"));
    }

    #[test]
    fn empty_ledger_is_reported() {
        let snapshot = LedgerSnapshot::empty(NetworkId::from("mainnet"));
        assert_eq!(render_status(&snapshot), "network mainnet: no migrations recorded");
    }
}
