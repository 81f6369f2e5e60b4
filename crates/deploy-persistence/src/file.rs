//! `LedgerStore` en archivos JSON-lines, para entornos sin Postgres.
//!
//! Layout bajo `root`:
//! - `<network>.jsonl`: un `LedgerEvent` por línea, en orden de `seq`.
//! - `<network>.lock`: archivo de lock exclusivo (`fs2`) para el run activo.
//!
//! Cada append hace `sync_all` antes de retornar. Una última línea sin `\n`
//! final, o que no parsea, se trata como escritura interrumpida: `list` la
//! ignora y el siguiente append la trunca. Una línea inválida en mitad del
//! archivo es corrupción y se reporta. Las líneas se leen como bytes, de modo
//! que un corte dentro de un carácter UTF-8 sólo afecta a la cola.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use fs2::FileExt;
use log::{debug, warn};

use deploy_core::{LedgerError, LedgerEvent, LedgerEventKind, LedgerLock, LedgerStore, NetworkId};

use crate::error::PersistenceError;

const LOG_EXT: &str = "jsonl";
const LOCK_EXT: &str = "lock";

/// Contenido válido de un archivo de ledger y, si la última línea está
/// cortada, el offset donde empieza.
struct Replay {
    events: Vec<LedgerEvent>,
    torn_at: Option<u64>,
}

pub struct FileLedgerStore {
    root: PathBuf,
    // Serializa appends dentro del proceso; entre procesos lo hace el lock.
    write: Mutex<()>,
}

impl FileLedgerStore {
    /// Abre (creando si falta) el directorio del ledger.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root,
                  write: Mutex::new(()) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, network: &NetworkId, ext: &str) -> Result<PathBuf, LedgerError> {
        let name = network.as_str();
        let valid = !name.is_empty()
                    && !name.starts_with('.')
                    && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(LedgerError::Storage(format!("network name '{name}' is not usable as a file name")));
        }
        Ok(self.root.join(format!("{name}.{ext}")))
    }

    fn replay(&self, network: &NetworkId, path: &Path) -> Result<Replay, LedgerError> {
        let raw = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Replay { events: Vec::new(),
                                   torn_at: None })
            }
            Err(e) => return Err(PersistenceError::from(e).into()),
        };
        let mut events = Vec::new();
        let mut offset: u64 = 0;
        let mut segments = raw.split_inclusive(|b| *b == b'\n').enumerate().peekable();
        while let Some((idx, segment)) = segments.next() {
            let is_last = segments.peek().is_none();
            // Sin '\n' final el registro no llegó a confirmarse, aunque parsee.
            let Some(line) = segment.strip_suffix(b"\n") else {
                warn!("ignoring unterminated tail record in {} ({} bytes)",
                      path.display(),
                      segment.len());
                return Ok(Replay { events,
                                   torn_at: Some(offset) });
            };
            if !line.iter().all(u8::is_ascii_whitespace) {
                match serde_json::from_slice::<LedgerEvent>(line) {
                    Ok(ev) => events.push(ev),
                    Err(e) if is_last => {
                        warn!("ignoring torn tail record in {}: {e}", path.display());
                        return Ok(Replay { events,
                                           torn_at: Some(offset) });
                    }
                    Err(e) => {
                        return Err(LedgerError::Corrupt { network: network.clone(),
                                                          detail: format!("{} line {}: {e}", path.display(), idx + 1) })
                    }
                }
            }
            offset += segment.len() as u64;
        }
        Ok(Replay { events,
                    torn_at: None })
    }
}

impl LedgerStore for FileLedgerStore {
    fn append(&self, network: &NetworkId, kind: LedgerEventKind) -> Result<LedgerEvent, LedgerError> {
        let path = self.path_for(network, LOG_EXT)?;
        let _write = self.write.lock().unwrap_or_else(|p| p.into_inner());
        let replay = self.replay(network, &path)?;
        if let Some(len) = replay.torn_at {
            let f = OpenOptions::new().write(true).open(&path).map_err(PersistenceError::from)?;
            f.set_len(len).map_err(PersistenceError::from)?;
            f.sync_all().map_err(PersistenceError::from)?;
        }
        let ev = LedgerEvent { seq: replay.events.last().map_or(0, |e| e.seq + 1),
                               network: network.clone(),
                               kind,
                               ts: Utc::now() };
        let mut line = serde_json::to_string(&ev).map_err(PersistenceError::from)?;
        line.push('\n');
        let mut file = OpenOptions::new().create(true)
                                         .append(true)
                                         .open(&path)
                                         .map_err(PersistenceError::from)?;
        file.write_all(line.as_bytes()).map_err(PersistenceError::from)?;
        file.sync_all().map_err(PersistenceError::from)?;
        debug!("append network={network} seq={} kind={}", ev.seq, ev.kind.event_type());
        Ok(ev)
    }

    fn list(&self, network: &NetworkId) -> Result<Vec<LedgerEvent>, LedgerError> {
        let path = self.path_for(network, LOG_EXT)?;
        Ok(self.replay(network, &path)?.events)
    }

    fn lock(&self, network: &NetworkId) -> Result<LedgerLock, LedgerError> {
        let path = self.path_for(network, LOCK_EXT)?;
        let file = OpenOptions::new().create(true)
                                     .read(true)
                                     .write(true)
                                     .truncate(false)
                                     .open(&path)
                                     .map_err(PersistenceError::from)?;
        if file.try_lock_exclusive().is_err() {
            return Err(LedgerError::Locked(network.clone()));
        }
        debug!("file lock acquired {}", path.display());
        Ok(LedgerLock::new(network.clone(), move || {
            if let Err(e) = FileExt::unlock(&file) {
                warn!("failed to release {}: {e}", path.display());
            }
        }))
    }

    fn networks(&self) -> Result<Vec<NetworkId>, LedgerError> {
        let mut nets: Vec<NetworkId> = fs::read_dir(&self.root).map_err(PersistenceError::from)?
                                                               .filter_map(|e| e.ok().map(|e| e.path()))
                                                               .filter(|p| p.extension().is_some_and(|ext| ext == LOG_EXT))
                                                               .filter_map(|p| {
                                                                   p.file_stem()
                                                                    .and_then(|s| s.to_str())
                                                                    .map(NetworkId::from)
                                                               })
                                                               .collect();
        nets.sort();
        Ok(nets)
    }
}
