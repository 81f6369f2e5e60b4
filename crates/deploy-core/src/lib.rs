//! deploy-core: runner de migraciones de despliegue ordenado, idempotente y
//! particionado por red.
//!
//! Un plan es una secuencia de steps con ordinal; cada transición se registra
//! en un ledger append-only por red, de modo que re-ejecutar una migración
//! sólo aplica los steps que aún no completaron.
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod model;
pub mod network;
pub mod registry;
pub mod repo;
pub mod step;
pub mod transport;

pub use engine::{ForcePolicy, MigrationRunner, Reconciler, RunHalt, RunOptions, RunReport, StepOutcome, StepReport};
pub use errors::{MigrationError, PlanError};
pub use event::{InMemoryLedgerStore, LedgerError, LedgerEvent, LedgerEventKind, LedgerLock, LedgerStore, Resolution,
                StepPhase};
pub use model::{ArgBinding, ArtifactDescriptor, OutputField, ParamSpec, ParamType};
pub use network::{NetworkContext, NetworkId, NetworkLedger, NetworkProfile, NetworkProfiles};
pub use registry::{ArtifactRegistry, InMemoryArtifactRegistry, RegistryError};
pub use repo::{LedgerEntry, LedgerSnapshot};
pub use step::{ActionContext, DeploymentStep, InvokeAction, MigrationPlan, PlanBuilder, PostAction, StepStatus};
pub use transport::{DeployReceipt, DeployRequest, DeployTransport, DeploymentQuery, InvokeCall, TransportError};
