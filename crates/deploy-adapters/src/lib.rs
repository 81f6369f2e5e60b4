//! deploy-adapters: implementaciones concretas de los colaboradores del core.
//!
//! - `artifacts`: registry que lee artifacts de build (JSON estilo Truffle).
//! - `simulated`: `DeployTransport` determinista para dry-runs y tests.
//! - `plan_file`: planes declarados en TOML.
//! - `puml`: la migración PumlNFT / PumlNFTMarket.

pub mod artifacts;
pub mod plan_file;
pub mod puml;
pub mod simulated;

pub use artifacts::{parse_artifact, ArtifactLoadError, DirectoryArtifactRegistry};
pub use plan_file::{load_plan, plan_from_toml_str, PlanFileError};
pub use simulated::{derive_address, SimDeployment, SimulatedTransport};
