//! Constantes del motor de migraciones.
//!
//! `ENGINE_VERSION` participa en el cálculo de fingerprints de steps: un
//! cambio de versión invalida determinísticamente los fingerprints
//! registrados aunque el plan y los argumentos no cambien (el ledger lo
//! reporta como `drifted`, nunca re-ejecuta por ello).

/// Versión lógica del motor. Mantener estable mientras no haya cambios
/// incompatibles en la forma del fingerprint.
pub const ENGINE_VERSION: &str = "M1.0";

/// Identidad de red usada por la CLI y la demo cuando no se indica otra.
pub const DEFAULT_NETWORK: &str = "development";
