//! Hash helpers – blake3 sobre texto canónico.

use blake3::Hasher;
use serde_json::Value;

use super::to_canonical_json;

/// Hashea un string y devuelve hex.
pub fn hash_str(input: &str) -> String {
    hash_bytes(input.as_bytes())
}

/// Hashea bytes arbitrarios (p.ej. bytecode) y devuelve hex.
pub fn hash_bytes(input: &[u8]) -> String {
    let mut h = Hasher::new();
    h.update(input);
    h.finalize().to_hex().to_string()
}

/// Hashea un `Value` usando su forma canónica (orden de claves estable).
pub fn hash_value(value: &Value) -> String {
    hash_str(&to_canonical_json(value))
}
