use serde::Serialize;
use serde_json::Value;

/// Insumos del fingerprint de un step. NO es el fingerprint final (hash) sino
/// el modelo previo a canonicalizar.
///
/// La red no forma parte del fingerprint: el mismo step con los mismos
/// argumentos produce el mismo fingerprint en cualquier red; el ledger ya
/// está particionado por red.
#[derive(Serialize)]
pub struct StepFingerprintInput<'a> {
    pub engine_version: &'a str,
    pub step_id: &'a str,
    pub artifact: &'a str,
    pub bytecode_hash: &'a str,
    pub args: &'a [Value],
}

impl StepFingerprintInput<'_> {
    pub fn fingerprint(&self) -> String {
        // Serializar una struct de referencias a `&str`/`Value` no falla.
        let value = serde_json::to_value(self).unwrap_or(Value::Null);
        crate::hashing::hash_value(&value)
    }
}
