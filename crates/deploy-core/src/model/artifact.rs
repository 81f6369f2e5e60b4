//! Descriptor de una unidad desplegable (contrato compilado).
//!
//! Un `ArtifactDescriptor` es el insumo inmutable que el `ArtifactRegistry`
//! entrega al runner:
//! - `name`: nombre lógico único dentro del proyecto (`PumlNFT`).
//! - `constructor`: esquema ordenado de parámetros del constructor.
//! - `bytecode`: payload binario (hex) que el transport despliega.
//! - `abi`: JSON opaco para el core; sólo lo interpretan transports reales.
//!
//! `bytecode_hash` identifica el payload y entra en el fingerprint del step,
//! de modo que recompilar un contrato se detecta como drift.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hashing::hash_str;

/// Tipo de un parámetro de constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamType {
    Address,
    Uint,
    Int,
    Bool,
    String,
    Bytes,
    Array(Box<ParamType>),
    /// Tipos que el core no valida (tuplas, structs). Acepta cualquier valor.
    Other(String),
}

impl ParamType {
    /// Traduce un tipo Solidity del ABI (`uint256`, `address[]`, `bytes32`...).
    pub fn from_solidity(ty: &str) -> Self {
        if let Some(inner) = ty.strip_suffix("[]") {
            return Self::Array(Box::new(Self::from_solidity(inner)));
        }
        match ty {
            "address" | "address payable" => Self::Address,
            "bool" => Self::Bool,
            "string" => Self::String,
            t if t.starts_with("uint") => Self::Uint,
            t if t.starts_with("int") => Self::Int,
            t if t.starts_with("bytes") => Self::Bytes,
            other => Self::Other(other.to_string()),
        }
    }

    /// Comprueba que un valor JSON resuelto encaje en el tipo.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Address, Value::String(s)) => is_address(s),
            (Self::Uint, Value::Number(n)) => n.is_u64(),
            (Self::Uint, Value::String(s)) => !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()),
            (Self::Int, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (Self::Int, Value::String(s)) => {
                let digits = s.strip_prefix('-').unwrap_or(s);
                !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
            }
            (Self::Bool, Value::Bool(_)) => true,
            (Self::String, Value::String(_)) => true,
            (Self::Bytes, Value::String(s)) => is_hex_blob(s),
            (Self::Array(inner), Value::Array(items)) => items.iter().all(|v| inner.accepts(v)),
            (Self::Other(_), _) => true,
            _ => false,
        }
    }
}

/// `0x` seguido de exactamente 40 dígitos hex.
pub fn is_address(s: &str) -> bool {
    s.strip_prefix("0x")
     .map(|h| h.len() == 40 && h.chars().all(|c| c.is_ascii_hexdigit()))
     .unwrap_or(false)
}

fn is_hex_blob(s: &str) -> bool {
    s.strip_prefix("0x")
     .map(|h| h.len() % 2 == 0 && h.chars().all(|c| c.is_ascii_hexdigit()))
     .unwrap_or(false)
}

/// Parámetro nombrado del constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self { name: name.into(), ty }
    }
}

/// Unidad desplegable resuelta por el registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub name: String,
    pub constructor: Vec<ParamSpec>,
    pub bytecode: String,
    pub abi: Value,
    bytecode_hash: String,
}

impl ArtifactDescriptor {
    pub fn new(name: impl Into<String>, constructor: Vec<ParamSpec>, bytecode: impl Into<String>, abi: Value) -> Self {
        let bytecode = bytecode.into();
        let bytecode_hash = hash_str(&bytecode);
        Self { name: name.into(),
               constructor,
               bytecode,
               abi,
               bytecode_hash }
    }

    /// Hash blake3 (hex) del bytecode.
    pub fn bytecode_hash(&self) -> &str {
        &self.bytecode_hash
    }

    /// Valida aridad y tipos de argumentos ya resueltos. Devuelve una
    /// descripción legible del primer desajuste.
    pub fn check_args(&self, args: &[Value]) -> Result<(), String> {
        if args.len() != self.constructor.len() {
            return Err(format!("{} expects {} constructor args, got {}",
                               self.name,
                               self.constructor.len(),
                               args.len()));
        }
        for (param, value) in self.constructor.iter().zip(args) {
            if !param.ty.accepts(value) {
                return Err(format!("{}.{}: {:?} does not accept {}", self.name, param.name, param.ty, value));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn solidity_types_are_mapped() {
        assert_eq!(ParamType::from_solidity("uint256"), ParamType::Uint);
        assert_eq!(ParamType::from_solidity("int8"), ParamType::Int);
        assert_eq!(ParamType::from_solidity("bytes32"), ParamType::Bytes);
        assert_eq!(ParamType::from_solidity("address[]"),
                   ParamType::Array(Box::new(ParamType::Address)));
        assert_eq!(ParamType::from_solidity("tuple"), ParamType::Other("tuple".into()));
    }

    #[test]
    fn address_and_numbers_are_checked() {
        let addr = json!("0x00000000000000000000000000000000000000aa");
        assert!(ParamType::Address.accepts(&addr));
        assert!(!ParamType::Address.accepts(&json!("0x12")));
        assert!(ParamType::Uint.accepts(&json!(7)));
        assert!(ParamType::Uint.accepts(&json!("1000000000000000000000")));
        assert!(!ParamType::Uint.accepts(&json!(-1)));
        assert!(ParamType::Int.accepts(&json!("-5")));
        assert!(ParamType::Bytes.accepts(&json!("0xdead")));
        assert!(!ParamType::Bytes.accepts(&json!("0xabc")));
    }

    #[test]
    fn check_args_reports_arity() {
        let d = ArtifactDescriptor::new("PumlNFT",
                                        vec![ParamSpec::new("baseURI", ParamType::String)],
                                        "0x6080",
                                        json!([]));
        assert!(d.check_args(&[json!("")]).is_ok());
        let err = d.check_args(&[]).unwrap_err();
        assert!(err.contains("expects 1"), "{err}");
        assert!(d.check_args(&[json!(1)]).is_err());
    }
}
