//! Plan de migración declarado en TOML.
//!
//! ```toml
//! [[steps]]
//! artifact = "PumlNFT"
//! args = [""]
//!
//! [[steps]]
//! artifact = "PumlNFTMarket"
//! args = [{ ref = "PumlNFT" }, { env = "account" }]
//! then = { method = "setMarket", target = "PumlNFT", args = [{ ref = "PumlNFTMarket" }] }
//! ```
//!
//! Un argumento es un literal, `{ ref = "<step>", field = "address" | "tx_hash" }`
//! o `{ env = "<clave>" }`. Sin `ordinal` explícito, cada step toma su
//! posición en el archivo.

use std::path::Path;

use deploy_core::{ArgBinding, DeploymentStep, InvokeAction, MigrationPlan, OutputField, PlanError};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanFileError {
    #[error("failed to read plan {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("failed to parse plan: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] PlanError),
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStep {
    artifact: String,
    id: Option<String>,
    ordinal: Option<usize>,
    #[serde(default)]
    args: Vec<RawArg>,
    then: Option<RawCall>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCall {
    method: String,
    target: Option<String>,
    #[serde(default)]
    args: Vec<RawArg>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawArg {
    Ref {
        #[serde(rename = "ref")]
        step: String,
        #[serde(default = "address_field")]
        field: OutputField,
    },
    Env {
        env: String,
    },
    Literal(Value),
}

fn address_field() -> OutputField {
    OutputField::Address
}

impl From<RawArg> for ArgBinding {
    fn from(raw: RawArg) -> Self {
        match raw {
            RawArg::Ref { step, field } => ArgBinding::StepOutput { step, field },
            RawArg::Env { env } => ArgBinding::Env(env),
            RawArg::Literal(v) => ArgBinding::Literal(v),
        }
    }
}

/// Construye y valida un plan desde TOML.
pub fn plan_from_toml_str(source: &str) -> Result<MigrationPlan, PlanFileError> {
    let raw: RawPlan = toml::from_str(source)?;
    let steps = raw.steps
                   .into_iter()
                   .enumerate()
                   .map(|(idx, s)| {
                       let args = s.args.into_iter().map(ArgBinding::from).collect();
                       let mut step = DeploymentStep::new(s.ordinal.unwrap_or(idx), s.artifact, args);
                       if let Some(id) = s.id {
                           step = step.with_id(id);
                       }
                       if let Some(call) = s.then {
                           let args = call.args.into_iter().map(ArgBinding::from).collect();
                           step = match call.target {
                               Some(target) => step.with_post_action(InvokeAction::on(target, call.method, args)),
                               None => step.with_post_action(InvokeAction::new(call.method, args)),
                           };
                       }
                       step
                   })
                   .collect();
    Ok(MigrationPlan::new(steps)?)
}

pub fn load_plan(path: impl AsRef<Path>) -> Result<MigrationPlan, PlanFileError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| PlanFileError::Io { path: path.display().to_string(),
                                                                                      source })?;
    plan_from_toml_str(&source)
}
