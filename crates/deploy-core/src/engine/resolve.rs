//! Resolución de bindings a valores concretos.
use std::collections::HashMap;

use serde_json::Value;

use crate::errors::MigrationError;
use crate::model::{ArgBinding, OutputField};
use crate::network::NetworkProfile;
use crate::transport::DeployReceipt;

/// Resuelve `bindings` en orden. `outputs` contiene sólo steps `Succeeded`
/// (más el step actual cuando se resuelven post-actions).
pub(crate) fn resolve_bindings(step_id: &str,
                               bindings: &[ArgBinding],
                               outputs: &HashMap<String, DeployReceipt>,
                               profile: &NetworkProfile)
                               -> Result<Vec<Value>, MigrationError> {
    bindings.iter()
            .map(|binding| match binding {
                ArgBinding::Literal(v) => Ok(v.clone()),
                ArgBinding::StepOutput { step, field } => {
                    let receipt = outputs.get(step)
                                         .ok_or_else(|| MigrationError::UnresolvedDependency { step: step_id.to_string(),
                                                                                               depends_on: step.clone() })?;
                    Ok(match field {
                        OutputField::Address => Value::from(receipt.address.clone()),
                        OutputField::TxHash => Value::from(receipt.tx_hash.clone()),
                    })
                }
                ArgBinding::Env(key) => profile.env_value(key)
                                               .ok_or_else(|| MigrationError::MissingEnv { step: step_id.to_string(),
                                                                                           key: key.clone() }),
            })
            .collect()
}
