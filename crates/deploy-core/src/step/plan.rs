//! `MigrationPlan`: secuencia ordenada y validada de steps.
//!
//! Las dependencias entre steps forman una cadena: orden total por ordinal y
//! referencias sólo hacia atrás. Eso hace innecesaria la detección de ciclos;
//! basta con comprobar posiciones al construir el plan.
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use super::{DeploymentStep, PostAction};
use crate::errors::{MigrationError, PlanError};
use crate::hashing::hash_value;
use crate::model::{ArgBinding, ArtifactDescriptor};
use crate::registry::ArtifactRegistry;

/// Plan inmutable de migración.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    steps: Vec<DeploymentStep>,
    positions: HashMap<String, usize>,
    definition_hash: String,
}

impl MigrationPlan {
    /// Valida y ordena los steps por ordinal.
    pub fn new(mut steps: Vec<DeploymentStep>) -> Result<Self, PlanError> {
        steps.sort_by_key(|s| s.ordinal);
        for pair in steps.windows(2) {
            if pair[0].ordinal == pair[1].ordinal {
                return Err(PlanError::DuplicateOrdinal(pair[1].ordinal));
            }
        }
        let mut positions = HashMap::with_capacity(steps.len());
        for (idx, step) in steps.iter().enumerate() {
            if positions.insert(step.id.clone(), idx).is_some() {
                return Err(PlanError::DuplicateStepId(step.id.clone()));
            }
        }
        for (idx, step) in steps.iter().enumerate() {
            for reference in step.references() {
                if reference == step.id {
                    return Err(PlanError::SelfReference(step.id.clone()));
                }
                check_backward(&positions, idx, &step.id, reference)?;
            }
            for reference in step.action_references() {
                if reference != step.id {
                    check_backward(&positions, idx, &step.id, reference)?;
                }
            }
        }
        let definition_hash = definition_hash(&steps);
        Ok(Self { steps,
                  positions,
                  definition_hash })
    }

    pub fn builder() -> PlanBuilder {
        PlanBuilder::default()
    }

    pub fn steps(&self) -> &[DeploymentStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn definition_hash(&self) -> &str {
        &self.definition_hash
    }

    pub fn step(&self, id: &str) -> Option<&DeploymentStep> {
        self.positions.get(id).map(|&i| &self.steps[i])
    }

    pub fn step_at(&self, ordinal: usize) -> Option<&DeploymentStep> {
        self.steps.iter().find(|s| s.ordinal == ordinal)
    }

    /// Resuelve todos los artifacts y valida los literales contra el esquema
    /// del constructor. No toca el ledger.
    ///
    /// Devuelve los descriptores alineados con `steps()`.
    pub fn validate_against<G>(&self, registry: &G) -> Result<Vec<Arc<ArtifactDescriptor>>, MigrationError>
        where G: ArtifactRegistry + ?Sized
    {
        let mut descriptors = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let descriptor = registry.lookup(&step.artifact)
                                     .map_err(|_| MigrationError::UnknownArtifact { step: step.id.clone(),
                                                                                    artifact: step.artifact.clone() })?;
            if step.args.len() != descriptor.constructor.len() {
                return Err(MigrationError::ArgumentMismatch { step: step.id.clone(),
                                                              detail: format!("{} expects {} constructor args, got {}",
                                                                              descriptor.name,
                                                                              descriptor.constructor.len(),
                                                                              step.args.len()) });
            }
            for (param, binding) in descriptor.constructor.iter().zip(&step.args) {
                if let ArgBinding::Literal(value) = binding {
                    if !param.ty.accepts(value) {
                        return Err(MigrationError::ArgumentMismatch { step: step.id.clone(),
                                                                      detail: format!("{}: {:?} does not accept {}",
                                                                                      param.name, param.ty, value) });
                    }
                }
            }
            descriptors.push(descriptor);
        }
        Ok(descriptors)
    }
}

fn check_backward(positions: &HashMap<String, usize>, idx: usize, step: &str, reference: &str) -> Result<(), PlanError> {
    match positions.get(reference) {
        None => Err(PlanError::UnknownStepReference { step: step.to_string(),
                                                      reference: reference.to_string() }),
        Some(&pos) if pos > idx => Err(PlanError::ForwardReference { step: step.to_string(),
                                                                     reference: reference.to_string() }),
        Some(_) => Ok(()),
    }
}

fn definition_hash(steps: &[DeploymentStep]) -> String {
    let items: Vec<_> = steps.iter()
                             .map(|s| {
                                 json!({
                                     "ordinal": s.ordinal,
                                     "id": s.id,
                                     "artifact": s.artifact,
                                     "post_action": s.post_action.as_ref().map(|a| a.name().to_string()),
                                 })
                             })
                             .collect();
    hash_value(&json!(items))
}

/// Builder con ordinales ascendentes automáticos.
///
/// ```ignore
/// let plan = MigrationPlan::builder()
///     .deploy("PumlNFT", [ArgBinding::lit("")])
///     .deploy("PumlNFTMarket", [])
///     .build()?;
/// ```
#[derive(Default)]
pub struct PlanBuilder {
    steps: Vec<DeploymentStep>,
    dangling_action: bool,
}

impl PlanBuilder {
    pub fn deploy(self, artifact: impl Into<String>, args: impl IntoIterator<Item = ArgBinding>) -> Self {
        let artifact = artifact.into();
        self.deploy_as(artifact.clone(), artifact, args)
    }

    pub fn deploy_as(mut self,
                     id: impl Into<String>,
                     artifact: impl Into<String>,
                     args: impl IntoIterator<Item = ArgBinding>)
                     -> Self {
        let step = DeploymentStep::new(self.steps.len(), artifact, args.into_iter().collect()).with_id(id);
        self.steps.push(step);
        self
    }

    /// Adjunta una post-action al último step declarado.
    pub fn then(mut self, action: impl PostAction + 'static) -> Self {
        match self.steps.pop() {
            Some(step) => self.steps.push(step.with_post_action(action)),
            None => self.dangling_action = true,
        }
        self
    }

    pub fn build(self) -> Result<MigrationPlan, PlanError> {
        if self.dangling_action {
            return Err(PlanError::DanglingPostAction);
        }
        MigrationPlan::new(self.steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ParamSpec, ParamType};
    use crate::registry::InMemoryArtifactRegistry;
    use crate::step::InvokeAction;
    use serde_json::json;

    fn registry() -> InMemoryArtifactRegistry {
        let mut reg = InMemoryArtifactRegistry::new();
        reg.register(ArtifactDescriptor::new("PumlNFT",
                                             vec![ParamSpec::new("baseURI", ParamType::String)],
                                             "0x6080aa",
                                             json!([])));
        reg.register(ArtifactDescriptor::new("PumlNFTMarket", vec![], "0x6080bb", json!([])));
        reg
    }

    #[test]
    fn builder_assigns_ascending_ordinals() {
        let plan = MigrationPlan::builder().deploy("PumlNFT", [ArgBinding::lit("")])
                                           .deploy("PumlNFTMarket", [])
                                           .build()
                                           .expect("valid plan");
        let ords: Vec<usize> = plan.steps().iter().map(|s| s.ordinal).collect();
        assert_eq!(ords, vec![0, 1]);
        assert_eq!(plan.step("PumlNFTMarket").map(|s| s.ordinal), Some(1));
        assert_eq!(plan.definition_hash().len(), 64);
    }

    #[test]
    fn explicit_ordinals_are_sorted_and_checked() {
        let plan = MigrationPlan::new(vec![DeploymentStep::new(20, "B", vec![ArgBinding::address_of("A")]),
                                           DeploymentStep::new(10, "A", vec![])]).expect("valid");
        assert_eq!(plan.steps()[0].id, "A");

        let dup = MigrationPlan::new(vec![DeploymentStep::new(1, "A", vec![]), DeploymentStep::new(1, "B", vec![])]);
        assert_eq!(dup.unwrap_err(), PlanError::DuplicateOrdinal(1));
    }

    #[test]
    fn forward_and_unknown_references_are_rejected() {
        let fwd = MigrationPlan::builder().deploy("A", [ArgBinding::address_of("B")])
                                          .deploy("B", [])
                                          .build();
        assert_eq!(fwd.unwrap_err(),
                   PlanError::ForwardReference { step: "A".into(),
                                                 reference: "B".into() });

        let unknown = MigrationPlan::builder().deploy("A", [ArgBinding::address_of("Z")]).build();
        assert!(matches!(unknown, Err(PlanError::UnknownStepReference { .. })));

        let selfref = MigrationPlan::builder().deploy("A", [ArgBinding::address_of("A")]).build();
        assert_eq!(selfref.unwrap_err(), PlanError::SelfReference("A".into()));
    }

    #[test]
    fn post_action_may_reference_own_step() {
        let plan = MigrationPlan::builder().deploy("PumlNFT", [ArgBinding::lit("")])
                                           .deploy("PumlNFTMarket", [])
                                           .then(InvokeAction::on("PumlNFT",
                                                                  "setMarket",
                                                                  vec![ArgBinding::address_of("PumlNFTMarket")]))
                                           .build();
        assert!(plan.is_ok());

        let dangling = MigrationPlan::builder().then(InvokeAction::new("init", vec![])).build();
        assert_eq!(dangling.unwrap_err(), PlanError::DanglingPostAction);
    }

    #[test]
    fn duplicate_ids_need_aliases() {
        let dup = MigrationPlan::builder().deploy("Token", []).deploy("Token", []).build();
        assert_eq!(dup.unwrap_err(), PlanError::DuplicateStepId("Token".into()));
        let ok = MigrationPlan::builder().deploy_as("TokenA", "Token", [])
                                         .deploy_as("TokenB", "Token", [])
                                         .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn validate_against_registry() {
        let reg = registry();
        let plan = MigrationPlan::builder().deploy("PumlNFT", [ArgBinding::lit("")])
                                           .deploy("PumlNFTMarket", [])
                                           .build()
                                           .unwrap();
        assert_eq!(plan.validate_against(&reg).unwrap().len(), 2);

        let unknown = MigrationPlan::builder().deploy("Missing", []).build().unwrap();
        assert_eq!(unknown.validate_against(&reg).unwrap_err(),
                   MigrationError::UnknownArtifact { step: "Missing".into(),
                                                     artifact: "Missing".into() });

        let arity = MigrationPlan::builder().deploy("PumlNFT", []).build().unwrap();
        assert!(matches!(arity.validate_against(&reg), Err(MigrationError::ArgumentMismatch { .. })));

        let wrong_type = MigrationPlan::builder().deploy("PumlNFT", [ArgBinding::lit(42)]).build().unwrap();
        assert!(matches!(wrong_type.validate_against(&reg), Err(MigrationError::ArgumentMismatch { .. })));
    }
}
