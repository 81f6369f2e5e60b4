use std::fmt;
use std::sync::Arc;

use super::PostAction;
use crate::model::ArgBinding;

/// Registro declarativo de un step: qué desplegar y con qué argumentos.
/// No ejecuta nada por sí mismo; el runner lo interpreta.
#[derive(Clone)]
pub struct DeploymentStep {
    /// Posición en el orden total del plan.
    pub ordinal: usize,
    /// Identificador estable y único dentro del plan (por defecto, el nombre
    /// del artifact).
    pub id: String,
    /// Nombre lógico del artifact en el registry.
    pub artifact: String,
    pub args: Vec<ArgBinding>,
    pub post_action: Option<Arc<dyn PostAction>>,
}

impl DeploymentStep {
    pub fn new(ordinal: usize, artifact: impl Into<String>, args: Vec<ArgBinding>) -> Self {
        let artifact = artifact.into();
        Self { ordinal,
               id: artifact.clone(),
               artifact,
               args,
               post_action: None }
    }

    /// Alias del step; permite desplegar el mismo artifact más de una vez.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_post_action(mut self, action: impl PostAction + 'static) -> Self {
        self.post_action = Some(Arc::new(action));
        self
    }

    /// Steps referenciados por los argumentos del constructor.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(|b| b.referenced_step())
    }

    /// Steps referenciados por la post-action (puede incluir el propio step).
    pub fn action_references(&self) -> Vec<&str> {
        self.post_action.as_ref().map(|a| a.references()).unwrap_or_default()
    }
}

impl fmt::Debug for DeploymentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentStep")
         .field("ordinal", &self.ordinal)
         .field("id", &self.id)
         .field("artifact", &self.artifact)
         .field("args", &self.args)
         .field("post_action", &self.post_action.as_ref().map(|a| a.name().to_string()))
         .finish()
    }
}
