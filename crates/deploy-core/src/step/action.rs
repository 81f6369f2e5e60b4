//! Post-actions: trabajo arbitrario tras desplegar un step (p.ej. cablear dos
//! unidades entre sí).
use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::Value;

use crate::model::ArgBinding;
use crate::network::{NetworkId, NetworkProfile};
use crate::transport::{DeployReceipt, DeployTransport, InvokeCall, TransportError};

/// Contexto entregado a `PostAction::run`.
pub struct ActionContext<'a> {
    pub network: &'a NetworkId,
    pub profile: &'a NetworkProfile,
    pub step_id: &'a str,
    /// Recibo del despliegue del step actual.
    pub deployed: &'a DeployReceipt,
    /// Bindings de la action ya resueltos, en orden.
    pub args: &'a [Value],
    /// Salidas de steps completados (incluye el actual).
    pub outputs: &'a HashMap<String, DeployReceipt>,
    pub transport: &'a dyn DeployTransport,
}

#[async_trait]
pub trait PostAction: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Bindings que el runner resuelve antes de `run` (mismas reglas que los
    /// argumentos del constructor, salvo que pueden referenciar el step
    /// actual).
    fn bindings(&self) -> &[ArgBinding] {
        &[]
    }

    /// Steps de los que depende la action.
    fn references(&self) -> Vec<&str> {
        self.bindings().iter().filter_map(|b| b.referenced_step()).collect()
    }

    /// Devuelve el tx hash de la acción, si hubo transacción.
    async fn run(&self, ctx: &ActionContext<'_>) -> Result<Option<String>, TransportError>;
}

/// Llama `method(args)` sobre la unidad recién desplegada o sobre la de otro
/// step ya completado.
#[derive(Debug, Clone)]
pub struct InvokeAction {
    name: String,
    target: Option<String>,
    method: String,
    args: Vec<ArgBinding>,
}

impl InvokeAction {
    pub fn new(method: impl Into<String>, args: Vec<ArgBinding>) -> Self {
        let method = method.into();
        Self { name: format!("invoke:{method}"),
               target: None,
               method,
               args }
    }

    /// Invoca sobre la dirección de `step` en lugar del step actual.
    pub fn on(step: impl Into<String>, method: impl Into<String>, args: Vec<ArgBinding>) -> Self {
        let step = step.into();
        let method = method.into();
        Self { name: format!("invoke:{step}.{method}"),
               target: Some(step),
               method,
               args }
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

#[async_trait]
impl PostAction for InvokeAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn bindings(&self) -> &[ArgBinding] {
        &self.args
    }

    fn references(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = self.args.iter().filter_map(|b| b.referenced_step()).collect();
        if let Some(t) = &self.target {
            refs.push(t.as_str());
        }
        refs
    }

    async fn run(&self, ctx: &ActionContext<'_>) -> Result<Option<String>, TransportError> {
        let to = match &self.target {
            None => ctx.deployed.address.clone(),
            Some(step) => ctx.outputs
                             .get(step)
                             .map(|r| r.address.clone())
                             .ok_or_else(|| TransportError::Other(format!("no address recorded for step '{step}'")))?,
        };
        let call = InvokeCall { network: ctx.network.clone(),
                                chain_id: ctx.profile.chain_id,
                                from: ctx.profile.account.clone(),
                                to,
                                method: self.method.clone(),
                                args: ctx.args.to_vec() };
        ctx.transport.invoke(&call).await.map(Some)
    }
}
