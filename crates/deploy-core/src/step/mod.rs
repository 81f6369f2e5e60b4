//! Steps de despliegue.
//!
//! Un step es un registro declarativo: despliega una unidad lógica con
//! argumentos ligados y, opcionalmente, ejecuta una post-action. Este módulo
//! define:
//! - `DeploymentStep`: el registro en sí.
//! - `MigrationPlan` / `PlanBuilder`: la secuencia ordenada y validada.
//! - `PostAction` / `InvokeAction`: trabajo tras el despliegue.
//! - `StepStatus`: estado de la entrada del step en el ledger.

pub mod action;
pub mod definition;
pub mod plan;
mod status;

pub use action::{ActionContext, InvokeAction, PostAction};
pub use definition::DeploymentStep;
pub use plan::{MigrationPlan, PlanBuilder};
pub use status::StepStatus;
