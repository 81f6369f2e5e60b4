//! Modelos neutrales (descriptores, bindings, fingerprint).

pub mod artifact;
pub mod binding;
pub mod fingerprint;

pub use artifact::{is_address, ArtifactDescriptor, ParamSpec, ParamType};
pub use binding::{ArgBinding, OutputField};
pub use fingerprint::StepFingerprintInput;
