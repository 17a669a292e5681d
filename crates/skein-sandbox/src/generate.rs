//! Boundary to the remote text-generation service.

use crate::error::GeneratorError;

/// Produces model completions for a program's prompts.
///
/// Implementations are called from the program's blocking thread, so a
/// networked implementation should block on its own runtime handle rather
/// than assume an ambient async context.
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for `prompt`, authenticating with
    /// `credential`.
    fn generate(&self, prompt: &str, credential: &str) -> Result<String, GeneratorError>;
}

/// Default generator used when the host wires no service in: every call
/// fails, with the credential check still applied first so programs see
/// the same error shape they would get from a real backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredGenerator;

impl TextGenerator for UnconfiguredGenerator {
    fn generate(&self, _prompt: &str, credential: &str) -> Result<String, GeneratorError> {
        if credential.is_empty() {
            return Err(GeneratorError::MissingCredential);
        }
        Err(GeneratorError::Service {
            message: "no text-generation backend configured".to_string(),
        })
    }
}
