//! Error types for sandboxed execution.

/// A run that could not be completed.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// The program itself threw: a compile failure, a runtime error, or an
    /// operation-limit trip inside the script engine. The host classifies
    /// these by inspecting the message text.
    #[error("program failed: {message}")]
    Script {
        /// Engine-reported failure text, including position information.
        message: String,
    },
    /// The run was superseded or torn down before it could finish.
    #[error("run aborted: {0}")]
    Aborted(String),
}

/// Failures from the remote text-generation service boundary.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    /// No credential was supplied for a program that needs one.
    #[error("no credential configured for the text-generation service")]
    MissingCredential,
    /// The service rejected or failed the request.
    #[error("text-generation service error: {message}")]
    Service {
        /// Service-reported failure text.
        message: String,
    },
}
