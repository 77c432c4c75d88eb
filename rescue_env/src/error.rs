//! Error types for the collaborator boundary.

use thiserror::Error;

/// Errors that can occur when talking to external collaborators.
#[derive(Debug, Error)]
pub enum EnvError {
    /// A remote model (vision or language) call failed
    #[error("Service error: {0}")]
    ServiceError(String),

    /// The service answered but with nothing usable
    #[error("Empty response from {0}")]
    EmptyResponse(String),

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a service error.
    pub fn service(msg: impl Into<String>) -> Self {
        Self::ServiceError(msg.into())
    }

    /// Creates an empty-response error naming the service.
    pub fn empty(service: impl std::fmt::Display) -> Self {
        Self::EmptyResponse(service.to_string())
    }
}
