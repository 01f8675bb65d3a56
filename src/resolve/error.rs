//! Resolution errors.

use thiserror::Error;

/// Why a resolvable (or an injected consumer) could not produce a value.
///
/// A dependency's error is propagated unchanged to every dependent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("'{consumer}' on state '{state}' depends on '{dependency}', which nothing provides")]
    MissingDependency {
        state: String,
        consumer: String,
        dependency: String,
    },

    #[error("Resolve failed: {message}")]
    Failed { message: String },
}

impl ResolveError {
    /// Error for a computation that could not produce its value.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}
