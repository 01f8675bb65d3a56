//! Errors reported when registering a state.

use thiserror::Error;

/// Problems found while validating a state declaration.
///
/// Registration reports every problem at once rather than the first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("State name must not be empty")]
    EmptyName,

    #[error("State '{0}' is already registered")]
    DuplicateState(String),

    #[error("Parent '{parent}' of state '{state}' is not registered")]
    MissingParent { state: String, parent: String },

    #[error("State '{state}' declares resolve '{resolve}' more than once")]
    DuplicateResolve { state: String, resolve: String },

    #[error("Resolve name '{resolve}' on state '{state}' is reserved")]
    ReservedName { state: String, resolve: String },

    #[error("Resolve '{resolve}' on state '{state}' depends on itself but no ancestor declares it")]
    SelfDependency { state: String, resolve: String },

    #[error("'{consumer}' on state '{state}' depends on unknown '{dependency}'")]
    UnknownDependency {
        state: String,
        consumer: String,
        dependency: String,
    },

    #[error("Resolves on state '{state}' form a dependency cycle: {}", cycle.join(" -> "))]
    DependencyCycle { state: String, cycle: Vec<String> },
}
