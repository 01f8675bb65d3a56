//! Builder API for state declarations.
//!
//! States are declared with a fluent [`StateBuilder`] and frozen into
//! [`StateNode`](crate::core::StateNode)s by the registry, which validates
//! each declaration and reports every [`BuildError`] it finds.

pub mod error;
pub mod state;

pub use error::BuildError;
pub use state::StateBuilder;

use crate::resolve::ResolveSpec;
use crate::core::Value;

/// Declare a leaf state whose resolves are constant values.
///
/// # Example
///
/// ```
/// use waypoint::builder::constant_state;
/// use serde_json::json;
///
/// let builder = constant_state("settings", [("theme", json!("dark"))]);
/// assert_eq!(builder.name(), "settings");
/// ```
pub fn constant_state<I, K>(name: &str, values: I) -> StateBuilder
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    values
        .into_iter()
        .fold(StateBuilder::new(name), |builder, (key, value)| {
            builder.resolve(ResolveSpec::value(key, value))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn constant_state_declares_one_resolve_per_value() {
        let builder = constant_state("a", [("x", json!(1)), ("y", json!(2))]);
        let names: Vec<_> = builder.resolves.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["x", "y"]);
    }
}
