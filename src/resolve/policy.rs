//! Resolution policies.

use super::resolvable::ResolveSpec;
use crate::core::StateNode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// When a resolvable is allowed to start computing.
///
/// Policies are ordered by eagerness: `Eager > Lazy > Jit`. A batch
/// resolution at policy `p` starts every resolvable whose policy is at
/// least as eager as `p`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ResolvePolicy {
    /// Only when a consumer asks for the value
    #[default]
    Jit = 1,
    /// Before the owning state is entered
    Lazy = 2,
    /// Before the transition's asynchronous phase begins
    Eager = 3,
}

impl ResolvePolicy {
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// True if a resolvable with this policy runs in a batch at `requested`.
    pub fn satisfies(self, requested: ResolvePolicy) -> bool {
        self >= requested
    }

    /// Most specific wins: the resolve's own policy, then the state's
    /// default, then `fallback`.
    pub fn effective(spec: &ResolveSpec, state: &StateNode, fallback: ResolvePolicy) -> Self {
        spec.policy()
            .or_else(|| state.resolve_policy())
            .unwrap_or(fallback)
    }
}

impl fmt::Display for ResolvePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Jit => "JIT",
            Self::Lazy => "LAZY",
            Self::Eager => "EAGER",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StateBuilder;
    use crate::core::StateRegistry;
    use serde_json::json;

    #[test]
    fn ordering_follows_eagerness() {
        assert!(ResolvePolicy::Eager > ResolvePolicy::Lazy);
        assert!(ResolvePolicy::Lazy > ResolvePolicy::Jit);
        assert_eq!(ResolvePolicy::Eager.ordinal(), 3);
        assert_eq!(ResolvePolicy::default(), ResolvePolicy::Jit);
    }

    #[test]
    fn satisfies_is_at_least_as_eager() {
        assert!(ResolvePolicy::Eager.satisfies(ResolvePolicy::Lazy));
        assert!(ResolvePolicy::Lazy.satisfies(ResolvePolicy::Lazy));
        assert!(!ResolvePolicy::Jit.satisfies(ResolvePolicy::Lazy));
        assert!(ResolvePolicy::Jit.satisfies(ResolvePolicy::Jit));
    }

    #[test]
    fn most_specific_policy_wins() {
        let mut registry = StateRegistry::new();
        let state = registry
            .register(StateBuilder::new("a").policy(ResolvePolicy::Lazy))
            .unwrap();
        let plain = registry.register(StateBuilder::new("b")).unwrap();

        let own = ResolveSpec::value("x", json!(1)).with_policy(ResolvePolicy::Eager);
        let inherits = ResolveSpec::value("y", json!(1));

        assert_eq!(
            ResolvePolicy::effective(&own, &state, ResolvePolicy::Jit),
            ResolvePolicy::Eager
        );
        assert_eq!(
            ResolvePolicy::effective(&inherits, &state, ResolvePolicy::Jit),
            ResolvePolicy::Lazy
        );
        assert_eq!(
            ResolvePolicy::effective(&inherits, &plain, ResolvePolicy::Jit),
            ResolvePolicy::Jit
        );
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ResolvePolicy::Eager).unwrap(),
            "\"eager\""
        );
        assert_eq!(ResolvePolicy::Lazy.to_string(), "LAZY");
    }
}
