//! Router configuration.

use crate::resolve::ResolvePolicy;
use serde::{Deserialize, Serialize};

/// Tunables for a [`Router`](super::Router).
///
/// Missing fields take their defaults when loaded from JSON:
///
/// ```rust
/// use waypoint::router::RouterConfig;
/// use waypoint::resolve::ResolvePolicy;
///
/// let config = RouterConfig::from_json(r#"{ "default_policy": "lazy" }"#).unwrap();
/// assert_eq!(config.max_redirects, 20);
/// assert_eq!(config.default_policy, ResolvePolicy::Lazy);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Redirect hops `Router::go` follows before giving up
    pub max_redirects: usize,
    /// Policy for resolves whose state declares none
    pub default_policy: ResolvePolicy,
    /// Most recent commits kept in the history; `None` keeps all
    pub history_limit: Option<usize>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_redirects: 20,
            default_policy: ResolvePolicy::Jit,
            history_limit: Some(1000),
        }
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn default_policy(mut self, policy: ResolvePolicy) -> Self {
        self.default_policy = policy;
        self
    }

    pub fn history_limit(mut self, limit: Option<usize>) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
