//! Transition targets and options.

use crate::core::StateNode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which states re-enter even if their parameters are unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reload {
    #[default]
    None,
    /// Every state on the target path re-enters
    All,
    /// The named state and its descendants re-enter
    From(String),
}

/// Options recorded on a transition at creation.
///
/// ```rust
/// use waypoint::transition::{Reload, TransitionOptions};
///
/// let options = TransitionOptions::new().reload_from("admin").inherit(true);
/// assert_eq!(options.reload, Reload::From("admin".to_string()));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionOptions {
    pub reload: Reload,
    /// Carry over source parameters the caller did not supply
    pub inherit: bool,
}

impl TransitionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reload(mut self, reload: Reload) -> Self {
        self.reload = reload;
        self
    }

    pub fn reload_all(self) -> Self {
        self.reload(Reload::All)
    }

    pub fn reload_from(self, state: impl Into<String>) -> Self {
        self.reload(Reload::From(state.into()))
    }

    pub fn inherit(mut self, inherit: bool) -> Self {
        self.inherit = inherit;
        self
    }
}

/// Target of a transition: a state name, or a registered node.
#[derive(Clone, Debug)]
pub enum TargetRef {
    Name(String),
    State(Arc<StateNode>),
}

impl TargetRef {
    pub fn name(&self) -> &str {
        match self {
            TargetRef::Name(name) => name,
            TargetRef::State(state) => state.name(),
        }
    }
}

impl From<&str> for TargetRef {
    fn from(name: &str) -> Self {
        TargetRef::Name(name.to_string())
    }
}

impl From<String> for TargetRef {
    fn from(name: String) -> Self {
        TargetRef::Name(name)
    }
}

impl From<Arc<StateNode>> for TargetRef {
    fn from(state: Arc<StateNode>) -> Self {
        TargetRef::State(state)
    }
}

impl From<&Arc<StateNode>> for TargetRef {
    fn from(state: &Arc<StateNode>) -> Self {
        TargetRef::State(Arc::clone(state))
    }
}
