//! Fluent builder for state declarations.

use crate::core::{Locals, StateCallback};
use crate::hooks::HookResult;
use crate::resolve::{ResolvePolicy, ResolveSpec};
use crate::transition::TransitionError;
use std::future::Future;

/// Declaration of a state, validated and frozen by
/// [`StateRegistry::register`](crate::core::StateRegistry::register).
///
/// # Example
///
/// ```rust
/// use waypoint::builder::StateBuilder;
/// use waypoint::core::StateRegistry;
/// use waypoint::resolve::{ResolvePolicy, ResolveSpec};
/// use serde_json::json;
///
/// let mut registry = StateRegistry::new();
/// registry.register(StateBuilder::new("users").abstract_state()).unwrap();
/// registry
///     .register(
///         StateBuilder::new("users.detail")
///             .param("id")
///             .policy(ResolvePolicy::Lazy)
///             .resolve(ResolveSpec::new("user", &["$stateParams"], |locals| async move {
///                 Ok(json!({ "id": locals["$stateParams"]["id"] }))
///             })),
///     )
///     .unwrap();
///
/// assert!(registry.get("users.detail").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct StateBuilder {
    pub(crate) name: String,
    pub(crate) parent: Option<String>,
    pub(crate) params: Vec<String>,
    pub(crate) resolves: Vec<ResolveSpec>,
    pub(crate) policy: Option<ResolvePolicy>,
    pub(crate) is_abstract: bool,
    pub(crate) on_enter: Option<StateCallback>,
    pub(crate) on_exit: Option<StateCallback>,
    pub(crate) on_retain: Option<StateCallback>,
}

impl StateBuilder {
    /// Start a declaration. A dotted name implies its parent (`a.b` → `a`).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            params: Vec::new(),
            resolves: Vec::new(),
            policy: None,
            is_abstract: false,
            on_enter: None,
            on_exit: None,
            on_retain: None,
        }
    }

    /// Set the parent explicitly instead of deriving it from the name.
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Declare a parameter key owned by this state.
    pub fn param(mut self, key: impl Into<String>) -> Self {
        self.params.push(key.into());
        self
    }

    pub fn resolve(mut self, spec: ResolveSpec) -> Self {
        self.resolves.push(spec);
        self
    }

    /// State-level default policy for resolves without their own.
    pub fn policy(mut self, policy: ResolvePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn abstract_state(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn on_enter<F, Fut>(mut self, deps: &[&str], callback: F) -> Self
    where
        F: Fn(Locals) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookResult, TransitionError>> + Send + 'static,
    {
        self.on_enter = Some(StateCallback::new(deps, callback));
        self
    }

    pub fn on_exit<F, Fut>(mut self, deps: &[&str], callback: F) -> Self
    where
        F: Fn(Locals) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookResult, TransitionError>> + Send + 'static,
    {
        self.on_exit = Some(StateCallback::new(deps, callback));
        self
    }

    pub fn on_retain<F, Fut>(mut self, deps: &[&str], callback: F) -> Self
    where
        F: Fn(Locals) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookResult, TransitionError>> + Send + 'static,
    {
        self.on_retain = Some(StateCallback::new(deps, callback));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent name: explicit, else the dotted prefix, else the root (`""`).
    pub fn parent_name(&self) -> &str {
        match &self.parent {
            Some(parent) => parent,
            None => self.name.rsplit_once('.').map_or("", |(prefix, _)| prefix),
        }
    }

    pub(crate) fn callbacks(&self) -> impl Iterator<Item = (&'static str, &StateCallback)> {
        [
            ("onEnter", self.on_enter.as_ref()),
            ("onExit", self.on_exit.as_ref()),
            ("onRetain", self.on_retain.as_ref()),
        ]
        .into_iter()
        .filter_map(|(label, cb)| cb.map(|cb| (label, cb)))
    }
}
