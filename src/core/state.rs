//! State definitions.
//!
//! A `StateNode` is one node of the state tree. Nodes are immutable once
//! registered; a child holds its parent, a parent never references its
//! children, so the root-to-node chain is acyclic and fixed.

use crate::hooks::HookResult;
use crate::resolve::{ResolvePolicy, ResolveSpec};
use crate::transition::TransitionError;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Values produced by resolves and carried by parameters.
pub type Value = serde_json::Value;

/// Parameter map for a transition target.
pub type Params = serde_json::Map<String, Value>;

/// Name → value map handed to computations and callbacks.
pub type Locals = HashMap<String, Value>;

/// Future returned by a state's lifecycle callback.
pub type CallbackFuture = BoxFuture<'static, Result<HookResult, TransitionError>>;

type CallbackFn = Arc<dyn Fn(Locals) -> CallbackFuture + Send + Sync>;

/// A declared `onEnter` / `onExit` / `onRetain` callback.
///
/// The callback lists the names it needs; the engine resolves exactly
/// those names against the state's resolve context before invoking it.
#[derive(Clone)]
pub struct StateCallback {
    deps: Arc<[String]>,
    callback: CallbackFn,
}

impl StateCallback {
    /// Create a callback injected with the named dependencies.
    ///
    /// # Example
    ///
    /// ```rust
    /// use waypoint::core::StateCallback;
    /// use waypoint::hooks::HookResult;
    ///
    /// let on_enter = StateCallback::new(&["user"], |locals| async move {
    ///     assert!(locals.contains_key("user"));
    ///     Ok(HookResult::Continue)
    /// });
    /// assert_eq!(on_enter.deps(), &["user".to_string()]);
    /// ```
    pub fn new<F, Fut>(deps: &[&str], callback: F) -> Self
    where
        F: Fn(Locals) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookResult, TransitionError>> + Send + 'static,
    {
        Self {
            deps: deps.iter().map(|d| d.to_string()).collect(),
            callback: Arc::new(move |locals| callback(locals).boxed()),
        }
    }

    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    pub(crate) fn invoke(&self, locals: Locals) -> CallbackFuture {
        (self.callback)(locals)
    }
}

impl fmt::Debug for StateCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCallback")
            .field("deps", &self.deps)
            .finish_non_exhaustive()
    }
}

/// One node of the registered state tree.
pub struct StateNode {
    pub(crate) name: String,
    pub(crate) parent: Option<Arc<StateNode>>,
    pub(crate) params: Vec<String>,
    pub(crate) resolves: Vec<ResolveSpec>,
    pub(crate) resolve_policy: Option<ResolvePolicy>,
    pub(crate) is_abstract: bool,
    pub(crate) on_enter: Option<StateCallback>,
    pub(crate) on_exit: Option<StateCallback>,
    pub(crate) on_retain: Option<StateCallback>,
}

impl StateNode {
    /// The unnamed root every path starts from.
    pub(crate) fn root() -> Self {
        Self {
            name: String::new(),
            parent: None,
            params: Vec::new(),
            resolves: Vec::new(),
            resolve_policy: None,
            is_abstract: true,
            on_enter: None,
            on_exit: None,
            on_retain: None,
        }
    }

    /// Fully qualified, dot-separated name. The root's name is empty.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<StateNode>> {
        self.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Abstract states can be ancestors of a target but never the target.
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Number of ancestors above this node (root is 0).
    pub fn depth(&self) -> usize {
        self.parent.as_ref().map_or(0, |p| p.depth() + 1)
    }

    /// Parameter keys owned by this state (not its ancestors).
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn resolves(&self) -> &[ResolveSpec] {
        &self.resolves
    }

    /// State-level default resolution policy, if declared.
    pub fn resolve_policy(&self) -> Option<ResolvePolicy> {
        self.resolve_policy
    }

    pub fn on_enter(&self) -> Option<&StateCallback> {
        self.on_enter.as_ref()
    }

    pub fn on_exit(&self) -> Option<&StateCallback> {
        self.on_exit.as_ref()
    }

    pub fn on_retain(&self) -> Option<&StateCallback> {
        self.on_retain.as_ref()
    }

    /// Root-first chain of nodes ending at `node`.
    pub fn path(node: &Arc<StateNode>) -> Vec<Arc<StateNode>> {
        let mut chain = vec![Arc::clone(node)];
        let mut cursor = node.parent.clone();
        while let Some(parent) = cursor {
            cursor = parent.parent.clone();
            chain.push(parent);
        }
        chain.reverse();
        chain
    }

    /// True if this node is `name` or a descendant of it.
    pub fn includes(&self, name: &str) -> bool {
        if self.name == name {
            return true;
        }
        let mut cursor = self.parent.as_ref();
        while let Some(parent) = cursor {
            if parent.name == name {
                return true;
            }
            cursor = parent.parent.as_ref();
        }
        false
    }

    pub(crate) fn declares_resolve(&self, name: &str) -> bool {
        self.resolves.iter().any(|r| r.name() == name)
    }
}

impl fmt::Debug for StateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateNode")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name.as_str()))
            .field("params", &self.params)
            .field(
                "resolves",
                &self.resolves.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .field("abstract", &self.is_abstract)
            .finish()
    }
}

impl fmt::Display for StateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.name)
        }
    }
}
