//! What hooks return, and what they receive.

use super::registry::HookPhase;
use crate::core::{Params, StateNode, Value};
use crate::resolve::{ResolveError, ResolveSpec};
use crate::transition::{TargetRef, Transition, TransitionError};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Deferred hook outcome, interpreted once it settles.
pub type HookFuture = BoxFuture<'static, Result<HookResult, TransitionError>>;

/// A hook's instruction to the running transition.
pub enum HookResult {
    /// Keep going
    Continue,
    /// Reject the transition as aborted
    Abort,
    /// Supersede the transition with another one
    Redirect(Transition),
    /// Add resolvables to the current state's context
    Resolves(Vec<ResolveSpec>),
    /// Await the future and apply its result the same way
    Pending(HookFuture),
}

impl HookResult {
    /// Defer the outcome to an asynchronous computation.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<HookResult, TransitionError>> + Send + 'static,
    {
        HookResult::Pending(future.boxed())
    }

    pub fn resolves(specs: impl IntoIterator<Item = ResolveSpec>) -> Self {
        HookResult::Resolves(specs.into_iter().collect())
    }
}

/// `false` aborts, `true` continues.
impl From<bool> for HookResult {
    fn from(proceed: bool) -> Self {
        if proceed {
            HookResult::Continue
        } else {
            HookResult::Abort
        }
    }
}

impl From<Transition> for HookResult {
    fn from(transition: Transition) -> Self {
        HookResult::Redirect(transition)
    }
}

impl fmt::Debug for HookResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookResult::Continue => f.write_str("Continue"),
            HookResult::Abort => f.write_str("Abort"),
            HookResult::Redirect(t) => f.debug_tuple("Redirect").field(&t.id()).finish(),
            HookResult::Resolves(specs) => f.debug_tuple("Resolves").field(specs).finish(),
            HookResult::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Everything a hook callback can see about the transition that invoked it.
#[derive(Clone)]
pub struct HookContext {
    transition: Transition,
    phase: HookPhase,
    state: Option<Arc<StateNode>>,
    error: Option<TransitionError>,
}

impl HookContext {
    pub(crate) fn new(transition: Transition, phase: HookPhase, state: Option<Arc<StateNode>>) -> Self {
        Self {
            transition,
            phase,
            state,
            error: None,
        }
    }

    pub(crate) fn with_error(mut self, error: TransitionError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn transition(&self) -> &Transition {
        &self.transition
    }

    pub fn phase(&self) -> HookPhase {
        self.phase
    }

    /// The state being exited, retained or entered, for per-state phases.
    pub fn state(&self) -> Option<&Arc<StateNode>> {
        self.state.as_ref()
    }

    /// The rejection being reported, for `onError` hooks.
    pub fn error(&self) -> Option<&TransitionError> {
        self.error.as_ref()
    }

    /// Request a resolved value as seen from this hook's state.
    ///
    /// Exiting hooks see the source path; every other hook sees the target
    /// path, anchored at its state or at the target leaf.
    pub fn resolve(&self, name: &str) -> BoxFuture<'static, Result<Value, TransitionError>> {
        let context = match (self.phase, &self.state) {
            (HookPhase::Exiting, Some(state)) => self.transition.from_context().anchored_at(state.name()),
            (_, Some(state)) => self
                .transition
                .to_context()
                .and_then(|c| c.anchored_at(state.name())),
            (_, None) => self.transition.to_context(),
        };
        match context {
            Some(context) => {
                let pending = context.resolve(name);
                async move { pending.await.map_err(TransitionError::from) }.boxed()
            }
            None => {
                let error = ResolveError::MissingDependency {
                    state: self.transition.target_name().to_string(),
                    consumer: self.phase.to_string(),
                    dependency: name.to_string(),
                };
                futures::future::ready(Err(error.into())).boxed()
            }
        }
    }

    /// Build a redirect to `target` from the same source as this transition.
    pub fn redirect(&self, target: impl Into<TargetRef>, params: Params) -> HookResult {
        HookResult::Redirect(self.transition.redirect(target, params))
    }
}

impl fmt::Debug for HookContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookContext")
            .field("transition", &self.transition.id())
            .field("phase", &self.phase)
            .field("state", &self.state.as_ref().map(|s| s.name().to_string()))
            .field("error", &self.error)
            .finish()
    }
}
