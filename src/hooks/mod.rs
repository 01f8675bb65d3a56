//! Lifecycle hooks.
//!
//! Hooks are callbacks registered for a [`HookPhase`] with [`MatchCriteria`]
//! on the transition's target and source states, ordered by priority. A hook
//! returns a [`HookResult`] telling the transition whether to continue,
//! abort, redirect, add resolvables, or wait for a deferred outcome.

mod criteria;
mod registry;
mod result;

pub use criteria::{Criterion, MatchCriteria, StatePredicate, Subject};
pub use registry::{Hook, HookFn, HookId, HookPhase, HookRegistry};
pub use result::{HookContext, HookFuture, HookResult};
