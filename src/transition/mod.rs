//! Transitions between states.
//!
//! A [`Transition`] is created from the router's committed path and a
//! target. Its [`TreeChanges`] are computed up front; running it executes
//! the hook pipeline in strict phase order:
//!
//! 1. `onBefore` hooks, invoked synchronously when `run` is first called
//! 2. `onInvalid` hooks (unknown or abstract target), or `onStart` then `on`
//! 3. eager resolves on the target path
//! 4. `onExiting` hooks and `onExit` callbacks, leaf first
//! 5. `onRetained` hooks and `onRetain` callbacks, root first
//! 6. lazy resolves, `onEntering` hooks and `onEnter` callbacks per state, root first
//! 7. commit, then `onSuccess` hooks; or `onError` hooks on rejection
//!
//! A transition that no longer holds the router's current generation is
//! rejected as superseded at its next step.

mod engine;
mod options;
mod pipeline;
mod rejection;
mod tree;

pub use engine::{Transition, TransitionFuture, TransitionStatus};
pub(crate) use engine::WeakTransition;
pub use options::{Reload, TargetRef, TransitionOptions};
pub use rejection::{Rejection, RejectionKind, TransitionError};
pub use tree::{keep_prefix, owned_params_equal, ParamEquality, TreeChanges};
