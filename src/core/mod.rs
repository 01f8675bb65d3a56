//! The static state tree.
//!
//! This module holds the data the engine treats as fixed input:
//! - `StateNode` definitions and the `StateRegistry` that owns them
//! - `Path` / `PathElement`, the root-first sequences a transition diffs
//! - `Glob` patterns over dotted state names
//! - `TransitionHistory`, the record of committed transitions

mod glob;
mod history;
mod path;
mod registry;
mod state;

pub use glob::Glob;
pub use history::{TransitionHistory, TransitionRecord};
pub use path::{Path, PathElement};
pub use registry::StateRegistry;
pub use state::{CallbackFuture, Locals, Params, StateCallback, StateNode, Value};
