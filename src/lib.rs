//! Waypoint: a hierarchical state-transition engine
//!
//! Waypoint moves an application between the states of a dotted state
//! tree. Given the committed state and a target it works out which states
//! are retained, exited and entered, resolves each state's asynchronous
//! dependencies, and runs lifecycle hooks around the move with classified
//! outcomes for aborts, redirects, supersession and no-op transitions.
//!
//! # Core Concepts
//!
//! - **StateNode / Path**: registered states and root-first paths through them
//! - **Resolvable**: a named, memoized computation with declared dependencies
//! - **ResolveContext**: layered lookup with ancestor shadowing and
//!   `Eager` / `Lazy` / `Jit` policies
//! - **Hooks**: callbacks matched by phase and state globs, ordered by priority
//! - **Transition**: the pipeline that diffs paths, runs hooks and commits
//!
//! # Example
//!
//! ```rust
//! use waypoint::builder::StateBuilder;
//! use waypoint::hooks::{HookResult, MatchCriteria};
//! use waypoint::resolve::ResolveSpec;
//! use waypoint::router::Router;
//! use waypoint::transition::{RejectionKind, TransitionOptions};
//! use waypoint::Params;
//! use serde_json::json;
//!
//! let router = Router::new();
//! router
//!     .register(StateBuilder::new("users").resolve(ResolveSpec::value("users", json!(["ada", "grace"]))))
//!     .unwrap();
//! router
//!     .register(StateBuilder::new("users.detail").param("id").resolve(ResolveSpec::new(
//!         "user",
//!         &["users", "$stateParams"],
//!         |locals| async move {
//!             let index = locals["$stateParams"]["id"].as_u64().unwrap_or_default() as usize;
//!             Ok(locals["users"][index].clone())
//!         },
//!     )))
//!     .unwrap();
//!
//! router.hooks().on_entering(MatchCriteria::any().to_state("admin.**"), |_| Ok(HookResult::Abort));
//!
//! let mut params = Params::new();
//! params.insert("id".into(), json!(1));
//! let transition = router.create_transition("users.detail", params.clone(), TransitionOptions::default());
//! let user = futures::executor::block_on(transition.resolve("user")).unwrap();
//! assert_eq!(user, json!("grace"));
//!
//! futures::executor::block_on(transition.run()).unwrap();
//! assert!(router.is("users.detail"));
//!
//! // Same state, same parameters: nothing to do.
//! let again = futures::executor::block_on(router.go("users.detail", params, TransitionOptions::default()));
//! assert_eq!(again.unwrap_err().kind(), Some(RejectionKind::Ignored));
//! ```

pub mod builder;
pub mod core;
pub mod hooks;
pub mod resolve;
pub mod router;
pub mod transition;

// Re-export commonly used types
pub use crate::builder::{BuildError, StateBuilder};
pub use crate::core::{Locals, Params, Path, StateNode, Value};
pub use crate::hooks::{HookContext, HookPhase, HookResult, MatchCriteria};
pub use crate::resolve::{ResolvePolicy, ResolveSpec};
pub use crate::router::{Router, RouterConfig};
pub use crate::transition::{Rejection, RejectionKind, Transition, TransitionError, TransitionOptions};
