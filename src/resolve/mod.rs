//! Asynchronous, dependency-ordered resolution of named values.
//!
//! # Key Concepts
//!
//! - **ResolveSpec**: a declared computation and the names it depends on
//! - **Resolvable**: a spec bound to a path element; computes at most once
//! - **ResolveContext**: layered lookup with self-exclusion and shadowing
//! - **ResolvePolicy**: `Eager`, `Lazy` or `Jit`, deciding when a
//!   resolvable may start
//!
//! Names no resolvable provides fall back to the built-in locals
//! (`$stateParams`, `$transition`) and then to the configured [`Injector`].

mod context;
mod error;
mod injector;
mod policy;
mod resolvable;

pub use context::{ResolveContext, Spawner, BUILTIN_LOCALS, STATE_PARAMS, TRANSITION};
pub(crate) use context::ResolveEnv;
pub use error::ResolveError;
pub use injector::{Injector, StaticInjector};
pub use policy::ResolvePolicy;
pub use resolvable::{ResolveFuture, ResolveSpec, Resolvable, SharedResolve};
