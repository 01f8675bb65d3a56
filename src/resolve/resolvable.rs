//! Named, memoized, dependency-annotated asynchronous computations.

use super::context::ResolveContext;
use super::error::ResolveError;
use super::policy::ResolvePolicy;
use crate::core::{Locals, Value};
use futures::future::{BoxFuture, Shared};
use futures::task::{Spawn, SpawnExt};
use futures::FutureExt;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Future produced by a resolve computation.
pub type ResolveFuture = BoxFuture<'static, Result<Value, ResolveError>>;

/// The memoized promise every consumer of one resolvable shares.
pub type SharedResolve = Shared<ResolveFuture>;

type ComputeFn = Arc<dyn Fn(Locals) -> ResolveFuture + Send + Sync>;

/// Declaration of a resolve: its name, the names it depends on, and the
/// computation that turns those dependencies into a value.
#[derive(Clone)]
pub struct ResolveSpec {
    name: String,
    deps: Arc<[String]>,
    compute: ComputeFn,
    policy: Option<ResolvePolicy>,
}

impl ResolveSpec {
    /// Declare a computation over the named dependencies.
    ///
    /// # Example
    ///
    /// ```rust
    /// use waypoint::resolve::ResolveSpec;
    /// use serde_json::json;
    ///
    /// let full_name = ResolveSpec::new("fullName", &["first", "last"], |locals| async move {
    ///     let first = locals["first"].as_str().unwrap_or_default().to_string();
    ///     let last = locals["last"].as_str().unwrap_or_default();
    ///     Ok(json!(format!("{first} {last}")))
    /// });
    /// assert_eq!(full_name.deps(), &["first".to_string(), "last".to_string()]);
    /// ```
    pub fn new<F, Fut>(name: impl Into<String>, deps: &[&str], compute: F) -> Self
    where
        F: Fn(Locals) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ResolveError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            deps: deps.iter().map(|d| d.to_string()).collect(),
            compute: Arc::new(move |locals| compute(locals).boxed()),
            policy: None,
        }
    }

    /// A resolve with no dependencies that yields `value`.
    pub fn value(name: impl Into<String>, value: Value) -> Self {
        Self::new(name, &[], move |_| futures::future::ready(Ok(value.clone())))
    }

    /// Override the owning state's default policy for this resolve.
    pub fn with_policy(mut self, policy: ResolvePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    pub fn policy(&self) -> Option<ResolvePolicy> {
        self.policy
    }
}

impl fmt::Debug for ResolveSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolveSpec")
            .field("name", &self.name)
            .field("deps", &self.deps)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

struct Inner {
    spec: ResolveSpec,
    state: String,
    policy: ResolvePolicy,
    promise: Mutex<Option<SharedResolve>>,
    data: Mutex<Option<Value>>,
}

/// A resolve bound to one path element.
///
/// The computation runs at most once: the first request creates and
/// caches the promise, later requests share it. Request values through a
/// [`ResolveContext`], which anchors the lookup at the owning element.
#[derive(Clone)]
pub struct Resolvable {
    inner: Arc<Inner>,
}

impl Resolvable {
    pub(crate) fn new(spec: ResolveSpec, state: &str, policy: ResolvePolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                spec,
                state: state.to_string(),
                policy,
                promise: Mutex::new(None),
                data: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.spec.name()
    }

    pub fn deps(&self) -> &[String] {
        self.inner.spec.deps()
    }

    /// Effective policy, fixed when the owning element was built.
    pub fn policy(&self) -> ResolvePolicy {
        self.inner.policy
    }

    /// Name of the owning state.
    pub fn state(&self) -> &str {
        &self.inner.state
    }

    /// True once a promise exists, settled or not.
    pub fn has_started(&self) -> bool {
        self.inner.promise.lock().is_some()
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.data.lock().is_some()
    }

    /// The settled value, if the computation has succeeded.
    pub fn data(&self) -> Option<Value> {
        self.inner.data.lock().clone()
    }

    pub fn ptr_eq(&self, other: &Resolvable) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Return the memoized promise, creating it on first call.
    ///
    /// `context` must be anchored at the owning element. Dependencies are
    /// looked up with this resolvable's own entry hidden, so a dependency on
    /// its own name reaches the nearest ancestor declaring that name. All
    /// dependencies are requested together; the first failure is returned
    /// without running the computation.
    /// When `context` carries a spawner, the new promise is also spawned so
    /// it runs to completion even if every consumer stops waiting.
    pub(crate) fn get(&self, context: &ResolveContext) -> SharedResolve {
        let mut promise = self.inner.promise.lock();
        if let Some(existing) = promise.as_ref() {
            return existing.clone();
        }

        let this = self.clone();
        let dependencies = context.dependencies_of(self);
        let computation = async move {
            let locals = dependencies.await?;
            tracing::trace!(resolve = %this.name(), state = %this.state(), "invoking resolve");
            let pending = (this.inner.spec.compute)(locals);
            match pending.await {
                Ok(value) => {
                    *this.inner.data.lock() = Some(value.clone());
                    Ok(value)
                }
                Err(error) => {
                    tracing::debug!(resolve = %this.name(), state = %this.state(), %error, "resolve failed");
                    Err(error)
                }
            }
        }
        .boxed()
        .shared();

        *promise = Some(computation.clone());
        if let Some(spawner) = context.spawner() {
            let spawner: &(dyn Spawn + Send + Sync) = &**spawner;
            if let Err(error) = spawner.spawn(computation.clone().map(|_| ())) {
                tracing::debug!(resolve = %self.name(), %error, "resolve not spawned; it runs when awaited");
            }
        }
        computation
    }
}

impl fmt::Debug for Resolvable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolvable")
            .field("name", &self.name())
            .field("state", &self.state())
            .field("policy", &self.policy())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
