//! Layered lookup over a path's resolvables.
//!
//! A `ResolveContext` is a path plus an anchor element. Lookups walk from
//! the anchor toward the root, so a state sees its own resolves and its
//! ancestors', never its descendants'. A resolvable depending on its own
//! name skips its own element's entry and reaches the nearest ancestor
//! with that name; every other consumer at or below the element sees the
//! element's own value.

use super::error::ResolveError;
use super::injector::Injector;
use super::policy::ResolvePolicy;
use super::resolvable::{ResolveFuture, Resolvable, SharedResolve};
use crate::core::{Locals, Params, Path, Value};
use futures::future::{self, BoxFuture};
use futures::task::Spawn;
use futures::FutureExt;
use std::fmt;
use std::sync::Arc;

/// Built-in local holding the target parameters as a JSON object.
pub const STATE_PARAMS: &str = "$stateParams";

/// Built-in local describing the running transition (`id`, `from`, `to`).
pub const TRANSITION: &str = "$transition";

/// Names that are always injectable and cannot be declared as resolves.
pub const BUILTIN_LOCALS: &[&str] = &[STATE_PARAMS, TRANSITION];

/// Executor that drives started resolvables to completion in the
/// background, whether or not anyone still awaits them.
pub type Spawner = Arc<dyn Spawn + Send + Sync>;

/// Values shared by every context of one transition.
pub(crate) struct ResolveEnv {
    pub(crate) params: Params,
    pub(crate) transition: Value,
    pub(crate) injector: Arc<dyn Injector>,
    pub(crate) spawner: Option<Spawner>,
}

#[derive(Clone)]
pub struct ResolveContext {
    path: Path,
    anchor: usize,
    env: Arc<ResolveEnv>,
}

impl ResolveContext {
    /// Context anchored at the leaf of `path`.
    pub fn new(path: Path, params: Params, injector: Arc<dyn Injector>) -> Self {
        let env = ResolveEnv {
            params,
            transition: Value::Null,
            injector,
            spawner: None,
        };
        Self::with_env(path, Arc::new(env))
    }

    /// Run every resolvable this context starts on `spawner` as well.
    ///
    /// Without a spawner a started resolvable only progresses while it is
    /// awaited; one left behind by a failed batch resumes when next requested.
    pub fn with_spawner(self, spawner: Spawner) -> Self {
        let env = ResolveEnv {
            params: self.env.params.clone(),
            transition: self.env.transition.clone(),
            injector: Arc::clone(&self.env.injector),
            spawner: Some(spawner),
        };
        Self {
            path: self.path,
            anchor: self.anchor,
            env: Arc::new(env),
        }
    }

    pub(crate) fn with_env(path: Path, env: Arc<ResolveEnv>) -> Self {
        let anchor = path.len().saturating_sub(1);
        Self { path, anchor, env }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn anchor(&self) -> usize {
        self.anchor
    }

    pub fn params(&self) -> &Params {
        &self.env.params
    }

    pub(crate) fn spawner(&self) -> Option<&Spawner> {
        self.env.spawner.as_ref()
    }

    /// The same path anchored at `index` (clamped to the leaf).
    pub fn at(&self, index: usize) -> ResolveContext {
        Self {
            path: self.path.clone(),
            anchor: index.min(self.path.len().saturating_sub(1)),
            env: Arc::clone(&self.env),
        }
    }

    /// The same path anchored at the element for `state`.
    pub fn anchored_at(&self, state: &str) -> Option<ResolveContext> {
        self.path.position(state).map(|index| self.at(index))
    }

    /// Nearest resolvable named `name` visible from the anchor.
    pub fn find(&self, name: &str) -> Option<Resolvable> {
        self.lookup(name, false).map(|(_, resolvable)| resolvable)
    }

    /// Request `name` as a consumer at the anchor.
    pub fn resolve(&self, name: &str) -> ResolveFuture {
        self.fetch(name, false, "resolve")
    }

    /// Request every name in `deps` concurrently, on behalf of `consumer`.
    pub fn locals(&self, deps: &[String], consumer: &str) -> BoxFuture<'static, Result<Locals, ResolveError>> {
        let fetches: Vec<_> = deps
            .iter()
            .map(|dep| self.named_fetch(dep, false, consumer))
            .collect();
        collect_locals(fetches)
    }

    /// Start every resolvable on the path whose policy satisfies `policy`
    /// and wait for all of them. The first failure settles the batch; the
    /// others keep their started promises.
    pub fn resolve_path(&self, policy: ResolvePolicy) -> BoxFuture<'static, Result<(), ResolveError>> {
        let pending: Vec<SharedResolve> = (0..self.path.len())
            .flat_map(|index| self.start_element(index, policy))
            .collect();
        tracing::debug!(%policy, started = pending.len(), "resolving path");
        settle(pending)
    }

    /// As [`resolve_path`](Self::resolve_path), for one element.
    pub fn resolve_element(
        &self,
        index: usize,
        policy: ResolvePolicy,
    ) -> BoxFuture<'static, Result<(), ResolveError>> {
        settle(self.start_element(index, policy))
    }

    pub(crate) fn dependencies_of(&self, resolvable: &Resolvable) -> BoxFuture<'static, Result<Locals, ResolveError>> {
        let fetches: Vec<_> = resolvable
            .deps()
            .iter()
            .map(|dep| self.named_fetch(dep, dep == resolvable.name(), resolvable.name()))
            .collect();
        collect_locals(fetches)
    }

    fn start_element(&self, index: usize, policy: ResolvePolicy) -> Vec<SharedResolve> {
        let Some(element) = self.path.element_at(index) else {
            return Vec::new();
        };
        let context = self.at(index);
        element
            .resolvables()
            .into_iter()
            .filter(|r| r.policy().satisfies(policy))
            .map(|r| r.get(&context))
            .collect()
    }

    fn lookup(&self, name: &str, hide_own: bool) -> Option<(usize, Resolvable)> {
        if self.path.is_empty() {
            return None;
        }
        (0..=self.anchor).rev().find_map(|index| {
            if hide_own && index == self.anchor {
                return None;
            }
            self.path
                .element_at(index)?
                .resolvable(name)
                .map(|resolvable| (index, resolvable))
        })
    }

    fn local(&self, name: &str) -> Option<Value> {
        match name {
            STATE_PARAMS => Some(Value::Object(self.env.params.clone())),
            TRANSITION => Some(self.env.transition.clone()),
            _ => self.env.injector.get(name),
        }
    }

    fn anchor_state(&self) -> String {
        self.path
            .element_at(self.anchor)
            .map(|e| e.state().name().to_string())
            .unwrap_or_default()
    }

    fn fetch(&self, name: &str, hide_own: bool, consumer: &str) -> ResolveFuture {
        if let Some((index, resolvable)) = self.lookup(name, hide_own) {
            let context = self.at(index);
            return async move { resolvable.get(&context).await }.boxed();
        }
        let found = self.local(name).ok_or_else(|| ResolveError::MissingDependency {
            state: self.anchor_state(),
            consumer: consumer.to_string(),
            dependency: name.to_string(),
        });
        future::ready(found).boxed()
    }

    fn named_fetch(
        &self,
        name: &str,
        hide_own: bool,
        consumer: &str,
    ) -> BoxFuture<'static, Result<(String, Value), ResolveError>> {
        let name = name.to_string();
        let fetch = self.fetch(&name, hide_own, consumer);
        async move { fetch.await.map(|value| (name, value)) }.boxed()
    }
}

fn collect_locals(
    fetches: Vec<BoxFuture<'static, Result<(String, Value), ResolveError>>>,
) -> BoxFuture<'static, Result<Locals, ResolveError>> {
    async move {
        let pairs = future::try_join_all(fetches).await?;
        Ok(pairs.into_iter().collect())
    }
    .boxed()
}

fn settle(pending: Vec<SharedResolve>) -> BoxFuture<'static, Result<(), ResolveError>> {
    async move { future::try_join_all(pending).await.map(|_| ()) }.boxed()
}

impl fmt::Debug for ResolveContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolveContext")
            .field("path", &self.path)
            .field("anchor", &self.anchor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StateBuilder;
    use crate::core::{StateNode, StateRegistry};
    use crate::resolve::{ResolveSpec, StaticInjector};
    use futures::channel::oneshot;
    use futures::task::{FutureObj, SpawnError};
    use parking_lot::Mutex;
    use serde_json::json;

    fn context_to(registry: &StateRegistry, name: &str) -> ResolveContext {
        let node = registry.get(name).unwrap();
        let path = Path::from_states(&StateNode::path(&node), ResolvePolicy::Jit);
        let mut params = Params::new();
        params.insert("id".into(), json!(42));
        let injector = StaticInjector::new().with("apiBase", json!("/api"));
        ResolveContext::new(path, params, Arc::new(injector))
    }

    struct TokioSpawner;

    impl Spawn for TokioSpawner {
        fn spawn_obj(&self, future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
            tokio::spawn(future);
            Ok(())
        }
    }

    fn shadowing_registry() -> StateRegistry {
        let mut registry = StateRegistry::new();
        registry
            .register(StateBuilder::new("g").resolve(ResolveSpec::value("_g", json!("G"))))
            .unwrap();
        registry
            .register(StateBuilder::new("g.h").resolve(ResolveSpec::new(
                "_g",
                &["_g"],
                |locals| async move {
                    let inherited = locals["_g"].as_str().unwrap_or_default().to_string();
                    Ok(json!(format!("{inherited}H")))
                },
            )))
            .unwrap();
        registry
            .register(StateBuilder::new("g.h.i").resolve(ResolveSpec::new(
                "_i",
                &["_g"],
                |locals| async move { Ok(locals["_g"].clone()) },
            )))
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn self_reference_reaches_ancestor() {
        let registry = shadowing_registry();
        let context = context_to(&registry, "g.h.i");

        let h = context.anchored_at("g.h").unwrap();
        assert_eq!(h.resolve("_g").await.unwrap(), json!("GH"));

        let g = context.anchored_at("g").unwrap();
        assert_eq!(g.resolve("_g").await.unwrap(), json!("G"));
    }

    #[tokio::test]
    async fn descendants_see_the_override() {
        let registry = shadowing_registry();
        let context = context_to(&registry, "g.h.i");
        assert_eq!(context.resolve("_i").await.unwrap(), json!("GH"));
        assert_eq!(context.resolve("_g").await.unwrap(), json!("GH"));
    }

    #[tokio::test]
    async fn eager_batch_leaves_jit_untouched() {
        let mut registry = StateRegistry::new();
        registry
            .register(
                StateBuilder::new("a")
                    .resolve(ResolveSpec::value("eager", json!(1)).with_policy(ResolvePolicy::Eager))
                    .resolve(ResolveSpec::value("lazy", json!(2)).with_policy(ResolvePolicy::Lazy))
                    .resolve(ResolveSpec::value("jit", json!(3))),
            )
            .unwrap();
        let context = context_to(&registry, "a");

        context.resolve_path(ResolvePolicy::Eager).await.unwrap();
        assert!(context.find("eager").unwrap().is_resolved());
        assert!(!context.find("lazy").unwrap().has_started());
        assert!(!context.find("jit").unwrap().has_started());

        context.resolve_element(1, ResolvePolicy::Lazy).await.unwrap();
        assert!(context.find("lazy").unwrap().is_resolved());
        assert!(!context.find("jit").unwrap().has_started());

        assert_eq!(context.resolve("jit").await.unwrap(), json!(3));
    }

    #[tokio::test]
    async fn batch_reports_first_failure() {
        let mut registry = StateRegistry::new();
        registry
            .register(
                StateBuilder::new("a")
                    .policy(ResolvePolicy::Eager)
                    .resolve(ResolveSpec::value("fine", json!(1)))
                    .resolve(ResolveSpec::new("broken", &[], |_| async {
                        Err(ResolveError::failed("nope"))
                    })),
            )
            .unwrap();
        let context = context_to(&registry, "a");

        let error = context.resolve_path(ResolvePolicy::Eager).await.unwrap_err();
        assert_eq!(error, ResolveError::failed("nope"));
    }

    #[tokio::test]
    async fn builtins_and_injector_fill_in() {
        let mut registry = StateRegistry::new();
        registry.register(StateBuilder::new("a")).unwrap();
        let context = context_to(&registry, "a");

        let locals = context
            .locals(&["$stateParams".to_string(), "apiBase".to_string()], "test")
            .await
            .unwrap();
        assert_eq!(locals["$stateParams"], json!({ "id": 42 }));
        assert_eq!(locals["apiBase"], json!("/api"));

        let error = context.resolve("ghost").await.unwrap_err();
        assert!(matches!(error, ResolveError::MissingDependency { ref state, .. } if state == "a"));
    }

    #[test]
    fn ancestors_never_see_descendants() {
        let registry = shadowing_registry();
        let context = context_to(&registry, "g.h.i");
        assert!(context.anchored_at("g.h").unwrap().find("_i").is_none());
        assert!(context.find("_i").is_some());
    }

    #[tokio::test]
    async fn failed_batch_leaves_started_resolves_running() {
        let (sender, receiver) = oneshot::channel::<Value>();
        let receiver = Arc::new(Mutex::new(Some(receiver)));
        let mut registry = StateRegistry::new();
        registry
            .register(
                StateBuilder::new("a")
                    .resolve(
                        ResolveSpec::new("slow", &[], move |_| {
                            let receiver = receiver.lock().take();
                            async move {
                                match receiver {
                                    Some(receiver) => receiver
                                        .await
                                        .map_err(|_| ResolveError::failed("input dropped")),
                                    None => Err(ResolveError::failed("computed twice")),
                                }
                            }
                        })
                        .with_policy(ResolvePolicy::Eager),
                    )
                    .resolve(
                        ResolveSpec::new("broken", &[], |_| async { Err(ResolveError::failed("x")) })
                            .with_policy(ResolvePolicy::Eager),
                    ),
            )
            .unwrap();
        let context = context_to(&registry, "a").with_spawner(Arc::new(TokioSpawner));

        let error = context.resolve_path(ResolvePolicy::Eager).await.unwrap_err();
        assert_eq!(error, ResolveError::failed("x"));
        let slow = context.find("slow").unwrap();
        assert!(slow.has_started());
        assert!(!slow.is_resolved());

        sender.send(json!("done")).unwrap();
        for _ in 0..20 {
            if slow.is_resolved() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(slow.data(), Some(json!("done")));
    }
}
