//! The state service: owns the registries and the committed path.
//!
//! A [`Router`] creates transitions from its committed state, follows
//! redirects, and answers queries about where it currently is. Cloning a
//! router is cheap; clones share everything.

mod config;

pub use config::RouterConfig;

use crate::builder::{BuildError, StateBuilder};
use crate::core::{
    Glob, Params, Path, StateNode, StateRegistry, TransitionHistory, TransitionRecord, Value,
};
use crate::hooks::HookRegistry;
use crate::resolve::{Injector, Spawner};
use crate::transition::{
    owned_params_equal, ParamEquality, Rejection, RejectionKind, TargetRef, Transition,
    TransitionError, TransitionOptions, WeakTransition,
};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub(crate) struct Committed {
    pub(crate) path: Path,
    pub(crate) params: Params,
    pub(crate) history: TransitionHistory,
}

/// State shared by a router and every transition it creates.
pub(crate) struct RouterCore {
    pub(crate) states: RwLock<StateRegistry>,
    pub(crate) hooks: HookRegistry,
    pub(crate) config: RouterConfig,
    pub(crate) param_equality: RwLock<ParamEquality>,
    pub(crate) spawner: RwLock<Option<Spawner>>,
    generation: AtomicU64,
    latest: Mutex<WeakTransition>,
    committed: Mutex<Committed>,
}

impl RouterCore {
    fn new(states: StateRegistry, config: RouterConfig) -> Self {
        let root_path = Path::from_states(&[Arc::clone(states.root())], config.default_policy);
        Self {
            states: RwLock::new(states),
            hooks: HookRegistry::new(),
            config,
            param_equality: RwLock::new(Arc::new(owned_params_equal)),
            spawner: RwLock::new(None),
            generation: AtomicU64::new(0),
            latest: Mutex::new(WeakTransition::new()),
            committed: Mutex::new(Committed {
                path: root_path,
                params: Params::new(),
                history: TransitionHistory::new(),
            }),
        }
    }

    /// Make `transition` the current one and return its generation.
    pub(crate) fn claim(&self, transition: &Transition) -> u64 {
        let mut latest = self.latest.lock();
        *latest = transition.downgrade();
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// The most recently started transition, if still alive.
    pub(crate) fn latest(&self) -> Option<Transition> {
        self.latest.lock().upgrade()
    }

    /// Commit `path` if `generation` is still current.
    pub(crate) fn commit(
        &self,
        generation: u64,
        path: Path,
        params: Params,
        record: TransitionRecord,
    ) -> Result<(), Rejection> {
        let mut committed = self.committed.lock();
        if !self.is_current(generation) {
            return Err(Rejection::superseded(self.latest()));
        }
        committed.history.push(record, self.config.history_limit);
        committed.path = path;
        committed.params = params;
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> (Path, Params) {
        let committed = self.committed.lock();
        (committed.path.clone(), committed.params.clone())
    }
}

/// Registers states and hooks and drives transitions between states.
///
/// # Example
///
/// ```rust
/// use waypoint::builder::StateBuilder;
/// use waypoint::router::Router;
/// use waypoint::transition::TransitionOptions;
/// use waypoint::Params;
///
/// let router = Router::new();
/// router.register(StateBuilder::new("home")).unwrap();
/// router.register(StateBuilder::new("home.inbox")).unwrap();
///
/// let entered = futures::executor::block_on(
///     router.go("home.inbox", Params::new(), TransitionOptions::default()),
/// )
/// .unwrap();
/// assert_eq!(entered.name(), "home.inbox");
/// assert!(router.includes("home"));
/// ```
#[derive(Clone)]
pub struct Router {
    core: Arc<RouterCore>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    pub fn with_config(config: RouterConfig) -> Self {
        Self::from_registry(StateRegistry::new(), config)
    }

    /// Start from an existing registry, e.g. one with an injector.
    pub fn from_registry(states: StateRegistry, config: RouterConfig) -> Self {
        Self {
            core: Arc::new(RouterCore::new(states, config)),
        }
    }

    /// Replace the parameter comparison used for the keep prefix.
    pub fn with_param_equality<F>(self, equal: F) -> Self
    where
        F: Fn(&StateNode, &Params, &Params) -> bool + Send + Sync + 'static,
    {
        *self.core.param_equality.write() = Arc::new(equal);
        self
    }

    /// Spawn every started resolve on `spawner`, so computations run to
    /// completion even when the transition that started them fails or is
    /// superseded.
    pub fn with_spawner(self, spawner: Spawner) -> Self {
        *self.core.spawner.write() = Some(spawner);
        self
    }

    pub fn register(&self, builder: StateBuilder) -> Result<Arc<StateNode>, Vec<BuildError>> {
        self.core.states.write().register(builder)
    }

    pub fn state(&self, name: &str) -> Option<Arc<StateNode>> {
        self.core.states.read().get(name)
    }

    pub fn injector(&self) -> Arc<dyn Injector> {
        Arc::clone(self.core.states.read().injector())
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.core.hooks
    }

    pub fn config(&self) -> &RouterConfig {
        &self.core.config
    }

    /// A transition from the committed state to `target`. Nothing runs
    /// until [`Transition::run`] is called.
    pub fn create_transition(
        &self,
        target: impl Into<TargetRef>,
        params: Params,
        options: TransitionOptions,
    ) -> Transition {
        let (path, from_params) = self.core.snapshot();
        Transition::new(Arc::clone(&self.core), path, from_params, target.into(), params, options)
    }

    /// Run a transition to `target`, following redirects.
    pub async fn go(
        &self,
        target: impl Into<TargetRef>,
        params: Params,
        options: TransitionOptions,
    ) -> Result<Arc<StateNode>, TransitionError> {
        let mut transition = self.create_transition(target, params, options);
        let mut hops = 0;
        loop {
            let error = match transition.run().await {
                Ok(state) => return Ok(state),
                Err(error) => error,
            };
            let next = match error.rejection() {
                Some(rejection) if rejection.kind() == RejectionKind::Superseded && rejection.is_redirect() => {
                    rejection.superseded_by().cloned()
                }
                _ => None,
            };
            let Some(next) = next else {
                return Err(error);
            };
            hops += 1;
            if hops > self.core.config.max_redirects {
                tracing::warn!(hops, target = %next.target_name(), "redirect limit exceeded");
                return Err(Rejection::aborted()
                    .with_detail(format!("Too many redirects (more than {})", self.core.config.max_redirects))
                    .into());
            }
            tracing::debug!(hops, target = %next.target_name(), "following redirect");
            transition = next;
        }
    }

    /// The deepest committed state.
    pub fn current(&self) -> Arc<StateNode> {
        let (path, _) = self.core.snapshot();
        path.leaf()
            .map(|element| Arc::clone(element.state()))
            .unwrap_or_else(|| Arc::clone(self.core.states.read().root()))
    }

    pub fn params(&self) -> Params {
        self.core.snapshot().1
    }

    pub fn current_path(&self) -> Path {
        self.core.snapshot().0
    }

    /// True if the current state is exactly `name`.
    pub fn is(&self, name: &str) -> bool {
        self.current().name() == name
    }

    /// True if the current state or one of its ancestors matches `pattern`.
    pub fn includes(&self, pattern: &str) -> bool {
        let glob = Glob::new(pattern);
        self.current_path()
            .iter()
            .any(|element| glob.matches(element.state().name()))
    }

    pub fn history(&self) -> TransitionHistory {
        self.core.committed.lock().history.clone()
    }

    /// An already-settled value visible from the committed leaf.
    pub fn resolved(&self, name: &str) -> Option<Value> {
        self.current_path()
            .iter()
            .rev()
            .find_map(|element| element.resolvable(name))
            .and_then(|resolvable| resolvable.data())
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("current", &self.current().name().to_string())
            .field("config", &self.core.config)
            .field("hooks", &self.core.hooks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{HookResult, MatchCriteria};
    use crate::resolve::{ResolveSpec, StaticInjector};
    use serde_json::json;

    fn router() -> Router {
        let router = Router::new();
        for name in ["home", "home.inbox", "home.sent", "settings"] {
            router.register(StateBuilder::new(name)).unwrap();
        }
        router
    }

    #[tokio::test]
    async fn starts_at_root() {
        let router = router();
        assert!(router.current().is_root());
        assert!(router.is(""));
        assert!(router.history().is_empty());
    }

    #[tokio::test]
    async fn go_commits_and_records_history() {
        let router = router();
        router.go("home.inbox", Params::new(), TransitionOptions::default()).await.unwrap();
        router.go("settings", Params::new(), TransitionOptions::default()).await.unwrap();

        assert!(router.is("settings"));
        assert!(!router.includes("home.**"));
        assert_eq!(router.history().get_path(), vec!["", "home.inbox", "settings"]);
    }

    #[tokio::test]
    async fn history_keeps_the_configured_number_of_commits() {
        let router = Router::with_config(RouterConfig::new().history_limit(Some(2)));
        router.register(StateBuilder::new("home")).unwrap();
        router.register(StateBuilder::new("settings")).unwrap();
        for name in ["home", "settings", "home"] {
            router.go(name, Params::new(), TransitionOptions::default()).await.unwrap();
        }
        assert_eq!(router.history().get_path(), vec!["home", "settings", "home"]);
        assert_eq!(router.history().len(), 2);
    }

    #[tokio::test]
    async fn includes_matches_ancestors() {
        let router = router();
        router.go("home.sent", Params::new(), TransitionOptions::default()).await.unwrap();
        assert!(router.includes("home"));
        assert!(router.includes("home.*"));
        assert!(!router.includes("settings"));
    }

    #[tokio::test]
    async fn go_follows_redirects() {
        let router = router();
        let hooks = router.hooks();
        hooks.on_start(MatchCriteria::any().to_state("home"), |ctx| {
            Ok(ctx.redirect("home.inbox", Params::new()))
        });

        let entered = router.go("home", Params::new(), TransitionOptions::default()).await.unwrap();
        assert_eq!(entered.name(), "home.inbox");
        assert!(router.is("home.inbox"));
    }

    #[tokio::test]
    async fn redirect_loops_are_bounded() {
        let router = Router::with_config(RouterConfig::new().max_redirects(3));
        router.register(StateBuilder::new("ping")).unwrap();
        router.register(StateBuilder::new("pong")).unwrap();
        router.hooks().on_start(MatchCriteria::any().to_state("ping"), |ctx| {
            Ok(ctx.redirect("pong", Params::new()))
        });
        router.hooks().on_start(MatchCriteria::any().to_state("pong"), |ctx| {
            Ok(ctx.redirect("ping", Params::new()))
        });

        let error = router.go("ping", Params::new(), TransitionOptions::default()).await.unwrap_err();
        assert_eq!(error.kind(), Some(RejectionKind::Aborted));
        assert!(router.current().is_root());
    }

    #[tokio::test]
    async fn resolved_reads_committed_values() {
        let states = StateRegistry::with_injector(Arc::new(StaticInjector::new().with("greeting", json!("hi"))));
        let router = Router::from_registry(states, RouterConfig::default());
        router
            .register(StateBuilder::new("home").resolve(
                ResolveSpec::new("message", &["greeting"], |locals| async move {
                    Ok(locals["greeting"].clone())
                })
                .with_policy(crate::resolve::ResolvePolicy::Eager),
            ))
            .unwrap();

        assert_eq!(router.resolved("message"), None);
        router.go("home", Params::new(), TransitionOptions::default()).await.unwrap();
        assert_eq!(router.resolved("message"), Some(json!("hi")));
    }

    #[tokio::test]
    async fn custom_param_equality() {
        let router = router().with_param_equality(|_, _, _| false);
        router.go("home", Params::new(), TransitionOptions::default()).await.unwrap();

        // Every state counts as changed, so the same target re-enters.
        let entered = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&entered);
        router.hooks().on_entering(MatchCriteria::any(), move |_| {
            *counter.lock() += 1;
            Ok(HookResult::Continue)
        });
        router.go("home", Params::new(), TransitionOptions::default()).await.unwrap();
        assert_eq!(*entered.lock(), 1);
    }
}
