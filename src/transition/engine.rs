//! The transition object and its lifecycle.

use super::options::{TargetRef, TransitionOptions};
use super::pipeline;
use super::rejection::{Rejection, TransitionError};
use super::tree::TreeChanges;
use crate::core::{Params, Path, StateNode, TransitionRecord, Value};
use crate::hooks::{HookContext, HookPhase, HookResult, Subject};
use crate::resolve::{ResolveContext, ResolveEnv};
use crate::router::RouterCore;
use chrono::{DateTime, Utc};
use futures::channel::oneshot;
use futures::future::{self, BoxFuture, Shared, WeakShared};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::Instrument;
use uuid::Uuid;

type RunResult = Result<Arc<StateNode>, TransitionError>;

/// The outcome every caller of [`Transition::run`] shares.
pub type TransitionFuture = Shared<BoxFuture<'static, RunResult>>;

type BeforeResults = Vec<Result<HookResult, TransitionError>>;

/// What `run` has produced so far. A running pipeline is held weakly: it
/// lives only as long as some caller still holds its future.
enum Outcome {
    Idle,
    Running(WeakShared<BoxFuture<'static, RunResult>>),
    Settled(RunResult),
}

/// Lifecycle of a transition. Terminal states are final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionStatus {
    Created,
    Running,
    Success,
    Error,
    Superseded,
}

impl TransitionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Superseded)
    }
}

struct Inner {
    id: Uuid,
    created_at: DateTime<Utc>,
    core: Arc<RouterCore>,
    target: String,
    to_state: Option<Arc<StateNode>>,
    from_state: Arc<StateNode>,
    from_path: Path,
    from_params: Params,
    params: Params,
    options: TransitionOptions,
    plan: Result<TreeChanges, Rejection>,
    from_env: Arc<ResolveEnv>,
    to_env: Arc<ResolveEnv>,
    status: Mutex<TransitionStatus>,
    generation: AtomicU64,
    outcome: Mutex<Outcome>,
}

/// A single attempt to move from one path to another.
///
/// The source, target and tree diff are fixed at creation. Running the
/// transition executes the hook pipeline once; resolved data accumulates
/// on its path elements as it goes.
#[derive(Clone)]
pub struct Transition {
    inner: Arc<Inner>,
}

/// Non-owning handle, held by the router to name the latest transition.
pub(crate) struct WeakTransition(Weak<Inner>);

impl WeakTransition {
    pub(crate) fn new() -> Self {
        Self(Weak::new())
    }

    pub(crate) fn upgrade(&self) -> Option<Transition> {
        self.0.upgrade().map(|inner| Transition { inner })
    }
}

impl Transition {
    pub(crate) fn new(
        core: Arc<RouterCore>,
        from_path: Path,
        from_params: Params,
        target: TargetRef,
        params: Params,
        options: TransitionOptions,
    ) -> Self {
        let id = Uuid::new_v4();
        let (root, injector, to_state) = {
            let states = core.states.read();
            let to_state = match &target {
                TargetRef::Name(name) => states.get(name),
                TargetRef::State(state) => states
                    .get(state.name())
                    .filter(|registered| Arc::ptr_eq(registered, state)),
            };
            (Arc::clone(states.root()), Arc::clone(states.injector()), to_state)
        };
        // Hook-injected resolves land on these forks, never on the committed path.
        let from_path = from_path.fork();
        let from_state = from_path
            .leaf()
            .map(|element| Arc::clone(element.state()))
            .unwrap_or(root);
        let target = target.name().to_string();

        let params = match &to_state {
            Some(state) if options.inherit => inherit_params(state, &from_params, params),
            _ => params,
        };

        let plan = match &to_state {
            None => Err(Rejection::invalid(format!("No such state '{target}'"))),
            Some(state) if state.is_abstract() => Err(Rejection::invalid(format!(
                "Cannot transition to abstract state '{target}'"
            ))),
            Some(state) => {
                let to_path = Path::from_states(&StateNode::path(state), core.config.default_policy);
                let equal = Arc::clone(&*core.param_equality.read());
                Ok(TreeChanges::compute(
                    &from_path,
                    &to_path,
                    &from_params,
                    &params,
                    &*equal,
                    &options.reload,
                ))
            }
        };

        let described = json!({
            "id": id.to_string(),
            "from": from_state.name(),
            "to": target,
        });
        let spawner = core.spawner.read().clone();
        let from_env = Arc::new(ResolveEnv {
            params: from_params.clone(),
            transition: described.clone(),
            injector: Arc::clone(&injector),
            spawner: spawner.clone(),
        });
        let to_env = Arc::new(ResolveEnv {
            params: params.clone(),
            transition: described,
            injector,
            spawner,
        });

        tracing::trace!(%id, from = %from_state.name(), to = %target, "transition created");

        Self {
            inner: Arc::new(Inner {
                id,
                created_at: Utc::now(),
                core,
                target,
                to_state,
                from_state,
                from_path,
                from_params,
                params,
                options,
                plan,
                from_env,
                to_env,
                status: Mutex::new(TransitionStatus::Created),
                generation: AtomicU64::new(0),
                outcome: Mutex::new(Outcome::Idle),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// The target as requested, whether or not it resolved.
    pub fn target_name(&self) -> &str {
        &self.inner.target
    }

    /// The target state, if the target resolved to a registered state.
    pub fn to(&self) -> Option<&Arc<StateNode>> {
        self.inner.to_state.as_ref()
    }

    /// The deepest state of the source path.
    pub fn from(&self) -> &Arc<StateNode> {
        &self.inner.from_state
    }

    /// Target parameters, after inheritance.
    pub fn params(&self) -> &Params {
        &self.inner.params
    }

    pub fn from_params(&self) -> &Params {
        &self.inner.from_params
    }

    pub fn options(&self) -> &TransitionOptions {
        &self.inner.options
    }

    /// The tree diff, unless the target was invalid.
    pub fn tree(&self) -> Option<&TreeChanges> {
        self.inner.plan.as_ref().ok()
    }

    pub fn status(&self) -> TransitionStatus {
        *self.inner.status.lock()
    }

    /// True if running would change nothing.
    pub fn is_ignored(&self) -> bool {
        self.tree().is_some_and(TreeChanges::is_identity)
    }

    /// Resolve context over the source path, anchored at its leaf.
    pub fn from_context(&self) -> ResolveContext {
        ResolveContext::with_env(self.inner.from_path.clone(), Arc::clone(&self.inner.from_env))
    }

    /// Resolve context over the target path, anchored at its leaf.
    pub fn to_context(&self) -> Option<ResolveContext> {
        self.tree()
            .map(|tree| ResolveContext::with_env(tree.to.clone(), Arc::clone(&self.inner.to_env)))
    }

    /// Request a value from the target path, starting it if needed.
    pub fn resolve(&self, name: &str) -> BoxFuture<'static, Result<Value, TransitionError>> {
        match self.to_context() {
            Some(context) => {
                let pending = context.resolve(name);
                async move { pending.await.map_err(TransitionError::from) }.boxed()
            }
            None => {
                let rejection = self
                    .inner
                    .plan
                    .as_ref()
                    .err()
                    .cloned()
                    .unwrap_or_else(|| Rejection::invalid(self.target_name()));
                future::ready(Err(TransitionError::from(rejection))).boxed()
            }
        }
    }

    /// A new transition from the same source to `target`, for redirects.
    pub fn redirect(&self, target: impl Into<TargetRef>, params: Params) -> Transition {
        Transition::new(
            Arc::clone(&self.inner.core),
            self.inner.from_path.clone(),
            self.inner.from_params.clone(),
            target.into(),
            params,
            self.inner.options.clone(),
        )
    }

    /// Run the hook pipeline.
    ///
    /// Idempotent: every call returns the same shared outcome. `onBefore`
    /// hooks are invoked during the first call, before it returns. The
    /// pipeline only makes progress while some caller polls a returned
    /// future; once every such future is dropped before settling, the run
    /// is abandoned and later calls report it as aborted.
    pub fn run(&self) -> TransitionFuture {
        let span = tracing::info_span!(
            "transition",
            id = %self.id(),
            from = %self.from().name(),
            to = %self.target_name(),
        );
        let (running, before) = {
            let mut outcome = self.inner.outcome.lock();
            let existing = match &*outcome {
                Outcome::Settled(result) => return settled(result.clone()),
                Outcome::Running(weak) => Some(weak.upgrade()),
                Outcome::Idle => None,
            };
            match existing {
                Some(Some(running)) => return running,
                Some(None) => {
                    span.in_scope(|| tracing::warn!("transition abandoned before it settled"));
                    let abandoned: RunResult = Err(Rejection::aborted()
                        .with_detail("Transition was abandoned before it settled")
                        .into());
                    self.set_status(TransitionStatus::Error);
                    *outcome = Outcome::Settled(abandoned.clone());
                    return settled(abandoned);
                }
                None => {}
            }
            if self.is_ignored() {
                span.in_scope(|| tracing::info!("transition ignored"));
                self.set_status(TransitionStatus::Error);
                let ignored: RunResult = Err(Rejection::ignored().into());
                *outcome = Outcome::Settled(ignored.clone());
                return settled(ignored);
            }
            let (sender, receiver) = oneshot::channel();
            let running = self.start(receiver, span.clone());
            if let Some(weak) = running.downgrade() {
                *outcome = Outcome::Running(weak);
            }
            (running, sender)
        };

        // The outcome lock is released, so a hook calling `run` again
        // receives the running future.
        let results = span.in_scope(|| self.invoke_before_hooks());
        if before.send(results).is_err() {
            tracing::debug!(id = %self.id(), "run dropped before onBefore results were delivered");
        }
        running
    }

    fn start(&self, before: oneshot::Receiver<BeforeResults>, span: tracing::Span) -> TransitionFuture {
        let generation = self.inner.core.claim(self);
        self.inner.generation.store(generation, Ordering::SeqCst);
        self.set_status(TransitionStatus::Running);

        let transition = self.clone();
        async move {
            let before = before.await.unwrap_or_default();
            let steps = pipeline::plan(&transition, before);
            let result = pipeline::drive(transition.clone(), steps).await;
            *transition.inner.outcome.lock() = Outcome::Settled(result.clone());
            result
        }
        .instrument(span)
        .boxed()
        .shared()
    }

    fn invoke_before_hooks(&self) -> BeforeResults {
        let hooks = self
            .inner
            .core
            .hooks
            .query(HookPhase::Before, self.to_subject(), self.from_subject());
        let context = HookContext::new(self.clone(), HookPhase::Before, None);
        hooks
            .iter()
            .map(|hook| {
                let result = hook.invoke(&context);
                if let Err(error) = &result {
                    tracing::warn!(hook = ?hook.id(), %error, "onBefore hook failed");
                }
                result
            })
            .collect()
    }

    pub(crate) fn core(&self) -> &RouterCore {
        &self.inner.core
    }

    pub(crate) fn plan(&self) -> &Result<TreeChanges, Rejection> {
        &self.inner.plan
    }

    pub(crate) fn to_subject(&self) -> Subject<'_> {
        match &self.inner.to_state {
            Some(state) => Subject::State(state),
            None => Subject::Unresolved(&self.inner.target),
        }
    }

    pub(crate) fn from_subject(&self) -> Subject<'_> {
        Subject::State(&self.inner.from_state)
    }

    pub(crate) fn set_status(&self, status: TransitionStatus) {
        let mut current = self.inner.status.lock();
        if !current.is_terminal() {
            *current = status;
        }
    }

    /// Fail with `SUPERSEDED` if a newer transition has started.
    pub(crate) fn check_current(&self) -> Result<(), TransitionError> {
        let generation = self.inner.generation.load(Ordering::SeqCst);
        if self.inner.core.is_current(generation) {
            Ok(())
        } else {
            Err(Rejection::superseded(self.inner.core.latest()).into())
        }
    }

    /// Make the target path the router's committed path.
    pub(crate) fn commit(&self) -> Result<Arc<StateNode>, TransitionError> {
        let (Ok(tree), Some(state)) = (&self.inner.plan, &self.inner.to_state) else {
            return Err(TransitionError::failed(format!(
                "transition to '{}' has no target path to commit",
                self.target_name()
            )));
        };
        let record = TransitionRecord {
            id: self.id(),
            from: self.from().name().to_string(),
            to: state.name().to_string(),
            params: self.inner.params.clone(),
            timestamp: Utc::now(),
        };
        let generation = self.inner.generation.load(Ordering::SeqCst);
        self.inner
            .core
            .commit(generation, tree.to.clone(), self.inner.params.clone(), record)?;
        self.set_status(TransitionStatus::Success);
        Ok(Arc::clone(state))
    }

    pub(crate) fn downgrade(&self) -> WeakTransition {
        WeakTransition(Arc::downgrade(&self.inner))
    }
}

fn settled(result: RunResult) -> TransitionFuture {
    future::ready(result).boxed().shared()
}

/// Fill in parameters owned by states on the target path from `from`.
fn inherit_params(target: &Arc<StateNode>, from: &Params, mut params: Params) -> Params {
    for state in StateNode::path(target) {
        for key in state.params() {
            if params.contains_key(key) {
                continue;
            }
            if let Some(value) = from.get(key) {
                params.insert(key.clone(), value.clone());
            }
        }
    }
    params
}

impl PartialEq for Transition {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("id", &self.id())
            .field("from", &self.from().name())
            .field("to", &self.target_name())
            .field("status", &self.status())
            .finish()
    }
}
