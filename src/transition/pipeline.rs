//! The ordered step list a transition runs, and the driver that runs it.
//!
//! Each step produces a typed outcome: `Ok(())` continues, `Err` rejects.
//! Before every step (and every hook within a step) the driver checks that
//! the transition still holds the current generation.

use super::engine::{Transition, TransitionStatus};
use super::rejection::{Rejection, RejectionKind, TransitionError};
use crate::core::{Path, PathElement, StateCallback, StateNode};
use crate::hooks::{HookContext, HookPhase, HookResult, Subject};
use crate::resolve::ResolvePolicy;
use std::fmt;
use std::sync::Arc;

/// Which path a per-state step refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Side {
    From,
    To,
}

pub(crate) enum Step {
    /// Results the onBefore hooks already returned, applied in order
    Before(Vec<Result<HookResult, TransitionError>>),
    /// Hooks matched against the transition's target and source
    Hooks(HookPhase),
    /// Hooks matched against one exited, retained or entered state
    StateHooks { phase: HookPhase, side: Side, index: usize },
    /// The state's own lifecycle callback
    Callback { phase: HookPhase, side: Side, index: usize },
    /// Batch resolution on the target path, or on one element of it
    Resolve { policy: ResolvePolicy, index: Option<usize> },
    Reject(Rejection),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Before(results) => write!(f, "onBefore ({} results)", results.len()),
            Step::Hooks(phase) => write!(f, "{phase}"),
            Step::StateHooks { phase, index, .. } => write!(f, "{phase} hooks @{index}"),
            Step::Callback { phase, index, .. } => write!(f, "{} @{index}", callback_label(*phase)),
            Step::Resolve { policy, index: None } => write!(f, "resolve {policy}"),
            Step::Resolve { policy, index: Some(index) } => write!(f, "resolve {policy} @{index}"),
            Step::Reject(rejection) => write!(f, "reject {}", rejection.kind()),
        }
    }
}

/// Build the step list for `transition`.
pub(crate) fn plan(transition: &Transition, before: Vec<Result<HookResult, TransitionError>>) -> Vec<Step> {
    let mut steps = vec![Step::Before(before)];
    let tree = match transition.plan() {
        Ok(tree) => tree,
        Err(rejection) => {
            steps.push(Step::Hooks(HookPhase::Invalid));
            steps.push(Step::Reject(rejection.clone()));
            return steps;
        }
    };

    steps.push(Step::Hooks(HookPhase::Start));
    steps.push(Step::Hooks(HookPhase::On));
    steps.push(Step::Resolve {
        policy: ResolvePolicy::Eager,
        index: None,
    });

    let keep = tree.keep();
    let named = |path: &Path, index: usize| {
        path.element_at(index).is_some_and(|e| !e.state().is_root())
    };

    for index in (keep..tree.from.len()).rev().filter(|&i| named(&tree.from, i)) {
        steps.push(Step::StateHooks { phase: HookPhase::Exiting, side: Side::From, index });
        steps.push(Step::Callback { phase: HookPhase::Exiting, side: Side::From, index });
    }
    for index in (0..keep).filter(|&i| named(&tree.to, i)) {
        steps.push(Step::StateHooks { phase: HookPhase::Retained, side: Side::To, index });
        steps.push(Step::Callback { phase: HookPhase::Retained, side: Side::To, index });
    }
    for index in (keep..tree.to.len()).filter(|&i| named(&tree.to, i)) {
        steps.push(Step::Resolve { policy: ResolvePolicy::Lazy, index: Some(index) });
        steps.push(Step::StateHooks { phase: HookPhase::Entering, side: Side::To, index });
        steps.push(Step::Callback { phase: HookPhase::Entering, side: Side::To, index });
    }
    steps
}

/// Run `steps`, commit on success, then run the completion hooks.
pub(crate) async fn drive(transition: Transition, steps: Vec<Step>) -> Result<Arc<StateNode>, TransitionError> {
    match execute(&transition, steps).await {
        Ok(state) => {
            tracing::info!(state = %state.name(), "transition succeeded");
            run_isolated(&transition, HookPhase::Success, None).await;
            Ok(state)
        }
        Err(error) => {
            if error.kind() == Some(RejectionKind::Superseded) {
                transition.set_status(TransitionStatus::Superseded);
            } else {
                transition.set_status(TransitionStatus::Error);
            }
            tracing::info!(%error, "transition rejected");
            run_isolated(&transition, HookPhase::Error, Some(error.clone())).await;
            Err(error)
        }
    }
}

async fn execute(transition: &Transition, steps: Vec<Step>) -> Result<Arc<StateNode>, TransitionError> {
    for step in steps {
        transition.check_current()?;
        tracing::debug!(%step, "running step");
        run_step(transition, step).await?;
    }
    transition.check_current()?;
    transition.commit()
}

async fn run_step(transition: &Transition, step: Step) -> Result<(), TransitionError> {
    match step {
        Step::Before(results) => {
            let leaf = target_leaf(transition);
            for result in results {
                apply(result, leaf.as_ref()).await?;
            }
            Ok(())
        }
        Step::Hooks(phase) => {
            let hooks = transition
                .core()
                .hooks
                .query(phase, transition.to_subject(), transition.from_subject());
            let context = HookContext::new(transition.clone(), phase, None);
            let leaf = target_leaf(transition);
            for hook in hooks {
                transition.check_current()?;
                apply(hook.invoke(&context), leaf.as_ref()).await?;
            }
            Ok(())
        }
        Step::StateHooks { phase, side, index } => {
            let element = element(transition, side, index)?;
            let state = element.state();
            let (to, from) = match side {
                Side::From => (transition.to_subject(), Subject::State(state)),
                Side::To => (Subject::State(state), transition.from_subject()),
            };
            let hooks = transition.core().hooks.query(phase, to, from);
            let context = HookContext::new(transition.clone(), phase, Some(Arc::clone(state)));
            for hook in hooks {
                transition.check_current()?;
                apply(hook.invoke(&context), Some(&element)).await?;
            }
            Ok(())
        }
        Step::Callback { phase, side, index } => {
            let element = element(transition, side, index)?;
            let Some(callback) = state_callback(element.state(), phase) else {
                return Ok(());
            };
            let context = match side {
                Side::From => Some(transition.from_context()),
                Side::To => transition.to_context(),
            }
            .ok_or_else(|| missing_path(transition))?
            .at(index);
            let locals = context.locals(callback.deps(), callback_label(phase)).await?;
            transition.check_current()?;
            apply(callback.invoke(locals).await, Some(&element)).await
        }
        Step::Resolve { policy, index } => {
            let context = transition.to_context().ok_or_else(|| missing_path(transition))?;
            match index {
                None => context.resolve_path(policy).await?,
                Some(index) => context.resolve_element(index, policy).await?,
            }
            Ok(())
        }
        Step::Reject(rejection) => Err(rejection.into()),
    }
}

/// Interpret a hook's result, awaiting deferred results until they settle.
async fn apply(
    result: Result<HookResult, TransitionError>,
    element: Option<&Arc<PathElement>>,
) -> Result<(), TransitionError> {
    let mut result = result;
    loop {
        match result? {
            HookResult::Continue => return Ok(()),
            HookResult::Abort => return Err(Rejection::aborted().into()),
            HookResult::Redirect(next) => {
                tracing::debug!(target = %next.target_name(), "hook redirected");
                return Err(Rejection::redirected(next).into());
            }
            HookResult::Resolves(specs) => {
                match element {
                    Some(element) => element.add_resolvables(specs),
                    None => tracing::debug!(count = specs.len(), "no target path for hook resolves"),
                }
                return Ok(());
            }
            HookResult::Pending(pending) => result = pending.await,
        }
    }
}

/// Run every hook of a completion phase; one failing does not stop the rest.
async fn run_isolated(transition: &Transition, phase: HookPhase, error: Option<TransitionError>) {
    let hooks = transition
        .core()
        .hooks
        .query(phase, transition.to_subject(), transition.from_subject());
    let mut context = HookContext::new(transition.clone(), phase, None);
    if let Some(error) = error {
        context = context.with_error(error);
    }
    for hook in hooks {
        if let Err(error) = apply(hook.invoke(&context), None).await {
            tracing::warn!(hook = ?hook.id(), %phase, %error, "completion hook failed");
        }
    }
}

fn element(transition: &Transition, side: Side, index: usize) -> Result<Arc<PathElement>, TransitionError> {
    let tree = transition.tree().ok_or_else(|| missing_path(transition))?;
    let path = match side {
        Side::From => &tree.from,
        Side::To => &tree.to,
    };
    path.element_at(index)
        .cloned()
        .ok_or_else(|| TransitionError::failed(format!("no path element at index {index}")))
}

fn target_leaf(transition: &Transition) -> Option<Arc<PathElement>> {
    transition.tree().and_then(|tree| tree.to.leaf().cloned())
}

fn state_callback(state: &StateNode, phase: HookPhase) -> Option<&StateCallback> {
    match phase {
        HookPhase::Exiting => state.on_exit(),
        HookPhase::Retained => state.on_retain(),
        HookPhase::Entering => state.on_enter(),
        _ => None,
    }
}

fn callback_label(phase: HookPhase) -> &'static str {
    match phase {
        HookPhase::Exiting => "onExit",
        HookPhase::Retained => "onRetain",
        _ => "onEnter",
    }
}

fn missing_path(transition: &Transition) -> TransitionError {
    TransitionError::failed(format!(
        "transition to '{}' has no target path",
        transition.target_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StateBuilder;
    use crate::core::Params;
    use crate::router::Router;
    use crate::transition::TransitionOptions;

    fn labels(steps: &[Step]) -> Vec<String> {
        steps.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn steps_follow_phase_order() {
        let router = Router::new();
        for name in ["a", "a.b", "a.b.c", "a.b.d"] {
            router.register(StateBuilder::new(name)).unwrap();
        }
        router.go("a.b.c", Params::new(), TransitionOptions::default()).await.unwrap();

        let transition = router.create_transition("a.b.d", Params::new(), TransitionOptions::default());
        let steps = plan(&transition, Vec::new());
        assert_eq!(
            labels(&steps),
            vec![
                "onBefore (0 results)",
                "onStart",
                "on",
                "resolve EAGER",
                "onExiting hooks @3",
                "onExit @3",
                "onRetained hooks @1",
                "onRetain @1",
                "onRetained hooks @2",
                "onRetain @2",
                "resolve LAZY @3",
                "onEntering hooks @3",
                "onEnter @3",
            ]
        );
    }

    #[test]
    fn invalid_target_runs_invalid_hooks_then_rejects() {
        let router = Router::new();
        let transition = router.create_transition("ghost", Params::new(), TransitionOptions::default());
        let steps = plan(&transition, Vec::new());
        assert_eq!(
            labels(&steps),
            vec!["onBefore (0 results)", "onInvalid", "reject INVALID"]
        );
    }

    #[tokio::test]
    async fn pending_results_are_unwrapped() {
        let nested = HookResult::pending(async {
            Ok(HookResult::pending(async { Ok(HookResult::Abort) }))
        });
        let error = apply(Ok(nested), None).await.unwrap_err();
        assert_eq!(error.kind(), Some(RejectionKind::Aborted));

        assert!(apply(Ok(HookResult::from(true)), None).await.is_ok());
        let failed = apply(Err(TransitionError::failed("boom")), None).await.unwrap_err();
        assert_eq!(failed, TransitionError::failed("boom"));
    }
}
