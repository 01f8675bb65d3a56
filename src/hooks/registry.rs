//! Hook storage, matching and ordering.

use super::criteria::{MatchCriteria, Subject};
use super::result::{HookContext, HookResult};
use crate::transition::TransitionError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Transition phase a hook is registered for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookPhase {
    Before,
    Invalid,
    Start,
    On,
    Exiting,
    Retained,
    Entering,
    Success,
    Error,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HookPhase::Before => "onBefore",
            HookPhase::Invalid => "onInvalid",
            HookPhase::Start => "onStart",
            HookPhase::On => "on",
            HookPhase::Exiting => "onExiting",
            HookPhase::Retained => "onRetained",
            HookPhase::Entering => "onEntering",
            HookPhase::Success => "onSuccess",
            HookPhase::Error => "onError",
        };
        f.write_str(label)
    }
}

/// Hook callback. Asynchronous work is returned as [`HookResult::Pending`].
pub type HookFn = Arc<dyn Fn(&HookContext) -> Result<HookResult, TransitionError> + Send + Sync>;

/// Handle for removing a registered hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

#[derive(Clone)]
pub struct Hook {
    id: HookId,
    phase: HookPhase,
    criteria: MatchCriteria,
    priority: i32,
    callback: HookFn,
}

impl Hook {
    pub fn id(&self) -> HookId {
        self.id
    }

    pub fn phase(&self) -> HookPhase {
        self.phase
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn criteria(&self) -> &MatchCriteria {
        &self.criteria
    }

    pub(crate) fn invoke(&self, context: &HookContext) -> Result<HookResult, TransitionError> {
        (self.callback)(context)
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("criteria", &self.criteria)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct HookTable {
    hooks: HashMap<HookPhase, Vec<Hook>>,
    next_id: u64,
}

/// Lifecycle hooks keyed by phase.
///
/// Within a phase hooks are ordered by priority, highest first; equal
/// priorities keep registration order.
///
/// # Example
///
/// ```rust
/// use waypoint::hooks::{HookPhase, HookRegistry, HookResult, MatchCriteria};
///
/// let hooks = HookRegistry::new();
/// hooks.register(HookPhase::Success, MatchCriteria::any(), 5, |_| Ok(HookResult::Continue));
/// hooks.register(HookPhase::Success, MatchCriteria::any(), 10, |_| Ok(HookResult::Continue));
///
/// let priorities: Vec<_> = hooks.hooks(HookPhase::Success).iter().map(|h| h.priority()).collect();
/// assert_eq!(priorities, vec![10, 5]);
/// ```
#[derive(Default)]
pub struct HookRegistry {
    table: Mutex<HookTable>,
}

macro_rules! phase_shortcut {
    ($(#[$meta:meta])* $method:ident => $phase:expr) => {
        $(#[$meta])*
        pub fn $method<F>(&self, criteria: MatchCriteria, callback: F) -> HookId
        where
            F: Fn(&HookContext) -> Result<HookResult, TransitionError> + Send + Sync + 'static,
        {
            self.register($phase, criteria, 0, callback)
        }
    };
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook and re-sort its phase by priority.
    pub fn register<F>(&self, phase: HookPhase, criteria: MatchCriteria, priority: i32, callback: F) -> HookId
    where
        F: Fn(&HookContext) -> Result<HookResult, TransitionError> + Send + Sync + 'static,
    {
        let mut table = self.table.lock();
        table.next_id += 1;
        let id = HookId(table.next_id);
        let hooks = table.hooks.entry(phase).or_default();
        hooks.push(Hook {
            id,
            phase,
            criteria,
            priority,
            callback: Arc::new(callback),
        });
        hooks.sort_by(|a, b| b.priority.cmp(&a.priority));
        tracing::trace!(?id, %phase, priority, "hook registered");
        id
    }

    /// Remove a hook. Returns false if it was not registered.
    pub fn deregister(&self, id: HookId) -> bool {
        let mut table = self.table.lock();
        table.hooks.values_mut().any(|hooks| {
            let before = hooks.len();
            hooks.retain(|h| h.id != id);
            hooks.len() != before
        })
    }

    /// Hooks of `phase` whose criteria match both states, in run order.
    pub fn query(&self, phase: HookPhase, to: Subject<'_>, from: Subject<'_>) -> Vec<Hook> {
        self.table
            .lock()
            .hooks
            .get(&phase)
            .map(|hooks| {
                hooks
                    .iter()
                    .filter(|h| h.criteria.matches(to, from))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every hook of `phase`, in run order.
    pub fn hooks(&self, phase: HookPhase) -> Vec<Hook> {
        self.table.lock().hooks.get(&phase).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.table.lock().hooks.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    phase_shortcut!(
        /// Invoked synchronously before the transition's asynchronous phase.
        on_before => HookPhase::Before
    );
    phase_shortcut!(
        /// Invoked when the target does not resolve to a usable state.
        on_invalid => HookPhase::Invalid
    );
    phase_shortcut!(on_start => HookPhase::Start);
    phase_shortcut!(on => HookPhase::On);
    phase_shortcut!(on_exiting => HookPhase::Exiting);
    phase_shortcut!(on_retained => HookPhase::Retained);
    phase_shortcut!(on_entering => HookPhase::Entering);
    phase_shortcut!(on_success => HookPhase::Success);
    phase_shortcut!(on_error => HookPhase::Error);
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StateBuilder;
    use crate::core::StateRegistry;

    fn noop(_: &HookContext) -> Result<HookResult, TransitionError> {
        Ok(HookResult::Continue)
    }

    #[test]
    fn orders_by_priority_then_registration() {
        let hooks = HookRegistry::new();
        let low = hooks.register(HookPhase::Success, MatchCriteria::any(), 5, noop);
        let first_high = hooks.register(HookPhase::Success, MatchCriteria::any(), 10, noop);
        let second_high = hooks.register(HookPhase::Success, MatchCriteria::any(), 10, noop);
        let default = hooks.on_success(MatchCriteria::any(), noop);

        let ids: Vec<_> = hooks.hooks(HookPhase::Success).iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec![first_high, second_high, low, default]);
    }

    #[test]
    fn query_filters_by_phase_and_criteria() {
        let mut states = StateRegistry::new();
        let a = states.register(StateBuilder::new("a")).unwrap();
        let b = states.register(StateBuilder::new("b")).unwrap();

        let hooks = HookRegistry::new();
        let to_a = hooks.on_entering(MatchCriteria::any().to_state("a"), noop);
        hooks.on_entering(MatchCriteria::any().to_state("b"), noop);
        hooks.on_exiting(MatchCriteria::any(), noop);

        let matched = hooks.query(HookPhase::Entering, Subject::State(&a), Subject::State(&b));
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id(), to_a);
        assert!(hooks.query(HookPhase::Start, Subject::State(&a), Subject::State(&b)).is_empty());
    }

    #[test]
    fn deregister_removes_hook() {
        let hooks = HookRegistry::new();
        let id = hooks.on_start(MatchCriteria::any(), noop);
        hooks.on_start(MatchCriteria::any(), noop);
        assert_eq!(hooks.len(), 2);

        assert!(hooks.deregister(id));
        assert!(!hooks.deregister(id));
        assert_eq!(hooks.len(), 1);
    }

    #[test]
    fn phase_labels() {
        assert_eq!(HookPhase::Before.to_string(), "onBefore");
        assert_eq!(HookPhase::Entering.to_string(), "onEntering");
    }
}
