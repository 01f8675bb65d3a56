//! Path diffing: which states are retained, exited and entered.

use super::options::Reload;
use crate::core::{Params, Path, StateNode, Value};
use std::sync::Arc;

/// Decides whether a state's own parameters are unchanged between the
/// source and target parameter sets.
pub type ParamEquality = Arc<dyn Fn(&StateNode, &Params, &Params) -> bool + Send + Sync>;

/// Compare only the keys `state` owns; a missing key equals `null`.
pub fn owned_params_equal(state: &StateNode, from: &Params, to: &Params) -> bool {
    state.params().iter().all(|key| {
        let before = from.get(key).unwrap_or(&Value::Null);
        let after = to.get(key).unwrap_or(&Value::Null);
        before == after
    })
}

/// Length of the longest shared prefix of `from` and `to` whose states are
/// identical and whose own parameters are unchanged, capped by `reload`.
pub fn keep_prefix(
    from: &Path,
    to: &Path,
    from_params: &Params,
    to_params: &Params,
    equal: &dyn Fn(&StateNode, &Params, &Params) -> bool,
    reload: &Reload,
) -> usize {
    let limit = match reload {
        Reload::None => usize::MAX,
        Reload::All => 0,
        Reload::From(name) => to.position(name).unwrap_or(usize::MAX),
    };
    from.iter()
        .zip(to.iter())
        .take(limit)
        .take_while(|(a, b)| {
            Arc::ptr_eq(a.state(), b.state()) && equal(a.state(), from_params, to_params)
        })
        .count()
}

/// The diff between a source path and a target path.
///
/// `to` reuses the source elements for the retained prefix, so resolvables
/// already settled there carry over.
#[derive(Clone, Debug, Default)]
pub struct TreeChanges {
    pub from: Path,
    pub to: Path,
    /// Shared prefix, root first
    pub retained: Path,
    /// Source states being left, leaf first
    pub exiting: Path,
    /// Target states being entered, root first
    pub entering: Path,
    keep: usize,
}

impl TreeChanges {
    /// Diff `from` against a freshly built target path.
    pub fn compute(
        from: &Path,
        to: &Path,
        from_params: &Params,
        to_params: &Params,
        equal: &dyn Fn(&StateNode, &Params, &Params) -> bool,
        reload: &Reload,
    ) -> Self {
        let keep = keep_prefix(from, to, from_params, to_params, equal, reload);
        let retained = from.slice(0, keep);
        let entering = to.slice(keep, to.len());
        Self {
            from: from.clone(),
            to: retained.concat(&entering),
            exiting: from.slice(keep, from.len()).reversed(),
            retained,
            entering,
            keep,
        }
    }

    /// Number of unchanged leading elements.
    pub fn keep(&self) -> usize {
        self.keep
    }

    /// True if nothing is exited or entered.
    pub fn is_identity(&self) -> bool {
        self.exiting.is_empty() && self.entering.is_empty()
    }
}
