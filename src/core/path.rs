//! Immutable root-first paths through the state tree.

use super::state::StateNode;
use crate::resolve::{ResolvePolicy, ResolveSpec, Resolvable};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A path's per-state slot: the state plus the resolvables it owns.
///
/// Derived paths share elements by `Arc`. A transition works on
/// [forks](PathElement::fork) of the committed elements: a fork shares every
/// existing resolvable (and so its settled value) but resolvables added to
/// it stay invisible to the committed path until the transition commits.
pub struct PathElement {
    state: Arc<StateNode>,
    default_policy: ResolvePolicy,
    resolvables: Mutex<HashMap<String, Resolvable>>,
}

impl PathElement {
    /// Build an element holding a fresh resolvable for each declared resolve.
    pub fn new(state: Arc<StateNode>, default_policy: ResolvePolicy) -> Self {
        let resolvables = state
            .resolves()
            .iter()
            .map(|spec| {
                let policy = ResolvePolicy::effective(spec, &state, default_policy);
                (
                    spec.name().to_string(),
                    Resolvable::new(spec.clone(), state.name(), policy),
                )
            })
            .collect();
        Self {
            state,
            default_policy,
            resolvables: Mutex::new(resolvables),
        }
    }

    pub fn state(&self) -> &Arc<StateNode> {
        &self.state
    }

    pub fn resolvable(&self, name: &str) -> Option<Resolvable> {
        self.resolvables.lock().get(name).cloned()
    }

    /// Snapshot of this element's resolvables, sorted by name.
    pub fn resolvables(&self) -> Vec<Resolvable> {
        let mut all: Vec<_> = self.resolvables.lock().values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// A new element over the same state and the same resolvables.
    pub fn fork(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            default_policy: self.default_policy,
            resolvables: Mutex::new(self.resolvables.lock().clone()),
        }
    }

    /// Add resolvables at runtime, replacing any with the same name.
    pub fn add_resolvables(&self, specs: Vec<ResolveSpec>) {
        let mut resolvables = self.resolvables.lock();
        for spec in specs {
            let policy = ResolvePolicy::effective(&spec, &self.state, self.default_policy);
            let name = spec.name().to_string();
            resolvables.insert(name, Resolvable::new(spec, self.state.name(), policy));
        }
    }
}

impl fmt::Debug for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathElement")
            .field("state", &self.state.name())
            .field(
                "resolvables",
                &self
                    .resolvables()
                    .iter()
                    .map(|r| r.name().to_string())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// An immutable, root-first sequence of path elements.
///
/// Deriving a path (`slice`, `concat`, `reversed`) never mutates the source;
/// the new path references the same elements.
#[derive(Clone, Default)]
pub struct Path {
    elements: Arc<[Arc<PathElement>]>,
}

impl Path {
    /// Fresh elements for each state in `states`.
    pub fn from_states(states: &[Arc<StateNode>], default_policy: ResolvePolicy) -> Self {
        states
            .iter()
            .map(|s| Arc::new(PathElement::new(Arc::clone(s), default_policy)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn element_at(&self, index: usize) -> Option<&Arc<PathElement>> {
        self.elements.get(index)
    }

    /// Deepest element.
    pub fn leaf(&self) -> Option<&Arc<PathElement>> {
        self.elements.last()
    }

    /// Elements in `[start, end)`, clamped to the path's bounds.
    pub fn slice(&self, start: usize, end: usize) -> Path {
        let end = end.min(self.len());
        let start = start.min(end);
        self.elements[start..end].iter().cloned().collect()
    }

    pub fn concat(&self, other: &Path) -> Path {
        self.iter().chain(other.iter()).cloned().collect()
    }

    pub fn reversed(&self) -> Path {
        self.iter().rev().cloned().collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<PathElement>> {
        self.elements.iter()
    }

    pub fn states(&self) -> Vec<Arc<StateNode>> {
        self.iter().map(|e| Arc::clone(e.state())).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.iter().map(|e| e.state().name().to_string()).collect()
    }

    /// A path of [forked](PathElement::fork) elements.
    pub fn fork(&self) -> Path {
        self.iter().map(|e| Arc::new(e.fork())).collect()
    }

    /// Index of the element whose state is `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.iter().position(|e| e.state().name() == name)
    }
}

impl FromIterator<Arc<PathElement>> for Path {
    fn from_iter<I: IntoIterator<Item = Arc<PathElement>>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StateBuilder;
    use crate::core::StateRegistry;
    use serde_json::json;

    fn path_to(name: &str) -> Path {
        let mut registry = StateRegistry::new();
        registry
            .register(StateBuilder::new("a").resolve(ResolveSpec::value("x", json!(1))))
            .unwrap();
        registry.register(StateBuilder::new("a.b")).unwrap();
        registry.register(StateBuilder::new("a.b.c")).unwrap();
        let node = registry.get(name).unwrap();
        Path::from_states(&StateNode::path(&node), ResolvePolicy::Jit)
    }

    #[test]
    fn slice_clamps_bounds() {
        let path = path_to("a.b.c");
        assert_eq!(path.slice(1, 3).names(), vec!["a", "a.b"]);
        assert_eq!(path.slice(2, 99).names(), vec!["a.b", "a.b.c"]);
        assert!(path.slice(5, 2).is_empty());
    }

    #[test]
    fn derived_paths_share_elements() {
        let path = path_to("a.b.c");
        let head = path.slice(0, 2);
        let tail = path.slice(2, 4);
        let joined = head.concat(&tail);

        assert_eq!(joined.names(), path.names());
        assert!(Arc::ptr_eq(
            joined.element_at(1).unwrap(),
            path.element_at(1).unwrap()
        ));
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn reversed_is_leaf_first() {
        let path = path_to("a.b.c");
        assert_eq!(path.reversed().names(), vec!["a.b.c", "a.b", "a", ""]);
        assert_eq!(path.names(), vec!["", "a", "a.b", "a.b.c"]);
    }

    #[test]
    fn elements_own_declared_resolvables() {
        let path = path_to("a.b");
        let a = path.element_at(1).unwrap();
        assert!(a.resolvable("x").is_some());
        assert!(path.element_at(2).unwrap().resolvable("x").is_none());
    }

    #[test]
    fn added_resolvables_replace_by_name() {
        let path = path_to("a");
        let a = path.leaf().unwrap();
        let before = a.resolvable("x").unwrap();
        a.add_resolvables(vec![ResolveSpec::value("x", json!(2))]);
        let after = a.resolvable("x").unwrap();
        assert!(!before.ptr_eq(&after));
        assert_eq!(path.position("a"), Some(1));
    }

    #[test]
    fn forks_share_resolvables_but_not_additions() {
        let path = path_to("a.b");
        let fork = path.fork();
        let original = path.element_at(1).unwrap();
        let forked = fork.element_at(1).unwrap();

        assert!(!Arc::ptr_eq(original, forked));
        assert!(original.resolvable("x").unwrap().ptr_eq(&forked.resolvable("x").unwrap()));

        forked.add_resolvables(vec![ResolveSpec::value("y", json!(2))]);
        assert!(forked.resolvable("y").is_some());
        assert!(original.resolvable("y").is_none());
        assert_eq!(fork.names(), path.names());
    }
}
