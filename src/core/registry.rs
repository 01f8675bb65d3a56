//! State registry: name lookup, ancestry, and registration-time validation.

use super::state::StateNode;
use crate::builder::{BuildError, StateBuilder};
use crate::resolve::{Injector, StaticInjector, BUILTIN_LOCALS};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<BuildError>>;

/// Registered states, keyed by fully qualified name, under an implicit root.
pub struct StateRegistry {
    root: Arc<StateNode>,
    states: HashMap<String, Arc<StateNode>>,
    order: Vec<String>,
    injector: Arc<dyn Injector>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::with_injector(Arc::new(StaticInjector::new()))
    }

    /// Registry whose dependency checks also accept names the injector provides.
    pub fn with_injector(injector: Arc<dyn Injector>) -> Self {
        Self {
            root: Arc::new(StateNode::root()),
            states: HashMap::new(),
            order: Vec::new(),
            injector,
        }
    }

    pub fn root(&self) -> &Arc<StateNode> {
        &self.root
    }

    pub fn injector(&self) -> &Arc<dyn Injector> {
        &self.injector
    }

    /// Look up a state by name; `""` is the root.
    pub fn get(&self, name: &str) -> Option<Arc<StateNode>> {
        if name.is_empty() {
            return Some(Arc::clone(&self.root));
        }
        self.states.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        name.is_empty() || self.states.contains_key(name)
    }

    /// Registered states, excluding the root.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// States in registration order.
    pub fn states(&self) -> impl Iterator<Item = &Arc<StateNode>> {
        self.order.iter().filter_map(|name| self.states.get(name))
    }

    /// Root-first ancestor chain of `name`, including the state itself.
    pub fn ancestry(&self, name: &str) -> Option<Vec<Arc<StateNode>>> {
        self.get(name).map(|node| StateNode::path(&node))
    }

    /// Validate and register a state declaration.
    ///
    /// Every problem with the declaration is reported, not just the first.
    pub fn register(&mut self, builder: StateBuilder) -> Result<Arc<StateNode>, Vec<BuildError>> {
        let parent = self.get(builder.parent_name());

        let mut checks: Vec<Check> =
            vec![self.check_name(&builder), check_parent(&builder, &parent)];
        checks.extend(check_resolve_names(&builder));
        checks.extend(self.check_dependencies(&builder, parent.as_ref()));
        checks.push(check_cycles(&builder));

        match Validation::all_vec(checks) {
            Validation::Failure(errors) => {
                let errors: Vec<BuildError> = errors.iter().cloned().collect();
                tracing::debug!(state = %builder.name, ?errors, "state registration rejected");
                Err(errors)
            }
            Validation::Success(_) => {
                let node = Arc::new(StateNode {
                    name: builder.name.clone(),
                    parent,
                    params: builder.params,
                    resolves: builder.resolves,
                    resolve_policy: builder.policy,
                    is_abstract: builder.is_abstract,
                    on_enter: builder.on_enter,
                    on_exit: builder.on_exit,
                    on_retain: builder.on_retain,
                });
                tracing::debug!(state = %node.name, "state registered");
                self.order.push(builder.name.clone());
                self.states.insert(builder.name, Arc::clone(&node));
                Ok(node)
            }
        }
    }

    fn check_name(&self, builder: &StateBuilder) -> Check {
        if builder.name.is_empty() {
            Validation::fail(BuildError::EmptyName)
        } else if self.states.contains_key(&builder.name) {
            Validation::fail(BuildError::DuplicateState(builder.name.clone()))
        } else {
            Validation::success(())
        }
    }

    /// Each dependency must come from the state itself, an ancestor,
    /// a built-in local, or the injector.
    fn check_dependencies(
        &self,
        builder: &StateBuilder,
        parent: Option<&Arc<StateNode>>,
    ) -> Vec<Check> {
        let own: HashSet<&str> = builder.resolves.iter().map(|r| r.name()).collect();
        let inherited = |name: &str| {
            parent.is_some_and(|p| StateNode::path(p).iter().any(|s| s.declares_resolve(name)))
        };
        let provided = |name: &str| {
            BUILTIN_LOCALS.contains(&name) || self.injector.has(name) || inherited(name)
        };

        let mut checks = Vec::new();
        for spec in &builder.resolves {
            for dep in spec.deps() {
                let check = if dep == spec.name() {
                    if inherited(dep.as_str()) {
                        Validation::success(())
                    } else {
                        Validation::fail(BuildError::SelfDependency {
                            state: builder.name.clone(),
                            resolve: dep.clone(),
                        })
                    }
                } else if own.contains(dep.as_str()) || provided(dep.as_str()) {
                    Validation::success(())
                } else {
                    Validation::fail(BuildError::UnknownDependency {
                        state: builder.name.clone(),
                        consumer: spec.name().to_string(),
                        dependency: dep.clone(),
                    })
                };
                checks.push(check);
            }
        }
        for (label, callback) in builder.callbacks() {
            for dep in callback.deps() {
                if !own.contains(dep.as_str()) && !provided(dep.as_str()) {
                    checks.push(Validation::fail(BuildError::UnknownDependency {
                        state: builder.name.clone(),
                        consumer: label.to_string(),
                        dependency: dep.clone(),
                    }));
                }
            }
        }
        checks
    }
}

fn check_parent(builder: &StateBuilder, parent: &Option<Arc<StateNode>>) -> Check {
    if parent.is_some() {
        Validation::success(())
    } else {
        Validation::fail(BuildError::MissingParent {
            state: builder.name.clone(),
            parent: builder.parent_name().to_string(),
        })
    }
}

fn check_resolve_names(builder: &StateBuilder) -> Vec<Check> {
    let mut seen = HashSet::new();
    let mut checks = Vec::new();
    for spec in &builder.resolves {
        if BUILTIN_LOCALS.contains(&spec.name()) {
            checks.push(Validation::fail(BuildError::ReservedName {
                state: builder.name.clone(),
                resolve: spec.name().to_string(),
            }));
        }
        if !seen.insert(spec.name()) {
            checks.push(Validation::fail(BuildError::DuplicateResolve {
                state: builder.name.clone(),
                resolve: spec.name().to_string(),
            }));
        }
    }
    checks
}

/// Depth-first search over edges between the state's own resolves.
/// Self edges are skipped: they point at an ancestor's resolve.
fn check_cycles(builder: &StateBuilder) -> Check {
    let edges: HashMap<&str, Vec<&str>> = builder
        .resolves
        .iter()
        .map(|spec| {
            let targets = spec
                .deps()
                .iter()
                .map(String::as_str)
                .filter(|dep| *dep != spec.name() && builder.resolves.iter().any(|r| r.name() == *dep))
                .collect();
            (spec.name(), targets)
        })
        .collect();

    fn visit<'a>(
        node: &'a str,
        edges: &HashMap<&'a str, Vec<&'a str>>,
        stack: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Option<Vec<String>> {
        if let Some(start) = stack.iter().position(|n| *n == node) {
            let mut cycle: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        if done.contains(node) {
            return None;
        }
        stack.push(node);
        for next in edges.get(node).into_iter().flatten() {
            if let Some(cycle) = visit(next, edges, stack, done) {
                return Some(cycle);
            }
        }
        stack.pop();
        done.insert(node);
        None
    }

    let mut done = HashSet::new();
    for spec in &builder.resolves {
        if let Some(cycle) = visit(spec.name(), &edges, &mut Vec::new(), &mut done) {
            return Validation::fail(BuildError::DependencyCycle {
                state: builder.name.clone(),
                cycle,
            });
        }
    }
    Validation::success(())
}

impl Default for StateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateRegistry")
            .field("states", &self.order)
            .finish_non_exhaustive()
    }
}
