//! Match criteria deciding which hooks apply to a transition.

use crate::core::{Glob, StateNode};
use std::fmt;
use std::sync::Arc;

/// Predicate over a state, used as a match criterion.
pub type StatePredicate = Arc<dyn Fn(&StateNode) -> bool + Send + Sync>;

/// What a criterion is tested against: a registered state, or the raw
/// name of a target that did not resolve to one.
#[derive(Clone, Copy, Debug)]
pub enum Subject<'a> {
    State(&'a StateNode),
    Unresolved(&'a str),
}

impl Subject<'_> {
    pub fn name(&self) -> &str {
        match self {
            Subject::State(state) => state.name(),
            Subject::Unresolved(name) => name,
        }
    }
}

/// A single `to` or `from` criterion.
#[derive(Clone, Default)]
pub enum Criterion {
    /// Matches every state
    #[default]
    Any,
    /// Matches if any pattern matches the full dotted name
    Globs(Vec<Glob>),
    /// Matches if the predicate returns true; never matches unresolved targets
    Predicate(StatePredicate),
}

impl Criterion {
    pub fn glob(pattern: &str) -> Self {
        Criterion::Globs(vec![Glob::new(pattern)])
    }

    pub fn globs<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Glob>,
    {
        Criterion::Globs(patterns.into_iter().map(Into::into).collect())
    }

    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&StateNode) -> bool + Send + Sync + 'static,
    {
        Criterion::Predicate(Arc::new(predicate))
    }

    pub fn matches(&self, subject: Subject<'_>) -> bool {
        match self {
            Criterion::Any => true,
            Criterion::Globs(globs) => globs.iter().any(|g| g.matches(subject.name())),
            Criterion::Predicate(predicate) => match subject {
                Subject::State(state) => predicate(state),
                Subject::Unresolved(_) => false,
            },
        }
    }
}

impl From<&str> for Criterion {
    fn from(pattern: &str) -> Self {
        Criterion::glob(pattern)
    }
}

impl From<Vec<&str>> for Criterion {
    fn from(patterns: Vec<&str>) -> Self {
        Criterion::globs(patterns)
    }
}

impl From<Glob> for Criterion {
    fn from(glob: Glob) -> Self {
        Criterion::Globs(vec![glob])
    }
}

impl fmt::Debug for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Any => f.write_str("Any"),
            Criterion::Globs(globs) => f.debug_tuple("Globs").field(globs).finish(),
            Criterion::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Criteria on the transition's target and source states.
///
/// ```rust
/// use waypoint::hooks::MatchCriteria;
///
/// let criteria = MatchCriteria::any().to_state("admin.**").from_state("login");
/// ```
#[derive(Clone, Debug, Default)]
pub struct MatchCriteria {
    pub to: Criterion,
    pub from: Criterion,
}

impl MatchCriteria {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn to_state(mut self, criterion: impl Into<Criterion>) -> Self {
        self.to = criterion.into();
        self
    }

    pub fn from_state(mut self, criterion: impl Into<Criterion>) -> Self {
        self.from = criterion.into();
        self
    }

    pub fn matches(&self, to: Subject<'_>, from: Subject<'_>) -> bool {
        self.to.matches(to) && self.from.matches(from)
    }
}
