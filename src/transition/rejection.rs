//! Rejection taxonomy and the error type delivered by a transition.

use super::engine::Transition;
use crate::resolve::ResolveError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a non-success outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RejectionKind {
    /// A newer transition preempted this one
    Superseded = 2,
    /// A hook returned `Abort`
    Aborted = 3,
    /// The target could not be resolved to a usable state
    Invalid = 4,
    /// Target equals source and no reload was requested
    Ignored = 5,
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RejectionKind::Superseded => "SUPERSEDED",
            RejectionKind::Aborted => "ABORTED",
            RejectionKind::Invalid => "INVALID",
            RejectionKind::Ignored => "IGNORED",
        };
        f.write_str(label)
    }
}

/// A classified rejection. Not a bug signal: callers branch on [`kind`](Self::kind).
#[derive(Clone, Debug, PartialEq)]
pub struct Rejection {
    kind: RejectionKind,
    detail: Option<String>,
    redirected: bool,
    superseded_by: Option<Transition>,
}

impl Rejection {
    fn new(kind: RejectionKind) -> Self {
        Self {
            kind,
            detail: None,
            redirected: false,
            superseded_by: None,
        }
    }

    pub fn ignored() -> Self {
        Self::new(RejectionKind::Ignored).with_detail("The transition was ignored")
    }

    pub fn aborted() -> Self {
        Self::new(RejectionKind::Aborted).with_detail("The transition has been aborted")
    }

    pub fn invalid(detail: impl Into<String>) -> Self {
        Self::new(RejectionKind::Invalid).with_detail(detail)
    }

    /// Superseded by a newer transition, if it is still alive.
    pub fn superseded(by: Option<Transition>) -> Self {
        Self {
            superseded_by: by,
            ..Self::new(RejectionKind::Superseded)
        }
        .with_detail("The transition has been superseded by a different transition")
    }

    /// Superseded because a hook redirected to `next`.
    pub fn redirected(next: Transition) -> Self {
        let detail = format!("The transition was redirected to '{}'", next.target_name());
        Self {
            redirected: true,
            superseded_by: Some(next),
            ..Self::new(RejectionKind::Superseded)
        }
        .with_detail(detail)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn kind(&self) -> RejectionKind {
        self.kind
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn is_redirect(&self) -> bool {
        self.redirected
    }

    /// The transition that replaced this one.
    pub fn superseded_by(&self) -> Option<&Transition> {
        self.superseded_by.as_ref()
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transition rejected ({})", self.kind)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

/// Error delivered by [`Transition::run`].
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("{0}")]
    Rejected(Rejection),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("{message}")]
    Failed { message: String },
}

impl TransitionError {
    pub fn failed(message: impl Into<String>) -> Self {
        TransitionError::Failed {
            message: message.into(),
        }
    }

    /// The rejection kind, for classified outcomes.
    pub fn kind(&self) -> Option<RejectionKind> {
        self.rejection().map(Rejection::kind)
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            TransitionError::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}

impl From<Rejection> for TransitionError {
    fn from(rejection: Rejection) -> Self {
        TransitionError::Rejected(rejection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_only_set_for_rejections() {
        let aborted: TransitionError = Rejection::aborted().into();
        assert_eq!(aborted.kind(), Some(RejectionKind::Aborted));

        let failed = TransitionError::failed("hook blew up");
        assert_eq!(failed.kind(), None);
        assert_eq!(failed.to_string(), "hook blew up");

        let resolve: TransitionError = ResolveError::failed("timeout").into();
        assert!(resolve.rejection().is_none());
    }

    #[test]
    fn display_includes_kind_and_detail() {
        let rejection = Rejection::invalid("No such state 'nowhere'");
        assert_eq!(
            rejection.to_string(),
            "transition rejected (INVALID): No such state 'nowhere'"
        );
        assert_eq!(Rejection::ignored().kind(), RejectionKind::Ignored);
    }

    #[test]
    fn superseded_without_successor() {
        let rejection = Rejection::superseded(None);
        assert_eq!(rejection.kind(), RejectionKind::Superseded);
        assert!(!rejection.is_redirect());
        assert!(rejection.superseded_by().is_none());
    }

    #[test]
    fn kinds_order_by_severity() {
        assert!((RejectionKind::Superseded as u8) < (RejectionKind::Ignored as u8));
        assert_eq!(
            serde_json::to_string(&RejectionKind::Aborted).unwrap(),
            "\"ABORTED\""
        );
    }
}
