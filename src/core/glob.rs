//! Glob patterns over dotted state names.
//!
//! `*` matches exactly one segment, `**` matches one or more segments,
//! anything else matches a segment literally.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    One,
    Many,
}

/// Compiled dotted-name pattern such as `app.*.detail` or `admin.**`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Glob {
    pattern: String,
    #[serde(skip)]
    segments: Vec<Segment>,
}

impl Glob {
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let segments = split(&pattern)
            .map(|s| match s {
                "*" => Segment::One,
                "**" => Segment::Many,
                literal => Segment::Literal(literal.to_string()),
            })
            .collect();
        Self { pattern, segments }
    }

    /// True if `text` contains a wildcard segment.
    pub fn is_glob(text: &str) -> bool {
        split(text).any(|s| s == "*" || s == "**")
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Test a full dotted state name against the pattern.
    ///
    /// ```rust
    /// use waypoint::core::Glob;
    ///
    /// assert!(Glob::new("app.*").matches("app.home"));
    /// assert!(!Glob::new("app.*").matches("app.home.detail"));
    /// assert!(Glob::new("app.**").matches("app.home.detail"));
    /// assert!(!Glob::new("app.**").matches("app"));
    /// ```
    pub fn matches(&self, name: &str) -> bool {
        let name: Vec<&str> = split(name).collect();
        match_segments(&self.segments, &name)
    }
}

fn split(text: &str) -> impl Iterator<Item = &str> {
    text.split('.').filter(|s| !s.is_empty())
}

fn match_segments(pattern: &[Segment], name: &[&str]) -> bool {
    match pattern.split_first() {
        None => name.is_empty(),
        Some((Segment::Literal(literal), rest)) => {
            name.first().is_some_and(|s| s == literal) && match_segments(rest, &name[1..])
        }
        Some((Segment::One, rest)) => !name.is_empty() && match_segments(rest, &name[1..]),
        Some((Segment::Many, rest)) => {
            (1..=name.len()).any(|taken| match_segments(rest, &name[taken..]))
        }
    }
}

impl From<String> for Glob {
    fn from(pattern: String) -> Self {
        Glob::new(pattern)
    }
}

impl From<&str> for Glob {
    fn from(pattern: &str) -> Self {
        Glob::new(pattern)
    }
}

impl From<Glob> for String {
    fn from(glob: Glob) -> Self {
        glob.pattern
    }
}

impl fmt::Debug for Glob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Glob({:?})", self.pattern)
    }
}

impl fmt::Display for Glob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}
