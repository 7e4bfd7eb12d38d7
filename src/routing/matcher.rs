//! Path segment matching.
//!
//! # Responsibilities
//! - Match a literal segment (exact, case-sensitive)
//! - Match a parameter segment against its constraint
//!
//! # Design Decisions
//! - Constraints are anchored on the whole segment
//! - Unconstrained parameters accept one or more non-slash characters
//! - Two parameter segments are interchangeable in the trie when their
//!   constraints are equal, whatever their names

use regex::Regex;

/// A single `/`-separated piece of a route pattern.
#[derive(Debug, Clone)]
pub enum Segment {
    /// Must equal the path segment exactly.
    Literal(String),
    /// Captures the path segment under `name`.
    Param {
        name: String,
        constraint: Option<Constraint>,
    },
}

impl Segment {
    /// Returns true if the path segment satisfies this pattern segment.
    pub fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::Literal(expected) => expected == segment,
            Segment::Param { constraint: None, .. } => !segment.is_empty(),
            Segment::Param {
                constraint: Some(constraint),
                ..
            } => constraint.matches(segment),
        }
    }

    /// Key used to merge equivalent segments of different routes.
    pub(crate) fn shape(&self) -> SegmentShape<'_> {
        match self {
            Segment::Literal(text) => SegmentShape::Literal(text),
            Segment::Param { constraint, .. } => {
                SegmentShape::Param(constraint.as_ref().map(Constraint::source))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum SegmentShape<'a> {
    Literal(&'a str),
    Param(Option<&'a str>),
}

/// A compiled parameter constraint such as `\d+` in `{id:\d+}`.
#[derive(Debug, Clone)]
pub struct Constraint {
    source: String,
    regex: Regex,
}

impl Constraint {
    /// Compile `source`, anchored so it must cover the whole segment.
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{source})$"))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// The expression as written in the pattern.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, segment: &str) -> bool {
        self.regex.is_match(segment)
    }
}
