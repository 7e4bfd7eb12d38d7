//! Route pattern parsing.
//!
//! # Syntax
//! ```text
//! /users                      literal segments
//! /users/{id}                 parameter, one or more non-slash characters
//! /users/{id:\d+}             parameter with a regex constraint
//! /archive[/{year}[/{month}]] optional trailing parts
//! ```
//!
//! # Design Decisions
//! - A placeholder must fill a whole segment
//! - Optional parts only at the end; each one expands to its own pattern
//! - All errors are reported at registration, never at dispatch

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use crate::routing::matcher::{Constraint, Segment};

/// Error raised for a malformed route pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern must start with '/'")]
    MissingLeadingSlash,

    #[error("unbalanced '{{' or '}}'")]
    UnbalancedBraces,

    #[error("unbalanced '[' or ']'")]
    UnbalancedBrackets,

    #[error("optional parts can only occur at the end of a pattern")]
    OptionalNotAtEnd,

    #[error("empty optional part")]
    EmptyOptional,

    #[error("placeholder must fill a whole segment: `{0}`")]
    PartialPlaceholder(String),

    #[error("invalid placeholder name `{0}`")]
    InvalidName(String),

    #[error("placeholder `{0}` is used more than once")]
    DuplicateParam(String),

    #[error("invalid constraint for `{name}`: {reason}")]
    InvalidConstraint { name: String, reason: String },
}

/// A parsed route pattern without optional parts.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parse a pattern that contains no optional parts.
    pub fn parse(source: &str) -> Result<Self, PatternError> {
        if !source.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash);
        }

        let mut seen = HashSet::new();
        let mut segments = Vec::new();
        for raw in split_segments(source)? {
            let segment = parse_segment(raw)?;
            if let Segment::Param { name, .. } = &segment {
                if !seen.insert(name.clone()) {
                    return Err(PatternError::DuplicateParam(name.clone()));
                }
            }
            segments.push(segment);
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Parse a pattern, expanding optional trailing parts into one pattern
    /// per variant, shortest first.
    pub fn expand(source: &str) -> Result<Vec<Self>, PatternError> {
        expand_optional(source)?
            .iter()
            .map(|variant| Self::parse(variant))
            .collect()
    }

    /// The pattern as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholder names in the order they appear.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Identity of the pattern for duplicate detection.
    ///
    /// Parameter names are erased: `/users/{id}` and `/users/{uid}` are the
    /// same route shape.
    pub fn key(&self) -> String {
        let parts: Vec<String> = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.clone(),
                Segment::Param {
                    constraint: None, ..
                } => "{}".to_string(),
                Segment::Param {
                    constraint: Some(c),
                    ..
                } => format!("{{:{}}}", c.source()),
            })
            .collect();
        parts.join("/")
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Split on `/` outside of placeholder braces.
fn split_segments(source: &str) -> Result<Vec<&str>, PatternError> {
    let mut depth = 0usize;
    let mut start = 0;
    let mut parts = Vec::new();

    for (i, ch) in source.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.checked_sub(1).ok_or(PatternError::UnbalancedBraces)?,
            '[' | ']' if depth == 0 => return Err(PatternError::UnbalancedBrackets),
            '/' if depth == 0 => {
                parts.push(&source[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(PatternError::UnbalancedBraces);
    }
    parts.push(&source[start..]);
    Ok(parts)
}

fn parse_segment(raw: &str) -> Result<Segment, PatternError> {
    if !raw.contains(['{', '}']) {
        return Ok(Segment::Literal(raw.to_string()));
    }

    // The brace opened first must be the one closed last.
    if !raw.starts_with('{') || closing_brace(raw) != Some(raw.len() - 1) {
        return Err(PatternError::PartialPlaceholder(raw.to_string()));
    }

    let inner = &raw[1..raw.len() - 1];
    let (name, constraint) = match inner.split_once(':') {
        Some((name, constraint)) => (name.trim(), Some(constraint.trim())),
        None => (inner.trim(), None),
    };

    if !is_valid_name(name) {
        return Err(PatternError::InvalidName(name.to_string()));
    }

    let constraint = match constraint {
        Some(source) if !source.is_empty() => {
            Some(
                Constraint::new(source).map_err(|e| PatternError::InvalidConstraint {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?,
            )
        }
        _ => None,
    };

    Ok(Segment::Param {
        name: name.to_string(),
        constraint,
    })
}

fn closing_brace(raw: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, ch) in raw.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn expand_optional(source: &str) -> Result<Vec<String>, PatternError> {
    let Some((open, close)) = optional_bounds(source)? else {
        return Ok(vec![source.to_string()]);
    };

    if close != source.len() - 1 {
        return Err(PatternError::OptionalNotAtEnd);
    }

    let base = &source[..open];
    let inner = &source[open + 1..close];
    if inner.is_empty() {
        return Err(PatternError::EmptyOptional);
    }

    let mut variants = vec![base.to_string()];
    for tail in expand_optional(inner)? {
        variants.push(format!("{base}{tail}"));
    }
    Ok(variants)
}

/// Locate the first top-level `[` and its matching `]`, skipping anything
/// inside placeholder braces.
fn optional_bounds(source: &str) -> Result<Option<(usize, usize)>, PatternError> {
    let mut braces = 0usize;
    let mut brackets = 0usize;
    let mut open = None;

    for (i, ch) in source.char_indices() {
        match ch {
            '{' => braces += 1,
            '}' => braces = braces.checked_sub(1).ok_or(PatternError::UnbalancedBraces)?,
            '[' if braces == 0 => {
                if open.is_none() {
                    open = Some(i);
                }
                brackets += 1;
            }
            ']' if braces == 0 => {
                brackets = brackets
                    .checked_sub(1)
                    .ok_or(PatternError::UnbalancedBrackets)?;
                if brackets == 0 {
                    if let Some(start) = open {
                        return Ok(Some((start, i)));
                    }
                }
            }
            _ => {}
        }
    }

    if brackets != 0 {
        return Err(PatternError::UnbalancedBrackets);
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(pattern: &str) -> Vec<String> {
        Pattern::expand(pattern)
            .unwrap()
            .iter()
            .map(|p| p.source().to_string())
            .collect()
    }

    #[test]
    fn test_parse_literal_and_params() {
        let pattern = Pattern::parse("/users/{id}/posts/{post:\\d+}").unwrap();
        assert_eq!(pattern.segments().len(), 5);
        let names: Vec<_> = pattern.param_names().collect();
        assert_eq!(names, vec!["id", "post"]);
    }

    #[test]
    fn test_root_pattern() {
        let pattern = Pattern::parse("/").unwrap();
        assert_eq!(pattern.segments().len(), 2);
        assert_eq!(pattern.param_names().count(), 0);
    }

    #[test]
    fn test_constraint_with_braces_and_slash_free_split() {
        let pattern = Pattern::parse("/codes/{code:[A-Z]{3}}").unwrap();
        assert!(pattern.segments()[2].matches("ABC"));
        assert!(!pattern.segments()[2].matches("ABCD"));
    }

    #[test]
    fn test_rejects_missing_leading_slash() {
        assert_eq!(
            Pattern::parse("users").unwrap_err(),
            PatternError::MissingLeadingSlash
        );
    }

    #[test]
    fn test_rejects_partial_placeholder() {
        assert!(matches!(
            Pattern::parse("/files/{name}.txt"),
            Err(PatternError::PartialPlaceholder(_))
        ));
        assert!(matches!(
            Pattern::parse("/files/x{name}"),
            Err(PatternError::PartialPlaceholder(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_params() {
        assert_eq!(
            Pattern::parse("/{id}/{id}").unwrap_err(),
            PatternError::DuplicateParam("id".into())
        );
    }

    #[test]
    fn test_rejects_bad_names_and_constraints() {
        assert!(matches!(
            Pattern::parse("/{1abc}"),
            Err(PatternError::InvalidName(_))
        ));
        assert!(matches!(
            Pattern::parse("/{}"),
            Err(PatternError::InvalidName(_))
        ));
        assert!(matches!(
            Pattern::parse("/{id:(}"),
            Err(PatternError::InvalidConstraint { .. })
        ));
    }

    #[test]
    fn test_rejects_unbalanced_braces() {
        assert_eq!(
            Pattern::parse("/{id").unwrap_err(),
            PatternError::UnbalancedBraces
        );
        assert_eq!(
            Pattern::parse("/id}").unwrap_err(),
            PatternError::UnbalancedBraces
        );
    }

    #[test]
    fn test_expand_nested_optional() {
        assert_eq!(
            sources("/user[/{id}[/{name}]]"),
            vec!["/user", "/user/{id}", "/user/{id}/{name}"]
        );
    }

    #[test]
    fn test_expand_without_optional() {
        assert_eq!(sources("/plain"), vec!["/plain"]);
    }

    #[test]
    fn test_brackets_inside_constraint_are_not_optional() {
        assert_eq!(sources("/n/{n:[0-9]+}"), vec!["/n/{n:[0-9]+}"]);
    }

    #[test]
    fn test_optional_must_be_trailing() {
        assert_eq!(
            Pattern::expand("/a[/b]/c").unwrap_err(),
            PatternError::OptionalNotAtEnd
        );
        assert_eq!(
            Pattern::expand("/a[]").unwrap_err(),
            PatternError::EmptyOptional
        );
        assert_eq!(
            Pattern::expand("/a[/b").unwrap_err(),
            PatternError::UnbalancedBrackets
        );
        assert_eq!(
            Pattern::expand("/a/b]").unwrap_err(),
            PatternError::UnbalancedBrackets
        );
    }

    #[test]
    fn test_key_erases_param_names() {
        let a = Pattern::parse("/users/{id}").unwrap();
        let b = Pattern::parse("/users/{uid}").unwrap();
        let c = Pattern::parse("/users/{id:\\d+}").unwrap();
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }
}
