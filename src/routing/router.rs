//! Route table, compilation, and dispatch.
//!
//! # Responsibilities
//! - Collect routes in registration order
//! - Compile them into one segment trie per method
//! - Resolve (method, path) to a target or an explicit miss
//!
//! # Design Decisions
//! - Immutable after compilation (shared across requests without locks)
//! - Literal children are hash lookups, parameter children are scanned
//! - Overlapping patterns resolve to the lowest registration index; every
//!   trie node remembers the lowest index below it so losing branches are
//!   pruned early
//! - Duplicate (method, pattern) registrations keep the first route
//! - HEAD falls back to GET when no HEAD route matches

use std::collections::{HashMap, HashSet};

use axum::http::Method;

use crate::routing::matcher::Segment;
use crate::routing::pattern::{Pattern, PatternError};

/// Handle to a target stored in a [`RouteTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(usize);

#[derive(Debug)]
struct RouteDef {
    method: Method,
    pattern: Pattern,
    target: TargetId,
}

/// Ordered route registrations, not yet dispatchable.
///
/// Targets live in an arena so one registration can bind several pattern
/// variants (optional parts) to the same target.
#[derive(Debug)]
pub struct RouteTable<T> {
    targets: Vec<T>,
    routes: Vec<RouteDef>,
    keys: HashSet<(Method, String)>,
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            routes: Vec::new(),
            keys: HashSet::new(),
        }
    }
}

impl<T> RouteTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `target` under `method` and `pattern`.
    ///
    /// An invalid pattern stores nothing.
    pub fn add(
        &mut self,
        method: Method,
        pattern: &str,
        target: T,
    ) -> Result<TargetId, PatternError> {
        let variants = Pattern::expand(pattern)?;
        let id = self.insert_target(target);
        self.bind_variants(method, variants, id);
        Ok(id)
    }

    /// Store a target without binding it to any route yet.
    pub fn insert_target(&mut self, target: T) -> TargetId {
        self.targets.push(target);
        TargetId(self.targets.len() - 1)
    }

    pub fn target_mut(&mut self, id: TargetId) -> Option<&mut T> {
        self.targets.get_mut(id.0)
    }

    /// Bind every variant of `pattern` to an existing target.
    ///
    /// Returns the number of variants actually added; variants that repeat
    /// an earlier (method, pattern) are skipped.
    pub fn bind(
        &mut self,
        method: Method,
        pattern: &str,
        target: TargetId,
    ) -> Result<usize, PatternError> {
        let variants = Pattern::expand(pattern)?;
        Ok(self.bind_variants(method, variants, target))
    }

    fn bind_variants(&mut self, method: Method, variants: Vec<Pattern>, target: TargetId) -> usize {
        let mut added = 0;

        for pattern in variants {
            if !self.keys.insert((method.clone(), pattern.key())) {
                tracing::warn!(
                    method = %method,
                    pattern = %pattern,
                    "Route shadowed by an earlier registration, keeping the first"
                );
                continue;
            }
            tracing::debug!(method = %method, pattern = %pattern, "Route registered");
            self.routes.push(RouteDef {
                method: method.clone(),
                pattern,
                target,
            });
            added += 1;
        }

        added
    }

    /// Number of bound (method, pattern) routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Transform every target, collecting all failures instead of the first.
    pub fn try_map<U, E, F>(self, mut f: F) -> Result<RouteTable<U>, Vec<E>>
    where
        F: FnMut(T) -> Result<U, E>,
    {
        let mut targets = Vec::with_capacity(self.targets.len());
        let mut errors = Vec::new();
        for target in self.targets {
            match f(target) {
                Ok(mapped) => targets.push(mapped),
                Err(e) => errors.push(e),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(RouteTable {
            targets,
            routes: self.routes,
            keys: self.keys,
        })
    }

    /// Freeze the table into a dispatchable [`Router`].
    pub fn compile(self) -> Router<T> {
        let mut trees: Vec<(Method, Node)> = Vec::new();
        let mut routes = Vec::with_capacity(self.routes.len());

        for (index, def) in self.routes.into_iter().enumerate() {
            let position = match trees.iter().position(|(m, _)| *m == def.method) {
                Some(position) => position,
                None => {
                    trees.push((def.method.clone(), Node::default()));
                    trees.len() - 1
                }
            };
            trees[position].1.insert(def.pattern.segments(), index);

            routes.push(CompiledRoute {
                target: def.target,
                params: def.pattern.param_names().map(str::to_string).collect(),
                pattern: def.pattern.source().to_string(),
            });
        }

        Router {
            targets: self.targets,
            trees,
            routes,
        }
    }
}

#[derive(Debug)]
struct CompiledRoute {
    target: TargetId,
    params: Vec<String>,
    pattern: String,
}

#[derive(Debug)]
struct Node {
    literals: HashMap<String, Node>,
    params: Vec<(Segment, Node)>,
    route: Option<usize>,
    min_route: usize,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            literals: HashMap::new(),
            params: Vec::new(),
            route: None,
            min_route: usize::MAX,
        }
    }
}

impl Node {
    fn insert(&mut self, segments: &[Segment], route: usize) {
        self.min_route = self.min_route.min(route);

        let Some((head, rest)) = segments.split_first() else {
            if self.route.is_none() {
                self.route = Some(route);
            }
            return;
        };

        let child = match head {
            Segment::Literal(text) => self.literals.entry(text.clone()).or_default(),
            Segment::Param { .. } => {
                let position = match self
                    .params
                    .iter()
                    .position(|(existing, _)| existing.shape() == head.shape())
                {
                    Some(position) => position,
                    None => {
                        self.params.push((head.clone(), Node::default()));
                        self.params.len() - 1
                    }
                };
                &mut self.params[position].1
            }
        };
        child.insert(rest, route);
    }

    fn lookup<'p>(
        &self,
        segments: &[&'p str],
        captures: &mut Vec<&'p str>,
        best: &mut Option<(usize, Vec<&'p str>)>,
    ) {
        if let Some((winner, _)) = best {
            if self.min_route >= *winner {
                return;
            }
        }

        let Some((head, rest)) = segments.split_first() else {
            if let Some(route) = self.route {
                if best.as_ref().map_or(true, |(winner, _)| route < *winner) {
                    *best = Some((route, captures.clone()));
                }
            }
            return;
        };

        if let Some(child) = self.literals.get(*head) {
            child.lookup(rest, captures, best);
        }

        for (segment, child) in &self.params {
            if segment.matches(head) {
                captures.push(head);
                child.lookup(rest, captures, best);
                captures.pop();
            }
        }
    }

    fn find<'p>(&self, segments: &[&'p str]) -> Option<(usize, Vec<&'p str>)> {
        let mut best = None;
        self.lookup(segments, &mut Vec::new(), &mut best);
        best
    }
}

/// Path parameters captured by a match, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for Params {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A successful dispatch.
#[derive(Debug)]
pub struct RouteMatch<'r, T> {
    pub target: &'r T,
    pub params: Params,
    /// The pattern variant that matched, as registered.
    pub pattern: &'r str,
}

/// Result of [`Router::dispatch`].
#[derive(Debug)]
pub enum Outcome<'r, T> {
    Found(RouteMatch<'r, T>),
    /// The path exists under other methods only.
    MethodNotAllowed { allowed: Vec<Method> },
    NotFound,
}

/// Compiled, immutable route table.
#[derive(Debug)]
pub struct Router<T> {
    targets: Vec<T>,
    trees: Vec<(Method, Node)>,
    routes: Vec<CompiledRoute>,
}

impl<T> Router<T> {
    /// Resolve a request method and path.
    ///
    /// `path` must not carry the query string.
    pub fn dispatch(&self, method: &Method, path: &str) -> Outcome<'_, T> {
        let segments: Vec<&str> = path.split('/').collect();

        if let Some(found) = self.find(method, &segments) {
            return Outcome::Found(found);
        }

        if *method == Method::HEAD {
            if let Some(found) = self.find(&Method::GET, &segments) {
                return Outcome::Found(found);
            }
        }

        let mut allowed: Vec<Method> = self
            .trees
            .iter()
            .filter(|(m, _)| m != method)
            .filter(|(_, tree)| tree.find(&segments).is_some())
            .map(|(m, _)| m.clone())
            .collect();

        if allowed.is_empty() {
            return Outcome::NotFound;
        }

        if allowed.contains(&Method::GET)
            && !allowed.contains(&Method::HEAD)
            && *method != Method::HEAD
        {
            allowed.push(Method::HEAD);
        }
        Outcome::MethodNotAllowed { allowed }
    }

    fn find(&self, method: &Method, segments: &[&str]) -> Option<RouteMatch<'_, T>> {
        let (_, tree) = self.trees.iter().find(|(m, _)| m == method)?;
        let (index, captures) = tree.find(segments)?;
        let route = &self.routes[index];

        let params = route
            .params
            .iter()
            .zip(captures)
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect();

        Some(RouteMatch {
            target: &self.targets[route.target.0],
            params,
            pattern: &route.pattern,
        })
    }

    /// Number of compiled (method, pattern) routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Methods with at least one route, in first-registration order.
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.trees.iter().map(|(m, _)| m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router(routes: &[(Method, &str, &'static str)]) -> Router<&'static str> {
        let mut table = RouteTable::new();
        for (method, pattern, name) in routes {
            table.add(method.clone(), pattern, *name).unwrap();
        }
        table.compile()
    }

    fn found<'r>(outcome: Outcome<'r, &'static str>) -> RouteMatch<'r, &'static str> {
        match outcome {
            Outcome::Found(m) => m,
            other => panic!("expected Found, got {:?}", other),
        }
    }

    #[test]
    fn test_param_capture() {
        let r = router(&[(Method::GET, "/users/{id}", "show")]);
        let m = found(r.dispatch(&Method::GET, "/users/42"));
        assert_eq!(*m.target, "show");
        assert_eq!(m.params.get("id"), Some("42"));
        assert_eq!(m.pattern, "/users/{id}");
    }

    #[test]
    fn test_method_not_allowed() {
        let r = router(&[(Method::POST, "/users", "create")]);
        match r.dispatch(&Method::GET, "/users") {
            Outcome::MethodNotAllowed { allowed } => assert_eq!(allowed, vec![Method::POST]),
            other => panic!("expected MethodNotAllowed, got {:?}", other),
        }
    }

    #[test]
    fn test_not_found_on_empty_router() {
        let r: Router<&'static str> = RouteTable::new().compile();
        assert!(r.is_empty());
        assert!(matches!(r.dispatch(&Method::GET, "/missing"), Outcome::NotFound));
    }

    #[test]
    fn test_not_found_regardless_of_method() {
        let r = router(&[
            (Method::GET, "/users/{id}", "show"),
            (Method::POST, "/users", "create"),
        ]);
        for method in [Method::GET, Method::POST, Method::DELETE, Method::HEAD] {
            assert!(matches!(r.dispatch(&method, "/users/42/extra"), Outcome::NotFound));
            assert!(matches!(r.dispatch(&method, "/accounts"), Outcome::NotFound));
        }
    }

    #[test]
    fn test_segment_count_must_match() {
        let r = router(&[(Method::GET, "/a/{b}", "ab")]);
        assert!(matches!(r.dispatch(&Method::GET, "/a"), Outcome::NotFound));
        assert!(matches!(r.dispatch(&Method::GET, "/a/b/c"), Outcome::NotFound));
    }

    #[test]
    fn test_trailing_slash_is_distinct() {
        let r = router(&[(Method::GET, "/users", "list")]);
        assert!(matches!(r.dispatch(&Method::GET, "/users"), Outcome::Found(_)));
        assert!(matches!(r.dispatch(&Method::GET, "/users/"), Outcome::NotFound));
    }

    #[test]
    fn test_root_route() {
        let r = router(&[(Method::GET, "/", "home")]);
        assert_eq!(*found(r.dispatch(&Method::GET, "/")).target, "home");
        assert!(matches!(r.dispatch(&Method::GET, ""), Outcome::NotFound));
    }

    #[test]
    fn test_first_registered_wins_param_before_literal() {
        let r = router(&[
            (Method::GET, "/users/{id}", "show"),
            (Method::GET, "/users/me", "me"),
        ]);
        let m = found(r.dispatch(&Method::GET, "/users/me"));
        assert_eq!(*m.target, "show");
        assert_eq!(m.params.get("id"), Some("me"));
    }

    #[test]
    fn test_first_registered_wins_literal_before_param() {
        let r = router(&[
            (Method::GET, "/users/me", "me"),
            (Method::GET, "/users/{id}", "show"),
        ]);
        assert_eq!(*found(r.dispatch(&Method::GET, "/users/me")).target, "me");
        assert_eq!(*found(r.dispatch(&Method::GET, "/users/7")).target, "show");
    }

    #[test]
    fn test_duplicate_pattern_keeps_first() {
        let mut table = RouteTable::new();
        table.add(Method::GET, "/users/{id}", "first").unwrap();
        let id = table.insert_target("second");
        assert_eq!(table.bind(Method::GET, "/users/{uid}", id).unwrap(), 0);
        assert_eq!(table.len(), 1);

        let r = table.compile();
        let m = found(r.dispatch(&Method::GET, "/users/1"));
        assert_eq!(*m.target, "first");
        assert_eq!(m.params.get("id"), Some("1"));
    }

    #[test]
    fn test_same_pattern_different_methods() {
        let r = router(&[
            (Method::GET, "/items/{id}", "get"),
            (Method::PUT, "/items/{id}", "put"),
            (Method::DELETE, "/items/{id}", "delete"),
        ]);
        assert_eq!(*found(r.dispatch(&Method::PUT, "/items/3")).target, "put");
        assert_eq!(*found(r.dispatch(&Method::DELETE, "/items/3")).target, "delete");
        match r.dispatch(&Method::PATCH, "/items/3") {
            Outcome::MethodNotAllowed { allowed } => {
                assert_eq!(allowed, vec![Method::GET, Method::PUT, Method::DELETE, Method::HEAD]);
            }
            other => panic!("expected MethodNotAllowed, got {:?}", other),
        }
    }

    #[test]
    fn test_constraint_falls_through_to_next_route() {
        let r = router(&[
            (Method::GET, "/posts/{id:\\d+}", "by_id"),
            (Method::GET, "/posts/{slug}", "by_slug"),
        ]);
        assert_eq!(*found(r.dispatch(&Method::GET, "/posts/12")).target, "by_id");
        let m = found(r.dispatch(&Method::GET, "/posts/hello-world"));
        assert_eq!(*m.target, "by_slug");
        assert_eq!(m.params.get("slug"), Some("hello-world"));
    }

    #[test]
    fn test_constraint_mismatch_is_not_found() {
        let r = router(&[(Method::GET, "/posts/{id:\\d+}", "by_id")]);
        assert!(matches!(r.dispatch(&Method::GET, "/posts/abc"), Outcome::NotFound));
        assert!(matches!(r.dispatch(&Method::POST, "/posts/abc"), Outcome::NotFound));
        assert!(matches!(
            r.dispatch(&Method::POST, "/posts/1"),
            Outcome::MethodNotAllowed { .. }
        ));
    }

    #[test]
    fn test_optional_variants_share_target() {
        let r = router(&[(Method::GET, "/archive[/{year}[/{month}]]", "archive")]);
        assert_eq!(*found(r.dispatch(&Method::GET, "/archive")).target, "archive");
        let m = found(r.dispatch(&Method::GET, "/archive/2024/05"));
        assert_eq!(m.params.get("year"), Some("2024"));
        assert_eq!(m.params.get("month"), Some("05"));
        assert_eq!(r.len(), 3);
    }

    #[test]
    fn test_head_falls_back_to_get() {
        let r = router(&[(Method::GET, "/status", "status")]);
        assert_eq!(*found(r.dispatch(&Method::HEAD, "/status")).target, "status");
    }

    #[test]
    fn test_explicit_head_route_wins() {
        let r = router(&[
            (Method::GET, "/status", "get"),
            (Method::HEAD, "/status", "head"),
        ]);
        assert_eq!(*found(r.dispatch(&Method::HEAD, "/status")).target, "head");
    }

    #[test]
    fn test_params_equal_substituted_values() {
        let patterns = [
            ("/a/{x}", vec![("x", "1")]),
            ("/b/{x}/c/{y}", vec![("x", "foo"), ("y", "bar")]),
            ("/{p:[a-z]+}/{q:\\d+}", vec![("p", "abc"), ("q", "99")]),
            ("/d/{long_name}", vec![("long_name", "v-1.2")]),
        ];

        let mut table = RouteTable::new();
        for (pattern, _) in &patterns {
            table.add(Method::GET, pattern, *pattern).unwrap();
        }
        let r = table.compile();

        for (pattern, values) in &patterns {
            let mut path = pattern.to_string();
            for (name, value) in values {
                let start = path.find(&format!("{{{}", name)).unwrap();
                let end = start + path[start..].find('}').unwrap();
                path.replace_range(start..=end, value);
            }
            let m = found(r.dispatch(&Method::GET, &path));
            assert_eq!(m.target, pattern);
            let expected: Params = values.iter().cloned().collect();
            assert_eq!(m.params, expected);
        }
    }

    #[test]
    fn test_invalid_pattern_rejected_at_registration() {
        let mut table: RouteTable<&'static str> = RouteTable::new();
        assert!(table.add(Method::GET, "no-slash", "x").is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn test_invalid_pattern_leaves_no_target() {
        let mut table = RouteTable::new();
        table.add(Method::GET, "/ok", 2).unwrap();
        assert!(table.add(Method::GET, "/bad/{id", 1).is_err());

        let mut seen = Vec::new();
        let table = table
            .try_map(|n: i32| {
                seen.push(n);
                Ok::<_, ()>(n)
            })
            .unwrap();
        assert_eq!(seen, vec![2]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_try_map_collects_all_errors() {
        let mut table = RouteTable::new();
        table.add(Method::GET, "/a", 1).unwrap();
        table.add(Method::GET, "/b", 2).unwrap();
        table.add(Method::GET, "/c", 3).unwrap();

        let errors = table
            .try_map(|n: i32| if n % 2 == 1 { Err(n) } else { Ok(n) })
            .unwrap_err();
        assert_eq!(errors, vec![1, 3]);
    }
}
