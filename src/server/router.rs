//! Path routing.
//!
//! A pattern is a sequence of segments: literals, named parameters (`:name`)
//! and single-component wildcards (`*`). A path matches only when it has the
//! same number of components as the pattern. Routes are tried in registration
//! order and the first full match wins.

use std::collections::HashMap;
use std::fmt;

use crate::parser::Method;
use crate::server::handler::HandlerFn;

/// One component matcher of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Matches the component exactly, case-sensitively.
    Literal(String),
    /// Matches any component and binds it under the given name.
    Param(String),
    /// Matches any component without binding it.
    Wildcard,
}

/// A parsed route pattern such as `/users/:id/*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parse a pattern string.
    pub fn parse(pattern: &str) -> Self {
        let segments = split_path(pattern)
            .map(|component| match component {
                "*" => Segment::Wildcard,
                _ => match component.strip_prefix(':') {
                    Some(name) => Segment::Param(name.to_string()),
                    None => Segment::Literal(component.to_string()),
                },
            })
            .collect();

        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    /// The pattern as registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The parsed segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Match a path (without query string), returning the bound parameters.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let components: Vec<&str> = split_path(path).collect();
        if components.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, component) in self.segments.iter().zip(components) {
            match segment {
                Segment::Literal(literal) if literal == component => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    let value = urlencoding::decode(component)
                        .map(|decoded| decoded.into_owned())
                        .unwrap_or_else(|_| component.to_string());
                    params.insert(name.clone(), value);
                }
                Segment::Wildcard => {}
            }
        }
        Some(params)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|component| !component.is_empty())
}

/// Represents a route in the HTTP server.
pub struct Route {
    /// The pattern to match.
    pub pattern: RoutePattern,
    /// The HTTP methods to match; empty matches any method.
    pub methods: Vec<Method>,
    /// The handler function.
    pub handler: HandlerFn,
}

impl Route {
    /// Whether this route accepts `method`.
    pub fn allows(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }
}

/// Ordered route table.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route. Earlier routes take precedence.
    pub fn add(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// The registered routes, in order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Find the first route accepting `method` whose pattern matches `path`.
    pub fn find<'r>(&'r self, method: &Method, path: &str) -> Option<(&'r Route, HashMap<String, String>)> {
        self.routes
            .iter()
            .filter(|route| route.allows(method))
            .find_map(|route| route.pattern.matches(path).map(|params| (route, params)))
    }
}
