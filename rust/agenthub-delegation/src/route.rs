//! The scope each HTTP route requires of a delegated caller.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// How a rule's path is compared against a request path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathPattern {
    /// The whole path must match
    Exact(String),
    /// The path must start with this
    Prefix(String),
    /// The path must end with this
    Suffix(String),
}

impl PathPattern {
    /// Returns `true` if `path` matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(pattern) => path == pattern,
            PathPattern::Prefix(pattern) => path.starts_with(pattern.as_str()),
            PathPattern::Suffix(pattern) => path.ends_with(pattern.as_str()),
        }
    }
}

/// One row of a route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    /// HTTP methods this rule applies to, compared case-insensitively
    pub methods: Vec<String>,
    /// Paths this rule applies to; any one must match
    pub paths: Vec<PathPattern>,
    /// Scope a delegated caller needs for matching requests
    pub scope: String,
}

impl RouteRule {
    /// A rule requiring `scope` for `methods` on `paths`.
    pub fn new<M, P>(methods: M, paths: P, scope: impl Into<String>) -> Self
    where
        M: IntoIterator,
        M::Item: Into<String>,
        P: IntoIterator<Item = PathPattern>,
    {
        Self {
            methods: methods.into_iter().map(Into::into).collect(),
            paths: paths.into_iter().collect(),
            scope: scope.into(),
        }
    }

    /// Returns `true` if this rule covers `method` and `path`.
    pub fn matches(&self, method: &str, path: &str) -> bool {
        self.methods
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(method))
            && self.paths.iter().any(|pattern| pattern.matches(path))
    }
}

/// An ordered route table. The first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteScopes {
    rules: Vec<RouteRule>,
}

impl RouteScopes {
    /// A table of `rules`, consulted in order.
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// The rules, in match order.
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// The scope required for `method` on `path`, or `None` when no rule
    /// covers the route.
    pub fn required_scope(&self, method: &str, path: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.matches(method, path))
            .map(|rule| rule.scope.as_str())
    }
}

impl Default for RouteScopes {
    fn default() -> Self {
        use PathPattern::{Exact, Prefix, Suffix};
        let p = |s: &str| Prefix(s.to_string());

        Self::new(vec![
            RouteRule::new(["GET"], [p("/v1/agents")], "read"),
            RouteRule::new(["GET"], [p("/v1/discovery")], "discovery.search"),
            RouteRule::new(["GET"], [p("/v1/identity")], "read"),
            RouteRule::new(["GET"], [p("/v1/capabilities")], "read"),
            RouteRule::new(["POST", "PUT", "DELETE"], [p("/v1/agents")], "write"),
            RouteRule::new(["POST", "PUT"], [p("/v1/identity")], "write"),
            RouteRule::new(
                ["POST"],
                [
                    Exact("/v1/delegations".to_string()),
                    Exact("/v1/identity/delegation-tokens".to_string()),
                ],
                "delegation.create",
            ),
            RouteRule::new(
                ["POST"],
                [p("/v1/runtime/sandboxes"), Suffix("/execute".to_string())],
                "runtime.execute",
            ),
            RouteRule::new(
                ["POST"],
                [
                    Exact("/v1/discovery/search".to_string()),
                    Exact("/v1/discovery/contract-match".to_string()),
                ],
                "discovery.search",
            ),
        ])
    }
}

static DEFAULT_ROUTES: LazyLock<RouteScopes> = LazyLock::new(RouteScopes::default);

/// The process-wide default route table.
pub fn default_routes() -> &'static RouteScopes {
    &DEFAULT_ROUTES
}

/// The scope the default route table requires for `method` on `path`.
pub fn required_scope_for_route(method: &str, path: &str) -> Option<&'static str> {
    default_routes().required_scope(method, path)
}
