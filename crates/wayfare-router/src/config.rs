// File: src/config.rs
// Purpose: Route configuration model, builder, and setup-time validation

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use wayfare_url::{UrlSegment, UrlSegmentGroup, PRIMARY_OUTLET};

use crate::errors::RouterError;
use crate::guard::{Guard, Resolver};
use crate::loader::RouteLoader;
use crate::state::DataMap;

/// A flat list of route definitions, tried in declaration order.
pub type Routes = Vec<Arc<Route>>;

/// Path pattern reserved for wildcard routes.
pub const WILDCARD: &str = "**";

/// How much of the remaining URL a route's `path` must account for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathMatch {
    /// The path may consume a prefix of the remaining segments.
    #[default]
    Prefix,
    /// The path must consume every remaining segment (and, for empty-path
    /// routes, the group must have no children).
    Full,
}

/// When a route's guards and resolvers re-run on a navigation that reuses
/// the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunGuardsAndResolvers {
    /// Re-run when path or matrix parameters of the consumed segments
    /// change. The default.
    #[default]
    ParamsChange,
    /// `ParamsChange`, plus query-parameter changes.
    ParamsOrQueryParamsChange,
    /// Re-run only when the segment paths themselves change.
    PathParamsChange,
    /// `PathParamsChange`, plus query-parameter changes.
    PathParamsOrQueryParamsChange,
    /// Re-run on every navigation that touches the node.
    Always,
}

/// Result of a custom matcher: the segments it consumed and the segments it
/// bound as positional parameters.
#[derive(Debug, Clone)]
pub struct UrlMatchResult {
    pub consumed: Vec<UrlSegment>,
    pub positional: BTreeMap<String, UrlSegment>,
}

/// A custom matching function that replaces the default path algorithm for
/// one route.
pub trait UrlMatcher: Send + Sync {
    fn matches(
        &self,
        segments: &[UrlSegment],
        group: &UrlSegmentGroup,
        route: &Route,
    ) -> Option<UrlMatchResult>;
}

impl<F> UrlMatcher for F
where
    F: Fn(&[UrlSegment], &UrlSegmentGroup, &Route) -> Option<UrlMatchResult> + Send + Sync,
{
    fn matches(
        &self,
        segments: &[UrlSegment],
        group: &UrlSegmentGroup,
        route: &Route,
    ) -> Option<UrlMatchResult> {
        self(segments, group, route)
    }
}

/// One route definition.
///
/// Routes are immutable once built and are shared as `Arc<Route>`; the
/// `Arc` identity doubles as the key for lazy-load memoization and the
/// default reuse decision. Runtime state (loaded children) lives in a
/// side-table on the router, never on the route itself.
///
/// ```
/// use wayfare_router::Route;
///
/// let routes = vec![
///     Route::path("").component("Home").arc(),
///     Route::path("users/:id").component("UserDetail").arc(),
///     Route::path("old").redirect_to("new").arc(),
/// ];
/// # let _ = routes;
/// ```
pub struct Route {
    /// Path pattern: `""`, `"users/:id"`, `"**"`, ...
    pub path: String,
    pub path_match: PathMatch,
    /// Outlet this route fills. Defaults to the primary outlet.
    pub outlet: String,
    /// Opaque component type name activated by this route.
    pub component: Option<String>,
    /// Redirect target. `:name` tokens substitute positional params from
    /// the match; a leading `/` makes the redirect absolute.
    pub redirect_to: Option<String>,
    pub children: Routes,
    /// Lazy child-config loader; loaded at most once per route.
    pub load_children: Option<Arc<dyn RouteLoader>>,
    /// Custom matcher replacing the default algorithm.
    pub matcher: Option<Arc<dyn UrlMatcher>>,
    pub can_load: Vec<Guard>,
    pub can_match: Vec<Guard>,
    pub can_activate: Vec<Guard>,
    pub can_activate_child: Vec<Guard>,
    pub can_deactivate: Vec<Guard>,
    /// Data resolvers keyed by the name their output lands under.
    pub resolve: BTreeMap<String, Resolver>,
    /// Static data bag merged into the snapshot's `data`.
    pub data: DataMap,
    /// Title applied by the title strategy when this is the deepest primary
    /// node of a committed navigation.
    pub title: Option<String>,
    pub run_guards_and_resolvers: RunGuardsAndResolvers,
}

impl Route {
    /// Starts building a route for `path`.
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            path_match: PathMatch::default(),
            outlet: PRIMARY_OUTLET.to_string(),
            component: None,
            redirect_to: None,
            children: Vec::new(),
            load_children: None,
            matcher: None,
            can_load: Vec::new(),
            can_match: Vec::new(),
            can_activate: Vec::new(),
            can_activate_child: Vec::new(),
            can_deactivate: Vec::new(),
            resolve: BTreeMap::new(),
            data: DataMap::new(),
            title: None,
            run_guards_and_resolvers: RunGuardsAndResolvers::default(),
        }
    }

    /// A wildcard route (`**`) that matches whatever is left.
    pub fn wildcard() -> Self {
        Self::path(WILDCARD)
    }

    pub fn component(mut self, name: impl Into<String>) -> Self {
        self.component = Some(name.into());
        self
    }

    pub fn redirect_to(mut self, target: impl Into<String>) -> Self {
        self.redirect_to = Some(target.into());
        self
    }

    /// Requires the path to consume the full remaining URL.
    pub fn full_match(mut self) -> Self {
        self.path_match = PathMatch::Full;
        self
    }

    pub fn outlet(mut self, outlet: impl Into<String>) -> Self {
        self.outlet = outlet.into();
        self
    }

    pub fn child(mut self, route: Route) -> Self {
        self.children.push(Arc::new(route));
        self
    }

    pub fn children(mut self, routes: impl IntoIterator<Item = Route>) -> Self {
        self.children.extend(routes.into_iter().map(Arc::new));
        self
    }

    pub fn load_children(mut self, loader: impl RouteLoader + 'static) -> Self {
        self.load_children = Some(Arc::new(loader));
        self
    }

    pub fn matcher(mut self, matcher: impl UrlMatcher + 'static) -> Self {
        self.matcher = Some(Arc::new(matcher));
        self
    }

    pub fn can_load(mut self, guard: Guard) -> Self {
        self.can_load.push(guard);
        self
    }

    pub fn can_match(mut self, guard: Guard) -> Self {
        self.can_match.push(guard);
        self
    }

    pub fn can_activate(mut self, guard: Guard) -> Self {
        self.can_activate.push(guard);
        self
    }

    pub fn can_activate_child(mut self, guard: Guard) -> Self {
        self.can_activate_child.push(guard);
        self
    }

    pub fn can_deactivate(mut self, guard: Guard) -> Self {
        self.can_deactivate.push(guard);
        self
    }

    pub fn resolve(mut self, key: impl Into<String>, resolver: Resolver) -> Self {
        self.resolve.insert(key.into(), resolver);
        self
    }

    pub fn data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn run_guards_and_resolvers(mut self, policy: RunGuardsAndResolvers) -> Self {
        self.run_guards_and_resolvers = policy;
        self
    }

    /// Finishes the builder, producing the shared form used in a config.
    pub fn arc(self) -> Arc<Route> {
        Arc::new(self)
    }

    /// True when this route has an empty path.
    pub fn is_empty_path(&self) -> bool {
        self.path.is_empty()
    }

    /// True when this route declares lazily loaded children.
    pub fn is_lazy(&self) -> bool {
        self.load_children.is_some()
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("path_match", &self.path_match)
            .field("outlet", &self.outlet)
            .field("component", &self.component)
            .field("redirect_to", &self.redirect_to)
            .field("children", &self.children)
            .field("lazy", &self.is_lazy())
            .field("data", &self.data)
            .field("title", &self.title)
            .finish()
    }
}

/// Two configs are the same route when they are the same allocation.
pub(crate) fn same_config(a: &Arc<Route>, b: &Arc<Route>) -> bool {
    Arc::ptr_eq(a, b)
}

/// Validates a route configuration at setup time.
///
/// These are the only routing failures that surface as synchronous errors;
/// everything that can go wrong during a navigation flows through the event
/// stream instead.
pub fn validate_config(routes: &Routes) -> Result<(), RouterError> {
    validate_level(routes, "")
}

fn validate_level(routes: &Routes, parent_path: &str) -> Result<(), RouterError> {
    for (index, route) in routes.iter().enumerate() {
        // An unconditional route shadows any later sibling with the same
        // path and outlet; candidates are tried in declaration order, so
        // the later one could never match. Routes with `can_match` guards
        // or a custom matcher are legitimate fallthrough candidates.
        let unconditional = route.can_match.is_empty() && route.matcher.is_none();
        if unconditional
            && routes[index + 1..]
                .iter()
                .any(|later| later.path == route.path && later.outlet == route.outlet)
        {
            return Err(RouterError::InvalidConfig(format!(
                "sibling routes duplicate path {:?} on outlet {:?}; the later one is unreachable",
                route.path, route.outlet
            )));
        }
        validate_route(route, parent_path)?;
    }
    Ok(())
}

fn validate_route(route: &Route, parent_path: &str) -> Result<(), RouterError> {
    let full_path = if parent_path.is_empty() {
        route.path.clone()
    } else {
        format!("{parent_path}/{}", route.path)
    };

    if route.path.starts_with('/') {
        return Err(RouterError::InvalidConfig(format!(
            "route path {:?} must not start with a slash",
            route.path
        )));
    }
    if route.path == WILDCARD && !route.children.is_empty() {
        return Err(RouterError::InvalidConfig(format!(
            "wildcard route {full_path:?} cannot have children"
        )));
    }
    if route.path == WILDCARD && route.is_lazy() {
        return Err(RouterError::InvalidConfig(format!(
            "wildcard route {full_path:?} cannot lazily load children"
        )));
    }
    if route.redirect_to.is_some() && route.component.is_some() {
        return Err(RouterError::InvalidConfig(format!(
            "route {full_path:?} cannot have both a redirect and a component"
        )));
    }
    if route.redirect_to.is_some() && !route.children.is_empty() {
        return Err(RouterError::InvalidConfig(format!(
            "route {full_path:?} cannot have both a redirect and children"
        )));
    }
    if route.redirect_to.is_some() && route.is_lazy() {
        return Err(RouterError::InvalidConfig(format!(
            "route {full_path:?} cannot have both a redirect and lazily loaded children"
        )));
    }
    if route.redirect_to.is_some() && !route.resolve.is_empty() {
        return Err(RouterError::InvalidConfig(format!(
            "route {full_path:?} cannot have both a redirect and resolvers"
        )));
    }
    if route.is_lazy() && !route.children.is_empty() {
        return Err(RouterError::InvalidConfig(format!(
            "route {full_path:?} cannot have both static and lazily loaded children"
        )));
    }
    if route.is_empty_path()
        && route.redirect_to.is_some()
        && route.path_match == PathMatch::Prefix
    {
        return Err(RouterError::InvalidConfig(format!(
            "empty-path route {full_path:?} with a redirect needs a full path match; \
             a prefix match would redirect every navigation"
        )));
    }

    validate_level(&route.children, &full_path)
}
