// File: src/reuse.rs
// Purpose: Route reuse strategy - keep, detach-and-store, or recreate nodes

use std::collections::HashMap;
use std::sync::Mutex;

use crate::config::same_config;
use crate::state::{LiveNode, RouteSnapshot};

/// A detached live subtree: the activated route, its component instance,
/// and its entire child tree, stored verbatim for later reattachment.
#[derive(Debug)]
pub struct DetachedRouteHandle(LiveNode);

impl DetachedRouteHandle {
    pub(crate) fn new(node: LiveNode) -> Self {
        Self(node)
    }

    pub(crate) fn into_node(self) -> LiveNode {
        self.0
    }
}

/// Decides, node by node, what happens to live routes when one route tree
/// transitions to another.
///
/// `should_reuse_route` is consulted for every paired node; the detach
/// family (`should_detach`/`store`/`retrieve`/`should_attach`) is an
/// optional extension point for caching entire subtrees across
/// navigations. Implementations needing state use interior mutability;
/// every method takes `&self`.
pub trait RouteReuseStrategy: Send + Sync {
    /// Whether the live node for `current` survives a navigation to
    /// `future`. Default semantics: same route config.
    fn should_reuse_route(&self, future: &RouteSnapshot, current: &RouteSnapshot) -> bool;

    /// Whether a node being removed should be stored instead of dropped.
    fn should_detach(&self, _snapshot: &RouteSnapshot) -> bool {
        false
    }

    /// Stores a detached subtree.
    fn store(&self, _snapshot: &RouteSnapshot, _handle: DetachedRouteHandle) {}

    /// Whether a node being created should come from the store.
    fn should_attach(&self, _snapshot: &RouteSnapshot) -> bool {
        false
    }

    /// Takes a previously stored subtree for `snapshot`, if any.
    fn retrieve(&self, _snapshot: &RouteSnapshot) -> Option<DetachedRouteHandle> {
        None
    }
}

/// Default strategy: reuse when the matched route config is identical,
/// never detach.
#[derive(Debug, Default)]
pub struct DefaultRouteReuseStrategy;

impl RouteReuseStrategy for DefaultRouteReuseStrategy {
    fn should_reuse_route(&self, future: &RouteSnapshot, current: &RouteSnapshot) -> bool {
        match (&future.route, &current.route) {
            (Some(a), Some(b)) => same_config(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

/// A ready-made detaching strategy that caches subtrees by route path.
///
/// Useful for "keep this tab's state alive" flows: configure the paths to
/// cache and the component instances under them survive leaving and
/// re-entering the route.
#[derive(Debug, Default)]
pub struct CachingReuseStrategy {
    cached_paths: Vec<String>,
    store: Mutex<HashMap<String, DetachedRouteHandle>>,
}

impl CachingReuseStrategy {
    pub fn new(cached_paths: impl IntoIterator<Item = String>) -> Self {
        Self {
            cached_paths: cached_paths.into_iter().collect(),
            store: Mutex::new(HashMap::new()),
        }
    }

    fn cache_key(&self, snapshot: &RouteSnapshot) -> Option<String> {
        let route = snapshot.route.as_ref()?;
        self.cached_paths
            .iter()
            .find(|p| p.as_str() == route.path)
            .cloned()
    }
}

impl RouteReuseStrategy for CachingReuseStrategy {
    fn should_reuse_route(&self, future: &RouteSnapshot, current: &RouteSnapshot) -> bool {
        DefaultRouteReuseStrategy.should_reuse_route(future, current)
    }

    fn should_detach(&self, snapshot: &RouteSnapshot) -> bool {
        self.cache_key(snapshot).is_some()
    }

    fn store(&self, snapshot: &RouteSnapshot, handle: DetachedRouteHandle) {
        if let Some(key) = self.cache_key(snapshot) {
            if let Ok(mut store) = self.store.lock() {
                store.insert(key, handle);
            }
        }
    }

    fn should_attach(&self, snapshot: &RouteSnapshot) -> bool {
        self.cache_key(snapshot)
            .is_some_and(|key| self.store.lock().map(|s| s.contains_key(&key)).unwrap_or(false))
    }

    fn retrieve(&self, snapshot: &RouteSnapshot) -> Option<DetachedRouteHandle> {
        let key = self.cache_key(snapshot)?;
        self.store.lock().ok()?.remove(&key)
    }
}
