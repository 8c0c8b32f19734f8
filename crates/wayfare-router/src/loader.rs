// File: src/loader.rs
// Purpose: Lazy route-config loading with identity-keyed memoization

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tracing::debug;

use crate::config::{Route, Routes};
use crate::errors::{BoxError, RouterError};

/// Loads the child routes of a lazily configured route.
///
/// Invoked at most once per route; the router memoizes the result keyed by
/// route identity, so repeated navigations into the same branch reuse the
/// loaded config.
pub trait RouteLoader: Send + Sync {
    fn load(&self, route: Arc<Route>) -> BoxFuture<'static, Result<Routes, BoxError>>;
}

impl<F> RouteLoader for F
where
    F: Fn(Arc<Route>) -> BoxFuture<'static, Result<Routes, BoxError>> + Send + Sync,
{
    fn load(&self, route: Arc<Route>) -> BoxFuture<'static, Result<Routes, BoxError>> {
        self(route)
    }
}

/// Side-table of loaded configs, keyed by `Arc<Route>` pointer identity.
///
/// Keeping this off the `Route` itself keeps route configs pure data; the
/// memo is owned by the router instance, not global.
#[derive(Default)]
pub(crate) struct ConfigMemo {
    loaded: Mutex<HashMap<usize, Routes>>,
}

impl ConfigMemo {
    pub(crate) fn get(&self, route: &Arc<Route>) -> Option<Routes> {
        self.loaded
            .lock()
            .ok()
            .and_then(|map| map.get(&key_of(route)).cloned())
    }

    pub(crate) fn is_loaded(&self, route: &Arc<Route>) -> bool {
        self.get(route).is_some()
    }

    /// Loads (or returns the memoized) children for `route`.
    pub(crate) async fn load(&self, route: &Arc<Route>) -> Result<Routes, RouterError> {
        if let Some(routes) = self.get(route) {
            return Ok(routes);
        }
        let loader = match &route.load_children {
            Some(loader) => Arc::clone(loader),
            None => return Ok(Vec::new()),
        };
        debug!(path = %route.path, "loading lazy route config");
        let routes = loader
            .load(Arc::clone(route))
            .await
            .map_err(|source| RouterError::LoadFailed {
                path: route.path.clone(),
                source,
            })?;
        if let Ok(mut map) = self.loaded.lock() {
            map.insert(key_of(route), routes.clone());
        }
        Ok(routes)
    }
}

fn key_of(route: &Arc<Route>) -> usize {
    Arc::as_ptr(route) as usize
}

/// Convenience loader wrapping an async closure.
///
/// ```
/// use wayfare_router::{FnLoader, Route};
///
/// let route = Route::path("admin").load_children(FnLoader::new(|| async {
///     Ok(vec![Route::path("").component("AdminHome").arc()])
/// }));
/// # let _ = route;
/// ```
pub struct FnLoader<F>(F);

impl<F, Fut> FnLoader<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Routes, BoxError>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F, Fut> RouteLoader for FnLoader<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Routes, BoxError>> + Send + 'static,
{
    fn load(&self, _route: Arc<Route>) -> BoxFuture<'static, Result<Routes, BoxError>> {
        Box::pin((self.0)())
    }
}
