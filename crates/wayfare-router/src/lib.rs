// File: src/lib.rs
// Purpose: Crate root - module wiring and the public API surface

//! An async client-side navigation engine.
//!
//! The router turns URL strings into trees of matched routes, runs guards
//! and resolvers against them, and commits the result atomically: the
//! current URL, the snapshot tree, and the live activated-route tree always
//! change together. Hosts observe progress on a broadcast event stream and
//! through `watch` channels on each activated route.
//!
//! ```no_run
//! use wayfare_router::{Route, Router};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let router = Router::builder(vec![
//!     Route::path("").component("Home").full_match().arc(),
//!     Route::path("users/:id").component("UserDetail").arc(),
//!     Route::wildcard().component("NotFound").arc(),
//! ])
//! .build()?;
//!
//! router.navigate_by_url("/users/42", Default::default()).await?;
//! assert_eq!(router.url(), "/users/42");
//! # Ok(())
//! # }
//! ```

mod checks;
mod commands;
mod config;
mod errors;
mod events;
mod guard;
mod loader;
mod location;
mod matcher;
mod recognize;
mod redirect;
mod reuse;
mod router;
mod scroll;
mod state;
mod title;

pub use wayfare_url as url;

pub use commands::{create_url_tree, NavigationExtras, QueryParamsHandling};
pub use config::{
    validate_config, PathMatch, Route, Routes, RunGuardsAndResolvers, UrlMatchResult, UrlMatcher,
    WILDCARD,
};
pub use errors::{BoxError, RouterError};
pub use events::{CancellationCode, NavigationSource, RouterEvent, SkipCode};
pub use guard::{
    CheckKind, Guard, GuardContext, GuardFuture, GuardOutcome, GuardService, ResolveFuture,
    Resolver,
};
pub use loader::{FnLoader, RouteLoader};
pub use location::{LocationAdapter, LocationChange, MemoryLocation};
pub use recognize::ParamInheritance;
pub use reuse::{
    CachingReuseStrategy, DefaultRouteReuseStrategy, DetachedRouteHandle, RouteReuseStrategy,
};
pub use router::{
    ErrorHandling, NavigationOutcome, OnSameUrlNavigation, Router, RouterBuilder, RouterOptions,
    UrlUpdateStrategy,
};
pub use scroll::{AnchorScrolling, ScrollManager, ScrollPositionRestoration};
pub use state::{
    ActivatedRoute, ComponentHandle, DataMap, LiveNode, NodeId, Params, RouteSnapshot, RouterState,
    SnapshotNode, SnapshotTree,
};
pub use title::{DefaultTitleStrategy, TitleStrategy};
