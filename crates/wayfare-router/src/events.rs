// File: src/events.rs
// Purpose: Lifecycle event stream types

use serde::Serialize;

/// What triggered a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NavigationSource {
    /// A call to `navigate`/`navigate_by_url`.
    Imperative,
    /// A browser back/forward entry reported by the location adapter.
    Popstate,
    /// A hash-only URL change reported by the location adapter.
    HashChange,
}

/// Why a navigation was cancelled without an error. Guard redirects are
/// not cancellations; they restart recognition inside the same transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CancellationCode {
    /// A navigation with a higher id was requested while this one was in
    /// flight.
    SupersededByNewNavigation,
    /// A `can_activate`/`can_activate_child`/`can_deactivate`/`can_load`
    /// guard denied the navigation.
    GuardRejected,
    /// A resolver completed without producing a value.
    NoDataFromResolver,
}

/// Why a navigation was skipped before it started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipCode {
    /// The target URL equals the current URL and `on_same_url_navigation`
    /// is not `Reload`.
    IgnoredSameUrlNavigation,
}

/// Ordered lifecycle events emitted on the router's event stream.
///
/// Every event carries the id of the transition that produced it, so
/// consumers can correlate a `NavigationStart` with its terminal
/// `NavigationEnd`/`NavigationCancel`/`NavigationError` even when
/// navigations overlap. Events serialize, so hosts can mirror the stream
/// into logs or devtools as JSON.
#[derive(Debug, Clone, Serialize)]
pub enum RouterEvent {
    NavigationStart {
        id: u64,
        url: String,
        source: NavigationSource,
    },
    /// A lazy route configuration fetch began.
    RouteConfigLoadStart { id: u64, path: String },
    RouteConfigLoadEnd { id: u64, path: String },
    RoutesRecognized {
        id: u64,
        url: String,
        url_after_redirects: String,
    },
    GuardsCheckStart {
        id: u64,
        url: String,
        url_after_redirects: String,
    },
    GuardsCheckEnd {
        id: u64,
        url: String,
        url_after_redirects: String,
        should_activate: bool,
    },
    ResolveStart {
        id: u64,
        url: String,
        url_after_redirects: String,
    },
    ResolveEnd {
        id: u64,
        url: String,
        url_after_redirects: String,
    },
    ChildActivationStart { id: u64, path: String },
    ChildActivationEnd { id: u64, path: String },
    ActivationStart { id: u64, path: String },
    ActivationEnd { id: u64, path: String },
    NavigationEnd {
        id: u64,
        url: String,
        url_after_redirects: String,
    },
    NavigationCancel {
        id: u64,
        url: String,
        code: CancellationCode,
    },
    NavigationSkipped {
        id: u64,
        url: String,
        code: SkipCode,
    },
    NavigationError {
        id: u64,
        url: String,
        error: String,
    },
    /// Emitted by the scroll-restoration collaborator after a successful
    /// navigation settles.
    Scroll {
        id: u64,
        position: Option<(f64, f64)>,
        anchor: Option<String>,
    },
}

impl RouterEvent {
    /// Transition id this event belongs to.
    pub fn id(&self) -> u64 {
        match self {
            RouterEvent::NavigationStart { id, .. }
            | RouterEvent::RouteConfigLoadStart { id, .. }
            | RouterEvent::RouteConfigLoadEnd { id, .. }
            | RouterEvent::RoutesRecognized { id, .. }
            | RouterEvent::GuardsCheckStart { id, .. }
            | RouterEvent::GuardsCheckEnd { id, .. }
            | RouterEvent::ResolveStart { id, .. }
            | RouterEvent::ResolveEnd { id, .. }
            | RouterEvent::ChildActivationStart { id, .. }
            | RouterEvent::ChildActivationEnd { id, .. }
            | RouterEvent::ActivationStart { id, .. }
            | RouterEvent::ActivationEnd { id, .. }
            | RouterEvent::NavigationEnd { id, .. }
            | RouterEvent::NavigationCancel { id, .. }
            | RouterEvent::NavigationSkipped { id, .. }
            | RouterEvent::NavigationError { id, .. }
            | RouterEvent::Scroll { id, .. } => *id,
        }
    }
}
