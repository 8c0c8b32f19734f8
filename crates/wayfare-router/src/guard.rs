// File: src/guard.rs
// Purpose: Guard and resolver abstractions and their combinator

use std::future::Future;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use serde_json::Value;
use wayfare_url::{UrlSegment, UrlTree};

use crate::config::Route;
use crate::errors::BoxError;
use crate::state::RouteSnapshot;

/// Result of one guard invocation.
#[derive(Debug, Clone)]
pub enum GuardOutcome {
    /// Let the navigation proceed past this checkpoint.
    Allow,
    /// Reject the navigation (`NavigationCancel` with `GuardRejected`), or,
    /// for `can_match`, fall through to the next route candidate.
    Deny,
    /// Abort this target and restart the navigation against a new URL tree
    /// within the same transition.
    Redirect(UrlTree),
}

impl GuardOutcome {
    pub fn is_allow(&self) -> bool {
        matches!(self, GuardOutcome::Allow)
    }
}

impl From<bool> for GuardOutcome {
    fn from(allowed: bool) -> Self {
        if allowed {
            GuardOutcome::Allow
        } else {
            GuardOutcome::Deny
        }
    }
}

/// Which checkpoint a guard is being invoked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    CanLoad,
    CanMatch,
    CanActivate,
    CanActivateChild,
    CanDeactivate,
}

/// Everything a guard can see when it runs.
///
/// `snapshot` is the node being entered for activation checks and the node
/// being left for deactivation checks; it is absent for `can_load` and
/// `can_match`, which run before a snapshot exists (those get the offered
/// `segments` instead).
#[derive(Debug, Clone)]
pub struct GuardContext {
    pub check: CheckKind,
    pub route: Option<Arc<Route>>,
    pub snapshot: Option<Arc<RouteSnapshot>>,
    pub segments: Vec<UrlSegment>,
    pub current_url: UrlTree,
    pub target_url: UrlTree,
}

/// Future returned by a guard.
pub type GuardFuture = BoxFuture<'static, Result<GuardOutcome, BoxError>>;

/// Object form of a guard: a service exposing a single check method.
pub trait GuardService: Send + Sync {
    fn check(&self, ctx: GuardContext) -> GuardFuture;
}

type GuardFn = dyn Fn(GuardContext) -> GuardFuture + Send + Sync;

/// A navigation guard, normalized at registration time.
///
/// Guards come in two forms - a plain async function or a service object -
/// and both collapse into a single callable here, so the orchestrator never
/// inspects what kind of guard it is running.
#[derive(Clone)]
pub enum Guard {
    Fn(Arc<GuardFn>),
    Service(Arc<dyn GuardService>),
}

impl Guard {
    /// Wraps an async closure as a guard.
    ///
    /// ```
    /// use wayfare_router::{Guard, GuardOutcome};
    ///
    /// let guard = Guard::from_fn(|_ctx| async { Ok(GuardOutcome::Allow) });
    /// # let _ = guard;
    /// ```
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(GuardContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<GuardOutcome, BoxError>> + Send + 'static,
    {
        Guard::Fn(Arc::new(move |ctx| Box::pin(f(ctx))))
    }

    /// Wraps a guard service object.
    pub fn from_service(service: Arc<dyn GuardService>) -> Self {
        Guard::Service(service)
    }

    /// A guard that always produces the same outcome. Handy in tests and
    /// for statically denying a route.
    pub fn always(outcome: GuardOutcome) -> Self {
        Guard::from_fn(move |_| {
            let outcome = outcome.clone();
            async move { Ok(outcome) }
        })
    }

    pub(crate) fn run(&self, ctx: GuardContext) -> GuardFuture {
        match self {
            Guard::Fn(f) => f(ctx),
            Guard::Service(s) => s.check(ctx),
        }
    }
}

impl std::fmt::Debug for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Guard::Fn(_) => f.write_str("Guard::Fn"),
            Guard::Service(_) => f.write_str("Guard::Service"),
        }
    }
}

/// Runs every guard in `guards`, then reduces the outcomes in declaration
/// order: the first non-`Allow` outcome wins, whether it is a `Deny` or a
/// `Redirect`. All guards are awaited before reduction, so results combine
/// deterministically by position, never by completion order.
pub(crate) async fn run_guards(
    guards: &[Guard],
    ctx: &GuardContext,
) -> Result<GuardOutcome, BoxError> {
    if guards.is_empty() {
        return Ok(GuardOutcome::Allow);
    }
    let outcomes = join_all(guards.iter().map(|g| g.run(ctx.clone()))).await;
    for outcome in outcomes {
        match outcome? {
            GuardOutcome::Allow => continue,
            terminal => return Ok(terminal),
        }
    }
    Ok(GuardOutcome::Allow)
}

/// Future returned by a resolver. `Ok(None)` means the resolver completed
/// without emitting a value, which cancels the navigation with
/// `NoDataFromResolver`.
pub type ResolveFuture = BoxFuture<'static, Result<Option<Value>, BoxError>>;

type ResolverFn = dyn Fn(Arc<RouteSnapshot>) -> ResolveFuture + Send + Sync;

/// A data resolver attached to a route. Runs during the resolve phase for
/// nodes on the activation checklist; its output lands in the snapshot's
/// `data` under the key it was registered with.
#[derive(Clone)]
pub struct Resolver(Arc<ResolverFn>);

impl Resolver {
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<RouteSnapshot>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Value>, BoxError>> + Send + 'static,
    {
        Resolver(Arc::new(move |snapshot| Box::pin(f(snapshot))))
    }

    /// A resolver that always yields the same value.
    pub fn value(value: Value) -> Self {
        Resolver::from_fn(move |_| {
            let value = value.clone();
            async move { Ok(Some(value)) }
        })
    }

    pub(crate) fn run(&self, snapshot: Arc<RouteSnapshot>) -> ResolveFuture {
        (self.0)(snapshot)
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Resolver")
    }
}
