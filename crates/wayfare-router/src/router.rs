// File: src/router.rs
// Purpose: The navigation pipeline - from requested URL to committed state

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tracing::{debug, instrument, trace};
use wayfare_url::{contains_tree, parse, serialize, UrlCompareOptions, UrlTree};

use crate::checks::{check_guards, compute_checks, run_resolvers, GuardDecision};
use crate::commands::{create_url_tree, NavigationExtras};
use crate::config::{validate_config, Routes};
use crate::errors::RouterError;
use crate::events::{CancellationCode, NavigationSource, RouterEvent, SkipCode};
use crate::loader::ConfigMemo;
use crate::location::{LocationAdapter, LocationChange, MemoryLocation};
use crate::recognize::{recognize, ParamInheritance, RecognizeError};
use crate::redirect::MAX_ABSOLUTE_REDIRECTS;
use crate::reuse::{DefaultRouteReuseStrategy, RouteReuseStrategy};
use crate::scroll::{AnchorScrolling, ScrollManager, ScrollPositionRestoration};
use crate::state::{advance_state, RouterState};
use crate::title::{DefaultTitleStrategy, TitleStrategy};

/// What a navigation to the current URL does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnSameUrlNavigation {
    /// Skip it, emitting `NavigationSkipped`.
    #[default]
    Ignore,
    /// Run the full pipeline again.
    Reload,
}

/// When the location reflects an in-flight navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UrlUpdateStrategy {
    /// Write the URL only after the navigation commits.
    #[default]
    Deferred,
    /// Write the URL as soon as the navigation starts; roll it back if the
    /// navigation does not commit.
    Eager,
}

/// What a navigation error does to the caller's handle. Malformed URL
/// input always propagates; this only covers failures inside the pipeline
/// (guards, resolvers, loaders, recognition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorHandling {
    /// The entry point returns the error.
    #[default]
    Propagate,
    /// The entry point swallows the error and returns
    /// [`NavigationOutcome::Failed`]. The `NavigationError` event fires
    /// either way.
    ResolveFalse,
}

/// Router-wide behavior switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouterOptions {
    pub on_same_url_navigation: OnSameUrlNavigation,
    pub url_update_strategy: UrlUpdateStrategy,
    pub param_inheritance: ParamInheritance,
    pub error_handling: ErrorHandling,
    pub scroll_restoration: ScrollPositionRestoration,
    pub anchor_scrolling: AnchorScrolling,
}

/// How a navigation request ended, short of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The navigation committed; the router's state and URL advanced.
    Committed,
    /// Same-URL navigation ignored.
    Skipped,
    Cancelled(CancellationCode),
    /// The navigation errored and [`ErrorHandling::ResolveFalse`] turned
    /// the error into an outcome.
    Failed,
}

impl NavigationOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, NavigationOutcome::Committed)
    }
}

struct Shared {
    current_url: UrlTree,
    state: RouterState,
    /// Whether any navigation has committed yet; the same-URL skip only
    /// applies afterwards.
    navigated: bool,
}

/// The navigation engine.
///
/// One router owns the route configuration, the committed state, the event
/// stream, and the collaborators (location, reuse, title, scroll). All
/// navigation entry points funnel into a single pipeline:
/// recognize, guards, resolvers, commit. Each phase boundary is a
/// cooperative checkpoint where a superseded navigation bows out.
///
/// ```no_run
/// use wayfare_router::{Route, Router};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let router = Router::builder(vec![
///     Route::path("home").component("Home").arc(),
///     Route::path("users/:id").component("User").arc(),
/// ])
/// .build()?;
///
/// let outcome = router.navigate_by_url("/users/42", Default::default()).await?;
/// assert!(outcome.is_committed());
/// assert_eq!(router.url(), "/users/42");
/// # Ok(())
/// # }
/// ```
pub struct Router {
    routes: Routes,
    options: RouterOptions,
    location: Arc<dyn LocationAdapter>,
    reuse: Arc<dyn RouteReuseStrategy>,
    title: Arc<dyn TitleStrategy>,
    scroll: ScrollManager,
    memo: ConfigMemo,
    events: broadcast::Sender<RouterEvent>,
    nav_seq: AtomicU64,
    /// Highest navigation id requested so far; in-flight navigations
    /// compare against it at checkpoints.
    latest: AtomicU64,
    shared: Mutex<Shared>,
}

/// Assembles a [`Router`], defaulting every collaborator.
pub struct RouterBuilder {
    routes: Routes,
    options: RouterOptions,
    location: Option<Arc<dyn LocationAdapter>>,
    reuse: Option<Arc<dyn RouteReuseStrategy>>,
    title: Option<Arc<dyn TitleStrategy>>,
}

impl RouterBuilder {
    pub fn options(mut self, options: RouterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn location(mut self, location: Arc<dyn LocationAdapter>) -> Self {
        self.location = Some(location);
        self
    }

    pub fn reuse_strategy(mut self, reuse: Arc<dyn RouteReuseStrategy>) -> Self {
        self.reuse = Some(reuse);
        self
    }

    pub fn title_strategy(mut self, title: Arc<dyn TitleStrategy>) -> Self {
        self.title = Some(title);
        self
    }

    /// Validates the configuration and builds the router.
    pub fn build(self) -> Result<Arc<Router>, RouterError> {
        validate_config(&self.routes)?;
        let (events, _) = broadcast::channel(64);
        let scroll = ScrollManager::new(
            self.options.scroll_restoration,
            self.options.anchor_scrolling,
        );
        Ok(Arc::new(Router {
            routes: self.routes,
            options: self.options,
            location: self
                .location
                .unwrap_or_else(|| Arc::new(MemoryLocation::new())),
            reuse: self
                .reuse
                .unwrap_or_else(|| Arc::new(DefaultRouteReuseStrategy)),
            title: self
                .title
                .unwrap_or_else(|| Arc::new(DefaultTitleStrategy::new())),
            scroll,
            memo: ConfigMemo::default(),
            events,
            nav_seq: AtomicU64::new(0),
            latest: AtomicU64::new(0),
            shared: Mutex::new(Shared {
                current_url: UrlTree::empty(),
                state: RouterState::initial(&UrlTree::empty()),
                navigated: false,
            }),
        }))
    }
}

impl Router {
    pub fn builder(routes: Routes) -> RouterBuilder {
        RouterBuilder {
            routes,
            options: RouterOptions::default(),
            location: None,
            reuse: None,
            title: None,
        }
    }

    /// Subscribes to the lifecycle event stream.
    pub fn events(&self) -> broadcast::Receiver<RouterEvent> {
        self.events.subscribe()
    }

    /// The serialized URL of the last committed navigation.
    pub fn url(&self) -> String {
        serialize(&self.lock_shared().current_url)
    }

    /// The committed router state.
    pub fn state(&self) -> RouterState {
        self.lock_shared().state.clone()
    }

    pub fn location(&self) -> &Arc<dyn LocationAdapter> {
        &self.location
    }

    pub fn scroll(&self) -> &ScrollManager {
        &self.scroll
    }

    /// Whether `url` is contained in the current URL under the given
    /// comparison options. Hosts use this to highlight active links.
    pub fn is_active(&self, url: &str, options: UrlCompareOptions) -> Result<bool, RouterError> {
        let target = parse(url)?;
        let current = self.lock_shared().current_url.clone();
        Ok(contains_tree(&current, &target, options))
    }

    /// Navigates to a serialized URL.
    pub async fn navigate_by_url(
        &self,
        url: &str,
        extras: NavigationExtras,
    ) -> Result<NavigationOutcome, RouterError> {
        let target = parse(url)?;
        let result = self
            .run_transition(target, NavigationSource::Imperative, extras)
            .await;
        self.settle(result)
    }

    /// Navigates via commands, e.g. `["users", "42"]`.
    pub async fn navigate(
        &self,
        commands: &[&str],
        extras: NavigationExtras,
    ) -> Result<NavigationOutcome, RouterError> {
        let current = self.lock_shared().current_url.clone();
        let target = create_url_tree(&current, commands, &extras)?;
        let result = self
            .run_transition(target, NavigationSource::Imperative, extras)
            .await;
        self.settle(result)
    }

    /// Navigates to whatever URL the location currently holds. Hosts call
    /// this once at startup.
    pub async fn initial_navigation(&self) -> Result<NavigationOutcome, RouterError> {
        let url = self.location.current();
        let target = parse(&url)?;
        let extras = NavigationExtras {
            replace_url: true,
            ..Default::default()
        };
        let result = self
            .run_transition(target, NavigationSource::Imperative, extras)
            .await;
        self.settle(result)
    }

    /// Reacts to a history change reported by the location adapter.
    pub async fn handle_location_change(
        &self,
        change: LocationChange,
    ) -> Result<NavigationOutcome, RouterError> {
        let target = parse(&change.url)?;
        let result = self
            .run_transition(target, change.source, NavigationExtras::default())
            .await;
        self.settle(result)
    }

    /// Spawns a task forwarding location changes into navigations.
    pub fn spawn_location_listener(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let router = Arc::clone(self);
        let mut changes = router.location.changes();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        if let Err(error) = router.handle_location_change(change).await {
                            debug!(%error, "history-triggered navigation failed");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    #[instrument(skip_all, fields(url = tracing::field::Empty))]
    async fn run_transition(
        &self,
        target: UrlTree,
        source: NavigationSource,
        extras: NavigationExtras,
    ) -> Result<NavigationOutcome, RouterError> {
        let target_url = serialize(&target);
        tracing::Span::current().record("url", target_url.as_str());

        let (current_url, previous_url_string, navigated) = {
            let shared = self.lock_shared();
            (
                shared.current_url.clone(),
                serialize(&shared.current_url),
                shared.navigated,
            )
        };

        let id = self.nav_seq.fetch_add(1, Ordering::SeqCst) + 1;
        // fetch_max, not store: a slower task must never move `latest`
        // backwards past an id it has already handed out.
        self.latest.fetch_max(id, Ordering::SeqCst);

        // Same-URL navigations are skipped unless configured to reload.
        if navigated
            && self.options.on_same_url_navigation == OnSameUrlNavigation::Ignore
            && target_url == previous_url_string
            && source == NavigationSource::Imperative
        {
            self.emit(RouterEvent::NavigationSkipped {
                id,
                url: target_url,
                code: SkipCode::IgnoredSameUrlNavigation,
            });
            return Ok(NavigationOutcome::Skipped);
        }

        self.emit(RouterEvent::NavigationStart {
            id,
            url: target_url.clone(),
            source,
        });

        let eager = self.options.url_update_strategy == UrlUpdateStrategy::Eager
            && !extras.skip_location_change
            && source == NavigationSource::Imperative;
        if eager {
            self.write_location(&target_url, extras.replace_url);
        }
        let rollback = |outcome_is_commit: bool| {
            if eager && !outcome_is_commit {
                self.location.replace(&previous_url_string);
            }
        };

        // Recognize and check guards. A guard redirect loops back here with
        // a new target; the transition id stays the same throughout.
        let notify = |event: RouterEvent| self.emit(event);
        let mut attempt = target;
        let mut replace_url = extras.replace_url;
        let mut guard_redirects = 0u32;
        let (mut future_tree, final_url, checks) = loop {
            let recognized = match recognize(
                &self.routes,
                &self.memo,
                &attempt,
                &current_url,
                self.options.param_inheritance,
                id,
                &notify,
            )
            .await
            {
                Ok(recognized) => recognized,
                Err(RecognizeError::Rejected) => {
                    rollback(false);
                    return Ok(self.cancel(id, &target_url, CancellationCode::GuardRejected));
                }
                Err(RecognizeError::Failed(error)) => {
                    rollback(false);
                    return Err(self.fail(id, &target_url, error));
                }
            };
            let mut future_tree = recognized.tree;
            let final_url = recognized.url_after_redirects;
            let final_url_string = serialize(&final_url);

            if self.superseded(id) {
                return Ok(self.cancel(
                    id,
                    &target_url,
                    CancellationCode::SupersededByNewNavigation,
                ));
            }
            self.emit(RouterEvent::RoutesRecognized {
                id,
                url: target_url.clone(),
                url_after_redirects: final_url_string.clone(),
            });

            // Guards.
            let previous_tree = self.lock_shared().state.snapshot.clone();
            let checks = compute_checks(&previous_tree, &mut future_tree);

            self.emit(RouterEvent::GuardsCheckStart {
                id,
                url: target_url.clone(),
                url_after_redirects: final_url_string.clone(),
            });
            let decision = match check_guards(
                &checks,
                &future_tree,
                &current_url,
                &final_url,
                id,
                &notify,
            )
            .await
            {
                Ok(decision) => decision,
                Err(error) => {
                    rollback(false);
                    return Err(self.fail(id, &target_url, error));
                }
            };
            let should_activate = matches!(decision, GuardDecision::Allow);
            self.emit(RouterEvent::GuardsCheckEnd {
                id,
                url: target_url.clone(),
                url_after_redirects: final_url_string.clone(),
                should_activate,
            });

            match decision {
                GuardDecision::Allow => break (future_tree, final_url, checks),
                GuardDecision::Deny => {
                    rollback(false);
                    return Ok(self.cancel(id, &target_url, CancellationCode::GuardRejected));
                }
                GuardDecision::Redirect(redirect_target) => {
                    guard_redirects += 1;
                    if guard_redirects > MAX_ABSOLUTE_REDIRECTS {
                        rollback(false);
                        return Err(self.fail(
                            id,
                            &target_url,
                            RouterError::InvalidConfig(
                                "guard redirects exceeded the navigation limit".to_string(),
                            ),
                        ));
                    }
                    debug!(id, url = %serialize(&redirect_target), "guard redirected, restarting recognition");
                    replace_url = true;
                    attempt = redirect_target;
                }
            }
        };
        let final_url_string = serialize(&final_url);

        if self.superseded(id) {
            return Ok(self.cancel(id, &target_url, CancellationCode::SupersededByNewNavigation));
        }

        // Resolvers.
        self.emit(RouterEvent::ResolveStart {
            id,
            url: target_url.clone(),
            url_after_redirects: final_url_string.clone(),
        });
        let resolved = match run_resolvers(
            &checks,
            &mut future_tree,
            self.options.param_inheritance,
        )
        .await
        {
            Ok(resolved) => resolved,
            Err(error) => {
                rollback(false);
                return Err(self.fail(id, &target_url, error));
            }
        };
        self.emit(RouterEvent::ResolveEnd {
            id,
            url: target_url.clone(),
            url_after_redirects: final_url_string.clone(),
        });
        if !resolved {
            rollback(false);
            return Ok(self.cancel(id, &target_url, CancellationCode::NoDataFromResolver));
        }

        // Commit: one critical section swaps URL and state together, so no
        // observer ever sees one without the other.
        let activation_order: Vec<_> = checks.activations().to_vec();
        {
            let mut shared = self.lock_shared();
            if self.superseded(id) {
                drop(shared);
                return Ok(self.cancel(
                    id,
                    &target_url,
                    CancellationCode::SupersededByNewNavigation,
                ));
            }
            let next_root = advance_state(&shared.state, &future_tree, self.reuse.as_ref());
            shared.current_url = final_url.clone();
            shared.state = RouterState {
                snapshot: future_tree.clone(),
                root: next_root,
            };
            shared.navigated = true;
        }

        for &node in activation_order.iter().rev() {
            self.emit(RouterEvent::ActivationEnd {
                id,
                path: future_tree.snapshot(node).path(),
            });
            if let Some(parent) = future_tree.parent(node) {
                self.emit(RouterEvent::ChildActivationEnd {
                    id,
                    path: future_tree.snapshot(parent).path(),
                });
            }
        }

        if !extras.skip_location_change {
            if eager {
                // The target was written upfront; only redirects need a
                // correction.
                if final_url_string != target_url {
                    self.location.replace(&final_url_string);
                }
            } else if source == NavigationSource::Imperative {
                self.write_location(&final_url_string, replace_url);
            } else if final_url_string != target_url {
                // History already moved; only redirects need a correction.
                self.location.replace(&final_url_string);
            }
        }

        self.emit(RouterEvent::NavigationEnd {
            id,
            url: target_url.clone(),
            url_after_redirects: final_url_string.clone(),
        });

        self.title.on_navigation_end(&future_tree);
        self.emit(self.scroll.scroll_event(
            id,
            &final_url_string,
            final_url.fragment.as_deref(),
            source,
        ));

        trace!(id, url = %final_url_string, "navigation committed");
        Ok(NavigationOutcome::Committed)
    }

    fn write_location(&self, url: &str, replace: bool) {
        if replace {
            self.location.replace(url);
        } else {
            self.location.push(url);
        }
    }

    fn settle(
        &self,
        result: Result<NavigationOutcome, RouterError>,
    ) -> Result<NavigationOutcome, RouterError> {
        match result {
            Err(error) if self.options.error_handling == ErrorHandling::ResolveFalse => {
                debug!(%error, "navigation error resolved to a failed outcome");
                Ok(NavigationOutcome::Failed)
            }
            other => other,
        }
    }

    fn superseded(&self, id: u64) -> bool {
        self.latest.load(Ordering::SeqCst) > id
    }

    fn cancel(&self, id: u64, url: &str, code: CancellationCode) -> NavigationOutcome {
        debug!(id, url, ?code, "navigation cancelled");
        self.emit(RouterEvent::NavigationCancel {
            id,
            url: url.to_string(),
            code,
        });
        NavigationOutcome::Cancelled(code)
    }

    fn fail(&self, id: u64, url: &str, error: RouterError) -> RouterError {
        self.emit(RouterEvent::NavigationError {
            id,
            url: url.to_string(),
            error: error.to_string(),
        });
        error
    }

    fn emit(&self, event: RouterEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn lock_shared(&self) -> MutexGuard<'_, Shared> {
        // Poisoning cannot leave the state half-written; the commit section
        // only swaps whole values.
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }
}
