// File: src/recognize.rs
// Purpose: Turn a URL tree into a route snapshot tree, applying redirects

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::warn;
use wayfare_url::{serialize, UrlSegment, UrlSegmentGroup, UrlTree, PRIMARY_OUTLET};

use crate::config::{PathMatch, Route, Routes};
use crate::errors::RouterError;
use crate::events::RouterEvent;
use crate::guard::{run_guards, CheckKind, GuardContext, GuardOutcome};
use crate::loader::ConfigMemo;
use crate::matcher::match_route;
use crate::redirect::{apply_redirect, is_absolute, linearize, RedirectError, MAX_ABSOLUTE_REDIRECTS};
use crate::state::{DataMap, NodeId, Params, RouteSnapshot, SnapshotTree};

/// How a node inherits params and data from its ancestors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamInheritance {
    /// Inherit through empty-path routes and componentless parents only.
    /// The default.
    #[default]
    EmptyOnly,
    /// Every node sees its ancestors' params and data.
    Always,
}

/// A successfully recognized navigation: the snapshot tree plus the URL
/// that remains after every redirect was applied.
#[derive(Debug)]
pub(crate) struct Recognized {
    pub tree: SnapshotTree,
    pub url_after_redirects: UrlTree,
}

/// Why recognition gave up on a navigation.
#[derive(Debug)]
pub(crate) enum RecognizeError {
    /// A `can_load` guard denied the navigation.
    Rejected,
    Failed(RouterError),
}

/// Internal abort signal while walking candidates. `NoMatch` makes the
/// caller try the next candidate; everything else unwinds the whole walk.
enum Abort {
    NoMatch,
    Rejected,
    Redirect(UrlTree),
    Error(RouterError),
}

/// Matched route tree before inheritance is applied.
struct RecogNode {
    snapshot: RouteSnapshot,
    children: Vec<RecogNode>,
}

/// Recognizes `target` against `routes`.
///
/// Redirects restart recognition against the rewritten URL within the same
/// call. The restart count is capped; past the cap redirecting routes stop
/// matching, so a redirect cycle degrades into `NoMatch` instead of
/// looping or erroring.
pub(crate) async fn recognize(
    routes: &Routes,
    memo: &ConfigMemo,
    target: &UrlTree,
    current_url: &UrlTree,
    inheritance: ParamInheritance,
    nav_id: u64,
    notify: &(dyn Fn(RouterEvent) + Send + Sync),
) -> Result<Recognized, RecognizeError> {
    let mut url = target.clone();
    let mut redirects_applied = 0u32;
    let mut allow_redirects = true;

    loop {
        let attempt = Attempt {
            routes,
            memo,
            target: &url,
            current_url,
            allow_redirects,
            nav_id,
            notify,
        };
        match attempt.run().await {
            Ok(nodes) => {
                let tree = build_tree(nodes, &url, inheritance);
                return Ok(Recognized {
                    tree,
                    url_after_redirects: url,
                });
            }
            Err(Abort::Redirect(tree)) => {
                redirects_applied += 1;
                if redirects_applied > MAX_ABSOLUTE_REDIRECTS {
                    if allow_redirects {
                        warn!(
                            url = %serialize(&tree),
                            "redirect limit reached, disabling further redirects"
                        );
                    }
                    allow_redirects = false;
                }
                url = tree;
            }
            Err(Abort::NoMatch) => {
                return Err(RecognizeError::Failed(RouterError::NoMatch {
                    url: serialize(&url),
                }))
            }
            Err(Abort::Rejected) => return Err(RecognizeError::Rejected),
            Err(Abort::Error(e)) => return Err(RecognizeError::Failed(e)),
        }
    }
}

struct Attempt<'a> {
    routes: &'a Routes,
    memo: &'a ConfigMemo,
    target: &'a UrlTree,
    current_url: &'a UrlTree,
    allow_redirects: bool,
    nav_id: u64,
    notify: &'a (dyn Fn(RouterEvent) + Send + Sync),
}

impl Attempt<'_> {
    async fn run(&self) -> Result<Vec<RecogNode>, Abort> {
        let root = &self.target.root;
        if root.has_children() {
            self.process_children(self.routes, root, &[]).await
        } else {
            let empty = UrlSegmentGroup::default();
            self.process_segment(self.routes, &empty, &[], PRIMARY_OUTLET, &[])
                .await
        }
    }

    /// Matches every child outlet of `group`, primary first so its
    /// redirects and errors win over auxiliary outlets.
    fn process_children<'s>(
        &'s self,
        routes: &'s [Arc<Route>],
        group: &'s UrlSegmentGroup,
        prefix: &'s [UrlSegment],
    ) -> BoxFuture<'s, Result<Vec<RecogNode>, Abort>> {
        Box::pin(async move {
            let mut outlets: Vec<&str> = group.children.keys().map(String::as_str).collect();
            if let Some(pos) = outlets.iter().position(|o| *o == PRIMARY_OUTLET) {
                outlets.remove(pos);
                outlets.insert(0, PRIMARY_OUTLET);
            }

            let mut nodes = Vec::new();
            for outlet in outlets {
                let child = &group.children[outlet];
                let mut matched = self
                    .process_segment(routes, child, &child.segments, outlet, prefix)
                    .await?;
                nodes.append(&mut matched);
            }
            Ok(merge_empty_path_matches(nodes))
        })
    }

    /// Tries candidates in declaration order; the first structural match
    /// whose `can_match` guards allow it wins.
    fn process_segment<'s>(
        &'s self,
        routes: &'s [Arc<Route>],
        group: &'s UrlSegmentGroup,
        segments: &'s [UrlSegment],
        outlet: &'s str,
        prefix: &'s [UrlSegment],
    ) -> BoxFuture<'s, Result<Vec<RecogNode>, Abort>> {
        Box::pin(async move {
            for route in routes {
                match self
                    .process_route(route, group, segments, outlet, prefix)
                    .await
                {
                    Err(Abort::NoMatch) => continue,
                    other => return other,
                }
            }
            Err(Abort::NoMatch)
        })
    }

    fn process_route<'s>(
        &'s self,
        route: &'s Arc<Route>,
        group: &'s UrlSegmentGroup,
        segments: &'s [UrlSegment],
        outlet: &'s str,
        prefix: &'s [UrlSegment],
    ) -> BoxFuture<'s, Result<Vec<RecogNode>, Abort>> {
        Box::pin(async move {
            // An empty-path route can stand in for a non-primary outlet: it
            // consumes nothing and fans out to children filling that outlet.
            if route.outlet != outlet
                && (outlet == PRIMARY_OUTLET || !empty_path_candidate(group, segments, route))
            {
                return Err(Abort::NoMatch);
            }

            if let Some(redirect_to) = &route.redirect_to {
                if !self.allow_redirects {
                    return Err(Abort::NoMatch);
                }
                let matched = match_route(segments, group, route).ok_or(Abort::NoMatch)?;
                self.check_can_match(route, &matched.consumed).await?;

                let trailing = if is_absolute(redirect_to) {
                    Vec::new()
                } else {
                    // Relative rewrites need a single linear tail; a
                    // branching remainder cannot be spliced.
                    let mut tail = matched.remaining.clone();
                    tail.extend(linear_tail(group).ok_or(Abort::NoMatch)?);
                    tail
                };
                let tree = apply_redirect(
                    redirect_to,
                    &matched.positional,
                    prefix,
                    &trailing,
                    &self.target.query_params,
                    self.target.fragment.as_deref(),
                )
                .map_err(|RedirectError::MissingParam(name)| {
                    Abort::Error(RouterError::InvalidConfig(format!(
                        "redirect target {redirect_to:?} references unknown parameter {name:?}"
                    )))
                })?;
                return Err(Abort::Redirect(tree));
            }

            let matched = match_route(segments, group, route).ok_or(Abort::NoMatch)?;
            self.check_can_match(route, &matched.consumed).await?;
            let child_routes = self.child_routes(route, &matched.consumed).await?;

            let snapshot = RouteSnapshot {
                url: matched.consumed.clone(),
                params: matched.params,
                query_params: self.target.query_params.clone(),
                fragment: self.target.fragment.clone(),
                data: route.data.clone(),
                outlet: route.outlet.clone(),
                component: route.component.clone(),
                route: Some(Arc::clone(route)),
                resolved_data: DataMap::new(),
            };

            let mut new_prefix = prefix.to_vec();
            new_prefix.extend(matched.consumed.iter().cloned());

            let children = if matched.remaining.is_empty() && group.has_children() {
                self.process_children(&child_routes, group, &new_prefix)
                    .await?
            } else if matched.remaining.is_empty() {
                if child_routes.is_empty() {
                    Vec::new()
                } else {
                    // The URL is exhausted; only empty-path children can
                    // still match, and none matching is fine.
                    let empty = UrlSegmentGroup::default();
                    match self
                        .process_segment(&child_routes, &empty, &[], outlet, &new_prefix)
                        .await
                    {
                        Ok(children) => children,
                        Err(Abort::NoMatch) => Vec::new(),
                        Err(other) => return Err(other),
                    }
                }
            } else {
                if child_routes.is_empty() {
                    return Err(Abort::NoMatch);
                }
                self.process_segment(&child_routes, group, &matched.remaining, outlet, &new_prefix)
                    .await?
            };

            Ok(vec![RecogNode { snapshot, children }])
        })
    }

    /// `can_match` runs after the structural match. `Deny` falls through to
    /// the next candidate; a redirect aborts matching entirely.
    async fn check_can_match(
        &self,
        route: &Arc<Route>,
        consumed: &[UrlSegment],
    ) -> Result<(), Abort> {
        if route.can_match.is_empty() {
            return Ok(());
        }
        let ctx = self.guard_ctx(CheckKind::CanMatch, route, consumed);
        match run_guards(&route.can_match, &ctx).await {
            Ok(GuardOutcome::Allow) => Ok(()),
            Ok(GuardOutcome::Deny) => Err(Abort::NoMatch),
            // Once redirects are disabled a redirecting guard cannot keep
            // the navigation spinning; its route just stops matching.
            Ok(GuardOutcome::Redirect(_)) if !self.allow_redirects => Err(Abort::NoMatch),
            Ok(GuardOutcome::Redirect(tree)) => Err(Abort::Redirect(tree)),
            Err(source) => Err(Abort::Error(RouterError::GuardFailed {
                path: route.path.clone(),
                source,
            })),
        }
    }

    /// The child configs of `route`: static children, or the lazily loaded
    /// set gated by `can_load` on first use.
    async fn child_routes(
        &self,
        route: &Arc<Route>,
        consumed: &[UrlSegment],
    ) -> Result<Routes, Abort> {
        if let Some(loaded) = self.memo.get(route) {
            return Ok(loaded);
        }
        if !route.is_lazy() {
            return Ok(route.children.clone());
        }

        let ctx = self.guard_ctx(CheckKind::CanLoad, route, consumed);
        match run_guards(&route.can_load, &ctx).await {
            Ok(GuardOutcome::Allow) => {}
            Ok(GuardOutcome::Deny) => return Err(Abort::Rejected),
            Ok(GuardOutcome::Redirect(_)) if !self.allow_redirects => return Err(Abort::Rejected),
            Ok(GuardOutcome::Redirect(tree)) => return Err(Abort::Redirect(tree)),
            Err(source) => {
                return Err(Abort::Error(RouterError::GuardFailed {
                    path: route.path.clone(),
                    source,
                }))
            }
        }

        (self.notify)(RouterEvent::RouteConfigLoadStart {
            id: self.nav_id,
            path: route.path.clone(),
        });
        let loaded = self.memo.load(route).await.map_err(Abort::Error)?;
        (self.notify)(RouterEvent::RouteConfigLoadEnd {
            id: self.nav_id,
            path: route.path.clone(),
        });
        Ok(loaded)
    }

    fn guard_ctx(
        &self,
        check: CheckKind,
        route: &Arc<Route>,
        consumed: &[UrlSegment],
    ) -> GuardContext {
        GuardContext {
            check,
            route: Some(Arc::clone(route)),
            snapshot: None,
            segments: consumed.to_vec(),
            current_url: self.current_url.clone(),
            target_url: self.target.clone(),
        }
    }
}

/// Whether `route` may match on behalf of an outlet it does not declare:
/// only empty-path routes qualify, and a `Full` match still refuses
/// leftovers.
fn empty_path_candidate(group: &UrlSegmentGroup, segments: &[UrlSegment], route: &Route) -> bool {
    if route.path_match == PathMatch::Full && (group.has_children() || !segments.is_empty()) {
        return false;
    }
    route.is_empty_path()
}

/// Collapses sibling branches that matched the same empty-path route into
/// one node carrying all of their children, so a shell route appears once
/// no matter how many outlets it fanned out to.
fn merge_empty_path_matches(nodes: Vec<RecogNode>) -> Vec<RecogNode> {
    let mut merged: Vec<RecogNode> = Vec::new();
    for node in nodes {
        let slot = match node.snapshot.route.as_ref() {
            Some(route) if route.is_empty_path() => merged.iter().position(|m| {
                m.snapshot
                    .route
                    .as_ref()
                    .is_some_and(|other| Arc::ptr_eq(other, route))
            }),
            _ => None,
        };
        match slot {
            Some(index) => merged[index].children.extend(node.children),
            None => merged.push(node),
        }
    }
    merged
}

/// The linear run of segments hanging below `group`, or `None` when the
/// children branch.
fn linear_tail(group: &UrlSegmentGroup) -> Option<Vec<UrlSegment>> {
    match group.children.len() {
        0 => Some(Vec::new()),
        1 => linearize(group.child(PRIMARY_OUTLET)?),
        _ => None,
    }
}

fn build_tree(nodes: Vec<RecogNode>, url: &UrlTree, inheritance: ParamInheritance) -> SnapshotTree {
    let mut tree = SnapshotTree::new(RouteSnapshot::root(url));
    let root = tree.root();
    for node in nodes {
        attach(&mut tree, root, node, inheritance);
    }
    tree
}

fn attach(tree: &mut SnapshotTree, parent: NodeId, node: RecogNode, inheritance: ParamInheritance) {
    let merged = inherit_into(tree.snapshot(parent), node.snapshot, inheritance);
    let id = tree.add_child(parent, merged);
    for child in node.children {
        attach(tree, id, child, inheritance);
    }
}

/// Whether a node with `route` inherits its parent's effective params and
/// data. Parents carry already-merged values, so one level of lookup
/// suffices for the whole ancestor chain.
pub(crate) fn should_inherit(
    inheritance: ParamInheritance,
    route: Option<&Arc<Route>>,
    parent_route: Option<&Arc<Route>>,
) -> bool {
    match inheritance {
        ParamInheritance::Always => true,
        ParamInheritance::EmptyOnly => {
            route.is_some_and(|r| r.is_empty_path())
                || parent_route.is_some_and(|p| p.component.is_none())
        }
    }
}

fn inherit_into(
    parent: &Arc<RouteSnapshot>,
    snapshot: RouteSnapshot,
    inheritance: ParamInheritance,
) -> RouteSnapshot {
    if !should_inherit(inheritance, snapshot.route.as_ref(), parent.route.as_ref()) {
        return snapshot;
    }
    let mut params: Params = parent.params.clone();
    params.extend(snapshot.params.clone());
    let mut data: DataMap = parent.data.clone();
    data.extend(snapshot.data.clone());
    RouteSnapshot {
        params,
        data,
        ..snapshot
    }
}
