// File: src/checks.rs
// Purpose: Diff two snapshot trees into checklists, run guards and resolvers

use std::sync::Arc;

use futures::future::join_all;
use tracing::debug;
use wayfare_url::UrlTree;

use crate::config::{Route, RunGuardsAndResolvers};
use crate::errors::RouterError;
use crate::events::RouterEvent;
use crate::guard::{run_guards, CheckKind, GuardContext, GuardOutcome};
use crate::recognize::{should_inherit, ParamInheritance};
use crate::state::{DataMap, NodeId, RouteSnapshot, SnapshotTree};

/// What the guard phase decided.
#[derive(Debug)]
pub(crate) enum GuardDecision {
    Allow,
    Deny,
    Redirect(UrlTree),
}

/// The per-navigation checklists produced by diffing the committed snapshot
/// tree against the freshly recognized one.
pub(crate) struct Checks {
    /// Snapshots leaving the state, deepest first, so children deactivate
    /// before their parents.
    deactivations: Vec<Arc<RouteSnapshot>>,
    /// Future-tree nodes entering the state or re-running their guards,
    /// parents before children.
    activations: Vec<NodeId>,
}

impl Checks {
    pub(crate) fn activation_count(&self) -> usize {
        self.activations.len()
    }

    /// Entering nodes, parents before children.
    pub(crate) fn activations(&self) -> &[NodeId] {
        &self.activations
    }
}

/// Pairs the two trees outlet by outlet and decides, per node, whether its
/// guards and resolvers run again.
///
/// Reused nodes that stay quiet keep their previously resolved data; the
/// future snapshot is patched here so the commit carries it forward.
pub(crate) fn compute_checks(
    previous: &SnapshotTree,
    future: &mut SnapshotTree,
) -> Checks {
    let mut checks = Checks {
        deactivations: Vec::new(),
        activations: Vec::new(),
    };
    diff_children(previous, previous.root(), future, future.root(), &mut checks);
    checks
}

fn diff_children(
    previous: &SnapshotTree,
    prev_id: NodeId,
    future: &mut SnapshotTree,
    fut_id: NodeId,
    checks: &mut Checks,
) {
    let fut_children: Vec<NodeId> = future.children(fut_id).to_vec();

    for fut_child in &fut_children {
        let outlet = future.snapshot(*fut_child).outlet.clone();
        match previous.child_by_outlet(prev_id, &outlet) {
            Some(prev_child) if same_route(previous.snapshot(prev_child), future.snapshot(*fut_child)) => {
                let prev_snapshot = previous.snapshot(prev_child).clone();
                let fut_snapshot = future.snapshot(*fut_child).clone();
                if should_run(&prev_snapshot, &fut_snapshot) {
                    checks.activations.push(*fut_child);
                } else {
                    carry_over(&prev_snapshot, future, *fut_child);
                }
                diff_children(previous, prev_child, future, *fut_child, checks);
            }
            Some(prev_child) => {
                deactivate_subtree(previous, prev_child, checks);
                activate_subtree(future, *fut_child, checks);
            }
            None => activate_subtree(future, *fut_child, checks),
        }
    }

    for prev_child in previous.children(prev_id) {
        let outlet = &previous.snapshot(*prev_child).outlet;
        let survives = fut_children
            .iter()
            .any(|&c| &future.snapshot(c).outlet == outlet);
        if !survives {
            deactivate_subtree(previous, *prev_child, checks);
        }
    }
}

fn same_route(prev: &Arc<RouteSnapshot>, fut: &Arc<RouteSnapshot>) -> bool {
    match (&prev.route, &fut.route) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn activate_subtree(future: &SnapshotTree, id: NodeId, checks: &mut Checks) {
    checks.activations.push(id);
    for child in future.children(id) {
        activate_subtree(future, *child, checks);
    }
}

fn deactivate_subtree(previous: &SnapshotTree, id: NodeId, checks: &mut Checks) {
    for child in previous.children(id) {
        deactivate_subtree(previous, *child, checks);
    }
    checks.deactivations.push(previous.snapshot(id).clone());
}

/// Whether a reused node's guards and resolvers re-run, per its
/// `run_guards_and_resolvers` policy.
fn should_run(prev: &RouteSnapshot, fut: &RouteSnapshot) -> bool {
    let policy = fut
        .route
        .as_ref()
        .map(|r| r.run_guards_and_resolvers)
        .unwrap_or_default();

    let paths_equal = prev.url.len() == fut.url.len()
        && prev
            .url
            .iter()
            .zip(&fut.url)
            .all(|(a, b)| a.path == b.path);
    let segments_equal =
        paths_equal && prev.url == fut.url && prev.params == fut.params;
    let query_changed = prev.query_params != fut.query_params;

    match policy {
        RunGuardsAndResolvers::Always => true,
        RunGuardsAndResolvers::ParamsChange => !segments_equal,
        RunGuardsAndResolvers::ParamsOrQueryParamsChange => !segments_equal || query_changed,
        RunGuardsAndResolvers::PathParamsChange => !paths_equal,
        RunGuardsAndResolvers::PathParamsOrQueryParamsChange => !paths_equal || query_changed,
    }
}

/// A quiet reused node keeps the data it resolved last time.
fn carry_over(prev: &RouteSnapshot, future: &mut SnapshotTree, id: NodeId) {
    let mut snapshot = (**future.snapshot(id)).clone();
    snapshot.data = prev.data.clone();
    snapshot.resolved_data = prev.resolved_data.clone();
    future.replace_snapshot(id, snapshot);
}

/// Runs every guard on the checklists.
///
/// Order: `can_deactivate` of leaving nodes, children before parents; then,
/// per entering node top-down, the `can_activate_child` guards of its
/// ancestors followed by its own `can_activate`. The first `Deny` or
/// redirect ends the phase.
pub(crate) async fn check_guards(
    checks: &Checks,
    future: &SnapshotTree,
    current_url: &UrlTree,
    target_url: &UrlTree,
    nav_id: u64,
    notify: &(dyn Fn(RouterEvent) + Send + Sync),
) -> Result<GuardDecision, RouterError> {
    for leaving in &checks.deactivations {
        let Some(route) = &leaving.route else { continue };
        if route.can_deactivate.is_empty() {
            continue;
        }
        let ctx = GuardContext {
            check: CheckKind::CanDeactivate,
            route: Some(Arc::clone(route)),
            snapshot: Some(Arc::clone(leaving)),
            segments: leaving.url.clone(),
            current_url: current_url.clone(),
            target_url: target_url.clone(),
        };
        match run_one(&route.can_deactivate, &ctx, route).await? {
            GuardDecision::Allow => {}
            other => return Ok(other),
        }
    }

    for &id in &checks.activations {
        let snapshot = future.snapshot(id).clone();
        let Some(route) = snapshot.route.clone() else { continue };

        if let Some(parent) = future.parent(id) {
            notify(RouterEvent::ChildActivationStart {
                id: nav_id,
                path: future.snapshot(parent).path(),
            });
        }
        notify(RouterEvent::ActivationStart {
            id: nav_id,
            path: snapshot.path(),
        });

        for ancestor_route in ancestor_routes(future, id) {
            if ancestor_route.can_activate_child.is_empty() {
                continue;
            }
            let ctx = GuardContext {
                check: CheckKind::CanActivateChild,
                route: Some(Arc::clone(&ancestor_route)),
                snapshot: Some(Arc::clone(&snapshot)),
                segments: snapshot.url.clone(),
                current_url: current_url.clone(),
                target_url: target_url.clone(),
            };
            match run_one(&ancestor_route.can_activate_child, &ctx, &ancestor_route).await? {
                GuardDecision::Allow => {}
                other => return Ok(other),
            }
        }

        if route.can_activate.is_empty() {
            continue;
        }
        let ctx = GuardContext {
            check: CheckKind::CanActivate,
            route: Some(Arc::clone(&route)),
            snapshot: Some(Arc::clone(&snapshot)),
            segments: snapshot.url.clone(),
            current_url: current_url.clone(),
            target_url: target_url.clone(),
        };
        match run_one(&route.can_activate, &ctx, &route).await? {
            GuardDecision::Allow => {}
            other => return Ok(other),
        }
    }

    Ok(GuardDecision::Allow)
}

async fn run_one(
    guards: &[crate::guard::Guard],
    ctx: &GuardContext,
    route: &Arc<Route>,
) -> Result<GuardDecision, RouterError> {
    match run_guards(guards, ctx).await {
        Ok(GuardOutcome::Allow) => Ok(GuardDecision::Allow),
        Ok(GuardOutcome::Deny) => {
            debug!(path = %route.path, check = ?ctx.check, "guard denied navigation");
            Ok(GuardDecision::Deny)
        }
        Ok(GuardOutcome::Redirect(tree)) => Ok(GuardDecision::Redirect(tree)),
        Err(source) => Err(RouterError::GuardFailed {
            path: route.path.clone(),
            source,
        }),
    }
}

/// Routes on the path from the root to `id`, excluding `id` itself.
fn ancestor_routes(tree: &SnapshotTree, id: NodeId) -> Vec<Arc<Route>> {
    let mut chain = Vec::new();
    let mut current = tree.parent(id);
    while let Some(node) = current {
        if let Some(route) = &tree.snapshot(node).route {
            chain.push(Arc::clone(route));
        }
        current = tree.parent(node);
    }
    chain.reverse();
    chain
}

/// Runs the resolvers of every node on the activation checklist, top-down.
///
/// A node's resolvers fire together and are reduced in key order; the first
/// `Ok(None)` cancels the navigation (`false`), the first error aborts it.
/// After resolving, every node's effective `data` is recomputed top-down so
/// resolved values flow to inheriting descendants.
pub(crate) async fn run_resolvers(
    checks: &Checks,
    future: &mut SnapshotTree,
    inheritance: ParamInheritance,
) -> Result<bool, RouterError> {
    for &id in &checks.activations {
        let snapshot = future.snapshot(id).clone();
        let Some(route) = snapshot.route.clone() else { continue };
        if route.resolve.is_empty() {
            continue;
        }

        let keys: Vec<&String> = route.resolve.keys().collect();
        let futures = route
            .resolve
            .values()
            .map(|resolver| resolver.run(Arc::clone(&snapshot)));
        let results = join_all(futures).await;

        let mut resolved = DataMap::new();
        for (key, result) in keys.into_iter().zip(results) {
            match result {
                Ok(Some(value)) => {
                    resolved.insert(key.clone(), value);
                }
                Ok(None) => return Ok(false),
                Err(source) => {
                    return Err(RouterError::ResolveFailed {
                        key: key.clone(),
                        source,
                    })
                }
            }
        }

        let mut next = (**future.snapshot(id)).clone();
        next.resolved_data = resolved;
        future.replace_snapshot(id, next);
    }

    remerge_data(future, inheritance);
    Ok(true)
}

/// Recomputes every node's effective `data` from its parent's effective
/// data, the route's static data, and its resolved data, in that
/// precedence order.
fn remerge_data(tree: &mut SnapshotTree, inheritance: ParamInheritance) {
    for id in tree.preorder() {
        let snapshot = tree.snapshot(id).clone();
        let Some(route) = snapshot.route.clone() else { continue };

        let parent_snapshot = tree.parent(id).map(|p| tree.snapshot(p).clone());
        let mut data = DataMap::new();
        if let Some(parent) = &parent_snapshot {
            if should_inherit(inheritance, snapshot.route.as_ref(), parent.route.as_ref()) {
                data.extend(parent.data.clone());
            }
        }
        data.extend(route.data.clone());
        data.extend(snapshot.resolved_data.clone());

        if data != snapshot.data {
            let mut next = (**tree.snapshot(id)).clone();
            next.data = data;
            tree.replace_snapshot(id, next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Route;
    use crate::guard::{Guard, Resolver};
    use crate::loader::ConfigMemo;
    use crate::recognize::recognize;
    use serde_json::json;
    use wayfare_url::parse;

    fn empty_tree() -> SnapshotTree {
        SnapshotTree::new(RouteSnapshot::root(&UrlTree::empty()))
    }

    async fn tree_for(routes: &crate::config::Routes, url: &str) -> SnapshotTree {
        let target = parse(url).unwrap();
        recognize(
            routes,
            &ConfigMemo::default(),
            &target,
            &UrlTree::empty(),
            ParamInheritance::EmptyOnly,
            1,
            &|_| {},
        )
        .await
        .unwrap()
        .tree
    }

    async fn guard_decision(
        routes: &crate::config::Routes,
        from: &str,
        to: &str,
    ) -> GuardDecision {
        let previous = tree_for(routes, from).await;
        let mut future = tree_for(routes, to).await;
        let checks = compute_checks(&previous, &mut future);
        check_guards(
            &checks,
            &future,
            &parse(from).unwrap(),
            &parse(to).unwrap(),
            1,
            &|_| {},
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn fresh_activation_runs_can_activate() {
        let routes = vec![
            Route::path("open").component("Open").arc(),
            Route::path("locked")
                .component("Locked")
                .can_activate(Guard::always(GuardOutcome::Deny))
                .arc(),
        ];
        assert!(matches!(
            guard_decision(&routes, "/open", "/locked").await,
            GuardDecision::Deny
        ));
        assert!(matches!(
            guard_decision(&routes, "/locked", "/open").await,
            GuardDecision::Allow
        ));
    }

    #[tokio::test]
    async fn can_deactivate_runs_for_leaving_nodes() {
        let routes = vec![
            Route::path("form")
                .component("Form")
                .can_deactivate(Guard::always(GuardOutcome::Deny))
                .arc(),
            Route::path("away").component("Away").arc(),
        ];
        assert!(matches!(
            guard_decision(&routes, "/form", "/away").await,
            GuardDecision::Deny
        ));
    }

    #[tokio::test]
    async fn can_activate_child_guards_ancestors() {
        let routes = vec![
            Route::path("parent")
                .can_activate_child(Guard::always(GuardOutcome::Deny))
                .child(Route::path("child").component("Child"))
                .arc(),
            Route::path("elsewhere").component("Elsewhere").arc(),
        ];
        assert!(matches!(
            guard_decision(&routes, "/elsewhere", "/parent/child").await,
            GuardDecision::Deny
        ));
    }

    #[tokio::test]
    async fn unchanged_reused_node_skips_guards_by_default() {
        let routes = vec![Route::path("users/:id")
            .component("User")
            .can_activate(Guard::always(GuardOutcome::Deny))
            .arc()];
        // Same URL twice: the node pairs with itself, params unchanged, so
        // the denying guard never runs.
        assert!(matches!(
            guard_decision(&routes, "/users/1", "/users/1").await,
            GuardDecision::Allow
        ));
        // A param change re-runs it.
        assert!(matches!(
            guard_decision(&routes, "/users/1", "/users/2").await,
            GuardDecision::Deny
        ));
    }

    #[tokio::test]
    async fn query_only_change_respects_policy() {
        let relaxed = vec![Route::path("list").component("List").arc()];
        let previous = tree_for(&relaxed, "/list?page=1").await;
        let mut future = tree_for(&relaxed, "/list?page=2").await;
        let checks = compute_checks(&previous, &mut future);
        assert_eq!(checks.activation_count(), 0);

        let strict = vec![Route::path("list")
            .component("List")
            .run_guards_and_resolvers(
                crate::config::RunGuardsAndResolvers::ParamsOrQueryParamsChange,
            )
            .arc()];
        let previous = tree_for(&strict, "/list?page=1").await;
        let mut future = tree_for(&strict, "/list?page=2").await;
        let checks = compute_checks(&previous, &mut future);
        assert_eq!(checks.activation_count(), 1);
    }

    #[tokio::test]
    async fn resolvers_populate_data_with_precedence() {
        let routes = vec![Route::path("item")
            .component("Item")
            .data("kind", json!("static"))
            .data("extra", json!(1))
            .resolve("kind", Resolver::value(json!("resolved")))
            .arc()];
        let previous = empty_tree();
        let mut future = tree_for(&routes, "/item").await;
        let checks = compute_checks(&previous, &mut future);
        let completed = run_resolvers(&checks, &mut future, ParamInheritance::EmptyOnly)
            .await
            .unwrap();
        assert!(completed);

        let node = future
            .child_by_outlet(future.root(), wayfare_url::PRIMARY_OUTLET)
            .unwrap();
        let snapshot = future.snapshot(node);
        // Resolved data shadows static data under the same key.
        assert_eq!(snapshot.data.get("kind"), Some(&json!("resolved")));
        assert_eq!(snapshot.data.get("extra"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn resolver_without_value_cancels() {
        let routes = vec![Route::path("item")
            .component("Item")
            .resolve("missing", Resolver::from_fn(|_| async { Ok(None) }))
            .arc()];
        let previous = empty_tree();
        let mut future = tree_for(&routes, "/item").await;
        let checks = compute_checks(&previous, &mut future);
        let completed = run_resolvers(&checks, &mut future, ParamInheritance::EmptyOnly)
            .await
            .unwrap();
        assert!(!completed);
    }

    #[tokio::test]
    async fn quiet_reused_node_keeps_resolved_data() {
        let routes = vec![Route::path("item")
            .component("Item")
            .resolve("n", Resolver::value(json!(5)))
            .arc()];
        let base = empty_tree();
        let mut first = tree_for(&routes, "/item").await;
        let checks = compute_checks(&base, &mut first);
        run_resolvers(&checks, &mut first, ParamInheritance::EmptyOnly)
            .await
            .unwrap();

        // Second navigation to the same URL: nothing re-runs, data carried.
        let mut second = tree_for(&routes, "/item").await;
        let checks = compute_checks(&first, &mut second);
        assert_eq!(checks.activation_count(), 0);
        run_resolvers(&checks, &mut second, ParamInheritance::EmptyOnly)
            .await
            .unwrap();
        let node = second
            .child_by_outlet(second.root(), wayfare_url::PRIMARY_OUTLET)
            .unwrap();
        assert_eq!(second.snapshot(node).data.get("n"), Some(&json!(5)));
    }
}
