// File: tests/router_tests.rs
// Purpose: End-to-end navigation scenarios through the public API

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::Notify;
use wayfare_router::url::UrlTree;
use wayfare_router::{
    CachingReuseStrategy, CancellationCode, Guard, GuardOutcome, LocationAdapter, MemoryLocation,
    NavigationExtras, NavigationOutcome, Resolver, Route, Router, RouterEvent, RouterOptions,
    RunGuardsAndResolvers,
};

fn shop_routes() -> Vec<Arc<Route>> {
    vec![
        Route::path("home").component("Home").arc(),
        Route::path("users/:id")
            .component("UserDetail")
            .child(Route::path("posts").component("UserPosts"))
            .arc(),
        Route::path("old").redirect_to("new").arc(),
        Route::path("new").component("New").arc(),
        Route::wildcard().component("NotFound").arc(),
    ]
}

fn drain(events: &mut tokio::sync::broadcast::Receiver<RouterEvent>) -> Vec<RouterEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test]
async fn params_and_matrix_params_reach_the_snapshot() {
    let router = Router::builder(shop_routes()).build().unwrap();
    router
        .navigate_by_url("/users/42;tab=posts/posts?page=2#top", Default::default())
        .await
        .unwrap();

    let state = router.state();
    let user = state.root.child_by_outlet("primary").unwrap();
    let snapshot = user.route.snapshot();
    assert_eq!(snapshot.params.get("id").map(String::as_str), Some("42"));
    assert_eq!(snapshot.params.get("tab").map(String::as_str), Some("posts"));
    assert_eq!(snapshot.fragment.as_deref(), Some("top"));

    let posts = user.child_by_outlet("primary").unwrap();
    assert_eq!(
        posts.route.snapshot().component.as_deref(),
        Some("UserPosts")
    );
}

#[tokio::test]
async fn matching_is_deterministic_for_overlapping_configs() {
    // Both routes match /a; the first declared wins every time, even though
    // the second is the more specific pattern.
    for _ in 0..5 {
        let router = Router::builder(vec![
            Route::path(":word").component("First").arc(),
            Route::path("a").component("Second").arc(),
        ])
        .build()
        .unwrap();
        router.navigate_by_url("/a", Default::default()).await.unwrap();
        let state = router.state();
        let node = state.root.child_by_outlet("primary").unwrap();
        assert_eq!(node.route.snapshot().component.as_deref(), Some("First"));
    }
}

#[tokio::test]
async fn event_order_for_a_successful_navigation() {
    let router = Router::builder(shop_routes()).build().unwrap();
    let mut events = router.events();
    router
        .navigate_by_url("/home", Default::default())
        .await
        .unwrap();

    let names: Vec<&str> = drain(&mut events)
        .iter()
        .map(|e| match e {
            RouterEvent::NavigationStart { .. } => "start",
            RouterEvent::RoutesRecognized { .. } => "recognized",
            RouterEvent::GuardsCheckStart { .. } => "guards-start",
            RouterEvent::ChildActivationStart { .. } => "child-activation-start",
            RouterEvent::ActivationStart { .. } => "activation-start",
            RouterEvent::GuardsCheckEnd { .. } => "guards-end",
            RouterEvent::ResolveStart { .. } => "resolve-start",
            RouterEvent::ResolveEnd { .. } => "resolve-end",
            RouterEvent::ActivationEnd { .. } => "activation-end",
            RouterEvent::ChildActivationEnd { .. } => "child-activation-end",
            RouterEvent::NavigationEnd { .. } => "end",
            RouterEvent::Scroll { .. } => "scroll",
            _ => "other",
        })
        .collect();

    assert_eq!(
        names,
        vec![
            "start",
            "recognized",
            "guards-start",
            "child-activation-start",
            "activation-start",
            "guards-end",
            "resolve-start",
            "resolve-end",
            "activation-end",
            "child-activation-end",
            "end",
            "scroll",
        ]
    );
}

#[tokio::test]
async fn redirect_emits_one_navigation_end_with_both_urls() {
    let router = Router::builder(shop_routes()).build().unwrap();
    let mut events = router.events();
    router
        .navigate_by_url("/old", Default::default())
        .await
        .unwrap();
    assert_eq!(router.url(), "/new");

    let ends: Vec<(String, String)> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            RouterEvent::NavigationEnd {
                url,
                url_after_redirects,
                ..
            } => Some((url, url_after_redirects)),
            _ => None,
        })
        .collect();
    assert_eq!(ends, vec![("/old".to_string(), "/new".to_string())]);
}

#[tokio::test]
async fn redirect_cycles_terminate() {
    let router = Router::builder(vec![
        Route::path("a").redirect_to("/b").arc(),
        Route::path("b").redirect_to("/a").arc(),
    ])
    .build()
    .unwrap();

    // The cycle degrades into a no-match error instead of hanging.
    let result = router.navigate_by_url("/a", Default::default()).await;
    assert!(result.is_err());
    assert_eq!(router.url(), "/");
}

#[tokio::test]
async fn guard_rejection_short_circuits_resolvers() {
    let resolver_ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = Arc::clone(&resolver_ran);
    let router = Router::builder(vec![
        Route::path("home").component("Home").arc(),
        Route::path("locked")
            .component("Locked")
            .can_activate(Guard::always(GuardOutcome::Deny))
            .resolve(
                "data",
                Resolver::from_fn(move |_| {
                    flag.store(true, std::sync::atomic::Ordering::SeqCst);
                    async { Ok(Some(json!(1))) }
                }),
            )
            .arc(),
    ])
    .build()
    .unwrap();

    router
        .navigate_by_url("/home", Default::default())
        .await
        .unwrap();
    let outcome = router
        .navigate_by_url("/locked", Default::default())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        NavigationOutcome::Cancelled(CancellationCode::GuardRejected)
    );
    assert_eq!(router.url(), "/home");
    assert!(!resolver_ran.load(std::sync::atomic::Ordering::SeqCst));
}

#[tokio::test]
async fn guard_redirect_stays_within_one_transition() -> anyhow::Result<()> {
    let router = Router::builder(vec![
        Route::path("secure")
            .component("Secure")
            .can_activate(Guard::from_fn(|_| async {
                Ok(GuardOutcome::Redirect("/login".parse::<UrlTree>()?))
            }))
            .arc(),
        Route::path("login").component("Login").arc(),
    ])
    .build()?;
    let mut events = router.events();

    let outcome = router.navigate_by_url("/secure", Default::default()).await?;
    assert!(outcome.is_committed());
    assert_eq!(router.url(), "/login");

    // The redirect restarts recognition under the same transition id: one
    // NavigationStart, no cancellation, one NavigationEnd carrying both
    // URLs.
    let seen = drain(&mut events);
    let starts: Vec<u64> = seen
        .iter()
        .filter_map(|e| match e {
            RouterEvent::NavigationStart { id, .. } => Some(*id),
            _ => None,
        })
        .collect();
    assert_eq!(starts.len(), 1);
    assert!(!seen
        .iter()
        .any(|e| matches!(e, RouterEvent::NavigationCancel { .. })));
    let ends: Vec<(u64, &str, &str)> = seen
        .iter()
        .filter_map(|e| match e {
            RouterEvent::NavigationEnd {
                id,
                url,
                url_after_redirects,
            } => Some((*id, url.as_str(), url_after_redirects.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(ends, vec![(starts[0], "/secure", "/login")]);
    Ok(())
}

#[tokio::test]
async fn newer_navigation_supersedes_an_inflight_one() {
    let gate = Arc::new(Notify::new());
    let release = Arc::clone(&gate);
    let router = Router::builder(vec![
        Route::path("slow")
            .component("Slow")
            .can_activate(Guard::from_fn(move |_| {
                let gate = Arc::clone(&release);
                async move {
                    gate.notified().await;
                    Ok(GuardOutcome::Allow)
                }
            }))
            .arc(),
        Route::path("fast").component("Fast").arc(),
    ])
    .build()
    .unwrap();

    let first = {
        let router = Arc::clone(&router);
        tokio::spawn(async move { router.navigate_by_url("/slow", Default::default()).await })
    };
    // Let the first navigation reach its guard before starting the second.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let second = router
        .navigate_by_url("/fast", Default::default())
        .await
        .unwrap();
    assert!(second.is_committed());

    gate.notify_one();
    let first = first.await.unwrap().unwrap();
    assert_eq!(
        first,
        NavigationOutcome::Cancelled(CancellationCode::SupersededByNewNavigation)
    );
    assert_eq!(router.url(), "/fast");
}

#[tokio::test]
async fn highest_transition_id_always_wins() -> anyhow::Result<()> {
    // Two navigations race from scratch; whichever was issued later (the
    // higher transition id) must own the committed URL, regardless of how
    // the tasks interleave.
    for _ in 0..25 {
        let router = Router::builder(vec![
            Route::path("a").component("A").arc(),
            Route::path("b").component("B").arc(),
        ])
        .build()?;
        let mut events = router.events();

        let first = {
            let router = Arc::clone(&router);
            tokio::spawn(async move { router.navigate_by_url("/a", Default::default()).await })
        };
        let second = {
            let router = Arc::clone(&router);
            tokio::spawn(async move { router.navigate_by_url("/b", Default::default()).await })
        };
        first.await??;
        second.await??;

        let winner = drain(&mut events)
            .into_iter()
            .filter_map(|e| match e {
                RouterEvent::NavigationStart { id, url, .. } => Some((id, url)),
                _ => None,
            })
            .max_by_key(|(id, _)| *id)
            .expect("no navigation started");
        assert_eq!(router.url(), winner.1);
    }
    Ok(())
}

#[tokio::test]
async fn query_only_change_reuses_the_component_instance() {
    let router = Router::builder(vec![Route::path("list").component("List").arc()])
        .build()
        .unwrap();

    router
        .navigate_by_url("/list?page=1", Default::default())
        .await
        .unwrap();
    let before = router.state();
    let node = before.root.child_by_outlet("primary").unwrap();
    let instance_before = node.component.clone().unwrap().instance_id();
    let mut watched = node.route.watch();

    router
        .navigate_by_url("/list?page=2", Default::default())
        .await
        .unwrap();
    let after = router.state();
    let node = after.root.child_by_outlet("primary").unwrap();
    assert_eq!(node.component.clone().unwrap().instance_id(), instance_before);

    // The reused node's watch channel saw the new snapshot.
    assert!(watched.has_changed().unwrap());
    let snapshot = watched.borrow_and_update().clone();
    assert!(snapshot.query_params.contains_key("page"));
}

#[tokio::test]
async fn caching_reuse_strategy_restores_detached_components() {
    let router = Router::builder(vec![
        Route::path("tab").component("Tab").arc(),
        Route::path("other").component("Other").arc(),
    ])
    .reuse_strategy(Arc::new(CachingReuseStrategy::new(["tab".to_string()])))
    .build()
    .unwrap();

    router
        .navigate_by_url("/tab", Default::default())
        .await
        .unwrap();
    let state = router.state();
    let instance = state
        .root
        .child_by_outlet("primary")
        .unwrap()
        .component
        .clone()
        .unwrap()
        .instance_id();

    router
        .navigate_by_url("/other", Default::default())
        .await
        .unwrap();
    router
        .navigate_by_url("/tab", Default::default())
        .await
        .unwrap();

    let state = router.state();
    let restored = state
        .root
        .child_by_outlet("primary")
        .unwrap()
        .component
        .clone()
        .unwrap()
        .instance_id();
    // The detached subtree came back with its component instance intact.
    assert_eq!(restored, instance);
}

#[tokio::test]
async fn guards_rerun_policy_is_respected_for_query_changes() {
    let runs = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let counting_guard = Guard::from_fn(move |_| {
        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        async { Ok(GuardOutcome::Allow) }
    });

    let router = Router::builder(vec![Route::path("list")
        .component("List")
        .can_activate(counting_guard)
        .run_guards_and_resolvers(RunGuardsAndResolvers::ParamsOrQueryParamsChange)
        .arc()])
    .build()
    .unwrap();

    router
        .navigate_by_url("/list?page=1", Default::default())
        .await
        .unwrap();
    router
        .navigate_by_url("/list?page=2", Default::default())
        .await
        .unwrap();
    // Both navigations ran the guard under the query-sensitive policy.
    assert_eq!(runs.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn back_button_navigates_through_history() {
    let memory = Arc::new(MemoryLocation::new());
    let router = Router::builder(shop_routes())
        .location(memory.clone())
        .build()
        .unwrap();
    let listener = router.spawn_location_listener();

    router
        .navigate_by_url("/home", Default::default())
        .await
        .unwrap();
    router
        .navigate_by_url("/users/1", Default::default())
        .await
        .unwrap();
    assert_eq!(memory.current(), "/users/1");

    // Popstate flows through the listener task; poll until it lands.
    assert!(memory.back());
    let mut settled = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if router.url() == "/home" {
            settled = true;
            break;
        }
    }
    assert!(settled, "router never followed the history change");
    listener.abort();
}

#[tokio::test]
async fn skip_location_change_keeps_history_still() {
    let router = Router::builder(shop_routes()).build().unwrap();
    router
        .navigate_by_url("/home", Default::default())
        .await
        .unwrap();

    let extras = NavigationExtras {
        skip_location_change: true,
        ..Default::default()
    };
    router.navigate_by_url("/users/9", extras).await.unwrap();
    assert_eq!(router.url(), "/users/9");
    assert_eq!(router.location().current(), "/home");
}

#[tokio::test]
async fn wildcard_is_the_last_resort() {
    let router = Router::builder(shop_routes()).build().unwrap();
    router
        .navigate_by_url("/completely/unknown", Default::default())
        .await
        .unwrap();
    let state = router.state();
    let node = state.root.child_by_outlet("primary").unwrap();
    assert_eq!(node.route.snapshot().component.as_deref(), Some("NotFound"));
}

#[tokio::test]
async fn options_are_applied() {
    let options = RouterOptions::default();
    let router = Router::builder(shop_routes()).options(options).build().unwrap();
    router
        .navigate_by_url("/home", Default::default())
        .await
        .unwrap();
    let outcome = router
        .navigate_by_url("/home", Default::default())
        .await
        .unwrap();
    assert_eq!(outcome, NavigationOutcome::Skipped);
}
