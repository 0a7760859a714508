//! Integration tests for the router: policy gating, aggregation, dispatch
//! isolation, dedup and reloads.

use std::{sync::Arc, time::Duration};

use waypost::{
    config::RhaiConfig,
    engine::{
        RouteError, Router, RouterError, RouterSettings,
        policy::RhaiPolicyGate,
        renderer::{Renderer, renderer_for},
        route::{RouteSet, StaticRouteSource},
    },
    models::{route::RouteConfig, template::TemplateConfig},
    outputs::Output,
    persistence::traits::DeliveryStore,
    template::TemplateService,
    test_helpers::{
        FailingOutput, FieldRenderer, InMemoryDeliveryStore, RecordingOutput, RouteBuilder,
        create_test_store, route_set,
    },
};

fn build_router(set: RouteSet, store: Arc<dyn DeliveryStore>) -> (Router, Arc<StaticRouteSource>) {
    let source = Arc::new(StaticRouteSource::new(set));
    let router = Router::new(
        source.clone(),
        Arc::new(RhaiPolicyGate::new(RhaiConfig::default())),
        store,
        RouterSettings::default(),
    );
    (router, source)
}

async fn loaded_router(routes: Vec<RouteConfig>, outputs: Vec<Arc<dyn Output>>) -> Router {
    let (router, _) = build_router(route_set(routes, outputs), InMemoryDeliveryStore::new());
    router.reload_config().await.unwrap();
    router
}

fn event(id: &str) -> Vec<u8> {
    format!(r#"{{"id":"{id}","image":"alpine:3.19","vulnerability_summary":{{"critical":1}}}}"#)
        .into_bytes()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn count_threshold_delivers_exact_batches_in_order() {
    let output = RecordingOutput::new("out");
    let router = loaded_router(
        vec![RouteBuilder::new("r1").output("out").aggregate_count(3).build()],
        vec![output.clone() as Arc<dyn Output>],
    )
    .await;

    for id in ["a", "b", "c", "d"] {
        router.handle_event(&event(id)).await.unwrap();
    }
    settle().await;
    assert_eq!(output.sent_titles(), vec!["a,b,c"]);

    // "d" waits for two more events; no timer is armed.
    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(output.sent_titles(), vec!["a,b,c"]);

    for id in ["e", "f"] {
        router.handle_event(&event(id)).await.unwrap();
    }
    settle().await;
    assert_eq!(output.sent_titles(), vec!["a,b,c", "d,e,f"]);
}

#[tokio::test(start_paused = true)]
async fn timer_flushes_single_event_within_one_period() {
    let output = RecordingOutput::new("out");
    let router = loaded_router(
        vec![RouteBuilder::new("r2").output("out").aggregate_timeout(Duration::from_secs(3)).build()],
        vec![output.clone() as Arc<dyn Output>],
    )
    .await;

    router.handle_event(&event("a")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(output.sent_titles().is_empty());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(output.sent_titles(), vec!["a"]);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(output.sent().len(), 1, "empty periods must not deliver");
}

#[tokio::test(start_paused = true)]
async fn shutdown_before_timer_drains_once_and_disarms_timer() {
    let output = RecordingOutput::new("out");
    let router = loaded_router(
        vec![RouteBuilder::new("r2").output("out").aggregate_timeout(Duration::from_secs(3)).build()],
        vec![output.clone() as Arc<dyn Output>],
    )
    .await;

    router.handle_event(&event("a")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    router.shutdown().await;
    assert_eq!(output.sent_titles(), vec!["a"]);
    assert!(output.is_terminated());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(output.sent().len(), 1);
    assert!(router.route_names().is_empty());
}

#[tokio::test(start_paused = true)]
async fn count_flush_resets_the_timer() {
    let output = RecordingOutput::new("out");
    let router = loaded_router(
        vec![
            RouteBuilder::new("both")
                .output("out")
                .aggregate_count(2)
                .aggregate_timeout(Duration::from_secs(10))
                .build(),
        ],
        vec![output.clone() as Arc<dyn Output>],
    )
    .await;

    tokio::time::sleep(Duration::from_secs(9)).await;
    for id in ["a", "b", "c"] {
        router.handle_event(&event(id)).await.unwrap();
    }
    settle().await;
    assert_eq!(output.sent_titles(), vec!["a,b"]);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(output.sent_titles(), vec!["a,b"]);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(output.sent_titles(), vec!["a,b", "c"]);
}

#[tokio::test]
async fn rejected_events_are_never_delivered() {
    let output = RecordingOutput::new("out");
    let router = loaded_router(
        vec![
            RouteBuilder::new("quay-only")
                .policy(r#"event.registry == "quay.io""#)
                .output("out")
                .build(),
        ],
        vec![output.clone() as Arc<dyn Output>],
    )
    .await;

    router.handle_event(br#"{"id":"a","registry":"docker.io"}"#).await.unwrap();
    router.handle_event(br#"{"id":"b","registry":"quay.io"}"#).await.unwrap();

    assert_eq!(output.sent_titles(), vec!["b"]);
}

#[tokio::test]
async fn policy_can_rewrite_the_event() {
    let output = RecordingOutput::new("out");
    let router = loaded_router(
        vec![
            RouteBuilder::new("rewrite")
                .policy(r#"#{ id: "critical-" + event.id }"#)
                .output("out")
                .build(),
        ],
        vec![output.clone() as Arc<dyn Output>],
    )
    .await;

    router.handle_event(&event("a")).await.unwrap();
    assert_eq!(output.sent_titles(), vec!["critical-a"]);
}

#[tokio::test]
async fn policy_error_is_isolated_to_its_route() {
    let output = RecordingOutput::new("out");
    let router = loaded_router(
        vec![
            RouteBuilder::new("broken").policy("event.nothing.deeper == 1").output("out").build(),
            RouteBuilder::new("healthy").output("out").build(),
        ],
        vec![output.clone() as Arc<dyn Output>],
    )
    .await;

    let err = router.handle_event(&event("a")).await.unwrap_err();

    let RouterError::RouteFailures(failures) = err else { panic!("expected route failures") };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].route, "broken");
    assert!(matches!(failures[0].error, RouteError::Policy(_)));
    assert_eq!(output.sent_titles(), vec!["a"]);
}

#[tokio::test]
async fn failing_output_does_not_block_siblings() {
    let first = RecordingOutput::new("first");
    let broken = FailingOutput::new("broken");
    let third = RecordingOutput::new("third");
    let router = loaded_router(
        vec![RouteBuilder::new("r").output("first").output("broken").output("third").build()],
        vec![first.clone() as Arc<dyn Output>, broken.clone(), third.clone()],
    )
    .await;

    let err = router.handle_event(&event("a")).await.unwrap_err();

    let RouterError::RouteFailures(failures) = err else { panic!("expected route failures") };
    let RouteError::Delivery { failed } = &failures[0].error else {
        panic!("expected a delivery failure")
    };
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "broken");
    assert_eq!(first.sent_titles(), vec!["a"]);
    assert_eq!(third.sent_titles(), vec!["a"]);
    assert_eq!(broken.attempts(), 1);
}

#[tokio::test]
async fn malformed_input_reaches_no_route() {
    let output = RecordingOutput::new("out");
    let router = loaded_router(
        vec![RouteBuilder::new("r").output("out").build()],
        vec![output.clone() as Arc<dyn Output>],
    )
    .await;

    assert!(matches!(router.handle_event(b"{oops").await, Err(RouterError::MalformedInput(_))));
    assert!(matches!(router.handle_event(b"[1]").await, Err(RouterError::MalformedInput(_))));
    assert!(output.sent().is_empty());
    assert!(router.recent_events().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn renderer_without_aggregation_delivers_items_individually() {
    let output = RecordingOutput::new("out");
    let mut set = route_set(
        vec![RouteBuilder::new("raw").output("out").aggregate_count(2).template("plain").build()],
        vec![output.clone() as Arc<dyn Output>],
    );
    set.renderers
        .insert("plain".into(), Arc::new(FieldRenderer::new("id").without_aggregation()));
    let (router, _) = build_router(set, InMemoryDeliveryStore::new());
    router.reload_config().await.unwrap();

    router.handle_event(&event("a")).await.unwrap();
    router.handle_event(&event("b")).await.unwrap();
    settle().await;

    assert_eq!(output.sent_titles(), vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn batch_render_failure_sends_nothing_and_does_not_requeue() {
    let output = RecordingOutput::new("out");
    let mut template = TemplateConfig::builtin();
    template.name = "broken-batch".into();
    template.aggregation_title = Some("{{ count | no_such_filter }}".into());
    let renderer: Arc<dyn Renderer> = renderer_for(template, Arc::new(TemplateService::new()));

    let mut set = route_set(
        vec![RouteBuilder::new("r").output("out").aggregate_count(2).template("broken-batch").build()],
        vec![output.clone() as Arc<dyn Output>],
    );
    set.renderers.insert("broken-batch".into(), renderer);
    let (router, _) = build_router(set, InMemoryDeliveryStore::new());
    router.reload_config().await.unwrap();

    for id in ["a", "b", "c"] {
        router.handle_event(&event(id)).await.unwrap();
    }
    settle().await;
    assert!(output.sent().is_empty());

    // The failed batch is dropped, not retried with the next one.
    router.handle_event(&event("d")).await.unwrap();
    settle().await;
    assert!(output.sent().is_empty());
}

#[tokio::test]
async fn duplicate_events_are_suppressed_per_route() {
    let output = RecordingOutput::new("out");
    let store = create_test_store().await;
    let set = route_set(
        vec![
            RouteBuilder::new("dedup")
                .output("out")
                .unique_props(&["image", "digest"], Duration::from_secs(3600))
                .build(),
        ],
        vec![output.clone() as Arc<dyn Output>],
    );
    let (router, _) = build_router(set, store.clone());
    router.reload_config().await.unwrap();

    router.handle_event(br#"{"id":"1","image":"alpine","digest":"sha256:a"}"#).await.unwrap();
    router.handle_event(br#"{"id":"2","image":"alpine","digest":"sha256:a"}"#).await.unwrap();
    router.handle_event(br#"{"id":"3","image":"alpine","digest":"sha256:b"}"#).await.unwrap();

    assert_eq!(output.sent_titles(), vec!["1", "3"]);
    let counts = store.get_delivery_counts().await.unwrap();
    assert_eq!(counts.get("out"), Some(&2));
}

#[tokio::test]
async fn tenant_delivery_targets_one_route() {
    let a = RecordingOutput::new("a-out");
    let b = RecordingOutput::new("b-out");
    let router = loaded_router(
        vec![
            RouteBuilder::new("team-a").output("a-out").build(),
            RouteBuilder::new("team-b").output("b-out").build(),
        ],
        vec![a.clone() as Arc<dyn Output>, b.clone()],
    )
    .await;

    router.handle_route("team-b", &event("x")).await.unwrap();
    assert!(a.sent().is_empty());
    assert_eq!(b.sent_titles(), vec!["x"]);

    let err = router.handle_route("team-c", &event("y")).await.unwrap_err();
    assert!(matches!(err, RouterError::RouteNotFound(name) if name == "team-c"));
}

#[tokio::test(start_paused = true)]
async fn reload_keeps_surviving_buffers_and_flushes_removed_routes() {
    let old_out = RecordingOutput::new("out");
    let kept = RouteBuilder::new("kept").output("out").aggregate_count(2).build();
    let removed = RouteBuilder::new("removed").output("out").aggregate_count(5).build();
    let (router, source) = build_router(
        route_set(vec![kept.clone(), removed], vec![old_out.clone() as Arc<dyn Output>]),
        InMemoryDeliveryStore::new(),
    );
    router.reload_config().await.unwrap();

    router.handle_event(&event("a")).await.unwrap();
    settle().await;
    assert!(old_out.sent().is_empty());

    let new_out = RecordingOutput::new("out");
    source.replace(route_set(vec![kept], vec![new_out.clone() as Arc<dyn Output>]));
    router.reload_config().await.unwrap();

    // The removed route flushed its pending "a" through the old output, which
    // was then terminated.
    assert_eq!(old_out.sent_titles(), vec!["a"]);
    assert!(old_out.is_terminated());
    assert_eq!(new_out.init_calls(), 1);
    assert_eq!(router.route_names(), vec!["kept"]);

    // The surviving route still holds "a" and completes the batch with the
    // new output.
    router.handle_event(&event("b")).await.unwrap();
    settle().await;
    assert_eq!(new_out.sent_titles(), vec!["a,b"]);
}

#[tokio::test]
async fn reload_failure_keeps_previous_routes() {
    let output = RecordingOutput::new("out");
    let (router, source) = build_router(
        route_set(vec![RouteBuilder::new("r").output("out").build()], vec![output.clone() as Arc<dyn Output>]),
        InMemoryDeliveryStore::new(),
    );
    router.reload_config().await.unwrap();

    source.replace(route_set(
        vec![RouteBuilder::new("r").output("out").template("missing").build()],
        vec![output.clone() as Arc<dyn Output>],
    ));
    assert!(matches!(router.reload_config().await, Err(RouterError::Config(_))));

    router.handle_event(&event("a")).await.unwrap();
    assert_eq!(output.sent_titles(), vec!["a"]);
    assert!(!output.is_terminated());
}

#[tokio::test]
async fn output_failing_init_is_left_out() {
    let healthy = RecordingOutput::new("healthy");
    let broken = RecordingOutput::failing_init("broken");
    let router = loaded_router(
        vec![RouteBuilder::new("r").output("healthy").output("broken").build()],
        vec![healthy.clone() as Arc<dyn Output>, broken.clone()],
    )
    .await;

    router.handle_event(&event("a")).await.unwrap();
    assert_eq!(healthy.sent_titles(), vec!["a"]);
    assert!(broken.sent().is_empty());
    assert_eq!(broken.init_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_intake_loses_nothing() {
    let output = RecordingOutput::new("out");
    let router = Arc::new(
        loaded_router(
            vec![RouteBuilder::new("r").output("out").aggregate_count(4).build()],
            vec![output.clone() as Arc<dyn Output>],
        )
        .await,
    );

    let tasks: Vec<_> = (0..40)
        .map(|i| {
            let router = Arc::clone(&router);
            tokio::spawn(async move { router.handle_event(&event(&i.to_string())).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    router.shutdown().await;

    let batches = output.sent_titles();
    assert_eq!(batches.len(), 10);
    let mut seen: Vec<usize> =
        batches.iter().flat_map(|b| b.split(',')).map(|id| id.parse().unwrap()).collect();
    seen.sort();
    assert_eq!(seen, (0..40).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn events_racing_a_reload_are_delivered_or_rejected() {
    let old_out = RecordingOutput::new("old");
    let new_out = RecordingOutput::new("new");
    let (router, source) = build_router(
        route_set(
            vec![RouteBuilder::new("removed").output("old").aggregate_count(3).build()],
            vec![old_out.clone() as Arc<dyn Output>],
        ),
        InMemoryDeliveryStore::new(),
    );
    router.reload_config().await.unwrap();
    let router = Arc::new(router);

    let tasks: Vec<_> = (0..200)
        .map(|i| {
            let router = Arc::clone(&router);
            tokio::spawn(async move { (i, router.handle_event(&event(&i.to_string())).await) })
        })
        .collect();

    source.replace(route_set(
        vec![RouteBuilder::new("added").output("new").build()],
        vec![new_out.clone() as Arc<dyn Output>],
    ));
    router.reload_config().await.unwrap();

    let mut accepted = Vec::new();
    for task in tasks {
        let (i, result) = task.await.unwrap();
        if result.is_ok() {
            accepted.push(i);
        }
    }
    router.shutdown().await;

    let mut delivered: Vec<usize> = old_out
        .sent_titles()
        .iter()
        .chain(new_out.sent_titles().iter())
        .flat_map(|batch| batch.split(','))
        .map(|id| id.parse().unwrap())
        .collect();
    delivered.sort();
    accepted.sort();
    assert_eq!(delivered, accepted);
}
