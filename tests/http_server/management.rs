use waypost::test_helpers::{RecordingOutput, RouteBuilder};

use crate::helpers::*;

#[tokio::test]
async fn management_endpoints_require_api_key() {
    let (server, _) = TestServer::with_recording_output().await;

    for path in ["/events", "/stats"] {
        let resp = server.get(path).await;
        assert_eq!(resp.status(), 401, "{path} without a key");

        let resp = server.client.get(server.url(path)).bearer_auth("wrong-key").send().await.unwrap();
        assert_eq!(resp.status(), 401, "{path} with a wrong key");
    }
    let resp = server.client.post(server.url("/reload")).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    server.cleanup().await;
}

#[tokio::test]
async fn events_endpoint_lists_recent_events() {
    let (server, _) = TestServer::with_recording_output().await;
    server.post_event("/", r#"{"id":"first"}"#).await;
    server.post_event("/", r#"{"id":"second"}"#).await;
    server.post_event("/", "[]").await;

    let resp = server.get_authed("/events").await;

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let events = body["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["event"]["id"], "first");
    assert_eq!(events[1]["event"]["id"], "second");
    assert!(events[0]["received_at"].is_string());

    server.cleanup().await;
}

#[tokio::test]
async fn stats_endpoint_reports_delivery_counts() {
    let (server, _) = TestServer::with_recording_output().await;
    server.post_event("/", r#"{"id":"a"}"#).await;
    server.post_event("/", r#"{"id":"b"}"#).await;

    let resp = server.get_authed("/stats").await;

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["deliveries"]["out"], 2);

    server.cleanup().await;
}

#[tokio::test]
async fn reload_swaps_routes() {
    let output = RecordingOutput::new("out");
    let server =
        TestServer::new(routes_to(vec![RouteBuilder::new("old").output("out").build()], &output)).await;

    server.source.replace(routes_to(vec![RouteBuilder::new("new").output("out").build()], &output));
    let resp = server.post_authed("/reload").await;

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "reloaded");
    assert_eq!(body["routes"], serde_json::json!(["new"]));

    server.cleanup().await;
}

#[tokio::test]
async fn rejected_reload_keeps_current_routes() {
    let output = RecordingOutput::new("out");
    let server =
        TestServer::new(routes_to(vec![RouteBuilder::new("kept").output("out").build()], &output)).await;

    server.source.replace(routes_to(
        vec![RouteBuilder::new("broken").policy("event.id ==").output("out").build()],
        &output,
    ));
    let resp = server.post_authed("/reload").await;

    assert_eq!(resp.status(), 422);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("broken"));
    assert_eq!(server.router.route_names(), vec!["kept"]);

    server.cleanup().await;
}
