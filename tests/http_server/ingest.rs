use waypost::test_helpers::{RecordingOutput, RouteBuilder};

use crate::helpers::*;

#[tokio::test]
async fn event_is_accepted_and_delivered() {
    let (server, output) = TestServer::with_recording_output().await;

    let resp = server.post_event("/", r#"{"id":"scan-1","image":"alpine:3.19"}"#).await;

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "accepted");
    assert_eq!(output.sent_titles(), vec!["scan-1"]);

    server.cleanup().await;
}

#[tokio::test]
async fn malformed_event_is_rejected() {
    let (server, output) = TestServer::with_recording_output().await;

    let resp = server.post_event("/", "{not json").await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("JSON"));

    let resp = server.post_event("/", r#""just a string""#).await;
    assert_eq!(resp.status(), 400);
    assert!(output.sent().is_empty());

    server.cleanup().await;
}

#[tokio::test]
async fn route_failures_are_reported_without_failing_the_request() {
    let output = RecordingOutput::new("out");
    let set = routes_to(
        vec![
            RouteBuilder::new("broken").policy("event.nothing.deeper == 1").output("out").build(),
            RouteBuilder::new("healthy").output("out").build(),
        ],
        &output,
    );
    let server = TestServer::new(set).await;

    let resp = server.post_event("/", r#"{"id":"scan-1"}"#).await;

    assert_eq!(resp.status(), 202);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "partial");
    assert_eq!(body["failures"][0]["route"], "broken");
    assert_eq!(output.sent_titles(), vec!["scan-1"]);

    server.cleanup().await;
}

#[tokio::test]
async fn tenant_endpoint_targets_one_route() {
    let output = RecordingOutput::new("out");
    let set = routes_to(
        vec![
            RouteBuilder::new("team-a").policy("false").output("out").build(),
            RouteBuilder::new("team-b").output("out").build(),
        ],
        &output,
    );
    let server = TestServer::new(set).await;

    let resp = server.post_event("/tenant/team-b", r#"{"id":"x"}"#).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(output.sent_titles(), vec!["x"]);

    let resp = server.post_event("/tenant/team-c", r#"{"id":"y"}"#).await;
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("team-c"));

    server.cleanup().await;
}
