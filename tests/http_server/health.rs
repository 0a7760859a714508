use crate::helpers::*;

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let (server, _) = TestServer::with_recording_output().await;

    let resp = server.get("/health").await;

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");

    server.cleanup().await;
}

#[tokio::test]
async fn health_endpoint_needs_no_api_key() {
    let (server, _) = TestServer::with_recording_output().await;

    let resp = server.client.get(server.url("/health")).bearer_auth("wrong").send().await.unwrap();
    assert_eq!(resp.status(), 200);

    server.cleanup().await;
}
