use std::{net::SocketAddr, sync::Arc};

use reqwest::{Client, Response};
use tokio::task;
use tokio_util::sync::CancellationToken;
use waypost::{
    config::{AppConfig, RhaiConfig},
    engine::{
        Router, RouterSettings,
        policy::RhaiPolicyGate,
        route::{RouteSet, StaticRouteSource},
    },
    http_server::{self, ApiState},
    models::route::RouteConfig,
    outputs::Output,
    persistence::SqliteDeliveryStore,
    test_helpers::{RecordingOutput, RouteBuilder, create_test_store, route_set},
};

pub const API_KEY: &str = "test-key";

pub struct TestServer {
    pub address: SocketAddr,
    pub client: Client,
    pub source: Arc<StaticRouteSource>,
    pub store: Arc<SqliteDeliveryStore>,
    pub router: Arc<Router>,
    shutdown: CancellationToken,
    server_handle: task::JoinHandle<()>,
}

impl TestServer {
    pub async fn new(set: RouteSet) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get address");
        drop(listener); // Release port for the app to use

        let config = Arc::new(
            AppConfig::builder().database_url("sqlite::memory:").listen_address(&addr.to_string()).build(),
        );
        let store = create_test_store().await;
        let source = Arc::new(StaticRouteSource::new(set));
        let router = Arc::new(Router::new(
            source.clone(),
            Arc::new(RhaiPolicyGate::new(RhaiConfig::default())),
            store.clone(),
            RouterSettings::from(config.as_ref()),
        ));
        router.reload_config().await.expect("Failed to load routes");

        let state = ApiState {
            config,
            router: router.clone(),
            store: store.clone(),
            api_key: Arc::from(API_KEY),
        };
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let server_handle = task::spawn(async move {
            http_server::run_server_from_config(state, token).await.expect("Server failed");
        });

        // Wait for server to start
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        Self { address: addr, client: Client::new(), source, store, router, shutdown, server_handle }
    }

    /// A server with a single catch-all route delivering to `out`.
    pub async fn with_recording_output() -> (Self, Arc<RecordingOutput>) {
        let output = RecordingOutput::new("out");
        let server = Self::new(routes_to(vec![RouteBuilder::new("all").output("out").build()], &output)).await;
        (server, output)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.address, path)
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client.get(self.url(path)).send().await.expect("Failed to send request")
    }

    pub async fn get_authed(&self, path: &str) -> Response {
        self.client.get(self.url(path)).bearer_auth(API_KEY).send().await.expect("Failed to send request")
    }

    pub async fn post_event(&self, path: &str, body: &str) -> Response {
        self.client
            .post(self.url(path))
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn post_authed(&self, path: &str) -> Response {
        self.client.post(self.url(path)).bearer_auth(API_KEY).send().await.expect("Failed to send request")
    }

    pub async fn cleanup(self) {
        self.shutdown.cancel();
        let _ = self.server_handle.await;
        self.router.shutdown().await;
    }
}

pub fn routes_to(routes: Vec<RouteConfig>, output: &Arc<RecordingOutput>) -> RouteSet {
    route_set(routes, vec![output.clone() as Arc<dyn Output>])
}
