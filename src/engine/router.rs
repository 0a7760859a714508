//! The router: entry point for every event and owner of the active routes.
//!
//! Each event is offered to every route concurrently. Per route the pipeline
//! is policy, dedup, render, then either the route's scheduler (aggregating
//! routes) or an immediate dispatch. A failing route never keeps the event
//! from the others; failures are collected into one [`RouterError`].
//!
//! Reloads swap the whole route table at once. A route that survives a
//! reload with the same aggregation policy keeps its scheduler and pending
//! items; other schedulers are stopped, which flushes what they hold.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::Mutex;

use super::{
    dispatch::{DispatchCoordinator, DispatchError, DispatchPayload},
    policy::{PolicyDecision, PolicyError, PolicyGate},
    renderer::RenderError,
    route::{RouteContext, RouteFlushSink, RouteSetError, RouteSource, RouteSourceError},
    scheduler::{RouteScheduler, SchedulerError},
};
use crate::{
    config::AppConfig,
    models::{
        event::{Event, EventParseError},
        route::RouteConfig,
    },
    outputs::Output,
    persistence::traits::DeliveryStore,
};

/// Why one route could not handle an event.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The policy could not be evaluated; the event was treated as not
    /// applicable.
    #[error("Policy evaluation failed: {0}")]
    Policy(#[from] PolicyError),

    /// The event could not be rendered; nothing was sent.
    #[error("Rendering failed: {0}")]
    Render(#[from] RenderError),

    /// The dispatch was aborted.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Some outputs failed to deliver. The others did receive the event.
    #[error("Delivery failed for outputs: {}", failed_outputs(.failed))]
    Delivery {
        /// Failed outputs with their error messages.
        failed: Vec<(String, String)>,
    },

    /// The route's scheduler is no longer accepting items.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

fn failed_outputs(failed: &[(String, String)]) -> String {
    failed.iter().map(|(name, e)| format!("{name} ({e})")).collect::<Vec<_>>().join(", ")
}

/// A failure attributed to one route.
#[derive(Debug)]
pub struct RouteFailure {
    /// The route that failed.
    pub route: String,
    /// What went wrong.
    pub error: RouteError,
}

/// Errors returned by the [`Router`].
#[derive(Debug, Error)]
pub enum RouterError {
    /// The payload is not a JSON object.
    #[error("Malformed input: {0}")]
    MalformedInput(#[from] EventParseError),

    /// A tenant delivery named a route that does not exist.
    #[error("Route '{0}' not found")]
    RouteNotFound(String),

    /// One or more routes failed; every other route handled the event.
    #[error("{} route(s) failed: {}", .0.len(), describe_failures(.0))]
    RouteFailures(Vec<RouteFailure>),

    /// The route source could not be loaded.
    #[error("Failed to load routes: {0}")]
    Source(#[from] RouteSourceError),

    /// The loaded routes are inconsistent.
    #[error("Invalid route configuration: {0}")]
    Config(#[from] RouteSetError),

    /// A route's policy does not compile.
    #[error("Invalid policy for route '{route}': {source}")]
    InvalidPolicy {
        /// The route.
        route: String,
        /// The compile error.
        #[source]
        source: PolicyError,
    },
}

fn describe_failures(failures: &[RouteFailure]) -> String {
    failures.iter().map(|f| format!("{}: {}", f.route, f.error)).collect::<Vec<_>>().join("; ")
}

/// An entry of the recent-events log.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecentEvent {
    /// When the router received the event.
    pub received_at: DateTime<Utc>,
    /// The event as received.
    pub event: Value,
}

/// Router settings taken from the application configuration.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Exposed to renderers as `server_url`.
    pub server_url: String,
    /// Size of the recent-events log.
    pub recent_events_capacity: usize,
    /// Queue capacity of every route scheduler.
    pub scheduler_channel_capacity: usize,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self { server_url: String::new(), recent_events_capacity: 200, scheduler_channel_capacity: 1024 }
    }
}

impl From<&AppConfig> for RouterSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            server_url: config.server_url.clone(),
            recent_events_capacity: config.recent_events_capacity,
            scheduler_channel_capacity: config.scheduler_channel_capacity.max(1),
        }
    }
}

struct ActiveRoute {
    context: Arc<ArcSwap<RouteContext>>,
    scheduler: Option<Arc<RouteScheduler>>,
}

impl ActiveRoute {
    fn name(&self) -> String {
        self.context.load().config.name.clone()
    }
}

#[derive(Default)]
struct RouteTable {
    routes: Vec<ActiveRoute>,
    outputs: HashMap<String, Arc<dyn Output>>,
}

/// Receives events and fans them out to the active routes.
pub struct Router {
    table: ArcSwap<RouteTable>,
    source: Arc<dyn RouteSource>,
    policy: Arc<dyn PolicyGate>,
    coordinator: Arc<DispatchCoordinator>,
    store: Arc<dyn DeliveryStore>,
    settings: RouterSettings,
    recent: Mutex<VecDeque<RecentEvent>>,
    reload_lock: Mutex<()>,
}

impl Router {
    /// Creates a router with no active routes. Call
    /// [`Router::reload_config`] to load them.
    pub fn new(
        source: Arc<dyn RouteSource>,
        policy: Arc<dyn PolicyGate>,
        store: Arc<dyn DeliveryStore>,
        settings: RouterSettings,
    ) -> Self {
        Self {
            table: ArcSwap::from_pointee(RouteTable::default()),
            source,
            policy,
            coordinator: Arc::new(DispatchCoordinator::new(Arc::clone(&store))),
            store,
            recent: Mutex::new(VecDeque::with_capacity(settings.recent_events_capacity)),
            settings,
            reload_lock: Mutex::new(()),
        }
    }

    /// Offers `raw` to every active route.
    pub async fn handle_event(&self, raw: &[u8]) -> Result<(), RouterError> {
        let event = self.accept(raw).await?;
        let table = self.table.load_full();

        let results = join_all(table.routes.iter().map(|route| self.ingest(route, &event))).await;
        let failures: Vec<RouteFailure> = table
            .routes
            .iter()
            .zip(results)
            .filter_map(|(route, result)| {
                result.err().map(|error| RouteFailure { route: route.name(), error })
            })
            .collect();

        if failures.is_empty() { Ok(()) } else { Err(RouterError::RouteFailures(failures)) }
    }

    /// Offers `raw` to the route named `route_name` only. Its policy still
    /// applies.
    pub async fn handle_route(&self, route_name: &str, raw: &[u8]) -> Result<(), RouterError> {
        let table = self.table.load_full();
        let route = table
            .routes
            .iter()
            .find(|r| r.context.load().config.name == route_name)
            .ok_or_else(|| RouterError::RouteNotFound(route_name.to_string()))?;

        let event = self.accept(raw).await?;
        self.ingest(route, &event).await.map_err(|error| {
            RouterError::RouteFailures(vec![RouteFailure { route: route_name.to_string(), error }])
        })
    }

    async fn accept(&self, raw: &[u8]) -> Result<Event, RouterError> {
        let event = Event::parse(raw).inspect_err(|e| {
            tracing::warn!(error = %e, size = raw.len(), "Dropping malformed event.");
        })?;
        self.record(&event).await;
        Ok(event)
    }

    async fn record(&self, event: &Event) {
        let capacity = self.settings.recent_events_capacity;
        if capacity == 0 {
            return;
        }
        let mut recent = self.recent.lock().await;
        while recent.len() >= capacity {
            recent.pop_front();
        }
        recent.push_back(RecentEvent { received_at: Utc::now(), event: event.to_value() });
    }

    async fn ingest(&self, route: &ActiveRoute, event: &Event) -> Result<(), RouteError> {
        let context = route.context.load_full();
        let config = &context.config;

        let accepted = match self.policy.evaluate(config, event).await {
            Ok(PolicyDecision::Accept(accepted)) => accepted,
            Ok(PolicyDecision::Reject) => {
                tracing::trace!(route = %config.name, "Event does not apply to route.");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(route = %config.name, error = %e, "Policy evaluation failed, event treated as not applicable.");
                return Err(e.into());
            }
        };

        if !self.is_first_occurrence(config, event).await {
            tracing::debug!(route = %config.name, "Duplicate event suppressed.");
            return Ok(());
        }

        let fields = context
            .renderer
            .render_single(&config.name, &accepted, &self.settings.server_url)
            .inspect_err(|e| {
                tracing::error!(route = %config.name, error = %e, "Failed to render event, dropping it.");
            })?;

        match &route.scheduler {
            Some(scheduler) => {
                scheduler.append(fields).await?;
                tracing::debug!(route = %config.name, "Event buffered for aggregation.");
            }
            None => {
                let report =
                    self.coordinator.dispatch(&context, DispatchPayload::Single(fields)).await?;
                if !report.is_success() {
                    return Err(RouteError::Delivery { failed: report.failed });
                }
            }
        }
        Ok(())
    }

    /// Registers the event's fingerprint for routes with dedup enabled.
    /// Store errors let the event through.
    async fn is_first_occurrence(&self, config: &RouteConfig, event: &Event) -> bool {
        if config.unique_message_props.is_empty() {
            return true;
        }
        let fingerprint = fingerprint(config, event);
        match self.store.register_fingerprint(&fingerprint, config.unique_message_timeout).await {
            Ok(first) => first,
            Err(e) => {
                tracing::warn!(route = %config.name, error = %e, "Failed to check event fingerprint, delivering anyway.");
                true
            }
        }
    }

    /// Loads a fresh route set from the source and swaps it in.
    ///
    /// Nothing changes when loading or validation fails. Concurrent calls are
    /// serialized; events keep flowing to the previous routes until the swap.
    pub async fn reload_config(&self) -> Result<(), RouterError> {
        let _guard = self.reload_lock.lock().await;

        let mut set = self.source.load().await?;
        set.validate()?;
        for route in &set.routes {
            self.policy.check(&route.policy).map_err(|source| RouterError::InvalidPolicy {
                route: route.name.clone(),
                source,
            })?;
        }

        let previous = self.table.load_full();

        let mut outputs = HashMap::with_capacity(set.outputs.len());
        for (name, output) in std::mem::take(&mut set.outputs) {
            let unchanged = previous.outputs.get(&name).is_some_and(|old| Arc::ptr_eq(old, &output));
            if !unchanged && let Err(e) = output.init().await {
                tracing::error!(output = %name, kind = output.kind(), error = %e, "Failed to initialize output, disabling it.");
                continue;
            }
            outputs.insert(name, output);
        }
        set.outputs = outputs;

        let mut routes = Vec::with_capacity(set.routes.len());
        let mut kept: Vec<Arc<RouteScheduler>> = Vec::new();
        for config in &set.routes {
            let context = set.resolve(config)?;
            let policy = config.aggregation_policy();

            let reusable = previous.routes.iter().find(|r| {
                r.context.load().config.name == config.name
                    && r.scheduler.as_ref().map(|s| s.policy()) == (!policy.is_none()).then_some(policy)
            });

            if let Some(existing) = reusable {
                existing.context.store(Arc::new(context));
                if let Some(scheduler) = &existing.scheduler {
                    kept.push(Arc::clone(scheduler));
                }
                routes.push(ActiveRoute {
                    context: Arc::clone(&existing.context),
                    scheduler: existing.scheduler.clone(),
                });
                continue;
            }

            let context = Arc::new(ArcSwap::from_pointee(context));
            let scheduler = if policy.is_none() {
                None
            } else {
                let sink = Arc::new(RouteFlushSink::new(Arc::clone(&context), Arc::clone(&self.coordinator)));
                let scheduler = Arc::new(RouteScheduler::new(
                    &config.name,
                    policy,
                    sink,
                    self.settings.scheduler_channel_capacity,
                ));
                scheduler.start().await;
                Some(scheduler)
            };
            routes.push(ActiveRoute { context, scheduler });
        }

        let route_count = routes.len();
        let output_count = set.outputs.len();
        let old = self.table.swap(Arc::new(RouteTable { routes, outputs: set.outputs.clone() }));

        let retired = old
            .routes
            .iter()
            .filter_map(|r| r.scheduler.as_ref())
            .filter(|s| !kept.iter().any(|k| Arc::ptr_eq(k, s)));
        join_all(retired.map(|s| s.stop())).await;

        let orphaned = old
            .outputs
            .iter()
            .filter(|(name, output)| !set.outputs.get(*name).is_some_and(|new| Arc::ptr_eq(new, output)))
            .map(|(_, output)| output);
        terminate_outputs(orphaned).await;

        tracing::info!(routes = route_count, outputs = output_count, "Route configuration loaded.");
        Ok(())
    }

    /// Events received most recently, oldest first.
    pub async fn recent_events(&self) -> Vec<RecentEvent> {
        self.recent.lock().await.iter().cloned().collect()
    }

    /// Names of the active routes in configured order.
    pub fn route_names(&self) -> Vec<String> {
        self.table.load().routes.iter().map(ActiveRoute::name).collect()
    }

    /// Removes every route, flushing what their schedulers hold, then
    /// terminates all outputs.
    pub async fn shutdown(&self) {
        let _guard = self.reload_lock.lock().await;
        let old = self.table.swap(Arc::new(RouteTable::default()));

        join_all(old.routes.iter().filter_map(|r| r.scheduler.as_ref()).map(|s| s.stop())).await;
        terminate_outputs(old.outputs.values()).await;
        tracing::info!(routes = old.routes.len(), "Router shut down.");
    }
}

async fn terminate_outputs<'a>(outputs: impl Iterator<Item = &'a Arc<dyn Output>>) {
    let terminations = outputs.map(|output| async move {
        if let Err(e) = output.terminate().await {
            tracing::warn!(output = %output.name(), error = %e, "Failed to terminate output.");
        }
    });
    join_all(terminations).await;
}

/// SHA-256 over the route name and the values of its unique properties.
/// Missing values hash as `null`.
fn fingerprint(config: &RouteConfig, event: &Event) -> String {
    let mut hasher = Sha256::new();
    hasher.update(config.name.as_bytes());
    for prop in &config.unique_message_props {
        let value = event.get_path(prop).map(Value::to_string).unwrap_or_else(|| "null".into());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}
