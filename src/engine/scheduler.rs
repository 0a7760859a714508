//! The per-route scheduler: one task per aggregating route owning its buffer
//! and timer.
//!
//! Appends, explicit flushes and stop requests reach the task over a bounded
//! channel. The task handles one message or tick at a time and awaits every
//! flush before reading the next message, so a route never has two flushes in
//! flight and an append arriving mid-flush lands in the next batch.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{
    sync::{Mutex, mpsc, oneshot},
    task::JoinHandle,
    time::{Instant, Interval, MissedTickBehavior, interval_at},
};

use super::buffer::AggregationBuffer;
use crate::models::{notification::RenderedFields, route::AggregationPolicy};

/// Receives the batches a scheduler flushes.
#[async_trait]
pub trait FlushSink: Send + Sync {
    /// Delivers one batch. Failures are the sink's to report.
    async fn flush(&self, route: &str, items: Vec<RenderedFields>);
}

/// Errors returned by [`RouteScheduler`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// The scheduler is not running.
    #[error("Scheduler for route '{0}' is stopped")]
    Stopped(String),
}

enum Command {
    Append(RenderedFields),
    Flush(oneshot::Sender<()>),
    Stop(oneshot::Sender<()>),
}

enum SchedulerState {
    Stopped,
    Running { tx: mpsc::Sender<Command>, handle: JoinHandle<()> },
}

/// Owns the aggregation lifecycle of one route.
pub struct RouteScheduler {
    route: String,
    policy: AggregationPolicy,
    sink: Arc<dyn FlushSink>,
    channel_capacity: usize,
    state: Mutex<SchedulerState>,
}

impl RouteScheduler {
    /// Creates a stopped scheduler.
    pub fn new(
        route: &str,
        policy: AggregationPolicy,
        sink: Arc<dyn FlushSink>,
        channel_capacity: usize,
    ) -> Self {
        Self {
            route: route.to_string(),
            policy,
            sink,
            channel_capacity: channel_capacity.max(1),
            state: Mutex::new(SchedulerState::Stopped),
        }
    }

    /// The aggregation policy this scheduler enforces.
    pub fn policy(&self) -> AggregationPolicy {
        self.policy
    }

    /// Spawns the scheduler task and arms the timer. No-op when running.
    pub async fn start(&self) {
        let mut state = self.state.lock().await;
        if matches!(*state, SchedulerState::Running { .. }) {
            return;
        }

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let worker = Worker {
            route: self.route.clone(),
            buffer: AggregationBuffer::new(self.policy.count_threshold()),
            sink: Arc::clone(&self.sink),
            ticker: self.policy.interval().map(new_ticker),
        };
        let handle = tokio::spawn(worker.run(rx));
        *state = SchedulerState::Running { tx, handle };
        tracing::debug!(route = %self.route, policy = ?self.policy, "Route scheduler started.");
    }

    /// Whether the scheduler task is running.
    pub async fn is_running(&self) -> bool {
        matches!(*self.state.lock().await, SchedulerState::Running { .. })
    }

    async fn sender(&self) -> Result<mpsc::Sender<Command>, SchedulerError> {
        match &*self.state.lock().await {
            SchedulerState::Running { tx, .. } => Ok(tx.clone()),
            SchedulerState::Stopped => Err(SchedulerError::Stopped(self.route.clone())),
        }
    }

    /// Queues a rendered item. Waits while the channel is full.
    pub async fn append(&self, item: RenderedFields) -> Result<(), SchedulerError> {
        self.sender()
            .await?
            .send(Command::Append(item))
            .await
            .map_err(|_| SchedulerError::Stopped(self.route.clone()))
    }

    /// Flushes whatever is pending and waits until the flush completed.
    #[cfg(test)]
    pub(crate) async fn flush_now(&self) -> Result<(), SchedulerError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.sender()
            .await?
            .send(Command::Flush(ack_tx))
            .await
            .map_err(|_| SchedulerError::Stopped(self.route.clone()))?;
        ack_rx.await.map_err(|_| SchedulerError::Stopped(self.route.clone()))
    }

    /// Disarms the timer, flushes pending items and waits for the task to
    /// exit. A flush already in progress completes first. No-op when stopped.
    pub async fn stop(&self) {
        let previous = std::mem::replace(&mut *self.state.lock().await, SchedulerState::Stopped);
        let SchedulerState::Running { tx, handle } = previous else {
            return;
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        if tx.send(Command::Stop(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
        drop(tx);
        if let Err(e) = handle.await {
            tracing::error!(route = %self.route, error = %e, "Route scheduler task failed.");
        }
        tracing::debug!(route = %self.route, "Route scheduler stopped.");
    }
}

fn new_ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

struct Worker {
    route: String,
    buffer: AggregationBuffer,
    sink: Arc<dyn FlushSink>,
    ticker: Option<Interval>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                biased;

                command = rx.recv() => match command {
                    Some(Command::Append(item)) => {
                        if let Some(batch) = self.buffer.push(item) {
                            tracing::debug!(route = %self.route, size = batch.len(), "Count threshold reached.");
                            self.flush(batch).await;
                            if let Some(ticker) = self.ticker.as_mut() {
                                ticker.reset();
                            }
                        }
                    }
                    Some(Command::Flush(ack)) => {
                        self.flush_pending().await;
                        let _ = ack.send(());
                    }
                    Some(Command::Stop(ack)) => {
                        self.drain(&mut rx).await;
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        self.drain(&mut rx).await;
                        break;
                    }
                },

                _ = next_tick(&mut self.ticker) => {
                    if !self.buffer.is_empty() {
                        tracing::debug!(route = %self.route, size = self.buffer.len(), "Aggregation timer elapsed.");
                        let batch = self.buffer.take();
                        self.flush(batch).await;
                    }
                }
            }
        }
    }

    /// Closes the channel and buffers every command that was already queued,
    /// then flushes. Senders that lose the race see the channel closed.
    async fn drain(&mut self, rx: &mut mpsc::Receiver<Command>) {
        rx.close();
        let mut acks = Vec::new();
        while let Some(command) = rx.recv().await {
            match command {
                Command::Append(item) => {
                    if let Some(batch) = self.buffer.push(item) {
                        self.flush(batch).await;
                    }
                }
                Command::Flush(ack) | Command::Stop(ack) => acks.push(ack),
            }
        }
        self.flush_pending().await;
        for ack in acks {
            let _ = ack.send(());
        }
    }

    async fn flush_pending(&mut self) {
        if !self.buffer.is_empty() {
            let batch = self.buffer.take();
            self.flush(batch).await;
        }
    }

    async fn flush(&self, batch: Vec<RenderedFields>) {
        self.sink.flush(&self.route, batch).await;
    }
}
