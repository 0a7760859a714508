use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;

use crate::{
    models::notification::{RenderedFields, RenderedFieldsExt},
    outputs::{Output, OutputError},
};

/// An output that keeps every delivery in memory.
pub struct RecordingOutput {
    name: String,
    sent: Mutex<Vec<RenderedFields>>,
    init_calls: AtomicUsize,
    terminated: AtomicBool,
    fail_init: bool,
}

impl RecordingOutput {
    /// Creates a recording output named `name`.
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            sent: Mutex::new(Vec::new()),
            init_calls: AtomicUsize::new(0),
            terminated: AtomicBool::new(false),
            fail_init: false,
        })
    }

    /// Creates a recording output whose `init` fails.
    pub fn failing_init(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            sent: Mutex::new(Vec::new()),
            init_calls: AtomicUsize::new(0),
            terminated: AtomicBool::new(false),
            fail_init: true,
        })
    }

    /// Every delivery so far, in order.
    pub fn sent(&self) -> Vec<RenderedFields> {
        self.sent.lock().unwrap().clone()
    }

    /// Titles of every delivery so far, in order.
    pub fn sent_titles(&self) -> Vec<String> {
        self.sent().iter().map(|f| f.title().to_string()).collect()
    }

    /// How often `init` was called.
    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    /// Whether `terminate` was called.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Output for RecordingOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "recording"
    }

    async fn init(&self) -> Result<(), OutputError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            return Err(OutputError::ConfigError(format!("{} refused to start", self.name)));
        }
        Ok(())
    }

    async fn send(&self, fields: &RenderedFields) -> Result<(), OutputError> {
        self.sent.lock().unwrap().push(fields.clone());
        Ok(())
    }

    async fn terminate(&self) -> Result<(), OutputError> {
        self.terminated.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// An output whose every delivery fails.
pub struct FailingOutput {
    name: String,
    attempts: AtomicUsize,
}

impl FailingOutput {
    /// Creates a failing output named `name`.
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self { name: name.to_string(), attempts: AtomicUsize::new(0) })
    }

    /// How often `send` was called.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Output for FailingOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "failing"
    }

    async fn send(&self, _fields: &RenderedFields) -> Result<(), OutputError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(OutputError::NotifyFailed(format!("{} is unreachable", self.name)))
    }
}
