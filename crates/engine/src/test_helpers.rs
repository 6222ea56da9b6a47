//! Scriptable in-memory engine for tests.

use std::sync::Arc;

use async_trait::async_trait;
use minicluster_membership::AdminError;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::config::EngineConfig;
use crate::engine::{Engine, EngineHandle, EngineIds};
use crate::error::EngineError;

/// Shared record of the calls made against a mock, in order.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Member id reported by every mock engine.
pub const MOCK_MEMBER_ID: &str = "8e9e05c52164694d";

/// Cluster id reported by every mock engine.
pub const MOCK_CLUSTER_ID: &str = "cdf818194e3a8c32";

/// How a mock engine exits on its own.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MockOutcome {
    /// Exits successfully.
    Clean,

    /// Exits with the given failure.
    Failure(String),
}

#[derive(Clone, Debug, Default)]
struct Behavior {
    start_error: Option<EngineError>,
    never_ready: bool,
    exits_before_ready: bool,
    exit_after_ready: Option<MockOutcome>,
    removal_failures: usize,
    stop_error: Option<EngineError>,
}

/// Engine whose launches are scripted up front.
#[derive(Clone, Debug, Default)]
pub struct MockEngine {
    behavior: Behavior,
    calls: CallLog,
    configs: Arc<Mutex<Vec<EngineConfig>>>,
}

impl MockEngine {
    /// Creates an engine that becomes ready immediately and runs until stopped.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine recording into `calls`.
    #[must_use]
    pub fn with_call_log(calls: CallLog) -> Self {
        Self {
            calls,
            ..Self::default()
        }
    }

    /// Never reports readiness.
    #[must_use]
    pub const fn never_ready(mut self) -> Self {
        self.behavior.never_ready = true;
        self
    }

    /// Exits with a failure while waiting for readiness.
    #[must_use]
    pub const fn exits_before_ready(mut self) -> Self {
        self.behavior.exits_before_ready = true;
        self
    }

    /// Exits with `outcome` as soon as termination is awaited.
    #[must_use]
    pub fn exits_after_ready(mut self, outcome: MockOutcome) -> Self {
        self.behavior.exit_after_ready = Some(outcome);
        self
    }

    /// Fails every launch with `error`.
    #[must_use]
    pub fn failing_start(mut self, error: EngineError) -> Self {
        self.behavior.start_error = Some(error);
        self
    }

    /// Fails the first `times` self-removals.
    #[must_use]
    pub const fn failing_removal(mut self, times: usize) -> Self {
        self.behavior.removal_failures = times;
        self
    }

    /// Fails every stop with `error` after recording it.
    #[must_use]
    pub fn failing_stop(mut self, error: EngineError) -> Self {
        self.behavior.stop_error = Some(error);
        self
    }

    /// Calls made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Configurations passed to every launch.
    #[must_use]
    pub fn configs(&self) -> Vec<EngineConfig> {
        self.configs.lock().clone()
    }
}

#[async_trait]
impl Engine for MockEngine {
    type Handle = MockHandle;

    async fn start(&self, config: &EngineConfig) -> Result<Self::Handle, EngineError> {
        self.calls.lock().push(format!(
            "start {} {}",
            config.name, config.initial_cluster_state
        ));
        self.configs.lock().push(config.clone());

        if let Some(error) = &self.behavior.start_error {
            return Err(error.clone());
        }

        let (stopped, _) = watch::channel(false);

        Ok(MockHandle {
            calls: Arc::clone(&self.calls),
            removal_failures: Mutex::new(self.behavior.removal_failures),
            behavior: self.behavior.clone(),
            stopped,
            fired: false,
        })
    }
}

/// Handle to a [`MockEngine`] launch.
#[derive(Debug)]
pub struct MockHandle {
    behavior: Behavior,
    calls: CallLog,
    fired: bool,
    removal_failures: Mutex<usize>,
    stopped: watch::Sender<bool>,
}

impl MockHandle {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

#[async_trait]
impl EngineHandle for MockHandle {
    async fn wait_ready(&mut self) -> Result<EngineIds, EngineError> {
        self.record("wait_ready");

        if self.behavior.never_ready {
            std::future::pending::<()>().await;
        }

        if self.behavior.exits_before_ready {
            return Err(EngineError::Exited("exit status: 1".to_string()));
        }

        Ok(EngineIds {
            member_id: MOCK_MEMBER_ID.to_string(),
            cluster_id: MOCK_CLUSTER_ID.to_string(),
        })
    }

    async fn terminated(&mut self) -> Result<(), EngineError> {
        if self.fired {
            return std::future::pending().await;
        }

        if let Some(outcome) = self.behavior.exit_after_ready.take() {
            self.fired = true;

            return match outcome {
                MockOutcome::Clean => Ok(()),
                MockOutcome::Failure(message) => Err(EngineError::Exited(message)),
            };
        }

        let mut stopped = self.stopped.subscribe();
        let _ = stopped.wait_for(|stopped| *stopped).await;
        self.fired = true;

        Ok(())
    }

    async fn remove_self(&self) -> Result<(), EngineError> {
        self.record(format!("remove_self {MOCK_MEMBER_ID}"));

        let mut failures = self.removal_failures.lock();
        if *failures > 0 {
            *failures -= 1;
            return Err(EngineError::Admin(AdminError::Unreachable(vec![
                "http://127.0.0.1:9301/".to_string(),
            ])));
        }

        Ok(())
    }

    async fn stop(&mut self) -> Result<(), EngineError> {
        self.record("stop");

        if let Some(error) = &self.behavior.stop_error {
            return Err(error.clone());
        }

        self.stopped.send_replace(true);

        Ok(())
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        self.record("close");

        Ok(())
    }
}
