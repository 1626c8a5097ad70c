// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Lifecycle Manager
//!
//! Submits compiled graphs, waits for them with a deadline, and deletes them
//! with bounded retries. Every status the backend reports is recorded through
//! the [`StackStatus`] state machine.
//!
//! Waiting is cooperative: a [`CancellationToken`] shared with an interrupt
//! handler aborts a blocking create, leaving the record in place so
//! [`StackManager::delete_all`] can still clean it up.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{DeployConfig, DEFAULT_STACK_TIMEOUT_SECS};
use crate::errors::{StackError, StackResult};
use crate::graph::ResourceGraph;
use crate::state_machine::{RecordedMachine, StackCommand, StackStatus, Transition};

use super::backend::{OrchestrationBackend, StackHandle, StackOutput};

/// A stack known to the manager
#[derive(Debug, Clone)]
pub struct DeployedStack {
    pub name: String,

    /// Backend id, set once submit returns
    pub id: Option<String>,

    /// Flattened outputs, filled after a blocking create completes
    pub outputs: HashMap<String, String>,

    pub created_at: DateTime<Utc>,

    /// Last reason the backend gave for a failure
    pub status_reason: Option<String>,

    lifecycle: RecordedMachine<StackStatus>,
}

impl DeployedStack {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            id: None,
            outputs: HashMap::new(),
            created_at: Utc::now(),
            status_reason: None,
            lifecycle: RecordedMachine::new(StackStatus::NotCreated),
        }
    }

    pub fn status(&self) -> StackStatus {
        *self.lifecycle.state()
    }

    /// Recorded status changes, oldest first
    pub fn history(&self) -> &[Transition<StackStatus, StackCommand>] {
        self.lifecycle.history()
    }

    fn handle(&self) -> Option<StackHandle> {
        self.id.as_ref().map(|id| StackHandle {
            id: id.clone(),
            name: self.name.clone(),
        })
    }

    fn apply(&mut self, command: StackCommand) -> StackResult<()> {
        let output = self.lifecycle.apply(command, Utc::now())?;
        for warning in output.warnings {
            if output.is_critical {
                error!(stack = %self.name, status = %self.status(), "{}", warning);
            } else {
                warn!(stack = %self.name, status = %self.status(), "{}", warning);
            }
        }
        Ok(())
    }

    fn observe(&mut self, observed: StackStatus) -> StackResult<()> {
        match self.status().command_towards(observed) {
            Some(command) => self.apply(command),
            None => Ok(()),
        }
    }
}

/// How [`StackManager::create`] waits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateOptions {
    /// Wait for a terminal status before returning
    pub block: bool,

    /// Limit on the blocking wait, measured from its start
    pub timeout: Duration,
}

impl CreateOptions {
    pub fn blocking(timeout: Duration) -> Self {
        Self {
            block: true,
            timeout,
        }
    }

    pub fn non_blocking() -> Self {
        Self {
            block: false,
            timeout: Duration::from_secs(DEFAULT_STACK_TIMEOUT_SECS),
        }
    }
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self::blocking(Duration::from_secs(DEFAULT_STACK_TIMEOUT_SECS))
    }
}

/// Tracks stacks created through one backend
pub struct StackManager<B: OrchestrationBackend> {
    backend: B,
    config: DeployConfig,
    stacks: RwLock<Vec<DeployedStack>>,
    cancel: CancellationToken,
}

impl<B: OrchestrationBackend> StackManager<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, DeployConfig::default())
    }

    pub fn with_config(backend: B, config: DeployConfig) -> Self {
        Self {
            backend,
            config,
            stacks: RwLock::new(Vec::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// Token that interrupts blocking creates when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Interrupt every blocking create, now and later
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Snapshot of a tracked stack
    pub async fn stack(&self, name: &str) -> Option<DeployedStack> {
        self.stacks.read().await.iter().find(|s| s.name == name).cloned()
    }

    /// Names of stacks not yet deleted, in creation order
    pub async fn tracked(&self) -> Vec<String> {
        self.stacks
            .read()
            .await
            .iter()
            .filter(|s| s.status() != StackStatus::DeleteComplete)
            .map(|s| s.name.clone())
            .collect()
    }

    /// Create a stack from `graph`.
    ///
    /// The record is registered before the backend is called, so an
    /// interrupted submit still leaves something to clean up. A non-blocking
    /// create returns right after submit with empty outputs.
    ///
    /// # Errors
    ///
    /// - [`StackError::AlreadyExists`] if a live stack has this name
    /// - [`StackError::CreateFailed`] with the backend's reason
    /// - [`StackError::Timeout`] when `options.timeout` elapses first
    /// - [`StackError::Interrupted`] when the manager is cancelled during
    ///   submit or while waiting
    pub async fn create(
        &self,
        name: &str,
        graph: &ResourceGraph,
        parameters: &BTreeMap<String, String>,
        options: CreateOptions,
    ) -> StackResult<DeployedStack> {
        self.register(name).await?;
        info!(
            stack = %name,
            backend = %self.backend.name(),
            resources = graph.len(),
            block = options.block,
            "Creating stack"
        );

        let handle = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                warn!(stack = %name, "Stack submit interrupted");
                return Err(StackError::Interrupted {
                    stack: name.to_string(),
                });
            }
            submitted = self.backend.submit(name, graph, parameters) => submitted?,
        };
        self.update(name, |stack| {
            stack.id = Some(handle.id.clone());
            stack.apply(StackCommand::Submit)
        })
        .await?;
        debug!(stack = %name, id = %handle.id, "Stack submitted");

        if !options.block {
            return self.update(name, |stack| Ok(stack.clone())).await;
        }

        self.wait_for_create(&handle, options.timeout).await?;

        let outputs = flatten_outputs(self.backend.get_outputs(&handle).await?);
        info!(stack = %name, outputs = outputs.len(), "Stack created");
        self.update(name, |stack| {
            stack.outputs = outputs;
            Ok(stack.clone())
        })
        .await
    }

    async fn wait_for_create(&self, handle: &StackHandle, timeout: Duration) -> StackResult<()> {
        let name = handle.name.as_str();
        let deadline = Instant::now() + timeout;

        loop {
            let reported = self.backend.get_status(handle).await?;
            match reported.status.parse::<StackStatus>() {
                Ok(StackStatus::CreateComplete) => {
                    return self
                        .update(name, |stack| stack.observe(StackStatus::CreateComplete))
                        .await;
                }
                Ok(StackStatus::CreateFailed) => {
                    let reason = reported
                        .reason
                        .unwrap_or_else(|| reported.status.clone());
                    self.update(name, |stack| {
                        stack.status_reason = Some(reason.clone());
                        stack.observe(StackStatus::CreateFailed)
                    })
                    .await?;
                    return Err(StackError::CreateFailed {
                        stack: name.to_string(),
                        reason,
                    });
                }
                Ok(StackStatus::Creating) => {
                    debug!(stack = %name, status = %reported.status, "Stack still creating");
                }
                Ok(other) => {
                    return Err(StackError::Backend(format!(
                        "unexpected status {} while creating stack '{}'",
                        other, name
                    )));
                }
                Err(err) => {
                    warn!(stack = %name, status = %reported.status, error = %err, "Ignoring unrecognized stack status");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                error!(stack = %name, timeout_secs = timeout.as_secs(), "Stack create timed out");
                return Err(StackError::Timeout {
                    stack: name.to_string(),
                    operation: "create",
                    timeout,
                });
            }

            tokio::select! {
                _ = sleep(self.config.poll_interval.min(deadline - now)) => {}
                _ = self.cancel.cancelled() => {
                    warn!(stack = %name, "Stack create interrupted");
                    return Err(StackError::Interrupted {
                        stack: name.to_string(),
                    });
                }
            }
        }
    }

    /// Delete a stack, retrying the whole delete-and-wait sequence.
    ///
    /// A no-op for a stack without a backend id or already deleted. Makes
    /// at most `retries` attempts (at least one), pausing between them;
    /// only the last failure is returned.
    pub async fn delete(&self, name: &str, block: bool, retries: u32) -> StackResult<()> {
        let handle = {
            let stacks = self.stacks.read().await;
            stacks
                .iter()
                .find(|s| s.name == name && s.status() != StackStatus::DeleteComplete)
                .and_then(DeployedStack::handle)
        };
        let Some(handle) = handle else {
            debug!(stack = %name, "No backend stack to delete");
            return Ok(());
        };

        let attempts = retries.max(1);
        let mut attempt = 1;
        loop {
            match self.delete_once(&handle, block).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() && attempt < attempts => {
                    warn!(
                        stack = %name,
                        attempt,
                        attempts,
                        error = %err,
                        "Stack delete failed, retrying"
                    );
                    sleep(self.config.retry_backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(stack = %name, attempt, error = %err, "Stack delete failed");
                    return Err(err);
                }
            }
        }
    }

    async fn delete_once(&self, handle: &StackHandle, block: bool) -> StackResult<()> {
        let name = handle.name.as_str();
        info!(stack = %name, id = %handle.id, "Deleting stack");

        if !self.backend.delete(handle).await? {
            let reason = "backend refused the delete request".to_string();
            self.update(name, |stack| {
                stack.status_reason = Some(reason.clone());
                Ok(())
            })
            .await?;
            return Err(StackError::DeleteFailed {
                stack: name.to_string(),
                reason,
            });
        }
        self.update(name, |stack| match stack.status() {
            StackStatus::Deleting => Ok(()),
            _ => stack.apply(StackCommand::BeginDelete),
        })
        .await?;

        if !block {
            return Ok(());
        }

        let timeout = self.config.delete_timeout;
        let deadline = Instant::now() + timeout;
        loop {
            let reported = self.backend.get_status(handle).await?;
            match reported.status.parse::<StackStatus>() {
                Ok(StackStatus::DeleteComplete) => {
                    self.update(name, |stack| stack.observe(StackStatus::DeleteComplete))
                        .await?;
                    info!(stack = %name, "Stack deleted");
                    return Ok(());
                }
                Ok(StackStatus::DeleteFailed) => {
                    let reason = reported
                        .reason
                        .unwrap_or_else(|| reported.status.clone());
                    self.update(name, |stack| {
                        stack.status_reason = Some(reason.clone());
                        stack.observe(StackStatus::DeleteFailed)
                    })
                    .await?;
                    return Err(StackError::DeleteFailed {
                        stack: name.to_string(),
                        reason,
                    });
                }
                Ok(_) => debug!(stack = %name, status = %reported.status, "Stack still deleting"),
                Err(err) => {
                    warn!(stack = %name, status = %reported.status, error = %err, "Ignoring unrecognized stack status");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(StackError::Timeout {
                    stack: name.to_string(),
                    operation: "delete",
                    timeout,
                });
            }
            sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }

    /// Delete every tracked stack, newest first.
    ///
    /// Keeps going after a failure and returns the first error once every
    /// stack has been tried.
    pub async fn delete_all(&self) -> StackResult<()> {
        let names = self.tracked().await;
        info!(stacks = names.len(), "Deleting all tracked stacks");

        let mut first_error = None;
        for name in names.iter().rev() {
            if let Err(err) = self.delete(name, true, self.config.delete_retries).await {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn register(&self, name: &str) -> StackResult<()> {
        let mut stacks = self.stacks.write().await;
        match stacks.iter().position(|s| s.name == name) {
            Some(i) if matches!(stacks[i].status(), StackStatus::NotCreated | StackStatus::DeleteComplete) => {
                stacks[i] = DeployedStack::new(name);
            }
            Some(_) => return Err(StackError::AlreadyExists(name.to_string())),
            None => stacks.push(DeployedStack::new(name)),
        }
        Ok(())
    }

    async fn update<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut DeployedStack) -> StackResult<T>,
    ) -> StackResult<T> {
        let mut stacks = self.stacks.write().await;
        let stack = stacks
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| StackError::Backend(format!("stack '{}' is not tracked", name)))?;
        f(stack)
    }
}

/// `key -> value` map; string values are taken as is
fn flatten_outputs(outputs: Vec<StackOutput>) -> HashMap<String, String> {
    outputs
        .into_iter()
        .map(|output| {
            let value = match output.value {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (output.key, value)
        })
        .collect()
}
