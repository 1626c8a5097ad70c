// Copyright (c) 2025 - Cowboy AI, Inc.
//! Orchestration backend boundary
//!
//! The only seam through which stacks reach a real service. The lifecycle
//! manager talks to a backend; the compiler never does.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::StackResult;
use crate::graph::ResourceGraph;

/// Handle returned by a successful submit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackHandle {
    pub id: String,
    pub name: String,
}

/// One stack output as reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackOutput {
    #[serde(rename = "output_key")]
    pub key: String,
    #[serde(rename = "output_value")]
    pub value: Value,
}

/// Raw stack status as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendStatus {
    /// Status string, e.g. `CREATE_IN_PROGRESS`
    pub status: String,

    /// Backend explanation, mostly set on failures
    pub reason: Option<String>,
}

impl BackendStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            reason: None,
        }
    }

    pub fn with_reason(status: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            reason: Some(reason.into()),
        }
    }
}

/// Service that instantiates resource graphs as stacks.
///
/// Implementations must be thread-safe (`Send + Sync`); the manager may be
/// shared with an interrupt handler that runs cleanup.
#[async_trait]
pub trait OrchestrationBackend: Send + Sync {
    /// Start creating a stack from `graph`
    async fn submit(
        &self,
        name: &str,
        graph: &ResourceGraph,
        parameters: &BTreeMap<String, String>,
    ) -> StackResult<StackHandle>;

    /// Current status of a stack
    async fn get_status(&self, handle: &StackHandle) -> StackResult<BackendStatus>;

    /// Outputs of a created stack
    async fn get_outputs(&self, handle: &StackHandle) -> StackResult<Vec<StackOutput>>;

    /// Request deletion; `false` when the backend refused the request
    async fn delete(&self, handle: &StackHandle) -> StackResult<bool>;

    /// Backend name for logging
    fn name(&self) -> &str;
}
