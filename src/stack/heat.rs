// Copyright (c) 2025 - Cowboy AI, Inc.

//! Orchestration service backend over its REST API
//!
//! Enabled with the `heat` feature.
//!
//! ```text
//! submit     = POST   {endpoint}/stacks
//! get_status = GET    {endpoint}/stacks/{name}/{id}
//! delete     = DELETE {endpoint}/stacks/{name}/{id}
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use stack_topology::stack::{HeatBackend, HeatConfig, StackManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HeatConfig {
//!         endpoint: "http://controller:8004/v1/tenant-id".to_string(),
//!         auth_token: "token".to_string(),
//!         timeout_secs: 30,
//!     };
//!     let manager = StackManager::new(HeatBackend::new(config)?);
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::errors::{StackError, StackResult};
use crate::graph::ResourceGraph;

use super::backend::{BackendStatus, OrchestrationBackend, StackHandle, StackOutput};

/// Connection settings for the orchestration service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatConfig {
    /// Service endpoint including the project, e.g. `http://host:8004/v1/<project>`
    pub endpoint: String,

    /// Keystone token sent as `X-Auth-Token`
    pub auth_token: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize)]
struct CreatedStack {
    stack: StackRef,
}

#[derive(Debug, Deserialize)]
struct StackRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StackEnvelope {
    stack: StackBody,
}

#[derive(Debug, Deserialize)]
struct StackBody {
    stack_status: String,
    #[serde(default)]
    stack_status_reason: Option<String>,
    #[serde(default)]
    outputs: Vec<StackOutput>,
}

/// Backend talking to a real orchestration service
pub struct HeatBackend {
    config: HeatConfig,
    client: Client,
}

impl HeatBackend {
    pub fn new(config: HeatConfig) -> StackResult<Self> {
        info!("Using orchestration service at {}", config.endpoint);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    "X-Auth-Token",
                    config
                        .auth_token
                        .parse()
                        .map_err(|e| StackError::Backend(format!("Invalid auth token: {}", e)))?,
                );
                headers.insert(
                    "Content-Type",
                    "application/json"
                        .parse()
                        .map_err(|e| StackError::Backend(format!("Invalid header: {}", e)))?,
                );
                headers
            })
            .build()
            .map_err(|e| StackError::Backend(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn stack_url(&self, handle: &StackHandle) -> String {
        format!(
            "{}/stacks/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            handle.name,
            handle.id
        )
    }

    async fn fetch(&self, handle: &StackHandle) -> StackResult<Option<StackBody>> {
        let url = self.stack_url(handle);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StackError::Backend(format!("Failed to query stack: {}", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let envelope: StackEnvelope = response
                    .json()
                    .await
                    .map_err(|e| StackError::Backend(format!("Invalid stack response: {}", e)))?;
                Ok(Some(envelope.stack))
            }
            status => Err(StackError::Backend(format!(
                "Stack query returned {}: {}",
                status,
                response.text().await.unwrap_or_default()
            ))),
        }
    }
}

#[async_trait]
impl OrchestrationBackend for HeatBackend {
    async fn submit(
        &self,
        name: &str,
        graph: &ResourceGraph,
        parameters: &BTreeMap<String, String>,
    ) -> StackResult<StackHandle> {
        let url = format!("{}/stacks", self.config.endpoint.trim_end_matches('/'));
        let body = json!({
            "stack_name": name,
            "template": graph.to_template(),
            "parameters": parameters,
            "disable_rollback": true,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| StackError::Backend(format!("Failed to submit stack: {}", e)))?;

        if response.status() == StatusCode::CREATED || response.status() == StatusCode::OK {
            let created: CreatedStack = response
                .json()
                .await
                .map_err(|e| StackError::Backend(format!("Invalid create response: {}", e)))?;
            debug!(stack = %name, id = %created.stack.id, "Stack accepted");
            Ok(StackHandle {
                id: created.stack.id,
                name: name.to_string(),
            })
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(StackError::Backend(format!(
                "Stack submit returned {}: {}",
                status, body
            )))
        }
    }

    async fn get_status(&self, handle: &StackHandle) -> StackResult<BackendStatus> {
        Ok(match self.fetch(handle).await? {
            Some(stack) => BackendStatus {
                status: stack.stack_status,
                reason: stack.stack_status_reason,
            },
            // a deleted stack eventually disappears from the API
            None => BackendStatus::new("DELETE_COMPLETE"),
        })
    }

    async fn get_outputs(&self, handle: &StackHandle) -> StackResult<Vec<StackOutput>> {
        self.fetch(handle)
            .await?
            .map(|stack| stack.outputs)
            .ok_or_else(|| StackError::Backend(format!("stack '{}' not found", handle.name)))
    }

    async fn delete(&self, handle: &StackHandle) -> StackResult<bool> {
        let response = self
            .client
            .delete(self.stack_url(handle))
            .send()
            .await
            .map_err(|e| StackError::Backend(format!("Failed to delete stack: {}", e)))?;

        let status = response.status();
        debug!(stack = %handle.name, %status, "Delete requested");
        Ok(status == StatusCode::NO_CONTENT || status == StatusCode::NOT_FOUND || status.is_success())
    }

    fn name(&self) -> &str {
        "heat"
    }
}
