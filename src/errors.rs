// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for topology construction, graph compilation and stack lifecycle

use std::time::Duration;

use thiserror::Error;

use crate::state_machine::TransitionError;

/// Errors raised while building the logical topology from configuration.
///
/// These are always raised before any compiler or backend call and are never
/// retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// A server referenced a placement group that was never declared
    #[error("server '{server}' references unknown placement group '{group}'")]
    UnknownPlacementGroup { server: String, group: String },

    /// A server referenced a server group that was never declared
    #[error("server '{server}' references unknown server group '{group}'")]
    UnknownServerGroup { server: String, group: String },

    /// A server asked to be attached to a network the context does not own
    #[error("server '{server}' references unknown network '{network}'")]
    UnknownNetwork { server: String, network: String },

    /// Policy string not in the group's vocabulary
    #[error("invalid {kind} policy '{policy}'")]
    InvalidPolicy { kind: &'static str, policy: String },

    /// Floating IP requested but nothing routes to an external network
    #[error("server '{server}' requests a floating IP but no network in context '{context}' has an external route")]
    NoExternalNetwork { server: String, context: String },

    /// Floating IP requested but none of the server's networks routes to
    /// the context's external network
    #[error("server '{server}' requests a floating IP but none of its attached networks routes to '{external_network}'")]
    NoRouteToExternal { server: String, external_network: String },

    /// Subnet CIDR could not be parsed
    #[error("invalid CIDR '{0}'")]
    InvalidCidr(String),

    /// Provider segmentation id out of range
    #[error("invalid segmentation id {0} (must be 1-4094)")]
    InvalidSegmentationId(u32),

    /// Instance count of zero
    #[error("server '{0}' must request at least one instance")]
    NoInstances(String),

    /// Name declared twice within one build session
    #[error("duplicate {kind} '{name}'")]
    Duplicate { kind: &'static str, name: String },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type for topology construction
pub type TopologyResult<T> = Result<T, TopologyError>;

/// Resource graph consistency violations.
///
/// The compiler only appends resources whose dependencies already exist, so
/// these indicate a programming error rather than bad user input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Resource name already present in the graph
    #[error("resource '{0}' already exists in the graph")]
    DuplicateResource(String),

    /// `depends_on` names a resource not yet in the graph
    #[error("resource '{resource}' depends on '{dependency}' which is not in the graph")]
    MissingDependency { resource: String, dependency: String },
}

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors surfaced by the stack lifecycle manager
#[derive(Debug, Error)]
pub enum StackError {
    /// Backend reported CREATE_FAILED
    #[error("stack '{stack}' creation failed: {reason}")]
    CreateFailed { stack: String, reason: String },

    /// Backend reported DELETE_FAILED, or refused the delete call
    #[error("stack '{stack}' deletion failed: {reason}")]
    DeleteFailed { stack: String, reason: String },

    /// Blocking wait exceeded its deadline
    #[error("stack '{stack}' {operation} timeout after {}s", .timeout.as_secs())]
    Timeout {
        stack: String,
        operation: &'static str,
        timeout: Duration,
    },

    /// Blocking wait was cancelled from outside
    #[error("deploy of stack '{stack}' interrupted")]
    Interrupted { stack: String },

    /// Transport or protocol error talking to the backend
    #[error("Backend error: {0}")]
    Backend(String),

    /// A live stack with this name is already tracked
    #[error("stack '{0}' already exists")]
    AlreadyExists(String),

    /// Observed status change not allowed by the lifecycle
    #[error("Lifecycle error: {0}")]
    InvalidTransition(#[from] TransitionError),

    /// Graph could not be compiled for deployment
    #[error("Compile error: {0}")]
    Compile(#[from] GraphError),
}

impl StackError {
    /// True when the error came from an exhausted blocking wait
    pub fn is_timeout(&self) -> bool {
        matches!(self, StackError::Timeout { .. })
    }

    /// True when the error came from an external cancellation
    pub fn is_interrupted(&self) -> bool {
        matches!(self, StackError::Interrupted { .. })
    }

    /// Whether a delete attempt failing with this error is worth resubmitting
    pub(crate) fn is_retryable(&self) -> bool {
        matches!(
            self,
            StackError::DeleteFailed { .. } | StackError::Backend(_) | StackError::Timeout { .. }
        )
    }
}

/// Result type for stack lifecycle operations
pub type StackResult<T> = Result<T, StackError>;

impl From<serde_json::Error> for StackError {
    fn from(err: serde_json::Error) -> Self {
        StackError::Backend(format!("Serialization error: {}", err))
    }
}
