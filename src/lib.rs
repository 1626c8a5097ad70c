// Copyright (c) 2025 - Cowboy AI, Inc.
//! Ephemeral cloud test topologies
//!
//! Builds a logical topology from configuration, compiles it into a
//! dependency-ordered resource graph with placement-aware scheduler hints,
//! and drives the resulting stack through create and delete.
//!
//! ```text
//! ContextConfig → TopologyRegistry → Context → compile → ResourceGraph
//!                                       ↑                    ↓
//!                                    outputs ← StackManager ← backend
//! ```

pub mod compiler;
pub mod config;
pub mod domain;
pub mod errors;
pub mod graph;
pub mod stack;
pub mod state_machine;

// Re-export commonly used types
pub use compiler::{compile, SchedulerHints};
pub use config::{ContextConfig, DeployConfig};
pub use domain::{Context, Server, TopologyRegistry};
pub use errors::{GraphError, StackError, StackResult, TopologyError, TopologyResult};
pub use graph::{ResourceGraph, ResourceType};
pub use stack::{CreateOptions, DeployedStack, OrchestrationBackend, SimulatedBackend, StackManager};
pub use state_machine::StackStatus;
