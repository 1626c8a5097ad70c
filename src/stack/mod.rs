// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack lifecycle
//!
//! - [`OrchestrationBackend`] - boundary to the service that runs stacks
//! - [`StackManager`] - create / poll / delete with deadlines and retries
//! - [`SimulatedBackend`] - in-memory backend for dry runs and tests
//! - `HeatBackend` - REST backend (feature `heat`)

pub mod backend;
pub mod manager;
pub mod simulated;

#[cfg(feature = "heat")]
pub mod heat;

pub use backend::{BackendStatus, OrchestrationBackend, StackHandle, StackOutput};
pub use manager::{CreateOptions, DeployedStack, StackManager};
pub use simulated::SimulatedBackend;

#[cfg(feature = "heat")]
pub use heat::{HeatBackend, HeatConfig};
