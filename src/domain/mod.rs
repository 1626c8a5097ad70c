// Copyright (c) 2025 - Cowboy AI, Inc.
//! Logical Topology Model
//!
//! Entities that capture what the user asked for, before anything is
//! compiled or deployed.
//!
//! # Value Objects with Invariants
//!
//! - [`Cidr`] - Subnet address with prefix length
//! - [`SegmentationId`] - Provider segment (1-4094)
//! - [`PlacementPolicy`] / [`ServerGroupPolicy`] - Closed policy vocabularies
//!
//! # Entities
//!
//! - [`Context`] - Owns the networks, servers and groups of one stack
//! - [`Network`] / [`Router`] - Tenant or provider network, optional router
//! - [`Server`] - One or more compute instances
//! - [`PlacementGroup`] / [`ServerGroup`] - Named placement constraints
//!
//! # Build Session
//!
//! [`TopologyRegistry`] replaces process-wide lookup tables: every context
//! built through one registry shares its name indexes, and nothing leaks
//! between registries.

pub mod context;
pub mod network;
pub mod object;
pub mod policy;
pub mod registry;
pub mod server;

pub use context::Context;
pub use network::{Cidr, Network, Router, SegmentationId};
pub use object::{ObjectMeta, TopologyObject};
pub use policy::{Group, GroupPolicy, PlacementGroup, PlacementPolicy, ServerGroup, ServerGroupPolicy};
pub use registry::{ServerInfo, TopologyRegistry};
pub use server::{FloatingIp, Interface, PortRef, Server, ServerDefaults};
