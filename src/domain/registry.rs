// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology build session
//!
//! Owns every context built in one session along with the name indexes
//! used for cross-context lookup.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::warn;

use crate::config::ContextConfig;
use crate::errors::{TopologyError, TopologyResult};

use super::context::Context;
use super::object::TopologyObject;
use super::server::{Interface, Server};

/// Connection details for a deployed server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub user: String,
    pub keypair_name: String,
    pub private_ip: Option<String>,
    pub public_ip: Option<String>,
    pub interfaces: BTreeMap<String, Interface>,
}

/// Contexts and name indexes of one build session
#[derive(Debug, Default)]
pub struct TopologyRegistry {
    contexts: Vec<Context>,
    context_index: HashMap<String, usize>,
    placement_groups: HashMap<String, String>,
    server_groups: HashMap<String, String>,
    servers: HashMap<String, usize>,
}

impl TopologyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context and register it.
    ///
    /// Context and group names are unique across the session. Nothing is
    /// registered if any part of the context fails to build.
    pub fn build_context(&mut self, config: &ContextConfig) -> TopologyResult<&mut Context> {
        if self.context_index.contains_key(&config.name) {
            return Err(TopologyError::Duplicate {
                kind: "context",
                name: config.name.clone(),
            });
        }
        if let Some(name) = config.placement_groups.keys().find(|n| self.placement_groups.contains_key(*n)) {
            return Err(TopologyError::Duplicate {
                kind: "placement group",
                name: name.to_string(),
            });
        }
        if let Some(name) = config.server_groups.keys().find(|n| self.server_groups.contains_key(*n)) {
            return Err(TopologyError::Duplicate {
                kind: "server group",
                name: name.to_string(),
            });
        }

        let context = Context::init(config).map_err(|err| {
            warn!(context = %config.name, error = %err, "Topology rejected");
            err
        })?;

        let position = self.contexts.len();
        self.context_index.insert(context.name().to_string(), position);
        for group in context.placement_groups() {
            self.placement_groups
                .insert(group.name().to_string(), context.name().to_string());
        }
        for group in context.server_groups() {
            self.server_groups
                .insert(group.name().to_string(), context.name().to_string());
        }
        for server in context.servers() {
            self.servers.insert(server.dn(), position);
        }
        self.contexts.push(context);
        Ok(&mut self.contexts[position])
    }

    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    pub fn contexts_mut(&mut self) -> impl Iterator<Item = &mut Context> {
        self.contexts.iter_mut()
    }

    pub fn context(&self, name: &str) -> Option<&Context> {
        self.context_index.get(name).map(|&i| &self.contexts[i])
    }

    pub fn context_mut(&mut self, name: &str) -> Option<&mut Context> {
        self.context_index.get(name).map(|&i| &mut self.contexts[i])
    }

    /// Look up a server by distinguished name across every context
    pub fn server(&self, dn: &str) -> Option<&Server> {
        self.servers
            .get(dn)
            .and_then(|&i| self.contexts[i].server(dn))
    }

    /// Login and addressing details of a server
    pub fn server_info(&self, dn: &str) -> Option<ServerInfo> {
        self.server(dn).map(|server| ServerInfo {
            user: server.user().to_string(),
            keypair_name: server.keypair_name().to_string(),
            private_ip: server.private_ip().map(str::to_string),
            public_ip: server.public_ip().map(str::to_string),
            interfaces: server.interfaces().clone(),
        })
    }
}
