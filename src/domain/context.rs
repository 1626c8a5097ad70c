// Copyright (c) 2025 - Cowboy AI, Inc.
//! Context aggregate
//!
//! A context owns every network, server and group of one stack. It is built
//! in one pass from configuration; any reference problem fails the whole
//! build before anything reaches the compiler or a backend.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tracing::{debug, info};

use crate::compiler::compile;
use crate::config::{ContextConfig, FlavorSpec, DEFAULT_USER};
use crate::errors::{StackResult, TopologyError, TopologyResult};
use crate::stack::{CreateOptions, DeployedStack, OrchestrationBackend, StackManager};

use super::network::{find_external_network, Network};
use super::object::TopologyObject;
use super::policy::{PlacementGroup, ServerGroup};
use super::server::{Server, ServerDefaults};

/// Topology of one stack
#[derive(Debug, Clone)]
pub struct Context {
    name: String,
    keypair_name: String,
    secgroup_name: String,
    image: Option<String>,
    flavor: Option<FlavorSpec>,
    user: String,
    public_key: Option<String>,
    timeout: Duration,
    parameters: BTreeMap<String, String>,
    pub(crate) networks: Vec<Network>,
    pub(crate) servers: Vec<Server>,
    pub(crate) placement_groups: Vec<PlacementGroup>,
    pub(crate) server_groups: Vec<ServerGroup>,
    server_map: HashMap<String, usize>,
    stack: Option<DeployedStack>,
}

impl Context {
    /// Build a context from its configuration.
    ///
    /// Groups are built first, then networks (with their routers), then
    /// servers. Servers resolve group references against this context only.
    pub fn init(config: &ContextConfig) -> TopologyResult<Self> {
        let name = config.name.clone();
        if name.is_empty() {
            return Err(TopologyError::Configuration("context name must not be empty".to_string()));
        }
        let keypair_name = format!("{}-key", name);
        let secgroup_name = format!("{}-secgroup", name);

        let placement_groups = config
            .placement_groups
            .iter()
            .map(|(group, cfg)| PlacementGroup::new(group, &name, &cfg.policy))
            .collect::<TopologyResult<Vec<_>>>()?;
        let server_groups = config
            .server_groups
            .iter()
            .map(|(group, cfg)| ServerGroup::new(group, &name, &cfg.policy))
            .collect::<TopologyResult<Vec<_>>>()?;

        let networks = config
            .networks
            .iter()
            .map(|(network, cfg)| Network::new(network, &name, cfg))
            .collect::<TopologyResult<Vec<_>>>()?;

        // server groups and networks share the `<context>-<name>` namespace
        for group in &server_groups {
            if networks
                .iter()
                .flat_map(Network::resource_names)
                .any(|resource| resource == group.stack_name())
            {
                return Err(TopologyError::Duplicate {
                    kind: "resource name",
                    name: group.stack_name().to_string(),
                });
            }
        }

        let mut context = Self {
            user: config.user.clone().unwrap_or_else(|| DEFAULT_USER.to_string()),
            image: config.image.clone(),
            flavor: config.flavor.clone(),
            public_key: config.public_key.clone(),
            timeout: Duration::from_secs(config.timeout),
            parameters: config.parameters.clone(),
            networks,
            servers: Vec::with_capacity(config.servers.len()),
            placement_groups,
            server_groups,
            server_map: HashMap::new(),
            stack: None,
            keypair_name,
            secgroup_name,
            name,
        };

        for (server_name, cfg) in config.servers.iter() {
            let defaults = ServerDefaults {
                context_name: &context.name,
                keypair_name: &context.keypair_name,
                secgroup_name: &context.secgroup_name,
                image: context.image.as_deref(),
                flavor: context.flavor.as_ref(),
                user: config.user.as_deref(),
            };
            let server = Server::new(server_name, defaults, cfg, &context.networks)?;
            context.join_groups(&server)?;
            debug!(server = %server.dn(), instances = server.instances(), "Server added to topology");
            context.server_map.insert(server.dn(), context.servers.len());
            context.servers.push(server);
        }

        info!(
            context = %context.name,
            networks = context.networks.len(),
            servers = context.servers.len(),
            "Context initialized"
        );
        Ok(context)
    }

    fn join_groups(&mut self, server: &Server) -> TopologyResult<()> {
        for group_name in server.placement_groups() {
            let group = self
                .placement_groups
                .iter_mut()
                .find(|g| g.name() == group_name)
                .ok_or_else(|| TopologyError::UnknownPlacementGroup {
                    server: server.dn(),
                    group: group_name.clone(),
                })?;
            group.add_member(server.stack_name());
        }

        if let Some(group_name) = server.server_group() {
            let group = self
                .server_groups
                .iter_mut()
                .find(|g| g.name() == group_name)
                .ok_or_else(|| TopologyError::UnknownServerGroup {
                    server: server.dn(),
                    group: group_name.to_string(),
                })?;
            group.add_member(server.stack_name());
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keypair_name(&self) -> &str {
        &self.keypair_name
    }

    pub fn secgroup_name(&self) -> &str {
        &self.secgroup_name
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn flavor(&self) -> Option<&FlavorSpec> {
        self.flavor.as_ref()
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref()
    }

    /// Blocking deploy timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub fn networks(&self) -> &[Network] {
        &self.networks
    }

    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn placement_groups(&self) -> &[PlacementGroup] {
        &self.placement_groups
    }

    pub fn server_groups(&self) -> &[ServerGroup] {
        &self.server_groups
    }

    pub fn network(&self, name: &str) -> Option<&Network> {
        self.networks.iter().find(|n| n.name() == name)
    }

    pub fn placement_group(&self, name: &str) -> Option<&PlacementGroup> {
        self.placement_groups.iter().find(|g| g.name() == name)
    }

    pub fn server_group(&self, name: &str) -> Option<&ServerGroup> {
        self.server_groups.iter().find(|g| g.name() == name)
    }

    /// Look up a server by distinguished name
    pub fn server(&self, dn: &str) -> Option<&Server> {
        self.server_map.get(dn).map(|&i| &self.servers[i])
    }

    /// External network reached by the first routed network, if any
    pub fn find_external_network(&self) -> Option<&str> {
        find_external_network(&self.networks)
    }

    /// Deployed stack, once [`deploy`](Self::deploy) succeeded
    pub fn stack(&self) -> Option<&DeployedStack> {
        self.stack.as_ref()
    }

    /// Copy stack outputs into networks and servers
    pub fn apply_outputs(&mut self, outputs: &HashMap<String, String>) {
        for network in &mut self.networks {
            let stack_id = outputs.get(&format!("{}-id", network.stack_name())).cloned();
            network.meta_mut().stack_id = stack_id;
        }
        for server in &mut self.servers {
            server.apply_outputs(outputs, &self.networks);
        }
    }

    /// Compile, create the stack and wait for it, then capture outputs.
    pub async fn deploy<B: OrchestrationBackend>(&mut self, manager: &StackManager<B>) -> StackResult<()> {
        info!(context = %self.name, "Deploying context");
        let graph = compile(self)?;
        let stack = manager
            .create(&self.name, &graph, &self.parameters, CreateOptions::blocking(self.timeout))
            .await?;

        self.apply_outputs(&stack.outputs);
        info!(
            context = %self.name,
            stack_id = stack.id.as_deref().unwrap_or_default(),
            "Context deployed"
        );
        self.stack = Some(stack);
        Ok(())
    }

    /// Delete the context's stack, retrying as configured
    pub async fn undeploy<B: OrchestrationBackend>(&mut self, manager: &StackManager<B>) -> StackResult<()> {
        info!(context = %self.name, "Undeploying context");
        manager
            .delete(&self.name, true, manager.config().delete_retries)
            .await?;
        self.stack = None;
        Ok(())
    }
}
