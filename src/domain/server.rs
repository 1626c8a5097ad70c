// Copyright (c) 2025 - Cowboy AI, Inc.
//! Server entity
//!
//! A server expands into one or more instances. Each instance gets its own
//! ports (one per attached network), an optional floating IP and an optional
//! volume. Naming is positional: instance 0 keeps the server's stack name,
//! instance `i` is `<stack_name>-<i>`.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::compiler::SchedulerHints;
use crate::config::{FlavorSpec, ServerConfig, VolumeSpec, DEFAULT_USER, DEFAULT_VOLUME_MOUNTPOINT};
use crate::errors::{GraphResult, TopologyError, TopologyResult};
use crate::graph::{get_attr, get_resource, ResourceGraph, ResourceType};

use super::network::{find_external_network, Network};
use super::object::{ObjectMeta, TopologyObject};

/// Context-level defaults a server inherits at construction
#[derive(Debug, Clone, Copy)]
pub struct ServerDefaults<'a> {
    pub context_name: &'a str,
    pub keypair_name: &'a str,
    pub secgroup_name: &'a str,
    pub image: Option<&'a str>,
    pub flavor: Option<&'a FlavorSpec>,
    pub user: Option<&'a str>,
}

/// Port created for the primary instance on one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRef {
    pub stack_name: String,
}

/// Public address requested through an external network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloatingIp {
    /// Resource name for the primary instance
    pub stack_name: String,

    /// External network the address is allocated from
    pub external_network: String,

    /// Attached network whose router reaches the external network
    pub network: String,
}

/// Addressing of one attached network, filled from stack outputs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub private_ip: Option<String>,
    pub mac_address: Option<String>,
    pub subnet_cidr: Option<String>,
    pub gateway_ip: Option<String>,
}

/// Compute server, possibly several instances
#[derive(Debug, Clone, PartialEq)]
pub struct Server {
    meta: ObjectMeta,
    keypair_name: String,
    secgroup_name: String,
    user: String,
    image: Option<String>,
    flavor: Option<FlavorSpec>,
    placement_groups: Vec<String>,
    server_group: Option<String>,
    instances: u32,
    networks: Vec<String>,
    ports: BTreeMap<String, PortRef>,
    floating_ip: Option<FloatingIp>,
    floating_ip_assoc: Option<String>,
    volume: Option<VolumeSpec>,
    volume_mountpoint: String,
    availability_zone: Option<String>,
    user_data: Option<String>,
    public_ip: Option<String>,
    private_ip: Option<String>,
    interfaces: BTreeMap<String, Interface>,
}

impl Server {
    /// Build a server from its declaration.
    ///
    /// `networks` are the networks already built for the context, in
    /// declaration order. Group names are copied but not resolved here.
    pub fn new(
        name: &str,
        defaults: ServerDefaults<'_>,
        config: &ServerConfig,
        networks: &[Network],
    ) -> TopologyResult<Self> {
        let meta = ObjectMeta::new(name, defaults.context_name, format!("{}.{}", name, defaults.context_name));
        let stack_name = meta.stack_name.clone();

        if config.instances == 0 {
            return Err(TopologyError::NoInstances(meta.dn()));
        }

        let attached: Vec<String> = match &config.networks {
            Some(names) => {
                for network in names {
                    if !networks.iter().any(|n| n.name() == network) {
                        return Err(TopologyError::UnknownNetwork {
                            server: meta.dn(),
                            network: network.clone(),
                        });
                    }
                }
                names.clone()
            }
            None => networks.iter().map(|n| n.name().to_string()).collect(),
        };

        let floating_ip = if config.floating_ip {
            let external_network =
                find_external_network(networks).ok_or_else(|| TopologyError::NoExternalNetwork {
                    server: meta.dn(),
                    context: defaults.context_name.to_string(),
                })?;
            let network = attached
                .iter()
                .filter_map(|name| networks.iter().find(|n| n.name() == name))
                .find(|n| n.has_route_to(external_network))
                .ok_or_else(|| TopologyError::NoRouteToExternal {
                    server: meta.dn(),
                    external_network: external_network.to_string(),
                })?;
            Some(FloatingIp {
                stack_name: format!("{}-fip", stack_name),
                external_network: external_network.to_string(),
                network: network.name().to_string(),
            })
        } else {
            None
        };

        Ok(Self {
            keypair_name: defaults.keypair_name.to_string(),
            secgroup_name: defaults.secgroup_name.to_string(),
            user: config
                .user
                .as_deref()
                .or(defaults.user)
                .unwrap_or(DEFAULT_USER)
                .to_string(),
            image: config.image.as_deref().or(defaults.image).map(str::to_string),
            flavor: config.flavor.clone().or_else(|| defaults.flavor.cloned()),
            placement_groups: config.placement.clone().map(|p| p.into_vec()).unwrap_or_default(),
            server_group: config.server_group.clone(),
            instances: config.instances,
            networks: attached,
            ports: BTreeMap::new(),
            floating_ip_assoc: floating_ip.as_ref().map(|_| format!("{}-fip-assoc", stack_name)),
            floating_ip,
            volume: config.volume.clone(),
            volume_mountpoint: config
                .volume_mountpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_VOLUME_MOUNTPOINT.to_string()),
            availability_zone: config.availability_zone.clone(),
            user_data: config.user_data.clone(),
            public_ip: None,
            private_ip: None,
            interfaces: BTreeMap::new(),
            meta,
        })
    }

    pub fn keypair_name(&self) -> &str {
        &self.keypair_name
    }

    pub fn secgroup_name(&self) -> &str {
        &self.secgroup_name
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn flavor(&self) -> Option<&FlavorSpec> {
        self.flavor.as_ref()
    }

    /// Placement group names, in declaration order
    pub fn placement_groups(&self) -> &[String] {
        &self.placement_groups
    }

    pub fn server_group(&self) -> Option<&str> {
        self.server_group.as_deref()
    }

    pub fn instances(&self) -> u32 {
        self.instances
    }

    /// Attached network names
    pub fn networks(&self) -> &[String] {
        &self.networks
    }

    /// Primary instance ports by network name, filled by compilation
    pub fn ports(&self) -> &BTreeMap<String, PortRef> {
        &self.ports
    }

    pub fn floating_ip(&self) -> Option<&FloatingIp> {
        self.floating_ip.as_ref()
    }

    pub fn floating_ip_assoc(&self) -> Option<&str> {
        self.floating_ip_assoc.as_deref()
    }

    pub fn public_ip(&self) -> Option<&str> {
        self.public_ip.as_deref()
    }

    pub fn private_ip(&self) -> Option<&str> {
        self.private_ip.as_deref()
    }

    pub fn interfaces(&self) -> &BTreeMap<String, Interface> {
        &self.interfaces
    }

    /// Resource name of instance `index`
    pub fn instance_name(&self, index: u32) -> String {
        if index == 0 {
            self.stack_name().to_string()
        } else {
            format!("{}-{}", self.stack_name(), index)
        }
    }

    /// Resource names of every instance, in order
    pub fn instance_names(&self) -> Vec<String> {
        (0..self.instances).map(|i| self.instance_name(i)).collect()
    }

    fn flavor_stack_name(&self) -> String {
        format!("{}-flavor", self.stack_name())
    }

    /// Emit every resource of this server.
    ///
    /// Resources are appended instance by instance, each instance's ports
    /// and addresses ahead of the instance itself.
    pub(crate) fn add_to_graph(
        &mut self,
        graph: &mut ResourceGraph,
        networks: &[Network],
        hints: &SchedulerHints,
    ) -> GraphResult<()> {
        let flavor = match &self.flavor {
            Some(FlavorSpec::Inline(inline)) => {
                let flavor_name = self.flavor_stack_name();
                graph.add_resource(
                    &flavor_name,
                    ResourceType::Flavor,
                    json!({
                        "name": inline.name.clone().unwrap_or_else(|| flavor_name.clone()),
                        "vcpus": inline.vcpus,
                        "ram": inline.ram,
                        "disk": inline.disk,
                        "extra_specs": inline.extra_specs,
                    }),
                    vec![],
                )?;
                Some((get_resource(&flavor_name), Some(flavor_name)))
            }
            Some(FlavorSpec::Named(name)) => Some((json!(name), None)),
            None => None,
        };

        let attached: Vec<&Network> = self
            .networks
            .iter()
            .filter_map(|name| networks.iter().find(|n| n.name() == name))
            .collect();

        self.ports.clear();
        for index in 0..self.instances {
            let instance = self.instance_name(index);

            let volume = match &self.volume {
                Some(VolumeSpec::Inline { size }) => {
                    let volume_name = format!("{}-volume", instance);
                    graph.add_resource(
                        &volume_name,
                        ResourceType::Volume,
                        json!({ "name": volume_name, "size": size }),
                        vec![],
                    )?;
                    Some((get_resource(&volume_name), Some(volume_name)))
                }
                Some(VolumeSpec::Existing(id)) => Some((json!(id), None)),
                None => None,
            };

            let mut port_names = Vec::with_capacity(attached.len());
            for network in &attached {
                let port_name = format!("{}-{}-port", instance, network.name());
                self.add_port(graph, &port_name, network)?;
                if index == 0 {
                    self.ports.insert(
                        network.name().to_string(),
                        PortRef {
                            stack_name: port_name.clone(),
                        },
                    );
                }

                if let Some(fip) = self.floating_ip.as_ref().filter(|f| f.network == network.name()) {
                    add_floating_ip(graph, &instance, fip, network, &port_name)?;
                }
                port_names.push(port_name);
            }

            let mut properties = Map::new();
            properties.insert("name".to_string(), json!(instance));
            properties.insert("key_name".to_string(), get_resource(&self.keypair_name));
            if let Some(image) = &self.image {
                properties.insert("image".to_string(), json!(image));
            }
            if let Some((flavor, _)) = &flavor {
                properties.insert("flavor".to_string(), flavor.clone());
            }
            properties.insert(
                "networks".to_string(),
                Value::Array(port_names.iter().map(|p| json!({ "port": get_resource(p) })).collect()),
            );
            if !hints.is_empty() {
                properties.insert("scheduler_hints".to_string(), hints.to_value());
            }
            if let Some(zone) = &self.availability_zone {
                properties.insert("availability_zone".to_string(), json!(zone));
            }
            if let Some(user_data) = &self.user_data {
                properties.insert("user_data".to_string(), json!(user_data));
            }

            let mut depends_on = port_names.clone();
            if let Some((_, Some(flavor_name))) = &flavor {
                depends_on.push(flavor_name.clone());
            }
            for hinted in hints.referenced_resources() {
                if !depends_on.iter().any(|d| d == hinted) {
                    depends_on.push(hinted.to_string());
                }
            }
            graph.add_resource(&instance, ResourceType::Server, Value::Object(properties), depends_on)?;
            graph.add_output(
                &instance,
                format!("Address of server {}", instance),
                get_attr(&instance, &[json!("first_address")]),
            );
            graph.add_output(
                format!("{}-id", instance),
                format!("ID of server {}", instance),
                get_resource(&instance),
            );

            if let Some((volume_id, volume_name)) = volume {
                let mut depends_on = vec![instance.clone()];
                depends_on.extend(volume_name);
                graph.add_resource(
                    format!("{}-volume-attachment", instance),
                    ResourceType::VolumeAttachment,
                    json!({
                        "instance_uuid": get_resource(&instance),
                        "volume_id": volume_id,
                        "mountpoint": self.volume_mountpoint,
                    }),
                    depends_on,
                )?;
            }
        }

        Ok(())
    }

    fn add_port(&self, graph: &mut ResourceGraph, port_name: &str, network: &Network) -> GraphResult<()> {
        let mut properties = Map::new();
        properties.insert("name".to_string(), json!(port_name));
        properties.insert("network_id".to_string(), get_resource(network.stack_name()));
        properties.insert(
            "fixed_ips".to_string(),
            json!([{ "subnet_id": get_resource(network.subnet_stack_name()) }]),
        );
        match network.port_security_enabled() {
            Some(false) => {
                properties.insert("port_security_enabled".to_string(), json!(false));
            }
            enabled => {
                properties.insert(
                    "security_groups".to_string(),
                    json!([get_resource(&self.secgroup_name)]),
                );
                if enabled.is_some() {
                    properties.insert("port_security_enabled".to_string(), json!(true));
                }
            }
        }
        if network.vnic_type() != "normal" {
            properties.insert("binding:vnic_type".to_string(), json!(network.vnic_type()));
        }
        if !network.allowed_address_pairs().is_empty() {
            properties.insert(
                "allowed_address_pairs".to_string(),
                json!(network.allowed_address_pairs()),
            );
        }

        graph.add_resource(
            port_name,
            ResourceType::Port,
            Value::Object(properties),
            vec![network.subnet_stack_name().to_string()],
        )?;
        graph.add_output(
            port_name,
            format!("Address of port {}", port_name),
            get_attr(port_name, &[json!("fixed_ips"), json!(0), json!("ip_address")]),
        );
        graph.add_output(
            format!("{}-mac_address", port_name),
            format!("MAC address of port {}", port_name),
            get_attr(port_name, &[json!("mac_address")]),
        );
        Ok(())
    }

    /// Copy backend-reported addresses into this server
    pub(crate) fn apply_outputs(&mut self, outputs: &HashMap<String, String>, networks: &[Network]) {
        self.meta.stack_id = outputs.get(&format!("{}-id", self.stack_name())).cloned();

        self.interfaces.clear();
        for (network_name, port) in &self.ports {
            let subnet = networks
                .iter()
                .find(|n| n.name() == network_name)
                .map(|n| n.subnet_stack_name().to_string());
            let lookup = |key: String| outputs.get(&key).cloned();
            self.interfaces.insert(
                network_name.clone(),
                Interface {
                    private_ip: outputs.get(&port.stack_name).cloned(),
                    mac_address: lookup(format!("{}-mac_address", port.stack_name)),
                    subnet_cidr: subnet.as_ref().and_then(|s| lookup(format!("{}-cidr", s))),
                    gateway_ip: subnet.as_ref().and_then(|s| lookup(format!("{}-gateway_ip", s))),
                },
            );
        }

        self.private_ip = self
            .networks
            .first()
            .and_then(|first| self.interfaces.get(first))
            .and_then(|iface| iface.private_ip.clone())
            .or_else(|| outputs.get(self.stack_name()).cloned());
        self.public_ip = self
            .floating_ip
            .as_ref()
            .and_then(|fip| outputs.get(&fip.stack_name).cloned());
    }
}

fn add_floating_ip(
    graph: &mut ResourceGraph,
    instance: &str,
    fip: &FloatingIp,
    network: &Network,
    port_name: &str,
) -> GraphResult<()> {
    let fip_name = format!("{}-fip", instance);
    let mut depends_on = Vec::new();
    if let Some(router) = network.router() {
        depends_on.push(router.stack_if_name().to_string());
    }
    graph.add_resource(
        &fip_name,
        ResourceType::FloatingIp,
        json!({ "floating_network": fip.external_network }),
        depends_on,
    )?;
    graph.add_output(
        &fip_name,
        format!("Floating address of {}", instance),
        get_attr(&fip_name, &[json!("floating_ip_address")]),
    );

    graph.add_resource(
        format!("{}-fip-assoc", instance),
        ResourceType::FloatingIpAssociation,
        json!({
            "floatingip_id": get_resource(&fip_name),
            "port_id": get_resource(port_name),
        }),
        vec![fip_name.clone(), port_name.to_string()],
    )
}

impl TopologyObject for Server {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InlineFlavor, NetworkConfig};

    fn defaults() -> ServerDefaults<'static> {
        ServerDefaults {
            context_name: "demo",
            keypair_name: "demo-key",
            secgroup_name: "demo-secgroup",
            image: Some("cirros"),
            flavor: None,
            user: None,
        }
    }

    fn networks() -> Vec<Network> {
        let routed = NetworkConfig {
            external_network: Some("public".to_string()),
            ..NetworkConfig::default()
        };
        let data = NetworkConfig {
            cidr: "10.0.2.0/24".to_string(),
            ..NetworkConfig::default()
        };
        vec![
            Network::new("mgmt", "demo", &routed).unwrap(),
            Network::new("data", "demo", &data).unwrap(),
        ]
    }

    fn graph_with(networks: &[Network]) -> ResourceGraph {
        let mut graph = ResourceGraph::new();
        graph.add_resource("demo-key", ResourceType::KeyPair, json!({}), vec![]).unwrap();
        graph
            .add_resource("demo-secgroup", ResourceType::SecurityGroup, json!({}), vec![])
            .unwrap();
        for network in networks {
            network.add_to_graph(&mut graph).unwrap();
        }
        graph
    }

    #[test]
    fn test_inherits_context_defaults() {
        let server = Server::new("athena", defaults(), &ServerConfig::default(), &networks()).unwrap();

        assert_eq!(server.stack_name(), "athena.demo");
        assert_eq!(server.dn(), "athena.demo");
        assert_eq!(server.keypair_name(), "demo-key");
        assert_eq!(server.image(), Some("cirros"));
        assert_eq!(server.user(), DEFAULT_USER);
        assert_eq!(server.networks(), &["mgmt".to_string(), "data".to_string()]);
    }

    #[test]
    fn test_unknown_network_rejected() {
        let config = ServerConfig {
            networks: Some(vec!["nope".to_string()]),
            ..ServerConfig::default()
        };
        assert_eq!(
            Server::new("athena", defaults(), &config, &networks()),
            Err(TopologyError::UnknownNetwork {
                server: "athena.demo".to_string(),
                network: "nope".to_string(),
            })
        );
    }

    #[test]
    fn test_floating_ip_needs_routed_network() {
        let config = ServerConfig {
            floating_ip: true,
            networks: Some(vec!["data".to_string()]),
            ..ServerConfig::default()
        };
        assert!(matches!(
            Server::new("athena", defaults(), &config, &networks()),
            Err(TopologyError::NoRouteToExternal { .. })
        ));

        let config = ServerConfig {
            floating_ip: true,
            ..ServerConfig::default()
        };
        let server = Server::new("athena", defaults(), &config, &networks()).unwrap();
        let fip = server.floating_ip().unwrap();
        assert_eq!(fip.stack_name, "athena.demo-fip");
        assert_eq!(fip.external_network, "public");
        assert_eq!(fip.network, "mgmt");
        assert_eq!(server.floating_ip_assoc(), Some("athena.demo-fip-assoc"));
    }

    #[test]
    fn test_zero_instances_rejected() {
        let config = ServerConfig {
            instances: 0,
            ..ServerConfig::default()
        };
        assert_eq!(
            Server::new("athena", defaults(), &config, &networks()),
            Err(TopologyError::NoInstances("athena.demo".to_string()))
        );
    }

    #[test]
    fn test_instances_get_their_own_ports() {
        let networks = networks();
        let config = ServerConfig {
            instances: 2,
            ..ServerConfig::default()
        };
        let mut server = Server::new("athena", defaults(), &config, &networks).unwrap();
        let mut graph = graph_with(&networks);
        server.add_to_graph(&mut graph, &networks, &SchedulerHints::new()).unwrap();

        assert_eq!(server.instance_names(), vec!["athena.demo", "athena.demo-1"]);
        let second = graph.get("athena.demo-1").unwrap();
        assert_eq!(
            second.depends_on,
            vec!["athena.demo-1-mgmt-port".to_string(), "athena.demo-1-data-port".to_string()]
        );
        assert_eq!(server.ports()["mgmt"].stack_name, "athena.demo-mgmt-port");
        assert!(graph.get("athena.demo").unwrap().properties.get("scheduler_hints").is_none());
    }

    #[test]
    fn test_inline_flavor_and_volume() {
        let networks = networks();
        let config = ServerConfig {
            flavor: Some(FlavorSpec::Inline(InlineFlavor {
                name: None,
                vcpus: 2,
                ram: 2048,
                disk: 10,
                extra_specs: BTreeMap::new(),
            })),
            volume: Some(VolumeSpec::Inline { size: 5 }),
            ..ServerConfig::default()
        };
        let mut server = Server::new("athena", defaults(), &config, &networks).unwrap();
        let mut graph = graph_with(&networks);
        server.add_to_graph(&mut graph, &networks, &SchedulerHints::new()).unwrap();

        let flavor = graph.get("athena.demo-flavor").unwrap();
        assert_eq!(flavor.kind, ResourceType::Flavor);
        assert_eq!(flavor.properties["vcpus"], json!(2));

        let instance = graph.get("athena.demo").unwrap();
        assert_eq!(instance.properties["flavor"], get_resource("athena.demo-flavor"));
        assert!(instance.depends_on.contains(&"athena.demo-flavor".to_string()));

        let attachment = graph.get("athena.demo-volume-attachment").unwrap();
        assert_eq!(
            attachment.depends_on,
            vec!["athena.demo".to_string(), "athena.demo-volume".to_string()]
        );
        assert_eq!(attachment.properties["mountpoint"], json!("/dev/vdb"));
    }

    #[test]
    fn test_apply_outputs() {
        let networks = networks();
        let config = ServerConfig {
            floating_ip: true,
            ..ServerConfig::default()
        };
        let mut server = Server::new("athena", defaults(), &config, &networks).unwrap();
        let mut graph = graph_with(&networks);
        server.add_to_graph(&mut graph, &networks, &SchedulerHints::new()).unwrap();

        let outputs: HashMap<String, String> = [
            ("athena.demo-mgmt-port", "10.0.1.5"),
            ("athena.demo-mgmt-port-mac_address", "fa:16:3e:00:00:01"),
            ("athena.demo-fip", "172.24.4.10"),
            ("athena.demo-id", "uuid-1"),
            ("demo-mgmt-subnet-cidr", "10.0.1.0/24"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        server.apply_outputs(&outputs, &networks);

        assert_eq!(server.private_ip(), Some("10.0.1.5"));
        assert_eq!(server.public_ip(), Some("172.24.4.10"));
        assert_eq!(server.stack_id(), Some("uuid-1"));
        let mgmt = &server.interfaces()["mgmt"];
        assert_eq!(mgmt.mac_address.as_deref(), Some("fa:16:3e:00:00:01"));
        assert_eq!(mgmt.subnet_cidr.as_deref(), Some("10.0.1.0/24"));
        assert_eq!(server.interfaces()["data"].private_ip, None);
    }
}
