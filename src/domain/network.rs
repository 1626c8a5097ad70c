// Copyright (c) 2025 - Cowboy AI, Inc.
//! Networks, subnets and routers
//!
//! Value objects with validation invariants ([`Cidr`], [`SegmentationId`])
//! and the [`Network`] entity, which owns at most one [`Router`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::config::{AddressPair, NetworkConfig};
use crate::errors::{GraphResult, TopologyError, TopologyResult};
use crate::graph::{get_attr, get_resource, ResourceGraph, ResourceType};

use super::object::{ObjectMeta, TopologyObject};

/// Subnet in CIDR notation
///
/// Invariants:
/// - Valid IPv4 or IPv6 address
/// - Prefix length present and within range for the address family
///
/// # Examples
///
/// ```rust
/// use stack_topology::domain::Cidr;
///
/// let cidr = Cidr::new("10.0.1.0/24").unwrap();
/// assert_eq!(cidr.prefix_length(), 24);
/// assert!(Cidr::new("10.0.1.0").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cidr {
    address: IpAddr,
    prefix_length: u8,
}

impl Cidr {
    pub fn new(cidr: impl AsRef<str>) -> TopologyResult<Self> {
        let cidr = cidr.as_ref();
        let invalid = || TopologyError::InvalidCidr(cidr.to_string());

        let (addr_str, prefix_str) = cidr.split_once('/').ok_or_else(invalid)?;
        let address = IpAddr::from_str(addr_str).map_err(|_| invalid())?;
        let prefix_length = prefix_str.parse::<u8>().map_err(|_| invalid())?;

        let max_prefix = match address {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix_length > max_prefix {
            return Err(invalid());
        }

        Ok(Self {
            address,
            prefix_length,
        })
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn prefix_length(&self) -> u8 {
        self.prefix_length
    }

    pub fn is_ipv6(&self) -> bool {
        matches!(self.address, IpAddr::V6(_))
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_length)
    }
}

impl FromStr for Cidr {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Cidr {
    type Error = TopologyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Cidr> for String {
    fn from(cidr: Cidr) -> Self {
        cidr.to_string()
    }
}

/// Provider network segmentation id (VLAN tag)
///
/// Invariants:
/// - 1-4094; 0 and 4095 are reserved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentationId(u32);

impl SegmentationId {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 4094;

    pub fn new(id: u32) -> TopologyResult<Self> {
        if !(Self::MIN..=Self::MAX).contains(&id) {
            return Err(TopologyError::InvalidSegmentationId(id));
        }
        Ok(Self(id))
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SegmentationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Router giving a network a route to an external network
#[derive(Debug, Clone, PartialEq)]
pub struct Router {
    meta: ObjectMeta,
    stack_if_name: String,
    external_gateway_info: String,
}

impl Router {
    fn new(network_name: &str, context_name: &str, external_network: &str) -> Self {
        let name = format!("{}-router", network_name);
        let stack_name = format!("{}-{}-router", context_name, network_name);
        Self {
            stack_if_name: format!("{}-if0", stack_name),
            meta: ObjectMeta::new(name, context_name, stack_name),
            external_gateway_info: external_network.to_string(),
        }
    }

    /// Name of the router interface resource
    pub fn stack_if_name(&self) -> &str {
        &self.stack_if_name
    }

    /// External network the router uses as gateway
    pub fn external_gateway_info(&self) -> &str {
        &self.external_gateway_info
    }
}

impl TopologyObject for Router {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

/// Tenant or provider network with one subnet
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    meta: ObjectMeta,
    subnet_stack_name: String,
    subnet_cidr: Cidr,
    router: Option<Router>,
    provider: Option<String>,
    physical_network: Option<String>,
    segmentation_id: Option<SegmentationId>,
    network_type: Option<String>,
    port_security_enabled: Option<bool>,
    vnic_type: String,
    allowed_address_pairs: Vec<AddressPair>,
    enable_dhcp: bool,
    gateway_ip: Option<String>,
}

impl Network {
    /// Build a network; a declared external network creates its router.
    pub fn new(name: &str, context_name: &str, config: &NetworkConfig) -> TopologyResult<Self> {
        let stack_name = format!("{}-{}", context_name, name);
        let segmentation_id = config.segmentation_id.map(SegmentationId::new).transpose()?;
        let router = config
            .external_network
            .as_deref()
            .map(|ext| Router::new(name, context_name, ext));

        Ok(Self {
            subnet_stack_name: format!("{}-subnet", stack_name),
            meta: ObjectMeta::new(name, context_name, stack_name),
            subnet_cidr: Cidr::new(&config.cidr)?,
            router,
            provider: config.provider.clone(),
            physical_network: config.physical_network.clone(),
            segmentation_id,
            network_type: config.network_type.clone(),
            port_security_enabled: config.port_security_enabled,
            vnic_type: config.vnic_type.clone(),
            allowed_address_pairs: config.allowed_address_pairs.clone(),
            enable_dhcp: config.enable_dhcp,
            gateway_ip: config.gateway_ip.clone(),
        })
    }

    pub fn subnet_stack_name(&self) -> &str {
        &self.subnet_stack_name
    }

    pub fn subnet_cidr(&self) -> &Cidr {
        &self.subnet_cidr
    }

    pub fn router(&self) -> Option<&Router> {
        self.router.as_ref()
    }

    pub fn vnic_type(&self) -> &str {
        &self.vnic_type
    }

    pub fn port_security_enabled(&self) -> Option<bool> {
        self.port_security_enabled
    }

    pub fn allowed_address_pairs(&self) -> &[AddressPair] {
        &self.allowed_address_pairs
    }

    pub fn segmentation_id(&self) -> Option<SegmentationId> {
        self.segmentation_id
    }

    /// Whether this network is bound to a physical provider segment
    pub fn is_provider(&self) -> bool {
        self.provider.is_some() || self.physical_network.is_some()
    }

    /// Whether traffic from this network can reach `external_network`
    pub fn has_route_to(&self, external_network: &str) -> bool {
        self.router
            .as_ref()
            .is_some_and(|router| router.external_gateway_info == external_network)
    }

    /// Names of every resource this network emits
    pub(crate) fn resource_names(&self) -> impl Iterator<Item = &str> {
        [self.stack_name(), self.subnet_stack_name()]
            .into_iter()
            .chain(self.router.iter().flat_map(|r| [r.stack_name(), r.stack_if_name()]))
    }

    /// Emit network, subnet and (if owned) router resources.
    pub(crate) fn add_to_graph(&self, graph: &mut ResourceGraph) -> GraphResult<()> {
        let stack_name = self.stack_name();

        let mut properties = Map::new();
        properties.insert("name".to_string(), json!(stack_name));
        let kind = if self.is_provider() {
            properties.insert(
                "physical_network".to_string(),
                json!(self.physical_network.as_deref().unwrap_or("physnet1")),
            );
            properties.insert(
                "network_type".to_string(),
                json!(self.network_type.as_deref().unwrap_or("vlan")),
            );
            if let Some(id) = self.segmentation_id {
                properties.insert("segmentation_id".to_string(), json!(id.value()));
            }
            ResourceType::ProviderNetwork
        } else {
            if let Some(network_type) = &self.network_type {
                properties.insert("value_specs".to_string(), json!({ "provider:network_type": network_type }));
            }
            ResourceType::Network
        };
        if let Some(enabled) = self.port_security_enabled {
            properties.insert("port_security_enabled".to_string(), json!(enabled));
        }
        graph.add_resource(stack_name, kind, Value::Object(properties), vec![])?;
        graph.add_output(
            format!("{}-id", stack_name),
            format!("ID of network {}", self.name()),
            get_resource(stack_name),
        );

        let mut subnet = Map::new();
        subnet.insert("name".to_string(), json!(self.subnet_stack_name));
        subnet.insert("network_id".to_string(), get_resource(stack_name));
        subnet.insert("cidr".to_string(), json!(self.subnet_cidr.to_string()));
        subnet.insert("ip_version".to_string(), json!(if self.subnet_cidr.is_ipv6() { 6 } else { 4 }));
        subnet.insert("enable_dhcp".to_string(), json!(self.enable_dhcp));
        match self.gateway_ip.as_deref() {
            Some("null") => {
                subnet.insert("gateway_ip".to_string(), Value::Null);
            }
            Some(gateway) => {
                subnet.insert("gateway_ip".to_string(), json!(gateway));
            }
            None => {}
        }
        graph.add_resource(
            &self.subnet_stack_name,
            ResourceType::Subnet,
            Value::Object(subnet),
            vec![stack_name.to_string()],
        )?;
        graph.add_output(
            format!("{}-cidr", self.subnet_stack_name),
            format!("CIDR of subnet {}", self.subnet_stack_name),
            get_attr(&self.subnet_stack_name, &[json!("cidr")]),
        );
        graph.add_output(
            format!("{}-gateway_ip", self.subnet_stack_name),
            format!("Gateway of subnet {}", self.subnet_stack_name),
            get_attr(&self.subnet_stack_name, &[json!("gateway_ip")]),
        );

        if let Some(router) = &self.router {
            graph.add_resource(
                router.stack_name(),
                ResourceType::Router,
                json!({
                    "name": router.stack_name(),
                    "external_gateway_info": { "network": router.external_gateway_info },
                }),
                vec![self.subnet_stack_name.clone()],
            )?;
            graph.add_resource(
                &router.stack_if_name,
                ResourceType::RouterInterface,
                json!({
                    "router_id": get_resource(router.stack_name()),
                    "subnet_id": get_resource(&self.subnet_stack_name),
                }),
                vec![router.stack_name().to_string(), self.subnet_stack_name.clone()],
            )?;
            graph.add_output(
                format!("{}-id", router.stack_name()),
                format!("ID of router {}", router.stack_name()),
                get_resource(router.stack_name()),
            );
        }

        Ok(())
    }
}

/// External network reached by the first routed network, if any
pub(crate) fn find_external_network(networks: &[Network]) -> Option<&str> {
    networks
        .iter()
        .find_map(|n| n.router().map(|r| r.external_gateway_info()))
}

impl TopologyObject for Network {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}
