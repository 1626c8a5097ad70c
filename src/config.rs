// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology and deployment configuration
//!
//! The topology tree is usually parsed from YAML or JSON by the caller; this
//! module only defines its shape. Maps keep the order they had in the source
//! document because declaration order drives resource order.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Default subnet for networks that do not specify one
pub const DEFAULT_SUBNET_CIDR: &str = "10.0.1.0/24";

/// Login user for servers and contexts that do not name one
pub const DEFAULT_USER: &str = "ubuntu";

/// Device a volume is attached to when no mountpoint is given
pub const DEFAULT_VOLUME_MOUNTPOINT: &str = "/dev/vdb";

/// Default blocking timeout for a context deployment, in seconds
pub const DEFAULT_STACK_TIMEOUT_SECS: u64 = 3600;

/// Map that keeps the source document's key order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedMap<T>(Vec<(String, T)>);

impl<T> OrderedMap<T> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert or replace, keeping the first position of the key
    pub fn insert(&mut self, key: impl Into<String>, value: T) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> Default for OrderedMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, T> FromIterator<(K, T)> for OrderedMap<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<T: Serialize> Serialize for OrderedMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct OrderedMapVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<T> {
    type Value = OrderedMap<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = OrderedMap::new();
        while let Some((key, value)) = access.next_entry::<String, T>()? {
            map.insert(key, value);
        }
        Ok(map)
    }

    // `key: ~` in YAML / `null` in JSON
    fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(OrderedMap::new())
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OrderedMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// One context of the topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Context name, unique within a build session
    pub name: String,

    /// Default image for servers that do not name one
    #[serde(default)]
    pub image: Option<String>,

    /// Default flavor for servers that do not name one
    #[serde(default)]
    pub flavor: Option<FlavorSpec>,

    /// Default login user
    #[serde(default)]
    pub user: Option<String>,

    /// Public key for the context keypair; generated by the backend if absent
    #[serde(default)]
    pub public_key: Option<String>,

    /// Blocking deploy timeout in seconds
    #[serde(default = "default_stack_timeout")]
    pub timeout: u64,

    /// Parameters passed to the backend with the stack
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,

    #[serde(default)]
    pub placement_groups: OrderedMap<GroupConfig>,

    #[serde(default)]
    pub server_groups: OrderedMap<GroupConfig>,

    #[serde(default)]
    pub networks: OrderedMap<NetworkConfig>,

    #[serde(default)]
    pub servers: OrderedMap<ServerConfig>,
}

fn default_stack_timeout() -> u64 {
    DEFAULT_STACK_TIMEOUT_SECS
}

impl ContextConfig {
    /// Empty context with defaults
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: None,
            flavor: None,
            user: None,
            public_key: None,
            timeout: DEFAULT_STACK_TIMEOUT_SECS,
            parameters: BTreeMap::new(),
            placement_groups: OrderedMap::new(),
            server_groups: OrderedMap::new(),
            networks: OrderedMap::new(),
            servers: OrderedMap::new(),
        }
    }
}

/// Placement or server group declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Policy string, validated when the group is built
    pub policy: String,
}

/// Network declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_cidr")]
    pub cidr: String,

    /// External network to route to; creates a router when set
    #[serde(default)]
    pub external_network: Option<String>,

    #[serde(default)]
    pub provider: Option<String>,

    #[serde(default)]
    pub physical_network: Option<String>,

    #[serde(default)]
    pub segmentation_id: Option<u32>,

    #[serde(default)]
    pub network_type: Option<String>,

    #[serde(default)]
    pub port_security_enabled: Option<bool>,

    #[serde(default = "default_vnic_type")]
    pub vnic_type: String,

    #[serde(default)]
    pub allowed_address_pairs: Vec<AddressPair>,

    #[serde(default = "default_true")]
    pub enable_dhcp: bool,

    /// Explicit gateway, or `"null"` to disable the gateway
    #[serde(default)]
    pub gateway_ip: Option<String>,
}

fn default_cidr() -> String {
    DEFAULT_SUBNET_CIDR.to_string()
}

fn default_vnic_type() -> String {
    "normal".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cidr: default_cidr(),
            external_network: None,
            provider: None,
            physical_network: None,
            segmentation_id: None,
            network_type: None,
            port_security_enabled: None,
            vnic_type: default_vnic_type(),
            allowed_address_pairs: Vec::new(),
            enable_dhcp: true,
            gateway_ip: None,
        }
    }
}

/// Extra address allowed through a port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressPair {
    pub ip_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
}

/// Server declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub image: Option<String>,

    #[serde(default)]
    pub flavor: Option<FlavorSpec>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default = "default_instances")]
    pub instances: u32,

    /// Allocate a public address through the external network
    #[serde(default)]
    pub floating_ip: bool,

    /// Placement group membership, one name or a list
    #[serde(default)]
    pub placement: Option<OneOrMany>,

    #[serde(default)]
    pub server_group: Option<String>,

    /// Networks to attach; every context network when absent
    #[serde(default)]
    pub networks: Option<Vec<String>>,

    #[serde(default)]
    pub volume: Option<VolumeSpec>,

    #[serde(default)]
    pub volume_mountpoint: Option<String>,

    #[serde(default)]
    pub availability_zone: Option<String>,

    #[serde(default)]
    pub user_data: Option<String>,
}

fn default_instances() -> u32 {
    1
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            image: None,
            flavor: None,
            user: None,
            instances: default_instances(),
            floating_ip: false,
            placement: None,
            server_group: None,
            networks: None,
            volume: None,
            volume_mountpoint: None,
            availability_zone: None,
            user_data: None,
        }
    }
}

/// A single name or a list of names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(name) => vec![name],
            OneOrMany::Many(names) => names,
        }
    }
}

/// Named flavor or one created for the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlavorSpec {
    Named(String),
    Inline(InlineFlavor),
}

/// Flavor defined inline in the topology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineFlavor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_vcpus")]
    pub vcpus: u32,
    /// Memory in MB
    #[serde(default = "default_ram")]
    pub ram: u32,
    /// Root disk in GB
    #[serde(default = "default_disk")]
    pub disk: u32,
    #[serde(default)]
    pub extra_specs: BTreeMap<String, String>,
}

fn default_vcpus() -> u32 {
    1
}

fn default_ram() -> u32 {
    1024
}

fn default_disk() -> u32 {
    1
}

/// Existing volume id or one created for the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VolumeSpec {
    Existing(String),
    Inline {
        /// Size in GB
        size: u32,
    },
}

/// Stack lifecycle timing
#[derive(Debug, Clone)]
pub struct DeployConfig {
    /// Interval between status polls
    pub poll_interval: Duration,
    /// Blocking wait limit for a delete
    pub delete_timeout: Duration,
    /// Delete attempts made by `delete_all`
    pub delete_retries: u32,
    /// Pause between delete attempts
    pub retry_backoff: Duration,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            delete_timeout: Duration::from_secs(900),
            delete_retries: 3,
            retry_backoff: Duration::from_secs(2),
        }
    }
}
