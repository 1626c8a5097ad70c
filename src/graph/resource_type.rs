// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Type Taxonomy
//!
//! The closed set of resource kinds a compiled topology can contain, with
//! the type names the orchestration service expects in a template.

use std::fmt;

/// Kind of resource declared in a [`ResourceGraph`](super::ResourceGraph)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    // Access
    /// SSH keypair injected into every server
    KeyPair,
    /// Security group shared by every port
    SecurityGroup,

    // Placement
    /// Affinity / anti-affinity server group
    ServerGroup,

    // Network
    /// Tenant network
    Network,
    /// Network bound to a physical provider segment
    ProviderNetwork,
    /// Subnet of a network
    Subnet,
    /// Router towards an external network
    Router,
    /// Router attachment to a subnet
    RouterInterface,
    /// Server port on a network
    Port,
    /// Public address allocated from an external network
    FloatingIp,
    /// Binding between a floating IP and a port
    FloatingIpAssociation,

    // Compute
    /// Compute instance
    Server,
    /// Flavor created inline for one server
    Flavor,

    // Storage
    /// Block volume created inline for one server
    Volume,
    /// Volume attached to an instance
    VolumeAttachment,
}

impl ResourceType {
    /// Type name used in a rendered template
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyPair => "OS::Nova::KeyPair",
            Self::SecurityGroup => "OS::Neutron::SecurityGroup",
            Self::ServerGroup => "OS::Nova::ServerGroup",
            Self::Network => "OS::Neutron::Net",
            Self::ProviderNetwork => "OS::Neutron::ProviderNet",
            Self::Subnet => "OS::Neutron::Subnet",
            Self::Router => "OS::Neutron::Router",
            Self::RouterInterface => "OS::Neutron::RouterInterface",
            Self::Port => "OS::Neutron::Port",
            Self::FloatingIp => "OS::Neutron::FloatingIP",
            Self::FloatingIpAssociation => "OS::Neutron::FloatingIPAssociation",
            Self::Server => "OS::Nova::Server",
            Self::Flavor => "OS::Nova::Flavor",
            Self::Volume => "OS::Cinder::Volume",
            Self::VolumeAttachment => "OS::Cinder::VolumeAttachment",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
