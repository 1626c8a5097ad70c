// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for stack-topology
//!
//! Topology configurations shared by the integration tests. Each fixture is
//! written as the JSON document a user would provide, so parsing is covered
//! along the way.

#![allow(dead_code)]

use serde_json::json;

use stack_topology::config::ContextConfig;

/// Parse a context configuration from JSON
pub fn context_config(value: serde_json::Value) -> ContextConfig {
    serde_json::from_value(value).expect("Invalid context fixture")
}

/// Context with no networks and no servers
pub fn empty_context() -> ContextConfig {
    context_config(json!({ "name": "empty" }))
}

/// One availability group {s1, s2} and one affinity group {s2, s3}
pub fn scenario_a() -> ContextConfig {
    context_config(json!({
        "name": "demo",
        "image": "cirros",
        "flavor": "m1.tiny",
        "placement_groups": {
            "pgrp1": { "policy": "availability" },
            "pgrp2": { "policy": "affinity" }
        },
        "networks": {
            "mgmt": { "cidr": "10.0.1.0/24", "external_network": "public" }
        },
        "servers": {
            "s1": { "placement": "pgrp1" },
            "s2": { "placement": ["pgrp1", "pgrp2"] },
            "s3": { "placement": "pgrp2" }
        }
    }))
}

/// Two networks, a floating IP, multiple instances and a server group
pub fn full_context() -> ContextConfig {
    context_config(json!({
        "name": "full",
        "image": "ubuntu-22.04",
        "flavor": "m1.small",
        "user": "cloud",
        "public_key": "ssh-ed25519 AAAAC3Nza test@example",
        "parameters": { "owner": "ci" },
        "placement_groups": {
            "spread": { "policy": "availability" }
        },
        "server_groups": {
            "workers": { "policy": "anti-affinity" }
        },
        "networks": {
            "mgmt": { "cidr": "10.0.1.0/24", "external_network": "public" },
            "data": {
                "cidr": "10.0.2.0/24",
                "port_security_enabled": false,
                "vnic_type": "direct",
                "allowed_address_pairs": [{ "ip_address": "0.0.0.0/0" }]
            }
        },
        "servers": {
            "gateway": {
                "floating_ip": true,
                "networks": ["mgmt"],
                "placement": "spread"
            },
            "worker": {
                "instances": 3,
                "server_group": "workers",
                "placement": "spread",
                "flavor": { "vcpus": 4, "ram": 4096, "disk": 20 },
                "volume": { "size": 10 }
            }
        }
    }))
}

/// Context whose servers all share one affinity group
pub fn affinity_context(name: &str, servers: usize) -> ContextConfig {
    let mut config = context_config(json!({
        "name": name,
        "placement_groups": { "near": { "policy": "affinity" } },
        "networks": { "mgmt": {} }
    }));
    for i in 0..servers {
        config.servers.insert(
            format!("node{}", i),
            serde_json::from_value(json!({ "placement": "near" })).expect("Invalid server fixture"),
        );
    }
    config
}
