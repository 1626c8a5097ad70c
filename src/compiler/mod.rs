// Copyright (c) 2025 - Cowboy AI, Inc.
//! Template Compiler
//!
//! Turns a [`Context`] into a [`ResourceGraph`]. Emission order is:
//!
//! 1. keypair and security group
//! 2. server groups that have members
//! 3. networks, each followed by its subnet and (if any) router
//! 4. servers, in placement order
//!
//! # Placement order
//!
//! Servers are sorted ascending by placement group count (stable, so ties
//! keep declaration order) and then split into three buckets processed in
//! turn: servers in an `availability` group, then servers in an `affinity`
//! group not already placed, then everything else. A server in groups of
//! both policies is placed with the availability bucket. Hints can only name
//! servers placed earlier, so this order decides which peers a server sees.

pub mod hints;

use tracing::{debug, info};

use crate::domain::{Context, PlacementPolicy, Server, TopologyObject};
use crate::errors::GraphResult;
use crate::graph::{get_attr, ResourceGraph, ResourceType};
use serde_json::{json, Map, Value};

pub use hints::{assign, SchedulerHints};

/// Compile a context into a resource graph.
///
/// Fills each server's port map as a side effect. Compiling the same context
/// twice yields identical graphs.
pub fn compile(context: &mut Context) -> GraphResult<ResourceGraph> {
    let mut graph = ResourceGraph::with_description(format!("Stack for context {}", context.name()));

    add_access_resources(&mut graph, context)?;

    for group in context.server_groups.iter().filter(|g| !g.members().is_empty()) {
        graph.add_resource(
            group.stack_name(),
            ResourceType::ServerGroup,
            json!({
                "name": group.stack_name(),
                "policies": [group.policy().as_str()],
            }),
            vec![],
        )?;
    }

    for network in &context.networks {
        network.add_to_graph(&mut graph)?;
    }

    let mut placed: Vec<String> = Vec::with_capacity(context.servers.len());
    for index in schedule(context) {
        let hints = hints_for(context, &context.servers[index], &placed);
        debug!(
            server = %context.servers[index].dn(),
            same_host = ?hints.same_host,
            different_host = ?hints.different_host,
            "Scheduling server"
        );
        context.servers[index].add_to_graph(&mut graph, &context.networks, &hints)?;
        placed.push(context.servers[index].stack_name().to_string());
    }

    info!(
        context = %context.name(),
        resources = graph.len(),
        outputs = graph.outputs().len(),
        "Context compiled"
    );
    Ok(graph)
}

/// Distinguished names of the context's servers in placement order
pub fn placement_order(context: &Context) -> Vec<String> {
    schedule(context)
        .into_iter()
        .map(|i| context.servers[i].dn())
        .collect()
}

fn schedule(context: &Context) -> Vec<usize> {
    let servers = &context.servers;
    let mut sorted: Vec<usize> = (0..servers.len()).collect();
    sorted.sort_by_key(|&i| servers[i].placement_groups().len());

    let in_policy = |i: usize, policy: PlacementPolicy| {
        servers[i]
            .placement_groups()
            .iter()
            .filter_map(|name| context.placement_group(name))
            .any(|group| group.policy() == policy)
    };

    let mut order: Vec<usize> = sorted
        .iter()
        .copied()
        .filter(|&i| in_policy(i, PlacementPolicy::Availability))
        .collect();
    let affinity: Vec<usize> = sorted
        .iter()
        .copied()
        .filter(|&i| in_policy(i, PlacementPolicy::Affinity) && !order.contains(&i))
        .collect();
    order.extend(affinity);
    let rest: Vec<usize> = sorted.into_iter().filter(|i| !order.contains(i)).collect();
    order.extend(rest);
    order
}

fn hints_for(context: &Context, server: &Server, placed: &[String]) -> SchedulerHints {
    let mut hints = SchedulerHints::new();
    for group in server
        .placement_groups()
        .iter()
        .filter_map(|name| context.placement_group(name))
    {
        assign(&mut hints, placed, group);
    }
    hints.group = server
        .server_group()
        .and_then(|name| context.server_group(name))
        .map(|group| group.stack_name().to_string());
    hints
}

fn add_access_resources(graph: &mut ResourceGraph, context: &Context) -> GraphResult<()> {
    let keypair = context.keypair_name();
    let mut properties = Map::new();
    properties.insert("name".to_string(), json!(keypair));
    match context.public_key() {
        Some(key) => {
            properties.insert("public_key".to_string(), json!(key));
        }
        None => {
            properties.insert("save_private_key".to_string(), json!(true));
            graph.add_output(
                format!("{}-private_key", keypair),
                format!("Private key of {}", keypair),
                get_attr(keypair, &[json!("private_key")]),
            );
        }
    }
    graph.add_resource(keypair, ResourceType::KeyPair, Value::Object(properties), vec![])?;

    let rule = |protocol: &str| {
        let mut rule = json!({ "remote_ip_prefix": "0.0.0.0/0", "protocol": protocol });
        if protocol != "icmp" {
            rule["port_range_min"] = json!(1);
            rule["port_range_max"] = json!(65535);
        }
        rule
    };
    graph.add_resource(
        context.secgroup_name(),
        ResourceType::SecurityGroup,
        json!({
            "name": context.secgroup_name(),
            "description": format!("Group allowing icmp, tcp and udp for {}", context.name()),
            "rules": [rule("icmp"), rule("tcp"), rule("udp")],
        }),
        vec![],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContextConfig, GroupConfig, OneOrMany, ServerConfig};

    fn group(policy: &str) -> GroupConfig {
        GroupConfig {
            policy: policy.to_string(),
        }
    }

    fn member_of(groups: &[&str]) -> ServerConfig {
        ServerConfig {
            placement: Some(OneOrMany::Many(groups.iter().map(|g| g.to_string()).collect())),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_empty_context_has_access_resources_only() {
        let mut context = Context::init(&ContextConfig::new("demo")).unwrap();
        let graph = compile(&mut context).unwrap();

        assert_eq!(graph.resource_names(), vec!["demo-key", "demo-secgroup"]);
    }

    #[test]
    fn test_availability_bucket_wins() {
        let mut config = ContextConfig::new("demo");
        config.placement_groups.insert("avail", group("availability"));
        config.placement_groups.insert("aff", group("affinity"));
        config.servers.insert("plain", ServerConfig::default());
        config.servers.insert("both", member_of(&["aff", "avail"]));
        config.servers.insert("near", member_of(&["aff"]));
        config.servers.insert("apart", member_of(&["avail"]));
        let context = Context::init(&config).unwrap();

        assert_eq!(
            placement_order(&context),
            vec!["apart.demo", "both.demo", "near.demo", "plain.demo"]
        );
    }

    #[test]
    fn test_server_group_hint() {
        let mut config = ContextConfig::new("demo");
        config.server_groups.insert("sg", group("anti-affinity"));
        config.server_groups.insert("unused", group("affinity"));
        config.servers.insert(
            "athena",
            ServerConfig {
                server_group: Some("sg".to_string()),
                ..ServerConfig::default()
            },
        );
        let mut context = Context::init(&config).unwrap();
        let graph = compile(&mut context).unwrap();

        assert!(graph.contains("demo-sg"));
        assert!(!graph.contains("demo-unused"));
        let server = graph.get("athena.demo").unwrap();
        assert_eq!(
            server.properties["scheduler_hints"],
            json!({"group": {"get_resource": "demo-sg"}})
        );
        assert_eq!(server.depends_on, vec!["demo-sg".to_string()]);
    }
}
