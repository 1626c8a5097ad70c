// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Placement
//!
//! Random placement group layouts are compiled and the resulting graph is
//! checked against the scheduling rules: hints only point backwards, only at
//! servers sharing a group of the matching policy, and compiling is
//! repeatable.

use std::collections::BTreeSet;

use proptest::prelude::*;
use serde_json::{json, Map, Value};

use stack_topology::compiler::{compile, placement_order};
use stack_topology::config::ContextConfig;
use stack_topology::domain::{Context, PlacementPolicy, TopologyObject};
use stack_topology::graph::{ResourceGraph, ResourceType};

// ============================================================================
// Layout Definition
// ============================================================================

/// Group policies plus, per server, its group indexes and instance count
#[derive(Debug, Clone)]
struct Layout {
    policies: Vec<&'static str>,
    servers: Vec<(Vec<usize>, u32)>,
}

impl Layout {
    fn config(&self) -> ContextConfig {
        let groups: Map<String, Value> = self
            .policies
            .iter()
            .enumerate()
            .map(|(i, policy)| (format!("g{}", i), json!({ "policy": policy })))
            .collect();

        let servers: Map<String, Value> = self
            .servers
            .iter()
            .enumerate()
            .map(|(i, (membership, instances))| {
                let mut server = json!({ "instances": instances });
                if !membership.is_empty() {
                    let names: Vec<String> = membership.iter().map(|g| format!("g{}", g)).collect();
                    server["placement"] = json!(names);
                }
                (format!("s{}", i), server)
            })
            .collect();

        serde_json::from_value(json!({
            "name": "prop",
            "networks": { "mgmt": {} },
            "placement_groups": groups,
            "servers": servers
        }))
        .expect("Generated layout must parse")
    }

    fn compile(&self) -> (Context, ResourceGraph) {
        let mut context = Context::init(&self.config()).expect("Generated layout must build");
        let graph = compile(&mut context).expect("Generated layout must compile");
        (context, graph)
    }
}

// ============================================================================
// Property Test Strategies
// ============================================================================

fn policy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("availability"), Just("affinity")]
}

/// Up to four groups and up to eight servers with random memberships
fn layout() -> impl Strategy<Value = Layout> {
    prop::collection::vec(policy(), 0..4)
        .prop_flat_map(|policies| {
            let groups = policies.len();
            let server = (prop::collection::vec(any::<bool>(), groups), 1u32..4).prop_map(
                |(mask, instances)| {
                    let membership = mask
                        .iter()
                        .enumerate()
                        .filter(|(_, member)| **member)
                        .map(|(i, _)| i)
                        .collect::<Vec<_>>();
                    (membership, instances)
                },
            );
            (Just(policies), prop::collection::vec(server, 1..8))
        })
        .prop_map(|(policies, servers)| Layout { policies, servers })
}

/// Resources referenced under `key` in a server resource's scheduler hints
fn hint_list(graph: &ResourceGraph, resource: &str, key: &str) -> Vec<String> {
    graph
        .get(resource)
        .and_then(|r| r.properties.get("scheduler_hints"))
        .and_then(|hints| hints.get(key))
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(|reference| reference.get("get_resource").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Hints a server should receive: peers placed before it, per shared group
fn expected_hints(context: &Context, dn: &str, policy: PlacementPolicy) -> Vec<String> {
    let order = placement_order(context);
    let position = order.iter().position(|d| d == dn).unwrap_or(order.len());
    let server = context.server(dn).expect("Scheduled server must exist");

    let mut expected = Vec::new();
    for group in server
        .placement_groups()
        .iter()
        .filter_map(|name| context.placement_group(name))
        .filter(|group| group.policy() == policy)
    {
        for earlier in &order[..position] {
            let peer = context.server(earlier).expect("Scheduled server must exist");
            if group.has_member(peer.stack_name()) {
                expected.push(peer.stack_name().to_string());
            }
        }
    }
    expected
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// Property: Compilation is deterministic
    ///
    /// Two independently built contexts from the same configuration compile
    /// to identical graphs and identical rendered templates.
    #[test]
    fn prop_compile_is_deterministic(layout in layout()) {
        let (first_context, first) = layout.compile();
        let (second_context, second) = layout.compile();

        prop_assert_eq!(placement_order(&first_context), placement_order(&second_context));
        prop_assert_eq!(first.to_template(), second.to_template());
        prop_assert_eq!(first, second);
    }

    /// Property: Dependencies always precede their dependents
    #[test]
    fn prop_dependencies_precede(layout in layout()) {
        let (_, graph) = layout.compile();

        for (position, resource) in graph.resources().enumerate() {
            for dependency in &resource.depends_on {
                let dep_position = graph.position(dependency);
                prop_assert!(
                    dep_position.map_or(false, |p| p < position),
                    "{} depends on {} which is not earlier",
                    resource.name,
                    dependency
                );
            }
        }
    }

    /// Property: Hints only reference servers emitted earlier
    ///
    /// Every name in a server's `same_host` or `different_host` list is an
    /// earlier server resource and is also among its dependencies.
    #[test]
    fn prop_hints_reference_earlier_servers(layout in layout()) {
        let (_, graph) = layout.compile();

        for (position, resource) in graph.resources().enumerate() {
            if resource.kind != ResourceType::Server {
                continue;
            }
            for key in ["same_host", "different_host"] {
                for peer in hint_list(&graph, &resource.name, key) {
                    let peer_resource = graph.get(&peer);
                    prop_assert!(peer_resource.map_or(false, |r| r.kind == ResourceType::Server));
                    prop_assert!(graph.position(&peer).map_or(false, |p| p < position));
                    prop_assert!(resource.depends_on.contains(&peer));
                }
            }
        }
    }

    /// Property: Hint lists follow group policy
    ///
    /// `different_host` holds exactly the earlier members of the server's
    /// availability groups and `same_host` those of its affinity groups,
    /// for every instance of the server.
    #[test]
    fn prop_hints_follow_group_policy(layout in layout()) {
        let (context, graph) = layout.compile();

        for server in context.servers() {
            let dn = server.dn();
            let different = expected_hints(&context, &dn, PlacementPolicy::Availability);
            let same = expected_hints(&context, &dn, PlacementPolicy::Affinity);
            for instance in server.instance_names() {
                prop_assert_eq!(&hint_list(&graph, &instance, "different_host"), &different);
                prop_assert_eq!(&hint_list(&graph, &instance, "same_host"), &same);
            }
        }
    }

    /// Property: Availability members are scheduled first
    #[test]
    fn prop_availability_members_scheduled_first(layout in layout()) {
        let (context, _) = layout.compile();
        let in_availability = |dn: &str| {
            context.server(dn).map_or(false, |server| {
                server
                    .placement_groups()
                    .iter()
                    .filter_map(|name| context.placement_group(name))
                    .any(|group| group.policy() == PlacementPolicy::Availability)
            })
        };

        let order = placement_order(&context);
        let first_outside = order.iter().position(|dn| !in_availability(dn)).unwrap_or(order.len());
        prop_assert!(order[first_outside..].iter().all(|dn| !in_availability(dn)));
        prop_assert_eq!(order.len(), layout.servers.len());
    }

    /// Property: Group membership matches configuration exactly
    #[test]
    fn prop_group_members_match(layout in layout()) {
        let (context, _) = layout.compile();

        for (index, _) in layout.policies.iter().enumerate() {
            let group = context
                .placement_group(&format!("g{}", index))
                .expect("Declared group must exist");
            let expected: BTreeSet<String> = layout
                .servers
                .iter()
                .enumerate()
                .filter(|(_, (membership, _))| membership.contains(&index))
                .map(|(i, _)| format!("s{}.prop", i))
                .collect();
            prop_assert_eq!(group.members(), &expected);
        }
    }

    /// Property: Every requested instance becomes one server resource
    #[test]
    fn prop_instance_count(layout in layout()) {
        let (context, graph) = layout.compile();

        let requested: u32 = layout.servers.iter().map(|(_, instances)| instances).sum();
        prop_assert_eq!(graph.resources_of(ResourceType::Server).count(), requested as usize);
        for server in context.servers() {
            for instance in server.instance_names() {
                prop_assert!(graph.contains(&instance));
                let port = format!("{}-mgmt-port", instance);
                prop_assert!(graph.contains(&port));
            }
        }
    }
}

// ============================================================================
// Standard Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_layout_without_groups() {
        let layout = Layout {
            policies: vec![],
            servers: vec![(vec![], 1), (vec![], 2)],
        };
        let (context, graph) = layout.compile();

        assert_eq!(placement_order(&context), vec!["s0.prop", "s1.prop"]);
        assert!(hint_list(&graph, "s1.prop", "different_host").is_empty());
        assert!(graph.contains("s1.prop-1"));
    }

    #[test]
    fn test_shared_availability_group() {
        let layout = Layout {
            policies: vec!["availability"],
            servers: vec![(vec![0], 1), (vec![0], 1), (vec![], 1)],
        };
        let (_, graph) = layout.compile();

        assert_eq!(hint_list(&graph, "s1.prop", "different_host"), vec!["s0.prop"]);
        assert!(graph.get("s2.prop").unwrap().properties.get("scheduler_hints").is_none());
    }
}
