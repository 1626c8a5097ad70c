// Copyright (c) 2025 - Cowboy AI, Inc.
//! Scheduler hint assignment
//!
//! A server's placement groups become `same_host` / `different_host` hints
//! naming peers that are already in the graph. Hints never point forward:
//! [`assign`] only looks at `already_placed`.

use serde_json::{json, Map, Value};

use crate::domain::{PlacementGroup, PlacementPolicy};
use crate::graph::get_resource;

/// Scheduler hints attached to one server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerHints {
    /// Peers to colocate with
    pub same_host: Option<Vec<String>>,

    /// Peers to keep apart from
    pub different_host: Option<Vec<String>>,

    /// Server group resource the instance joins
    pub group: Option<String>,
}

impl SchedulerHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.same_host.as_ref().map_or(true, Vec::is_empty)
            && self.different_host.as_ref().map_or(true, Vec::is_empty)
            && self.group.is_none()
    }

    /// Every resource the hints refer to
    pub fn referenced_resources(&self) -> impl Iterator<Item = &str> {
        self.same_host
            .iter()
            .flatten()
            .chain(self.different_host.iter().flatten())
            .chain(self.group.iter())
            .map(String::as_str)
    }

    /// Render as the `scheduler_hints` server property
    pub fn to_value(&self) -> Value {
        let refs = |names: &[String]| Value::Array(names.iter().map(|n| get_resource(n)).collect());

        let mut hints = Map::new();
        if let Some(names) = self.same_host.as_deref().filter(|n| !n.is_empty()) {
            hints.insert("same_host".to_string(), refs(names));
        }
        if let Some(names) = self.different_host.as_deref().filter(|n| !n.is_empty()) {
            hints.insert("different_host".to_string(), refs(names));
        }
        if let Some(group) = &self.group {
            hints.insert("group".to_string(), json!(get_resource(group)));
        }
        Value::Object(hints)
    }
}

/// Add hints for one group membership.
///
/// Every already-placed server that is a member of `group` is appended, in
/// placement order, to the hint list matching the group's policy.
pub fn assign(hints: &mut SchedulerHints, already_placed: &[String], group: &PlacementGroup) {
    let list = match group.policy() {
        PlacementPolicy::Affinity => &mut hints.same_host,
        PlacementPolicy::Availability => &mut hints.different_host,
    };
    let list = list.get_or_insert_with(Vec::new);

    for placed in already_placed {
        if group.has_member(placed) {
            list.push(placed.clone());
        }
    }
}
