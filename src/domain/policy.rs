// Copyright (c) 2025 - Cowboy AI, Inc.
//! Placement and server groups
//!
//! The two group kinds share one structure but use disjoint policy
//! vocabularies, so each is a distinct type: a placement group can never be
//! passed where a server group is expected.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::errors::{TopologyError, TopologyResult};

/// Policy vocabulary of one group kind
pub trait GroupPolicy: Copy + Eq + fmt::Debug + fmt::Display + FromStr<Err = TopologyError> {
    /// Group kind, used in error messages
    const KIND: &'static str;
}

/// Relative placement of servers within a placement group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementPolicy {
    /// Members run on different hosts
    Availability,
    /// Members run on the same host
    Affinity,
}

impl PlacementPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementPolicy::Availability => "availability",
            PlacementPolicy::Affinity => "affinity",
        }
    }
}

impl fmt::Display for PlacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlacementPolicy {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "availability" => Ok(PlacementPolicy::Availability),
            "affinity" => Ok(PlacementPolicy::Affinity),
            other => Err(TopologyError::InvalidPolicy {
                kind: Self::KIND,
                policy: other.to_string(),
            }),
        }
    }
}

impl GroupPolicy for PlacementPolicy {
    const KIND: &'static str = "placement group";
}

/// Backend-enforced server group policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServerGroupPolicy {
    Affinity,
    AntiAffinity,
}

impl ServerGroupPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerGroupPolicy::Affinity => "affinity",
            ServerGroupPolicy::AntiAffinity => "anti-affinity",
        }
    }
}

impl fmt::Display for ServerGroupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerGroupPolicy {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "affinity" => Ok(ServerGroupPolicy::Affinity),
            "anti-affinity" => Ok(ServerGroupPolicy::AntiAffinity),
            other => Err(TopologyError::InvalidPolicy {
                kind: Self::KIND,
                policy: other.to_string(),
            }),
        }
    }
}

impl GroupPolicy for ServerGroupPolicy {
    const KIND: &'static str = "server group";
}

/// Named group of servers under one policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group<P: GroupPolicy> {
    name: String,
    context_name: String,
    stack_name: String,
    policy: P,
    members: BTreeSet<String>,
}

/// Scheduler-level placement constraint
pub type PlacementGroup = Group<PlacementPolicy>;

/// Backend-level server group
pub type ServerGroup = Group<ServerGroupPolicy>;

impl<P: GroupPolicy> Group<P> {
    /// Build a group, validating the policy string
    pub fn new(name: impl Into<String>, context_name: impl Into<String>, policy: &str) -> TopologyResult<Self> {
        let name = name.into();
        let context_name = context_name.into();
        Ok(Self {
            stack_name: format!("{}-{}", context_name, name),
            policy: policy.parse()?,
            name,
            context_name,
            members: BTreeSet::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context_name(&self) -> &str {
        &self.context_name
    }

    /// Resource name when the group itself is emitted
    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn policy(&self) -> P {
        self.policy
    }

    /// Stack names of member servers
    pub fn members(&self) -> &BTreeSet<String> {
        &self.members
    }

    pub fn has_member(&self, stack_name: &str) -> bool {
        self.members.contains(stack_name)
    }

    pub fn add_member(&mut self, stack_name: impl Into<String>) {
        self.members.insert(stack_name.into());
    }
}
