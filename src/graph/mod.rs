// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Graph
//!
//! An ordered, append-only collection of named resource declarations with
//! typed properties and explicit dependency edges, plus a side table of
//! outputs the backend should report once the stack exists.
//!
//! # Invariants
//!
//! - Resource names are unique
//! - Every `depends_on` entry names a resource already in the graph, so
//!   declaration order is always a valid creation order
//!
//! ```rust
//! use serde_json::json;
//! use stack_topology::graph::{ResourceGraph, ResourceType};
//!
//! let mut graph = ResourceGraph::new();
//! graph.add_resource("net", ResourceType::Network, json!({}), vec![]).unwrap();
//! graph
//!     .add_resource("subnet", ResourceType::Subnet, json!({}), vec!["net".into()])
//!     .unwrap();
//! assert!(graph.add_resource("port", ResourceType::Port, json!({}), vec!["missing".into()]).is_err());
//! ```

pub mod resource_type;
pub mod template;

use std::collections::{BTreeMap, HashMap};

use serde_json::{json, Value};

use crate::errors::{GraphError, GraphResult};

pub use resource_type::ResourceType;

/// One declared resource; rendered by [`ResourceGraph::to_template`]
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Unique resource name
    pub name: String,

    /// Resource kind
    pub kind: ResourceType,

    /// Backend properties
    pub properties: Value,

    /// Resources that must exist first
    pub depends_on: Vec<String>,
}

/// A value the backend should report after deployment
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub description: String,
    pub value: Value,
}

/// Dependency-ordered resource declarations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceGraph {
    description: String,
    resources: Vec<Resource>,
    index: HashMap<String, usize>,
    outputs: BTreeMap<String, Output>,
}

impl ResourceGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty graph with a template description
    pub fn with_description(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    /// Template description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Append a resource.
    ///
    /// Fails without modifying the graph if the name is taken or a
    /// dependency is not yet declared.
    pub fn add_resource(
        &mut self,
        name: impl Into<String>,
        kind: ResourceType,
        properties: Value,
        depends_on: Vec<String>,
    ) -> GraphResult<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(GraphError::DuplicateResource(name));
        }
        if let Some(missing) = depends_on.iter().find(|dep| !self.index.contains_key(*dep)) {
            return Err(GraphError::MissingDependency {
                resource: name,
                dependency: missing.clone(),
            });
        }

        self.index.insert(name.clone(), self.resources.len());
        self.resources.push(Resource {
            name,
            kind,
            properties,
            depends_on,
        });
        Ok(())
    }

    /// Record an output; a later output with the same name replaces it
    pub fn add_output(&mut self, name: impl Into<String>, description: impl Into<String>, value: Value) {
        self.outputs.insert(
            name.into(),
            Output {
                description: description.into(),
                value,
            },
        );
    }

    /// Check whether a resource is declared
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Look up a resource by name
    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.index.get(name).map(|&i| &self.resources[i])
    }

    /// Declaration position of a resource
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Resources in declaration order
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    /// Resource names in declaration order
    pub fn resource_names(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.name.as_str()).collect()
    }

    /// Resources of one kind, in declaration order
    pub fn resources_of(&self, kind: ResourceType) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(move |r| r.kind == kind)
    }

    /// Requested outputs
    pub fn outputs(&self) -> &BTreeMap<String, Output> {
        &self.outputs
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Reference to another resource in the same graph
pub fn get_resource(name: &str) -> Value {
    json!({ "get_resource": name })
}

/// Attribute of another resource, resolved by the backend
pub fn get_attr(name: &str, path: &[Value]) -> Value {
    let mut args = vec![Value::String(name.to_string())];
    args.extend(path.iter().cloned());
    json!({ "get_attr": args })
}
