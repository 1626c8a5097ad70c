// Copyright (c) 2025 - Cowboy AI, Inc.
//! Template rendering for a compiled [`ResourceGraph`]

use serde_json::{json, Map, Value};

use super::ResourceGraph;

/// Template format version understood by the orchestration service
pub const TEMPLATE_VERSION: &str = "2013-05-23";

impl ResourceGraph {
    /// Render the graph as a template document.
    ///
    /// Resources appear in declaration order; the backend relies on
    /// `depends_on` rather than on that order.
    pub fn to_template(&self) -> Value {
        let mut resources = Map::new();
        for resource in self.resources() {
            let mut body = Map::new();
            body.insert("type".to_string(), json!(resource.kind.as_str()));
            body.insert("properties".to_string(), resource.properties.clone());
            if !resource.depends_on.is_empty() {
                body.insert("depends_on".to_string(), json!(resource.depends_on));
            }
            resources.insert(resource.name.clone(), Value::Object(body));
        }

        let outputs: Map<String, Value> = self
            .outputs()
            .iter()
            .map(|(name, output)| {
                (
                    name.clone(),
                    json!({ "description": output.description, "value": output.value }),
                )
            })
            .collect();

        json!({
            "heat_template_version": TEMPLATE_VERSION,
            "description": self.description(),
            "resources": resources,
            "outputs": outputs,
        })
    }
}
