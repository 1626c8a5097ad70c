// Copyright (c) 2025 - Cowboy AI, Inc.
//! Common identity shared by every topology entity

use serde::{Deserialize, Serialize};

/// Identity of an entity owned by a context
///
/// The owning context is referenced by name only; entities never outlive
/// the context that built them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Name, unique within the context
    pub name: String,

    /// Owning context
    pub context_name: String,

    /// Resource name used in the compiled graph
    pub stack_name: String,

    /// Backend id, filled after deployment
    pub stack_id: Option<String>,
}

impl ObjectMeta {
    pub fn new(
        name: impl Into<String>,
        context_name: impl Into<String>,
        stack_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            context_name: context_name.into(),
            stack_name: stack_name.into(),
            stack_id: None,
        }
    }

    /// Distinguished name: `<name>.<context>`
    pub fn dn(&self) -> String {
        format!("{}.{}", self.name, self.context_name)
    }
}

/// Entity with a name inside a context
pub trait TopologyObject {
    fn meta(&self) -> &ObjectMeta;

    fn meta_mut(&mut self) -> &mut ObjectMeta;

    fn name(&self) -> &str {
        &self.meta().name
    }

    fn context_name(&self) -> &str {
        &self.meta().context_name
    }

    fn stack_name(&self) -> &str {
        &self.meta().stack_name
    }

    fn stack_id(&self) -> Option<&str> {
        self.meta().stack_id.as_deref()
    }

    fn dn(&self) -> String {
        self.meta().dn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinguished_name() {
        let meta = ObjectMeta::new("athena", "demo", "athena.demo");
        assert_eq!(meta.dn(), "athena.demo");
        assert!(meta.stack_id.is_none());
    }
}
