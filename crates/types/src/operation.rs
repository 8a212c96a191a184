//! Concrete resource addresses and the operations sent against them.

use std::fmt;

use thiserror::Error;

use crate::constants::{ADDRESS, OP};
use crate::model_node::{ModelNode, Property};

/// Ordered `name=value` segments pointing at one managed resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ResourceAddress {
    segments: Vec<(String, String)>,
}

impl ResourceAddress {
    /// The root resource (empty address).
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments<I, N, V>(segments: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(|(name, value)| (name.into(), value.into())).collect(),
        }
    }

    /// Reads the `address` list of an operation.
    pub fn from_node(node: &ModelNode) -> Self {
        Self {
            segments: node
                .as_property_list()
                .into_iter()
                .map(|property| (property.name, property.value.as_string()))
                .collect(),
        }
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.segments.push((name.into(), value.into()));
        self
    }

    pub fn segments(&self) -> &[(String, String)] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The `address` list node (a list of properties).
    pub fn to_node(&self) -> ModelNode {
        ModelNode::List(
            self.segments
                .iter()
                .map(|(name, value)| ModelNode::from(Property::new(name.clone(), value.clone())))
                .collect(),
        )
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for (name, value) in &self.segments {
            write!(f, "/{name}={value}")?;
        }
        Ok(())
    }
}

/// Errors raised when a value tree is not a valid operation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OperationError {
    #[error("operation is missing the '{0}' field")]
    MissingField(&'static str),

    #[error("operation name must be a non-empty string")]
    InvalidName,
}

/// A management operation: a value tree naming an address and an operation.
///
/// The tree is never mutated once the operation is built; dispatching only
/// reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    node: ModelNode,
}

impl Operation {
    pub fn builder(address: ResourceAddress, name: impl Into<String>) -> OperationBuilder {
        OperationBuilder {
            address,
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    /// Validates that `node` carries an address and an operation name.
    pub fn from_node(node: ModelNode) -> Result<Self, OperationError> {
        if !node.has(ADDRESS) {
            return Err(OperationError::MissingField(ADDRESS));
        }
        if !node.has(OP) {
            return Err(OperationError::MissingField(OP));
        }
        match node.get(OP).as_str() {
            Some(name) if !name.trim().is_empty() => Ok(Self { node }),
            _ => Err(OperationError::InvalidName),
        }
    }

    pub fn name(&self) -> &str {
        self.node.get(OP).as_str().unwrap_or_default()
    }

    pub fn address(&self) -> ResourceAddress {
        ResourceAddress::from_node(self.node.get(ADDRESS))
    }

    /// Optional parameter lookup; mandatory fields are reachable too.
    pub fn parameter(&self, name: &str) -> Option<&ModelNode> {
        self.node.has(name).then(|| self.node.get(name))
    }

    pub fn node(&self) -> &ModelNode {
        &self.node
    }

    pub fn into_node(self) -> ModelNode {
        self.node
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address(), self.name())
    }
}

/// Collects the pieces of an [`Operation`].
#[derive(Debug, Clone)]
pub struct OperationBuilder {
    address: ResourceAddress,
    name: String,
    parameters: Vec<(String, ModelNode)>,
}

impl OperationBuilder {
    /// Adds a parameter. `operation` and `address` are reserved for the name
    /// and address given to [`Operation::builder`] and are ignored here.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<ModelNode>) -> Self {
        self.parameters.push((name.into(), value.into()));
        self
    }

    pub fn build(self) -> Operation {
        let mut node = ModelNode::object();
        node.get_mut(OP).set(self.name);
        node.get_mut(ADDRESS).set(self.address.to_node());
        for (name, value) in self.parameters {
            if name == OP || name == ADDRESS {
                continue;
            }
            node.get_mut(&name).set(value);
        }
        Operation { node }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_name_and_address_over_reserved_parameters() {
        let operation = Operation::builder(ResourceAddress::from_segments([("subsystem", "logging")]), "read-resource")
            .param("operation", "remove")
            .param("address", ModelNode::List(Vec::new()))
            .param("recursive", true)
            .build();

        assert_eq!(operation.name(), "read-resource");
        assert_eq!(operation.address().segments(), &[("subsystem".to_string(), "logging".to_string())]);
        assert_eq!(operation.node().keys(), vec!["operation", "address", "recursive"]);
        assert!(Operation::from_node(operation.into_node()).is_ok());
    }

    #[test]
    fn builder_produces_address_and_name() {
        let operation = Operation::builder(ResourceAddress::from_segments([("profile", "full")]), "read-resource")
            .param("recursive", true)
            .build();

        assert_eq!(operation.name(), "read-resource");
        assert_eq!(operation.address().segments(), &[("profile".to_string(), "full".to_string())]);
        assert_eq!(operation.parameter("recursive").and_then(ModelNode::as_bool), Some(true));
        assert!(operation.parameter("proxies").is_none());
        assert_eq!(operation.to_string(), "/profile=full:read-resource");
    }

    #[test]
    fn from_node_requires_mandatory_fields() {
        let mut node = ModelNode::object();
        node.get_mut("operation").set("read-resource");
        assert_eq!(Operation::from_node(node.clone()), Err(OperationError::MissingField("address")));

        node.get_mut("address").set(ModelNode::list());
        node.get_mut("operation").set("");
        assert_eq!(Operation::from_node(node.clone()), Err(OperationError::InvalidName));

        node.get_mut("operation").set("whoami");
        assert!(Operation::from_node(node).is_ok());
    }

    #[test]
    fn root_address_displays_as_slash() {
        assert_eq!(ResourceAddress::root().to_string(), "/");
        let operation = Operation::builder(ResourceAddress::root(), "whoami").build();
        assert!(operation.address().is_root());
    }
}
