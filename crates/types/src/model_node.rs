//! The detyped value tree used for management operations and their responses.

use std::fmt;

use indexmap::IndexMap;

use crate::constants::{FAILED, FAILURE_DESCRIPTION, OUTCOME, RESULT};

/// Type tags understood by the management model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelType {
    BigDecimal,
    BigInteger,
    Boolean,
    Bytes,
    Double,
    Expression,
    Int,
    List,
    Long,
    Object,
    Property,
    String,
    Type,
    Undefined,
}

impl ModelType {
    /// Single byte tag used by the binary encoding.
    pub fn tag(self) -> u8 {
        match self {
            ModelType::BigDecimal => b'd',
            ModelType::BigInteger => b'i',
            ModelType::Boolean => b'Z',
            ModelType::Bytes => b'b',
            ModelType::Double => b'D',
            ModelType::Expression => b'e',
            ModelType::Int => b'I',
            ModelType::List => b'l',
            ModelType::Long => b'J',
            ModelType::Object => b'o',
            ModelType::Property => b'p',
            ModelType::String => b's',
            ModelType::Type => b't',
            ModelType::Undefined => b'u',
        }
    }

    /// Inverse of [`ModelType::tag`].
    pub fn from_tag(tag: u8) -> Option<Self> {
        let model_type = match tag {
            b'd' => ModelType::BigDecimal,
            b'i' => ModelType::BigInteger,
            b'Z' => ModelType::Boolean,
            b'b' => ModelType::Bytes,
            b'D' => ModelType::Double,
            b'e' => ModelType::Expression,
            b'I' => ModelType::Int,
            b'l' => ModelType::List,
            b'J' => ModelType::Long,
            b'o' => ModelType::Object,
            b'p' => ModelType::Property,
            b's' => ModelType::String,
            b't' => ModelType::Type,
            b'u' => ModelType::Undefined,
            _ => return None,
        };
        Some(model_type)
    }

    /// Upper-case name as the management model prints it (e.g. `STRING`).
    pub fn name(self) -> &'static str {
        match self {
            ModelType::BigDecimal => "BIG_DECIMAL",
            ModelType::BigInteger => "BIG_INTEGER",
            ModelType::Boolean => "BOOLEAN",
            ModelType::Bytes => "BYTES",
            ModelType::Double => "DOUBLE",
            ModelType::Expression => "EXPRESSION",
            ModelType::Int => "INT",
            ModelType::List => "LIST",
            ModelType::Long => "LONG",
            ModelType::Object => "OBJECT",
            ModelType::Property => "PROPERTY",
            ModelType::String => "STRING",
            ModelType::Type => "TYPE",
            ModelType::Undefined => "UNDEFINED",
        }
    }
}

/// A named value, used for address segments and ordered key/value lists.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: ModelNode,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<ModelNode>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Recursive, dynamically typed tree.
///
/// Objects keep insertion order, which matters for addresses and for the
/// byte-for-byte output of the binary encoding.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ModelNode {
    #[default]
    Undefined,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Expression(String),
    Type(ModelType),
    List(Vec<ModelNode>),
    Object(IndexMap<String, ModelNode>),
    Property(Box<Property>),
}

static UNDEFINED: ModelNode = ModelNode::Undefined;

impl ModelNode {
    /// Creates an empty object node.
    pub fn object() -> Self {
        ModelNode::Object(IndexMap::new())
    }

    /// Creates an empty list node.
    pub fn list() -> Self {
        ModelNode::List(Vec::new())
    }

    pub fn model_type(&self) -> ModelType {
        match self {
            ModelNode::Undefined => ModelType::Undefined,
            ModelNode::Boolean(_) => ModelType::Boolean,
            ModelNode::Int(_) => ModelType::Int,
            ModelNode::Long(_) => ModelType::Long,
            ModelNode::Double(_) => ModelType::Double,
            ModelNode::String(_) => ModelType::String,
            ModelNode::Bytes(_) => ModelType::Bytes,
            ModelNode::Expression(_) => ModelType::Expression,
            ModelNode::Type(_) => ModelType::Type,
            ModelNode::List(_) => ModelType::List,
            ModelNode::Object(_) => ModelType::Object,
            ModelNode::Property(_) => ModelType::Property,
        }
    }

    pub fn is_defined(&self) -> bool {
        !matches!(self, ModelNode::Undefined)
    }

    /// Returns the child stored under `key`, or an undefined node.
    ///
    /// Unlike the mutable accessor this never changes the tree.
    pub fn get(&self, key: &str) -> &ModelNode {
        match self {
            ModelNode::Object(map) => map.get(key).unwrap_or(&UNDEFINED),
            ModelNode::Property(property) if property.name == key => &property.value,
            _ => &UNDEFINED,
        }
    }

    /// Returns the child stored under `key`, creating it when missing.
    ///
    /// An undefined node is turned into an object first. Any other
    /// non-object node is replaced by an object, mirroring how the management
    /// model auto-vivifies paths.
    pub fn get_mut(&mut self, key: &str) -> &mut ModelNode {
        if !matches!(self, ModelNode::Object(_)) {
            *self = ModelNode::object();
        }
        match self {
            ModelNode::Object(map) => map.entry(key.to_string()).or_default(),
            _ => unreachable!("node was converted to an object above"),
        }
    }

    /// Walks a chain of keys without modifying the tree.
    pub fn at(&self, path: &[&str]) -> &ModelNode {
        path.iter().fold(self, |node, key| node.get(key))
    }

    /// Replaces this node's value.
    pub fn set(&mut self, value: impl Into<ModelNode>) -> &mut Self {
        *self = value.into();
        self
    }

    /// Appends a value, turning an undefined node into a list first.
    pub fn add(&mut self, value: impl Into<ModelNode>) -> &mut Self {
        if !matches!(self, ModelNode::List(_)) {
            *self = ModelNode::list();
        }
        if let ModelNode::List(items) = self {
            items.push(value.into());
        }
        self
    }

    /// Whether the object contains `key`, defined or not.
    pub fn has(&self, key: &str) -> bool {
        match self {
            ModelNode::Object(map) => map.contains_key(key),
            ModelNode::Property(property) => property.name == key,
            _ => false,
        }
    }

    /// Whether the object contains `key` with a defined value.
    pub fn has_defined(&self, key: &str) -> bool {
        self.has(key) && self.get(key).is_defined()
    }

    /// Object keys in insertion order. Non-objects have no keys.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            ModelNode::Object(map) => map.keys().map(String::as_str).collect(),
            ModelNode::Property(property) => vec![property.name.as_str()],
            _ => Vec::new(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ModelNode::String(value) | ModelNode::Expression(value) => Some(value),
            _ => None,
        }
    }

    /// String form of any node, the way the management model renders it.
    pub fn as_string(&self) -> String {
        match self {
            ModelNode::Undefined => "undefined".to_string(),
            ModelNode::Boolean(value) => value.to_string(),
            ModelNode::Int(value) => value.to_string(),
            ModelNode::Long(value) => value.to_string(),
            ModelNode::Double(value) => value.to_string(),
            ModelNode::String(value) | ModelNode::Expression(value) => value.clone(),
            ModelNode::Type(model_type) => model_type.name().to_string(),
            other => other.to_json_string(true),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ModelNode::Boolean(value) => Some(*value),
            ModelNode::String(value) => value.parse().ok(),
            ModelNode::Int(value) => Some(*value != 0),
            ModelNode::Long(value) => Some(*value != 0),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            ModelNode::Int(value) => Some(i64::from(*value)),
            ModelNode::Long(value) => Some(*value),
            ModelNode::Double(value) => Some(*value as i64),
            ModelNode::String(value) => value.parse().ok(),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        self.as_long().and_then(|value| i32::try_from(value).ok())
    }

    /// Items of a list node. Anything else yields an empty slice.
    pub fn as_list(&self) -> &[ModelNode] {
        match self {
            ModelNode::List(items) => items,
            _ => &[],
        }
    }

    /// Interprets the node as an ordered list of properties.
    ///
    /// Accepts a list of property nodes, a list of single-key objects, or an
    /// object (each key becomes a property). Other shapes yield nothing.
    pub fn as_property_list(&self) -> Vec<Property> {
        match self {
            ModelNode::Object(map) => map.iter().map(|(name, value)| Property::new(name.clone(), value.clone())).collect(),
            ModelNode::Property(property) => vec![(**property).clone()],
            ModelNode::List(items) => items
                .iter()
                .flat_map(|item| match item {
                    ModelNode::Property(property) => vec![(**property).clone()],
                    ModelNode::Object(map) => map.iter().map(|(name, value)| Property::new(name.clone(), value.clone())).collect(),
                    _ => Vec::new(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// `true` when the `outcome` field reports `failed`.
    pub fn is_failure(&self) -> bool {
        self.get(OUTCOME).as_str() == Some(FAILED)
    }

    /// Human readable failure description of a failed response.
    pub fn failure_description(&self) -> String {
        let description = self.get(FAILURE_DESCRIPTION);
        if description.is_defined() {
            description.as_string()
        } else {
            "No failure-description provided".to_string()
        }
    }

    /// The `result` child of a response.
    pub fn result(&self) -> &ModelNode {
        self.get(RESULT)
    }
}

impl fmt::Display for ModelNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json_string(true))
    }
}

impl From<bool> for ModelNode {
    fn from(value: bool) -> Self {
        ModelNode::Boolean(value)
    }
}

impl From<i32> for ModelNode {
    fn from(value: i32) -> Self {
        ModelNode::Int(value)
    }
}

impl From<i64> for ModelNode {
    fn from(value: i64) -> Self {
        ModelNode::Long(value)
    }
}

impl From<f64> for ModelNode {
    fn from(value: f64) -> Self {
        ModelNode::Double(value)
    }
}

impl From<&str> for ModelNode {
    fn from(value: &str) -> Self {
        ModelNode::String(value.to_string())
    }
}

impl From<String> for ModelNode {
    fn from(value: String) -> Self {
        ModelNode::String(value)
    }
}

impl From<&String> for ModelNode {
    fn from(value: &String) -> Self {
        ModelNode::String(value.clone())
    }
}

impl From<Property> for ModelNode {
    fn from(value: Property) -> Self {
        ModelNode::Property(Box::new(value))
    }
}

impl From<Vec<ModelNode>> for ModelNode {
    fn from(value: Vec<ModelNode>) -> Self {
        ModelNode::List(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_mut_auto_vivifies_nested_objects() {
        let mut node = ModelNode::Undefined;
        node.get_mut("response-headers").get_mut("process-state").set("reload-required");

        assert_eq!(node.at(&["response-headers", "process-state"]).as_str(), Some("reload-required"));
        assert!(node.has_defined("response-headers"));
        assert!(!node.has("result"));
    }

    #[test]
    fn get_on_missing_key_is_undefined_and_does_not_mutate() {
        let node = ModelNode::object();
        assert!(!node.get("missing").is_defined());
        assert!(node.keys().is_empty());
    }

    #[test]
    fn failure_detection_uses_outcome_field() {
        let mut failed = ModelNode::object();
        failed.get_mut("outcome").set("failed");
        failed.get_mut("failure-description").set("WFLYCTL0216: resource not found");
        assert!(failed.is_failure());
        assert_eq!(failed.failure_description(), "WFLYCTL0216: resource not found");

        let mut success = ModelNode::object();
        success.get_mut("outcome").set("success");
        assert!(!success.is_failure());
    }

    #[test]
    fn failure_description_has_fallback_text() {
        let mut failed = ModelNode::object();
        failed.get_mut("outcome").set("failed");
        assert_eq!(failed.failure_description(), "No failure-description provided");
    }

    #[test]
    fn property_list_accepts_properties_and_single_key_objects() {
        let mut single_key = ModelNode::object();
        single_key.get_mut("subsystem").set("logging");
        let address = ModelNode::List(vec![Property::new("profile", "full").into(), single_key]);

        let properties = address.as_property_list();
        assert_eq!(properties.len(), 2);
        assert_eq!(properties[0].name, "profile");
        assert_eq!(properties[0].value.as_str(), Some("full"));
        assert_eq!(properties[1].name, "subsystem");
        assert_eq!(properties[1].value.as_str(), Some("logging"));
    }

    #[test]
    fn as_string_renders_scalars_plainly() {
        assert_eq!(ModelNode::from(true).as_string(), "true");
        assert_eq!(ModelNode::from(42).as_string(), "42");
        assert_eq!(ModelNode::from("full").as_string(), "full");
        assert_eq!(ModelNode::Type(ModelType::Long).as_string(), "LONG");
    }

    #[test]
    fn add_turns_undefined_into_list() {
        let mut node = ModelNode::Undefined;
        node.add("a").add(1);
        assert_eq!(node.as_list().len(), 2);
    }
}
