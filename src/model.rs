//! # Data Model
//!
//! Core data structures of the property graph: node handles, attribute
//! values, and references to persisted entities.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Compact handle for a node, unique within one graph for its lifetime.
///
/// Handles are never reused, so a handle held across a `replace` either
/// still names the surviving node or names nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// A scalar or small structured attribute value produced by the parser.
///
/// Mappings keep the order in which the parser produced their entries;
/// canonicalization is responsible for making them order independent.
/// Floats compare by bit pattern, so `NaN` equals itself and `-0.0` does not
/// equal `0.0` here; [`crate::canonical::canonicalize`] folds both.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Value {
    /// Missing, null and empty-string values do not identify anything.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Str(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Textual rendering used when comparing conflicting values by length.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(x) => x.to_string(),
            Value::Str(s) => s.clone(),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::render).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Map(entries) => {
                let inner: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.render()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

pub type Attributes = BTreeMap<String, Value>;

/// Reference to an already persisted entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceRef {
    /// Concrete (table-level) type the entity is stored under
    pub concrete_type: String,
    /// Specific type recorded on the row
    pub type_name: String,
    /// Raw primary key
    pub pk: u64,
}

impl InstanceRef {
    pub fn new(concrete_type: impl Into<String>, type_name: impl Into<String>, pk: u64) -> Self {
        Self {
            concrete_type: concrete_type.into(),
            type_name: type_name.into(),
            pk,
        }
    }
}

impl fmt::Display for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.type_name, self.pk)
    }
}

/// A typed, attributed vertex of the property graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Graph-local handle
    pub id: NodeId,
    /// Identifier assigned by the upstream parser (e.g. `_:b0`)
    pub external_id: String,
    /// Type tag, resolved against the schema registry
    pub type_name: String,
    pub attrs: Attributes,
    /// Persisted entity this node was bound to, if any
    pub instance: Option<InstanceRef>,
}

impl Node {
    pub fn new(id: NodeId, external_id: String, type_name: String, attrs: Attributes) -> Self {
        Self {
            id,
            external_id,
            type_name,
            attrs,
            instance: None,
        }
    }

    /// Attribute lookup that treats blank values as absent.
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name).filter(|value| !value.is_blank())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {} {}>", self.type_name, self.external_id, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_values() {
        assert!(Value::Null.is_blank());
        assert!(Value::from("").is_blank());
        assert!(!Value::from("x").is_blank());
        assert!(!Value::Int(0).is_blank());
        assert!(!Value::List(vec![]).is_blank());
    }

    #[test]
    fn test_node_attr_skips_blank() {
        let mut attrs = Attributes::new();
        attrs.insert("title".to_string(), Value::from(""));
        attrs.insert("language".to_string(), Value::from("en"));
        let node = Node::new(NodeId(0), "_:a".to_string(), "article".to_string(), attrs);

        assert_eq!(node.attr("title"), None);
        assert_eq!(node.attr("language"), Some(&Value::from("en")));
        assert_eq!(node.attr("missing"), None);
    }

    #[test]
    fn test_render() {
        let value = Value::Map(vec![
            ("b".to_string(), Value::Int(2)),
            ("a".to_string(), Value::List(vec![Value::from("x"), Value::Bool(true)])),
        ]);
        assert_eq!(value.render(), "{b: 2, a: [x, true]}");
        assert_eq!(NodeId(3).to_string(), "N3");
        assert_eq!(InstanceRef::new("abstractagent", "person", 9).to_string(), "person#9");
    }

    #[test]
    fn test_float_values() {
        assert!(!Value::Float(0.0).is_blank());
        assert_eq!(Value::from(2.5).render(), "2.5");
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
        assert_ne!(Value::Float(1.0), Value::Int(1));
    }
}
