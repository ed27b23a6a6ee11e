//! # Schema Registry
//!
//! Static, versioned table of node types: their fields, their disambiguation
//! descriptors, and their position in the type hierarchy. The registry is
//! built once from a declarative document, validated, and then shared
//! read-only by every disambiguation pass.
//!
//! A type without a parent is a concrete (persisted) type. Every other type
//! is a proxy of the concrete root of its parent chain and inherits fields
//! and descriptor from its ancestors, the nearest declaration winning.

use crate::error::{DisambiguationError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

const SCHOLARLY_SCHEMA: &str = include_str!("../schema/scholarly.json");

/// Declared datatype of an attribute field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    #[default]
    Text,
    Datetime,
    Integer,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldDef {
    Attribute {
        #[serde(default)]
        datatype: DataType,
    },
    /// Forward edge named after the field, pointing at one node.
    ToOne { target: String },
    /// Reverse foreign key: the subjects of incoming `reverse_of` edges.
    ToMany { target: String, reverse_of: String },
    ManyToMany { target: String },
}

impl FieldDef {
    pub fn is_relation(&self) -> bool {
        !matches!(self, FieldDef::Attribute { .. })
    }

    pub fn datatype(&self) -> Option<DataType> {
        match self {
            FieldDef::Attribute { datatype } => Some(*datatype),
            _ => None,
        }
    }

    fn target(&self) -> Option<&str> {
        match self {
            FieldDef::Attribute { .. } => None,
            FieldDef::ToOne { target }
            | FieldDef::ToMany { target, .. }
            | FieldDef::ManyToMany { target } => Some(target),
        }
    }
}

/// Disambiguation descriptor of a type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Descriptor {
    /// Fields that must all match exactly
    pub all: Vec<String>,
    /// Fields where one matching value suffices
    pub any: Vec<String>,
    /// Require matches to be compatible in the type hierarchy
    pub constrain_types: bool,
}

impl Descriptor {
    pub fn is_empty(&self) -> bool {
        self.all.is_empty() && self.any.is_empty()
    }

    /// Every descriptor field, `all` first.
    pub fn fields(&self) -> impl Iterator<Item = &String> {
        self.all.iter().chain(self.any.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDef>,
    #[serde(default)]
    pub disambiguation: Option<Descriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub version: String,
    pub types: Vec<TypeDecl>,
}

/// Fully resolved view of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub name: String,
    /// Root of the parent chain; the persisted table
    pub concrete: String,
    /// Parent chain, nearest first, ending at the concrete root
    pub ancestors: Vec<String>,
    /// Every type below this one
    pub descendants: BTreeSet<String>,
    pub fields: BTreeMap<String, FieldDef>,
    pub descriptor: Option<Descriptor>,
    /// Types a match may carry when the descriptor constrains types
    pub matching_types: Option<BTreeSet<String>>,
}

impl TypeInfo {
    pub fn is_concrete(&self) -> bool {
        self.ancestors.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    /// This type and every descendant.
    pub fn hierarchy(&self) -> BTreeSet<String> {
        let mut types = self.descendants.clone();
        types.insert(self.name.clone());
        types
    }
}

#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    version: String,
    types: HashMap<String, TypeInfo>,
}

impl SchemaRegistry {
    /// Build and validate a registry from a declarative document.
    pub fn from_document(document: SchemaDocument) -> Result<Self> {
        let mut decls: HashMap<String, TypeDecl> = HashMap::new();
        for decl in document.types {
            if decls.contains_key(&decl.name) {
                return Err(DisambiguationError::Schema(format!(
                    "type {:?} declared twice",
                    decl.name
                )));
            }
            decls.insert(decl.name.clone(), decl);
        }

        let mut types = HashMap::with_capacity(decls.len());
        for name in decls.keys() {
            let ancestors = ancestors_of(&decls, name)?;
            let concrete = ancestors.last().cloned().unwrap_or_else(|| name.clone());

            // Root first so nearer declarations override.
            let mut fields = BTreeMap::new();
            let mut descriptor = None;
            for type_name in ancestors.iter().rev().chain(std::iter::once(name)) {
                let decl = &decls[type_name];
                for (field, def) in &decl.fields {
                    fields.insert(field.clone(), def.clone());
                }
                if decl.disambiguation.is_some() {
                    descriptor = decl.disambiguation.clone();
                }
            }

            types.insert(
                name.clone(),
                TypeInfo {
                    name: name.clone(),
                    concrete,
                    ancestors,
                    descendants: BTreeSet::new(),
                    fields,
                    descriptor,
                    matching_types: None,
                },
            );
        }

        let links: Vec<(String, Vec<String>)> = types
            .values()
            .map(|info| (info.name.clone(), info.ancestors.clone()))
            .collect();
        for (name, ancestors) in links {
            for ancestor in ancestors {
                if let Some(info) = types.get_mut(&ancestor) {
                    info.descendants.insert(name.clone());
                }
            }
        }

        for info in types.values_mut() {
            info.matching_types = match &info.descriptor {
                Some(descriptor) if descriptor.constrain_types => Some(matching_types_of(info)),
                _ => None,
            };
        }

        let registry = Self {
            version: document.version,
            types,
        };
        registry.validate()?;
        Ok(registry)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let document: SchemaDocument = serde_json::from_str(raw)
            .map_err(|e| DisambiguationError::Schema(format!("invalid schema document: {}", e)))?;
        Self::from_document(document)
    }

    /// Load a registry from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DisambiguationError::Schema(format!("could not read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    /// The built-in scholarly-metadata schema.
    pub fn scholarly() -> Result<Self> {
        Self::from_json(SCHOLARLY_SCHEMA)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn type_names(&self) -> BTreeSet<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    pub fn type_info(&self, type_name: &str) -> Option<&TypeInfo> {
        self.types.get(type_name)
    }

    /// Like `type_info`, but an unknown type is an error.
    pub fn get(&self, type_name: &str) -> Result<&TypeInfo> {
        self.types
            .get(type_name)
            .ok_or_else(|| DisambiguationError::UnknownType(type_name.to_string()))
    }

    /// True iff `sub` is a strict subtype of `sup`.
    pub fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        self.types
            .get(sub)
            .map(|info| info.ancestors.iter().any(|ancestor| ancestor == sup))
            .unwrap_or(false)
    }

    /// Declared datatype of an attribute field, if it is an attribute.
    pub fn datatype(&self, type_name: &str, field: &str) -> Option<DataType> {
        self.types
            .get(type_name)
            .and_then(|info| info.field(field))
            .and_then(FieldDef::datatype)
    }

    fn validate(&self) -> Result<()> {
        let mut names: Vec<&String> = self.types.keys().collect();
        names.sort();
        for name in names {
            let info = &self.types[name];
            for (field, def) in &info.fields {
                if let Some(target) = def.target() {
                    if !self.types.contains_key(target) {
                        return Err(DisambiguationError::Schema(format!(
                            "{}.{} targets unknown type {:?}",
                            name, field, target
                        )));
                    }
                }
            }

            let Some(descriptor) = &info.descriptor else {
                continue;
            };
            let mut seen = HashSet::new();
            for field in descriptor.fields() {
                if !seen.insert(field) {
                    return Err(DisambiguationError::Schema(format!(
                        "{} lists disambiguation field {:?} twice",
                        name, field
                    )));
                }
                match info.field(field) {
                    None => {
                        return Err(DisambiguationError::Schema(format!(
                            "{} disambiguates on undeclared field {:?}",
                            name, field
                        )))
                    }
                    Some(FieldDef::ManyToMany { .. }) => {
                        return Err(DisambiguationError::UnsupportedField {
                            type_name: name.clone(),
                            field: field.clone(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }
}

fn ancestors_of(decls: &HashMap<String, TypeDecl>, name: &str) -> Result<Vec<String>> {
    let mut ancestors = Vec::new();
    let mut seen = HashSet::new();
    seen.insert(name.to_string());
    let mut current = decls[name].parent.clone();
    while let Some(parent) = current {
        if !seen.insert(parent.clone()) {
            return Err(DisambiguationError::Schema(format!(
                "type hierarchy of {:?} contains a cycle through {:?}",
                name, parent
            )));
        }
        let decl = decls.get(&parent).ok_or_else(|| {
            DisambiguationError::Schema(format!("{:?} has unknown parent {:?}", name, parent))
        })?;
        current = decl.parent.clone();
        ancestors.push(parent);
    }
    Ok(ancestors)
}

/// Own type, every subtype, and every proxy supertype. The concrete root is
/// not a proxy and only matches itself.
fn matching_types_of(info: &TypeInfo) -> BTreeSet<String> {
    let mut types = BTreeSet::new();
    types.insert(info.name.clone());
    if info.is_concrete() {
        return types;
    }
    types.extend(info.descendants.iter().cloned());
    let proxies = &info.ancestors[..info.ancestors.len() - 1];
    types.extend(proxies.iter().cloned());
    types
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scholarly_schema_loads() {
        let registry = SchemaRegistry::scholarly().unwrap();
        assert!(!registry.version().is_empty());

        let article = registry.get("article").unwrap();
        assert_eq!(article.concrete, "abstractcreativework");
        assert_eq!(
            article.ancestors,
            vec!["publication", "creativework", "abstractcreativework"]
        );
        assert!(article.field("title").is_some());
        let descriptor = article.descriptor.as_ref().unwrap();
        assert_eq!(descriptor.any, vec!["identifiers"]);
        assert!(descriptor.constrain_types);
    }

    #[test]
    fn test_matching_types() {
        let registry = SchemaRegistry::scholarly().unwrap();

        let article = registry.get("article").unwrap();
        assert_eq!(
            article.matching_types,
            Some(set(&["article", "creativework", "publication"]))
        );

        let creativework = registry.get("creativework").unwrap();
        let types = creativework.matching_types.as_ref().unwrap();
        assert!(types.contains("creativework"));
        assert!(types.contains("preprint"));
        assert!(!types.contains("abstractcreativework"));

        let identifier = registry.get("workidentifier").unwrap();
        assert_eq!(identifier.matching_types, None);
    }

    #[test]
    fn test_subtypes() {
        let registry = SchemaRegistry::scholarly().unwrap();
        assert!(registry.is_subtype("article", "creativework"));
        assert!(registry.is_subtype("preprint", "publication"));
        assert!(!registry.is_subtype("creativework", "article"));
        assert!(!registry.is_subtype("article", "article"));
        assert!(!registry.is_subtype("person", "creativework"));
        assert!(registry.get("publication").unwrap().hierarchy().contains("thesis"));
    }

    #[test]
    fn test_nearest_descriptor_wins() {
        let registry = SchemaRegistry::scholarly().unwrap();
        let person = registry.get("person").unwrap();
        let organization = registry.get("organization").unwrap();
        assert_eq!(person.descriptor.as_ref().unwrap().any, vec!["identifiers"]);
        assert_eq!(
            organization.descriptor.as_ref().unwrap().any,
            vec!["identifiers", "name"]
        );
        assert_eq!(
            registry.datatype("article", "date_modified"),
            Some(DataType::Datetime)
        );
        assert_eq!(registry.datatype("article", "identifiers"), None);
    }

    #[test]
    fn test_rejects_many_to_many_descriptor() {
        let raw = r#"{
            "types": [
                {"name": "tag", "fields": {"name": {"kind": "attribute"}}},
                {"name": "work",
                 "fields": {"tags": {"kind": "many_to_many", "target": "tag"}},
                 "disambiguation": {"all": ["tags"]}}
            ]
        }"#;
        let err = SchemaRegistry::from_json(raw).unwrap_err();
        assert!(matches!(
            err,
            DisambiguationError::UnsupportedField { ref field, .. } if field == "tags"
        ));
    }

    #[test]
    fn test_rejects_bad_hierarchy() {
        let cycle = r#"{"types": [
            {"name": "a", "parent": "b"},
            {"name": "b", "parent": "a"}
        ]}"#;
        assert!(matches!(
            SchemaRegistry::from_json(cycle),
            Err(DisambiguationError::Schema(_))
        ));

        let orphan = r#"{"types": [{"name": "a", "parent": "missing"}]}"#;
        assert!(matches!(
            SchemaRegistry::from_json(orphan),
            Err(DisambiguationError::Schema(_))
        ));

        let undeclared = r#"{"types": [
            {"name": "a", "disambiguation": {"all": ["uri"]}}
        ]}"#;
        assert!(matches!(
            SchemaRegistry::from_json(undeclared),
            Err(DisambiguationError::Schema(_))
        ));
    }

    #[test]
    fn test_unknown_type() {
        let registry = SchemaRegistry::scholarly().unwrap();
        assert!(matches!(
            registry.get("spaceship"),
            Err(DisambiguationError::UnknownType(_))
        ));
    }
}
