//! # Store Module
//!
//! Storage contract used by database comparison, plus an in-memory store.
//!
//! A query names a concrete type, an optional type restriction, and a
//! disjunction of alternatives, each a conjunction of exact-match
//! conditions. Stores must honor the row limit without materializing the
//! full match set.

use crate::canonical::{canonicalize, CanonicalKey};
use crate::model::{InstanceRef, Value};
use crate::obfuscate::IdObfuscator;
use anyhow::{bail, Result};
use hashbrown::HashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One exact-match condition on a persisted entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Attribute equal to a canonical value
    Attribute { field: String, value: CanonicalKey },
    /// Relation containing every listed primary key
    Related { field: String, pks: BTreeSet<u64> },
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Attribute { field, value } => write!(f, "{}={}", field, value),
            Condition::Related { field, pks } => write!(f, "{}__id in {:?}", field, pks),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityQuery {
    /// Table to search
    pub concrete_type: String,
    /// Allowed type tags, unrestricted when `None`
    pub types: Option<BTreeSet<String>>,
    /// An entity matches if it satisfies every condition of any alternative
    pub alternatives: Vec<Vec<Condition>>,
}

impl EntityQuery {
    pub fn new(concrete_type: impl Into<String>) -> Self {
        Self {
            concrete_type: concrete_type.into(),
            types: None,
            alternatives: Vec::new(),
        }
    }

    /// Restrict to `types`, intersecting with any restriction already set.
    pub fn restrict_types(mut self, types: BTreeSet<String>) -> Self {
        self.types = Some(match self.types {
            Some(current) => current.intersection(&types).cloned().collect(),
            None => types,
        });
        self
    }

    pub fn with_alternative(mut self, conditions: Vec<Condition>) -> Self {
        self.alternatives.push(conditions);
        self
    }
}

impl fmt::Display for EntityQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.concrete_type)?;
        if let Some(types) = &self.types {
            write!(f, " type in {:?}", types)?;
        }
        for (i, alternative) in self.alternatives.iter().enumerate() {
            write!(f, "{}", if i == 0 { " where (" } else { " or (" })?;
            for (j, condition) in alternative.iter().enumerate() {
                if j > 0 {
                    write!(f, " and ")?;
                }
                write!(f, "{}", condition)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// Read access to persisted entities.
pub trait EntityStore {
    /// Entities matching `query`, at most `limit` of them.
    fn find(&self, query: &EntityQuery, limit: usize) -> Result<Vec<InstanceRef>>;

    /// Raw primary key behind an external reference, `None` if it cannot be
    /// decoded.
    fn resolve_reference(&self, reference: &str) -> Option<u64> {
        IdObfuscator::decode_id(reference).ok()
    }
}

/// A persisted row as seen by the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedEntity {
    pub instance: InstanceRef,
    pub attrs: BTreeMap<String, CanonicalKey>,
    pub relations: BTreeMap<String, BTreeSet<u64>>,
}

impl PersistedEntity {
    pub fn new(concrete_type: impl Into<String>, type_name: impl Into<String>, pk: u64) -> Self {
        Self {
            instance: InstanceRef::new(concrete_type, type_name, pk),
            attrs: BTreeMap::new(),
            relations: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(field.into(), canonicalize(&value.into()));
        self
    }

    pub fn with_related(mut self, field: impl Into<String>, pk: u64) -> Self {
        self.relations.entry(field.into()).or_default().insert(pk);
        self
    }

    /// Check a single condition
    pub fn satisfies(&self, condition: &Condition) -> bool {
        match condition {
            Condition::Attribute { field, value } => self.attrs.get(field) == Some(value),
            Condition::Related { field, pks } => self
                .relations
                .get(field)
                .map(|related| pks.is_subset(related))
                .unwrap_or(false),
        }
    }
}

/// In-memory entity store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Entities by concrete type, then primary key
    tables: HashMap<String, BTreeMap<u64, PersistedEntity>>,
}

impl MemoryStore {
    /// Create a new store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity; primary keys are unique per concrete type
    pub fn insert(&mut self, entity: PersistedEntity) -> Result<()> {
        let table = self
            .tables
            .entry(entity.instance.concrete_type.clone())
            .or_default();
        if table.contains_key(&entity.instance.pk) {
            bail!("duplicate primary key {}", entity.instance);
        }
        table.insert(entity.instance.pk, entity);
        Ok(())
    }

    /// Get an entity by concrete type and primary key
    pub fn get(&self, concrete_type: &str, pk: u64) -> Option<&PersistedEntity> {
        self.tables.get(concrete_type).and_then(|table| table.get(&pk))
    }

    /// Get the number of entities
    pub fn len(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EntityStore for MemoryStore {
    fn find(&self, query: &EntityQuery, limit: usize) -> Result<Vec<InstanceRef>> {
        let Some(table) = self.tables.get(&query.concrete_type) else {
            return Ok(Vec::new());
        };

        // Each alternative is capped on its own, then unioned.
        let mut found: BTreeMap<u64, InstanceRef> = BTreeMap::new();
        for alternative in &query.alternatives {
            let rows = table
                .values()
                .filter(|entity| {
                    query
                        .types
                        .as_ref()
                        .map(|types| types.contains(&entity.instance.type_name))
                        .unwrap_or(true)
                })
                .filter(|entity| alternative.iter().all(|c| entity.satisfies(c)))
                .take(limit);
            for entity in rows {
                found.insert(entity.instance.pk, entity.instance.clone());
            }
        }

        Ok(found.into_values().take(limit).collect())
    }
}
