//! # Conflicts Module
//!
//! Attribute conflict policy applied whenever one node is folded into
//! another. For every attribute of the losing node:
//!
//! - absent on the survivor: adopt the losing value;
//! - equal: nothing to do;
//! - datetime field: keep the chronologically later value;
//! - anything else: keep the longer rendering, the lexicographically smaller
//!   one on a tie.
//!
//! A surviving person node has its `name` recomputed from the name parts.

use crate::config::DEFAULT_PERSON_TYPE;
use crate::model::{Attributes, Node, Value};
use crate::schema::{DataType, SchemaRegistry};
use std::cmp::Ordering;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

/// Recomputes a display name from structured name parts.
pub trait NameNormalizer: Send + Sync {
    fn normalize(&self, attrs: &Attributes) -> Option<String>;
}

/// Joins `given_name`, `additional_name`, `family_name` and `suffix` with
/// single spaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinNameParts;

const NAME_PARTS: [&str; 4] = ["given_name", "additional_name", "family_name", "suffix"];

impl NameNormalizer for JoinNameParts {
    fn normalize(&self, attrs: &Attributes) -> Option<String> {
        let parts: Vec<&str> = NAME_PARTS
            .iter()
            .filter_map(|part| attrs.get(*part))
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

#[derive(Clone)]
pub struct ConflictPolicy {
    person_type: String,
    normalizer: Arc<dyn NameNormalizer>,
}

impl std::fmt::Debug for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConflictPolicy")
            .field("person_type", &self.person_type)
            .finish_non_exhaustive()
    }
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_PERSON_TYPE, Arc::new(JoinNameParts))
    }
}

impl ConflictPolicy {
    pub fn new(person_type: impl Into<String>, normalizer: Arc<dyn NameNormalizer>) -> Self {
        Self {
            person_type: person_type.into(),
            normalizer,
        }
    }

    pub fn person_type(&self) -> &str {
        &self.person_type
    }

    /// Fold `loser` attributes into `survivor`, resolving conflicts.
    pub fn merge_into(&self, registry: &SchemaRegistry, survivor: &mut Node, loser: &Attributes) {
        for (field, value) in loser {
            let resolved = match survivor.attrs.get(field) {
                None => value.clone(),
                Some(current) if current == value => continue,
                Some(current) => {
                    let datatype = registry.datatype(&survivor.type_name, field);
                    resolve_conflict(datatype, current, value).clone()
                }
            };
            survivor.attrs.insert(field.clone(), resolved);
        }

        if survivor.type_name == self.person_type {
            survivor.attrs.remove("name");
            if let Some(name) = self.normalizer.normalize(&survivor.attrs) {
                survivor.attrs.insert("name".to_string(), Value::Str(name));
            }
        }
    }
}

/// Pick the winner of two differing values of one field.
pub fn resolve_conflict<'a>(datatype: Option<DataType>, a: &'a Value, b: &'a Value) -> &'a Value {
    if datatype == Some(DataType::Datetime) {
        if let (Some(x), Some(y)) = (parse_datetime(a), parse_datetime(b)) {
            match x.cmp(&y) {
                Ordering::Greater => return a,
                Ordering::Less => return b,
                Ordering::Equal => {}
            }
        }
    }

    let (ra, rb) = (a.render(), b.render());
    match rb.chars().count().cmp(&ra.chars().count()) {
        Ordering::Greater => b,
        Ordering::Less => a,
        Ordering::Equal if rb < ra => b,
        Ordering::Equal => a,
    }
}

/// RFC 3339 timestamps, or bare calendar dates taken as midnight UTC.
fn parse_datetime(value: &Value) -> Option<OffsetDateTime> {
    let raw = value.as_str()?.trim();
    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(parsed);
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|date| date.midnight().assume_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeId;

    fn node(type_name: &str, pairs: &[(&str, &str)]) -> Node {
        let attrs = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect();
        Node::new(NodeId(0), "_:n".to_string(), type_name.to_string(), attrs)
    }

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        node("tag", pairs).attrs
    }

    #[test]
    fn test_later_datetime_wins() {
        let registry = SchemaRegistry::scholarly().unwrap();
        let policy = ConflictPolicy::default();
        let mut survivor = node("article", &[("date_modified", "2021-06-01T00:00:00Z")]);
        policy.merge_into(
            &registry,
            &mut survivor,
            &attrs(&[("date_modified", "2020-01-01T00:00:00Z")]),
        );
        assert_eq!(
            survivor.attrs["date_modified"],
            Value::from("2021-06-01T00:00:00Z")
        );

        let mut survivor = node("article", &[("date_modified", "2020-01-01T00:00:00Z")]);
        policy.merge_into(
            &registry,
            &mut survivor,
            &attrs(&[("date_modified", "2021-06-01T00:00:00Z")]),
        );
        assert_eq!(
            survivor.attrs["date_modified"],
            Value::from("2021-06-01T00:00:00Z")
        );
    }

    #[test]
    fn test_dates_compare_chronologically_not_by_length() {
        let later = Value::from("2021-06-01");
        let earlier = Value::from("2020-01-01T00:00:00+00:00");
        assert_eq!(resolve_conflict(Some(DataType::Datetime), &earlier, &later), &later);
        // Outside a datetime field the longer rendering wins.
        assert_eq!(resolve_conflict(Some(DataType::Text), &earlier, &later), &earlier);
    }

    #[test]
    fn test_longer_text_wins() {
        let registry = SchemaRegistry::scholarly().unwrap();
        let policy = ConflictPolicy::default();
        let mut survivor = node("article", &[("title", "A Much Longer Title")]);
        policy.merge_into(&registry, &mut survivor, &attrs(&[("title", "Short")]));
        assert_eq!(survivor.attrs["title"], Value::from("A Much Longer Title"));

        let mut survivor = node("article", &[("title", "Short")]);
        policy.merge_into(&registry, &mut survivor, &attrs(&[("title", "A Much Longer Title")]));
        assert_eq!(survivor.attrs["title"], Value::from("A Much Longer Title"));
    }

    #[test]
    fn test_equal_length_takes_smaller() {
        let a = Value::from("beta");
        let b = Value::from("alfa");
        assert_eq!(resolve_conflict(None, &a, &b), &b);
        assert_eq!(resolve_conflict(None, &b, &a), &b);
    }

    #[test]
    fn test_missing_attributes_adopted() {
        let registry = SchemaRegistry::scholarly().unwrap();
        let mut survivor = node("article", &[("title", "Graphs")]);
        ConflictPolicy::default().merge_into(
            &registry,
            &mut survivor,
            &attrs(&[("language", "en"), ("title", "Graphs")]),
        );
        assert_eq!(survivor.attrs["language"], Value::from("en"));
        assert_eq!(survivor.attrs["title"], Value::from("Graphs"));
    }

    #[test]
    fn test_person_name_recomputed() {
        let registry = SchemaRegistry::scholarly().unwrap();
        let mut survivor = node(
            "person",
            &[("name", "B. Obama"), ("given_name", "Barack"), ("family_name", "Obama")],
        );
        ConflictPolicy::default().merge_into(
            &registry,
            &mut survivor,
            &attrs(&[("name", "Barack Hussein Obama"), ("additional_name", "Hussein")]),
        );
        assert_eq!(survivor.attrs["name"], Value::from("Barack Hussein Obama"));

        let mut bare = node("person", &[("name", "Anonymous")]);
        ConflictPolicy::default().merge_into(&registry, &mut bare, &Attributes::new());
        assert!(!bare.attrs.contains_key("name"));
    }

    #[test]
    fn test_other_agents_keep_name() {
        let registry = SchemaRegistry::scholarly().unwrap();
        let mut survivor = node("organization", &[("name", "Center for Open Science")]);
        ConflictPolicy::default().merge_into(&registry, &mut survivor, &attrs(&[("name", "COS")]));
        assert_eq!(survivor.attrs["name"], Value::from("Center for Open Science"));
    }
}
