//! # Canonical Keys
//!
//! Turns attribute and relation values into immutable, hashable keys.
//!
//! Mappings are canonicalized into `(key, value)` pairs sorted by key, so two
//! mappings with equal content produce equal keys whatever order the parser
//! emitted their entries in. Earlier implementations disagreed on this (one
//! hashed mappings in insertion order); sorting is applied uniformly here.
//! Sequences keep their order.
//!
//! Floats are keyed by a bit pattern whose unsigned order is the numeric
//! order. `-0.0` folds into `0.0` and every `NaN` into one quiet `NaN`.

use crate::model::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalKey {
    Null,
    Bool(bool),
    Int(i64),
    /// Order-preserving bits of a float, see [`float_bits`]
    Float(u64),
    Str(String),
    Seq(Vec<CanonicalKey>),
    Map(Vec<(String, CanonicalKey)>),
}

/// Canonicalize a value. Pure and total.
pub fn canonicalize(value: &Value) -> CanonicalKey {
    match value {
        Value::Null => CanonicalKey::Null,
        Value::Bool(b) => CanonicalKey::Bool(*b),
        Value::Int(i) => CanonicalKey::Int(*i),
        Value::Float(x) => CanonicalKey::Float(float_bits(*x)),
        Value::Str(s) => CanonicalKey::Str(s.clone()),
        Value::List(items) => CanonicalKey::Seq(items.iter().map(canonicalize).collect()),
        Value::Map(entries) => {
            let mut pairs: Vec<(String, CanonicalKey)> = entries
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            // Full ordering so duplicate keys cannot reintroduce order dependence.
            pairs.sort();
            CanonicalKey::Map(pairs)
        }
    }
}

/// Map a float to bits that sort like the numbers they encode.
pub fn float_bits(x: f64) -> u64 {
    let x = if x.is_nan() {
        f64::NAN
    } else if x == 0.0 {
        0.0
    } else {
        x
    };
    let bits = x.to_bits();
    if bits >> 63 == 1 {
        !bits
    } else {
        bits | 1 << 63
    }
}

fn float_from_bits(bits: u64) -> f64 {
    if bits >> 63 == 1 {
        f64::from_bits(bits & !(1 << 63))
    } else {
        f64::from_bits(!bits)
    }
}

/// Canonical key for an unordered set of identifiers.
pub fn canonical_set<I, S>(items: I) -> CanonicalKey
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut keys: Vec<CanonicalKey> = items
        .into_iter()
        .map(|item| CanonicalKey::Str(item.into()))
        .collect();
    keys.sort();
    keys.dedup();
    CanonicalKey::Seq(keys)
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalKey::Null => write!(f, "null"),
            CanonicalKey::Bool(b) => write!(f, "{}", b),
            CanonicalKey::Int(i) => write!(f, "{}", i),
            CanonicalKey::Float(bits) => write!(f, "{:?}", float_from_bits(*bits)),
            CanonicalKey::Str(s) => write!(f, "{:?}", s),
            CanonicalKey::Seq(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            CanonicalKey::Map(pairs) => {
                write!(f, "(")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "({:?}, {})", k, v)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// One component of a composite key: a field name paired with its canonical value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey {
    pub field: String,
    pub value: CanonicalKey,
}

impl FieldKey {
    pub fn new(field: impl Into<String>, value: CanonicalKey) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.field, self.value)
    }
}

/// Conjunctive key: every `all` field, in declaration order.
pub type AllKey = Vec<FieldKey>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn map(entries: &[(&str, Value)]) -> Value {
        Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(canonicalize(&Value::Int(4)), CanonicalKey::Int(4));
        assert_eq!(
            canonicalize(&Value::from("osf")),
            CanonicalKey::Str("osf".to_string())
        );
        assert_eq!(canonicalize(&Value::Null), CanonicalKey::Null);
    }

    #[test]
    fn test_mapping_order_independent() {
        let a = map(&[("scheme", Value::from("doi")), ("host", Value::from("dx.doi.org"))]);
        let b = map(&[("host", Value::from("dx.doi.org")), ("scheme", Value::from("doi"))]);
        assert_eq!(canonicalize(&a), canonicalize(&b));

        let mut set = HashSet::new();
        set.insert(canonicalize(&a));
        assert!(set.contains(&canonicalize(&b)));
    }

    #[test]
    fn test_nested_mapping_order_independent() {
        let inner_a = map(&[("x", Value::Int(1)), ("y", Value::Int(2))]);
        let inner_b = map(&[("y", Value::Int(2)), ("x", Value::Int(1))]);
        let a = Value::List(vec![inner_a, Value::from("tail")]);
        let b = Value::List(vec![inner_b, Value::from("tail")]);
        assert_eq!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn test_sequence_order_preserved() {
        let a = Value::List(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::List(vec![Value::Int(2), Value::Int(1)]);
        assert_ne!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn test_float_keys() {
        assert_eq!(canonicalize(&Value::Float(-0.0)), canonicalize(&Value::Float(0.0)));
        assert_eq!(
            canonicalize(&Value::Float(f64::NAN)),
            canonicalize(&Value::Float(-f64::NAN))
        );
        assert_ne!(canonicalize(&Value::Float(1.0)), canonicalize(&Value::Int(1)));

        let mut keys: Vec<CanonicalKey> = [2.5, -1.0, f64::INFINITY, 0.0, -3.5, f64::NEG_INFINITY]
            .iter()
            .map(|x| canonicalize(&Value::Float(*x)))
            .collect();
        keys.sort();
        let rendered: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["-inf", "-3.5", "-1.0", "0.0", "2.5", "inf"]);
    }

    #[test]
    fn test_canonical_set() {
        assert_eq!(canonical_set(["b", "a", "b"]), canonical_set(["a", "b"]));
        assert_eq!(canonical_set(["a", "b"]).to_string(), "(\"a\", \"b\")");
    }
}
