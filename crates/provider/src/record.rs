//! Provider records: schema-validated field/value containers
//!
//! A record is an instance of a provider: one optional value slot per
//! schema field, positionally aligned with the provider's sorted field
//! list. Records are immutable after construction; combining two records
//! allocates a new one.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::schema::Provider;
use crate::value::{Value, ValueError};

/// Source position a record was instantiated at
///
/// Diagnostic pass-through only: nothing in construction, lookup, or merge
/// reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Name of the chunk (script) the call came from
    pub chunk: String,
    /// 1-based line within the chunk
    pub line: u32,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.chunk, self.line)
    }
}

/// An instance of a provider
#[derive(Debug)]
pub struct Record {
    provider: Arc<Provider>,
    /// One slot per schema field; `None` means unset
    slots: Box<[Option<Value>]>,
    origin: Option<Location>,
}

impl Record {
    /// Instantiate a provider from flattened keyword arguments
    ///
    /// Pairs are processed in input order. A field supplied twice fails
    /// immediately, before later pairs are looked at; names the schema
    /// does not declare are collected across the whole call and reported
    /// together. Zero pairs is a valid call and leaves every slot unset.
    pub fn from_named_args(
        provider: Arc<Provider>,
        args: impl IntoIterator<Item = (String, Value)>,
        origin: Option<Location>,
    ) -> Result<Self, ProviderError> {
        let mut slots: Vec<Option<Value>> = vec![None; provider.fields().len()];
        let mut unexpected: Vec<String> = Vec::new();

        for (name, value) in args {
            match provider.position_of(&name) {
                Some(pos) => {
                    if slots[pos].is_some() {
                        return Err(ProviderError::DuplicateField {
                            field: name,
                            provider: provider.name().to_string(),
                        });
                    }
                    slots[pos] = Some(value);
                }
                None => unexpected.push(name),
            }
        }

        if !unexpected.is_empty() {
            return Err(ProviderError::UnknownFields {
                fields: unexpected,
                provider: provider.name().to_string(),
            });
        }

        Ok(Self {
            provider,
            slots: slots.into_boxed_slice(),
            origin,
        })
    }

    /// The provider this record instantiates
    pub fn provider(&self) -> &Arc<Provider> {
        &self.provider
    }

    /// Where this record was instantiated, if known
    pub fn origin(&self) -> Option<&Location> {
        self.origin.as_ref()
    }

    /// Value of `name`, if the schema declares it and the slot is set
    ///
    /// Pure query: an undeclared name is `None`, never an error.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let pos = self.provider.position_of(name)?;
        self.slots[pos].as_ref()
    }

    /// Names of the set fields, in schema order
    pub fn field_names(&self) -> Vec<&str> {
        self.provider
            .fields()
            .iter()
            .zip(self.slots.iter())
            .filter(|(_, slot)| slot.is_some())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Number of set fields
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Disjoint-union merge with a record of the same provider
    ///
    /// Fails if the operands' providers differ by identity, or if any field
    /// is set on both sides. Neither operand is touched; the result is a
    /// fresh record with no origin.
    pub fn merge(&self, other: &Record) -> Result<Record, ProviderError> {
        if self.provider.id() != other.provider.id() {
            return Err(ProviderError::ProviderMismatch {
                left: self.provider.name().to_string(),
                right: other.provider.name().to_string(),
            });
        }

        let mut slots: Vec<Option<Value>> = Vec::with_capacity(self.slots.len());
        for (i, (left, right)) in self.slots.iter().zip(other.slots.iter()).enumerate() {
            match (left, right) {
                (Some(_), Some(_)) => {
                    return Err(ProviderError::FieldConflict {
                        field: self.provider.fields()[i].clone(),
                    });
                }
                (Some(value), None) | (None, Some(value)) => slots.push(Some(value.clone())),
                (None, None) => slots.push(None),
            }
        }

        Ok(Record {
            provider: Arc::clone(&self.provider),
            slots: slots.into_boxed_slice(),
            origin: None,
        })
    }

    /// Whether this record may be treated as a frozen, hashable value
    ///
    /// True only once the provider has been exported and every set value is
    /// itself immutable. Recomputed on each call: both conditions can flip
    /// to true later, never back.
    pub fn is_immutable(&self) -> bool {
        if !self.provider.is_exported() {
            return false;
        }
        self.slots.iter().flatten().all(Value::is_immutable)
    }

    /// Freeze the containers held in the set slots
    pub fn freeze_values(&self) {
        for value in self.slots.iter().flatten() {
            value.freeze();
        }
    }

    /// JSON view of the set fields, for introspection
    pub fn to_json(&self) -> Result<serde_json::Value, ValueError> {
        let mut map = serde_json::Map::new();
        for (name, slot) in self.provider.fields().iter().zip(self.slots.iter()) {
            if let Some(value) = slot {
                map.insert(name.clone(), value.to_json()?);
            }
        }
        Ok(serde_json::Value::Object(map))
    }
}

// Records are equal when they instantiate the same provider (by identity)
// with equal slot contents.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.provider.id() == other.provider.id() && self.slots == other.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::List;

    fn provider(name: &str, fields: &[&str]) -> Arc<Provider> {
        Arc::new(Provider::new(name, fields.iter().copied()).unwrap())
    }

    fn args(pairs: &[(&str, i64)]) -> Vec<(String, Value)> {
        pairs
            .iter()
            .map(|(name, n)| (name.to_string(), Value::Int(*n)))
            .collect()
    }

    #[test]
    fn test_zero_args_yields_empty_record() {
        let p = provider("RigInfo", &["a", "b"]);
        let record = Record::from_named_args(Arc::clone(&p), [], None).unwrap();

        assert!(record.field_names().is_empty());
        assert!(record.is_empty());
        for field in p.fields() {
            assert!(record.get(field).is_none());
        }
    }

    #[test]
    fn test_construction_order_independent() {
        let p = provider("RigInfo", &["a", "b", "c"]);
        let first =
            Record::from_named_args(Arc::clone(&p), args(&[("a", 1), ("c", 3)]), None).unwrap();
        let second =
            Record::from_named_args(Arc::clone(&p), args(&[("c", 3), ("a", 1)]), None).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.get("a"), Some(&Value::Int(1)));
        assert_eq!(first.get("c"), Some(&Value::Int(3)));
        assert!(first.get("b").is_none());
    }

    #[test]
    fn test_field_names_in_schema_order() {
        let p = provider("RigInfo", &["deps", "outs", "srcs"]);
        let record = Record::from_named_args(
            Arc::clone(&p),
            args(&[("srcs", 1), ("deps", 2)]),
            None,
        )
        .unwrap();

        assert_eq!(record.field_names(), vec!["deps", "srcs"]);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_get_unknown_name_is_pure_query() {
        let p = provider("RigInfo", &["a"]);
        let record = Record::from_named_args(Arc::clone(&p), args(&[("a", 1)]), None).unwrap();
        assert!(record.get("nope").is_none());
    }

    #[test]
    fn test_duplicate_field_fails_eagerly() {
        let p = provider("RigInfo", &["a", "b"]);
        let err = Record::from_named_args(Arc::clone(&p), args(&[("a", 1), ("a", 2)]), None)
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "got multiple values for parameter a in call to instantiate provider RigInfo"
        );
    }

    #[test]
    fn test_duplicate_reported_before_unknowns() {
        // The duplicate comes after an unknown name, but duplicates fail
        // eagerly while unknowns are deferred
        let p = provider("RigInfo", &["a", "b"]);
        let err = Record::from_named_args(
            Arc::clone(&p),
            args(&[("zzz", 9), ("a", 1), ("a", 2)]),
            None,
        )
        .unwrap_err();

        assert!(matches!(err, ProviderError::DuplicateField { .. }));
    }

    #[test]
    fn test_unknown_fields_aggregated_in_input_order() {
        let p = provider("RigInfo", &["a", "b"]);
        let err = Record::from_named_args(
            Arc::clone(&p),
            args(&[("a", 1), ("c", 2), ("d", 3)]),
            None,
        )
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "got unexpected fields 'c', 'd' in call to instantiate provider RigInfo"
        );
    }

    #[test]
    fn test_single_unknown_field_message() {
        let p = provider("RigInfo", &["a", "b"]);
        let err =
            Record::from_named_args(Arc::clone(&p), args(&[("c", 2)]), None).unwrap_err();

        assert_eq!(
            err.to_string(),
            "got unexpected field 'c' in call to instantiate provider RigInfo"
        );
    }

    #[test]
    fn test_merge_disjoint_records() {
        let p = provider("RigInfo", &["a", "b", "c"]);
        let left = Record::from_named_args(Arc::clone(&p), args(&[("a", 1)]), None).unwrap();
        let right = Record::from_named_args(Arc::clone(&p), args(&[("b", 2)]), None).unwrap();

        let merged = left.merge(&right).unwrap();
        assert_eq!(merged.get("a"), Some(&Value::Int(1)));
        assert_eq!(merged.get("b"), Some(&Value::Int(2)));
        assert!(merged.get("c").is_none());
        assert_eq!(merged.field_names(), vec!["a", "b"]);

        // Operands are untouched
        assert_eq!(left.len(), 1);
        assert_eq!(right.len(), 1);
    }

    #[test]
    fn test_merge_conflict() {
        let p = provider("RigInfo", &["a", "b"]);
        let left =
            Record::from_named_args(Arc::clone(&p), args(&[("a", 1), ("b", 2)]), None).unwrap();
        let right = Record::from_named_args(Arc::clone(&p), args(&[("a", 3)]), None).unwrap();

        let err = left.merge(&right).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot add struct instances with common field 'a'"
        );
    }

    #[test]
    fn test_merge_provider_mismatch_by_identity() {
        // Same field list, distinct providers
        let pa = provider("AInfo", &["x", "y"]);
        let pb = provider("BInfo", &["x", "y"]);
        let a = Record::from_named_args(Arc::clone(&pa), args(&[("x", 1)]), None).unwrap();
        let b = Record::from_named_args(Arc::clone(&pb), args(&[("y", 2)]), None).unwrap();

        let err = a.merge(&b).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot use '+' operator on instances of different providers (AInfo and BInfo)"
        );
    }

    #[test]
    fn test_merge_result_has_no_origin() {
        let p = provider("RigInfo", &["a", "b"]);
        let loc = Location {
            chunk: "BUILD.lua".to_string(),
            line: 12,
        };
        let left =
            Record::from_named_args(Arc::clone(&p), args(&[("a", 1)]), Some(loc.clone())).unwrap();
        let right = Record::from_named_args(Arc::clone(&p), args(&[("b", 2)]), None).unwrap();

        assert_eq!(left.origin(), Some(&loc));
        let merged = left.merge(&right).unwrap();
        assert!(merged.origin().is_none());
    }

    #[test]
    fn test_immutability_gated_on_export() {
        let p = provider("RigInfo", &["a"]);
        let record = Record::from_named_args(Arc::clone(&p), args(&[("a", 1)]), None).unwrap();

        // Primitive values only, but the provider is not exported yet
        assert!(!record.is_immutable());
        p.mark_exported();
        assert!(record.is_immutable());
    }

    #[test]
    fn test_immutability_tracks_value_freeze() {
        let p = provider("RigInfo", &["a"]);
        let list = Arc::new(List::from_vec(vec![Value::Int(1)]));
        let record = Record::from_named_args(
            Arc::clone(&p),
            vec![("a".to_string(), Value::List(Arc::clone(&list)))],
            None,
        )
        .unwrap();

        p.mark_exported();
        assert!(!record.is_immutable());

        list.freeze();
        assert!(record.is_immutable());
    }

    #[test]
    fn test_freeze_values_freezes_slots() {
        let p = provider("RigInfo", &["a"]);
        let list = Arc::new(List::new());
        let record = Record::from_named_args(
            Arc::clone(&p),
            vec![("a".to_string(), Value::List(Arc::clone(&list)))],
            None,
        )
        .unwrap();

        record.freeze_values();
        assert!(list.is_frozen());
    }

    #[test]
    fn test_values_shared_not_copied() {
        let p = provider("RigInfo", &["a", "b"]);
        let list = Arc::new(List::new());
        let left = Record::from_named_args(
            Arc::clone(&p),
            vec![("a".to_string(), Value::List(Arc::clone(&list)))],
            None,
        )
        .unwrap();
        let right = Record::from_named_args(Arc::clone(&p), args(&[("b", 2)]), None).unwrap();

        let merged = left.merge(&right).unwrap();
        list.push(Value::Int(7)).unwrap();

        // The merged record sees the same list, not a copy
        match merged.get("a").unwrap() {
            Value::List(shared) => assert_eq!(shared.len(), 1),
            other => panic!("expected list, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_to_json_skips_unset_slots() {
        let p = provider("RigInfo", &["a", "b"]);
        let record = Record::from_named_args(Arc::clone(&p), args(&[("a", 1)]), None).unwrap();
        assert_eq!(record.to_json().unwrap(), serde_json::json!({ "a": 1 }));
    }
}
