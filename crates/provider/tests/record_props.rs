//! Property tests for record construction and merge

use std::sync::Arc;

use proptest::prelude::*;
use rig_provider::{Provider, Record, Value};

const FIELDS: [&str; 6] = ["alpha", "bravo", "charlie", "delta", "echo", "foxtrot"];

/// A stable, distinct value per field name
fn value_for(name: &str) -> Value {
    let pos = FIELDS.iter().position(|field| *field == name).unwrap();
    Value::Int(pos as i64)
}

fn to_args(names: &[&str]) -> Vec<(String, Value)> {
    names
        .iter()
        .map(|name| (name.to_string(), value_for(name)))
        .collect()
}

proptest! {
    #[test]
    fn test_construction_order_independent(
        names in prop::sample::subsequence(FIELDS.to_vec(), 0..=FIELDS.len()).prop_shuffle()
    ) {
        let provider = Arc::new(Provider::new("PropInfo", FIELDS).unwrap());
        let record =
            Record::from_named_args(Arc::clone(&provider), to_args(&names), None).unwrap();

        for name in &names {
            let expected = value_for(name);
            prop_assert_eq!(record.get(name), Some(&expected));
        }
        for name in FIELDS {
            if !names.contains(&name) {
                prop_assert!(record.get(name).is_none());
            }
        }

        // Schema order, regardless of the shuffled call order
        let mut expected_names = names.clone();
        expected_names.sort();
        prop_assert_eq!(record.field_names(), expected_names);
    }

    #[test]
    fn test_disjoint_merge_matches_direct_construction(
        names in prop::sample::subsequence(FIELDS.to_vec(), 0..=FIELDS.len()),
        split in any::<prop::sample::Index>(),
    ) {
        let provider = Arc::new(Provider::new("PropInfo", FIELDS).unwrap());
        let cut = split.index(names.len() + 1);
        let (left_names, right_names) = names.split_at(cut);

        let left =
            Record::from_named_args(Arc::clone(&provider), to_args(left_names), None).unwrap();
        let right =
            Record::from_named_args(Arc::clone(&provider), to_args(right_names), None).unwrap();
        let full =
            Record::from_named_args(Arc::clone(&provider), to_args(&names), None).unwrap();

        let merged = left.merge(&right).unwrap();
        let merged_flipped = right.merge(&left).unwrap();

        prop_assert_eq!(&merged, &full);
        // Operand order does not affect the resulting field values
        prop_assert_eq!(&merged, &merged_flipped);
    }
}
