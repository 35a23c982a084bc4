//! Property-based tests for expansion and aggregation.
//!
//! ## Test Categories
//!
//! ### 1. Expansion
//! - Observation levels never exceed the configured maximum depth
//! - Captured strings and arrays are truncated, reported lengths are not
//!
//! ### 2. Aggregation
//! - Reducing partitioned accumulator maps equals a single pass
//! - Histogram buckets account for every counted value
//! - Top-N and Bottom-N sizes are bounded by the distinct value count

use proptest::prelude::*;
use term_schema::aggregate::frequency::{bottom_n, rank, top_n, FrequencyTable};
use term_schema::aggregate::histogram::{build_histogram, Domain};
use term_schema::aggregate::{AccumulatorMap, AggregateConfig, GroupKey, PartialState};
use term_schema::bson::{DocumentBuilder, Value, ValueKey};
use term_schema::expand::{ExpandConfig, Expander};

/// Builds a document nested `depth` levels deep under key `k`.
fn nested(depth: usize, leaf: i32) -> DocumentBuilder {
    let mut doc = DocumentBuilder::new().int32("leaf", leaf);
    for _ in 0..depth {
        doc = DocumentBuilder::new().document("k", doc).int32("leaf", leaf);
    }
    doc
}

fn observations_config() -> AggregateConfig {
    AggregateConfig {
        store_min_max_avg_value: true,
        store_min_max_avg_length: true,
        ..AggregateConfig::default()
    }
}

proptest! {
    #[test]
    fn prop_levels_bounded_by_max_depth(depth in 0usize..12, max_depth in 0u32..8) {
        let expander = Expander::new(ExpandConfig {
            max_depth,
            ..ExpandConfig::default()
        });
        let observations = expander.expand(&nested(depth, 1).build()).unwrap();
        prop_assert!(!observations.is_empty());
        for observation in &observations {
            prop_assert!(observation.level <= max_depth);
        }
    }

    #[test]
    fn prop_string_length_survives_truncation(s in "\\PC{0,40}", max in 1usize..20) {
        let expander = Expander::new(ExpandConfig {
            string_max_length: max,
            store_value: true,
            store_string_length: true,
            ..ExpandConfig::default()
        });
        let doc = DocumentBuilder::new().string("s", s.clone()).build();
        let observations = expander.expand(&doc).unwrap();
        let chars = s.chars().count();
        prop_assert_eq!(observations[0].length, Some(chars as u64));
        match &observations[0].value {
            Some(Value::String(captured)) => {
                prop_assert_eq!(captured.chars().count(), chars.min(max));
                prop_assert!(s.starts_with(captured.as_str()));
            }
            other => prop_assert!(false, "unexpected value {:?}", other),
        }
    }

    #[test]
    fn prop_array_length_survives_truncation(len in 0usize..40, max in 0usize..25) {
        let expander = Expander::new(ExpandConfig {
            array_max_length: max,
            store_value: true,
            store_array_length: true,
            ..ExpandConfig::default()
        });
        let items = (0..len as i32).map(Value::Int32).collect();
        let doc = DocumentBuilder::new().array("a", items).build();
        let observations = expander.expand(&doc).unwrap();
        prop_assert_eq!(observations[0].length, Some(len as u64));
        match &observations[0].value {
            Some(Value::Array(captured)) => prop_assert_eq!(captured.len(), len.min(max)),
            other => prop_assert!(false, "unexpected value {:?}", other),
        }
        let elements = observations.iter().filter(|o| o.name == "a.[]").count();
        prop_assert_eq!(elements, len.min(max));
    }

    #[test]
    fn prop_partitioned_reduce_matches_single_pass(
        values in prop::collection::vec((0u8..4, -1000i64..1000), 1..200),
        partitions in 1usize..6,
    ) {
        let config = observations_config();
        let key_of = |k: u8| GroupKey::new(format!("f{k}"), term_schema::bson::BsonType::Long);

        let mut single = AccumulatorMap::new();
        for (k, v) in &values {
            single
                .entry(&key_of(*k), &config)
                .unwrap()
                .observe(Some(&Value::Int64(*v)), None)
                .unwrap();
        }

        let mut parts = vec![AccumulatorMap::new(); partitions];
        for (i, (k, v)) in values.iter().enumerate() {
            parts[i % partitions]
                .entry(&key_of(*k), &config)
                .unwrap()
                .observe(Some(&Value::Int64(*v)), None)
                .unwrap();
        }
        parts.reverse();
        let merged = AccumulatorMap::merge(parts).unwrap();
        prop_assert_eq!(merged, single);
    }

    #[test]
    fn prop_histogram_counts_every_value(
        values in prop::collection::vec((-1.0e6f64..1.0e6, 1u64..50), 2..100),
        resolution in 2u32..200,
    ) {
        let total: u64 = values.iter().map(|(_, c)| c).sum();
        if let Some(histogram) = build_histogram(values.iter().copied(), resolution, Domain::Real) {
            prop_assert_eq!(histogram.total_count(), total);
            prop_assert!(histogram.buckets.iter().all(|b| b.index < histogram.bucket_count));
            prop_assert!(histogram.step > 0.0);
        }
    }

    #[test]
    fn prop_integer_histogram_counts_every_value(
        values in prop::collection::vec((-5000i64..5000, 1u64..10), 2..100),
        resolution in 2u32..50,
    ) {
        let total: u64 = values.iter().map(|(_, c)| c).sum();
        let pairs = values.iter().map(|(v, c)| (*v as f64, *c));
        if let Some(histogram) = build_histogram(pairs, resolution, Domain::Integer) {
            prop_assert_eq!(histogram.total_count(), total);
            prop_assert!(histogram.step >= 1.0);
            prop_assert_eq!(histogram.step.fract(), 0.0);
        }
    }

    #[test]
    fn prop_top_and_bottom_bounded(
        values in prop::collection::vec(0i32..30, 0..300),
        n in 0usize..40,
    ) {
        let mut table = FrequencyTable::new();
        for v in &values {
            if let Some(key) = ValueKey::from_value(&Value::Int32(*v)) {
                table.add_count(key, 1);
            }
        }
        let distinct = table.len();
        let ranked = rank(&table);
        let top = top_n(&ranked, n);
        let bottom = bottom_n(&ranked, n);
        prop_assert_eq!(top.len(), n.min(distinct));
        prop_assert_eq!(bottom.len(), n.min(distinct));

        if n >= distinct {
            let mut seen: Vec<&ValueKey> = top.iter().map(|(k, _)| k).collect();
            seen.sort_by_key(|k| k.as_number().map(|x| x as i64));
            seen.dedup();
            prop_assert_eq!(seen.len(), distinct);
        }
        for pair in top.windows(2) {
            prop_assert!(pair[0].1 >= pair[1].1);
        }
    }
}
