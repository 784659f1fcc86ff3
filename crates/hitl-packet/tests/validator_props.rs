use hitl_packet::{flatten_record, validate_packet, REQUIRED_RECORD_KEYS};
use hitl_test_utils::{make_packet, make_record, packet_with_ids};
use proptest::prelude::*;
use proptest::sample::Index;
use serde_json::{json, Value};

fn policy_ids() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::btree_set("[A-Z]{1,3}-[0-9]{1,3}", 1..12)
        .prop_map(|ids| ids.into_iter().collect())
}

fn packet_for(ids: &[String]) -> Value {
    make_packet(ids.iter().map(|id| make_record(id)).collect())
}

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z_]{0,8}".prop_map(Value::from),
    ];
    leaf.prop_recursive(4, 32, 6, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..6).prop_map(Value::from),
            proptest::collection::hash_map(
                prop_oneof![
                    Just("schema_version".to_string()),
                    Just("metadata".to_string()),
                    Just("records".to_string()),
                    Just("policy_id".to_string()),
                    Just("keyword".to_string()),
                    "[a-z]{1,4}",
                ],
                inner,
                0..6
            )
            .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

#[test]
fn test_fixed_invalid_inputs_never_panic() {
    for input in [
        json!(null),
        json!("packet"),
        json!(3.5),
        json!([]),
        json!({"records": "x"}),
        json!({"metadata": "x"}),
        json!({"schema_version": 1, "metadata": {}, "records": [null]}),
    ] {
        let result = validate_packet(&input);
        assert!(!result.is_valid, "{input}");
    }
}

#[test]
fn test_quality_flag_compaction() {
    let mut record = make_record("A");
    record["keyword"]["quality_flags"] = json!({"a": true, "b": false, "c": true});
    assert_eq!(flatten_record(&record).quality_flags, "a,c");
}

proptest! {
    #[test]
    fn prop_valid_packets_have_no_errors(ids in policy_ids()) {
        let result = validate_packet(&packet_for(&ids));
        prop_assert!(result.is_valid, "{:?}", result.errors);
    }

    #[test]
    fn prop_shuffle_only_reports_order(
        (sorted, shuffled) in policy_ids()
            .prop_flat_map(|ids| (Just(ids.clone()), Just(ids).prop_shuffle()))
    ) {
        let result = validate_packet(&packet_for(&shuffled));
        if shuffled == sorted {
            prop_assert!(result.is_valid);
        } else {
            prop_assert_eq!(result.errors, vec!["Records are not sorted by policy_id".to_string()]);
        }
    }

    #[test]
    fn prop_count_mismatch_is_single_error(ids in policy_ids(), declared in 0u64..1000) {
        prop_assume!(declared != ids.len() as u64);
        let mut packet = packet_for(&ids);
        packet["metadata"]["record_count"] = json!(declared);

        let result = validate_packet(&packet);
        prop_assert_eq!(
            result.errors,
            vec![format!(
                "record_count mismatch: metadata says {declared}, actual records list has {}",
                ids.len()
            )]
        );
    }

    #[test]
    fn prop_missing_key_names_record_and_path(
        ids in policy_ids(),
        record_pick in any::<Index>(),
        key_pick in any::<Index>(),
    ) {
        let keys: Vec<&str> = REQUIRED_RECORD_KEYS
            .iter()
            .copied()
            .filter(|k| *k != "policy_id")
            .collect();
        let key = keys[key_pick.index(keys.len())];
        let at = record_pick.index(ids.len());

        let mut packet = packet_for(&ids);
        let (parent, leaf) = match key.rsplit_once('.') {
            Some((section, leaf)) => (format!("/records/{at}/{section}"), leaf),
            None => (format!("/records/{at}"), key),
        };
        packet
            .pointer_mut(&parent)
            .and_then(Value::as_object_mut)
            .unwrap()
            .remove(leaf);

        let result = validate_packet(&packet);
        prop_assert_eq!(result.errors, vec![format!("Record {}: missing key {key}", ids[at])]);
    }

    #[test]
    fn prop_duplicate_reported_per_extra_copy(
        ids in policy_ids(),
        pick in any::<Index>(),
        extra in 1usize..4,
    ) {
        let at = pick.index(ids.len());
        let mut with_dupes = ids.clone();
        for _ in 0..extra {
            with_dupes.insert(at, ids[at].clone());
        }

        let result = validate_packet(&packet_for(&with_dupes));
        let expected = vec![format!("Duplicate policy_id: {}", ids[at]); extra];
        prop_assert_eq!(result.errors, expected);
    }

    #[test]
    fn prop_validator_never_panics(value in arb_json()) {
        let result = validate_packet(&value);
        prop_assert_eq!(result.is_valid, result.errors.is_empty());
    }

    #[test]
    fn prop_flatten_never_panics_and_is_deterministic(value in arb_json()) {
        prop_assert_eq!(flatten_record(&value), flatten_record(&value));
    }
}

#[test]
fn test_unsorted_pair_scenario() {
    let result = validate_packet(&packet_with_ids(&["BBB", "AAA"]));
    assert_eq!(result.errors, vec!["Records are not sorted by policy_id"]);
}
