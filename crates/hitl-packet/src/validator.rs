//! Semantic packet validator
//!
//! Runs the six structural checks the evaluation engine applies to its own
//! output:
//!
//! 1. Top-level keys present (`schema_version`, `metadata`, `records`)
//! 2. Metadata has required, non-null fields
//! 3. `record_count` matches the actual number of records
//! 4. Each record carries every required dotted key
//! 5. Records sorted by `policy_id`
//! 6. No duplicate `policy_id`
//!
//! Works on a raw [`Value`] that has not been schema-validated. Every access
//! goes through option-returning accessors, so no input can make it panic.

use crate::types::{
    ValidationResult, REQUIRED_METADATA_KEYS, REQUIRED_RECORD_PATHS, TOP_LEVEL_KEYS,
};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Validate a parsed packet, collecting every violation
#[must_use]
pub fn validate_packet(packet: &Value) -> ValidationResult {
    let Some(root) = packet.as_object() else {
        return ValidationResult::from_errors(vec!["Packet is not an object".to_string()]);
    };

    let mut errors = Vec::new();

    // 1. Top-level structure
    for key in TOP_LEVEL_KEYS {
        if !root.contains_key(*key) {
            errors.push(format!("Missing top-level key: {key}"));
        }
    }
    if !errors.is_empty() {
        return ValidationResult::from_errors(errors);
    }

    // 2. Metadata
    let Some(meta) = root.get("metadata").and_then(Value::as_object) else {
        errors.push("metadata is not an object".to_string());
        return ValidationResult::from_errors(errors);
    };
    check_metadata(meta, &mut errors);

    let Some(records) = root.get("records").and_then(Value::as_array) else {
        errors.push("records is not an array".to_string());
        return ValidationResult::from_errors(errors);
    };

    // 3. Record count
    if let Some(declared) = meta.get("record_count").filter(|v| v.is_number()) {
        if !count_matches(declared, records.len()) {
            errors.push(format!(
                "record_count mismatch: metadata says {declared}, actual records list has {}",
                records.len()
            ));
        }
    }

    // 4. Required keys per record
    for (index, record) in records.iter().enumerate() {
        check_record_keys(index, record, &mut errors);
    }

    let policy_ids: Vec<&str> = records.iter().map(sort_key).collect();

    // 5. Ordering
    if !policy_ids.windows(2).all(|pair| pair[0] <= pair[1]) {
        errors.push("Records are not sorted by policy_id".to_string());
    }

    // 6. Duplicates
    let mut seen = HashSet::with_capacity(policy_ids.len());
    for pid in &policy_ids {
        if !seen.insert(*pid) {
            errors.push(format!("Duplicate policy_id: {pid}"));
        }
    }

    if !errors.is_empty() {
        tracing::debug!(errors = errors.len(), "packet failed semantic validation");
    }
    ValidationResult::from_errors(errors)
}

fn check_metadata(meta: &Map<String, Value>, errors: &mut Vec<String>) {
    for key in REQUIRED_METADATA_KEYS {
        if meta.get(*key).map_or(true, Value::is_null) {
            errors.push(format!("Missing or null metadata field: {key}"));
        }
    }
}

fn check_record_keys(index: usize, record: &Value, errors: &mut Vec<String>) {
    let Some(fields) = record.as_object() else {
        errors.push(format!("Record at index {index} is not an object"));
        return;
    };

    let label = fields
        .get("policy_id")
        .and_then(record_label)
        .unwrap_or_else(|| format!("[index {index}]"));

    for path in REQUIRED_RECORD_PATHS.iter() {
        if !path.exists_in(record) {
            errors.push(format!("Record {label}: missing key {path}"));
        }
    }
}

/// Printable `policy_id`; empty strings, `0`, `false` and `null` have none
fn record_label(policy_id: &Value) -> Option<String> {
    match policy_id {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        Value::Array(_) | Value::Object(_) => Some(policy_id.to_string()),
        _ => None,
    }
}

/// `policy_id` used for ordering; anything but a string sorts as `""`
fn sort_key(record: &Value) -> &str {
    record
        .get("policy_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

#[allow(clippy::cast_precision_loss, clippy::float_cmp)]
fn count_matches(declared: &Value, actual: usize) -> bool {
    match (declared.as_u64(), declared.as_f64()) {
        (Some(n), _) => u64::try_from(actual).map_or(false, |a| a == n),
        // 2.0 is the same count as 2; negative or fractional never matches
        (None, Some(f)) => f == actual as f64,
        (None, None) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(policy_id: &str) -> Value {
        json!({
            "session_id": "S1",
            "policy_id": policy_id,
            "tier": "TIER_1_BINARY",
            "keyword": {
                "raw_score": 5.0,
                "capped_score": 4.0,
                "decision_score": 0.8,
                "threshold": 5.0,
                "quality_flags": {}
            },
            "ai": {"invoked": false, "invocation_reason": "ai_disabled"},
            "decision": {"display_status": "PASS", "confidence_label": "HIGH", "matched": true},
            "evidence": {"best_evidence_location": "S1", "best_evidence_excerpt": "x"},
            "provenance": {"keyword_source": "keyword_metadata"},
            "criteria": {"evidence_criteria_used": false}
        })
    }

    fn packet(records: Vec<Value>) -> Value {
        json!({
            "schema_version": "hitl_packet_v1",
            "metadata": {
                "session_id": "S1",
                "generated_at": "2026-01-01T00:00:00Z",
                "schema_version": "hitl_packet_v1",
                "record_count": records.len(),
                "policies_evaluated": records.len(),
                "policies_in_kb": 100,
                "policies_filtered": null
            },
            "records": records
        })
    }

    #[test]
    fn valid_packet_passes() {
        let result = validate_packet(&packet(vec![record("A-1"), record("B-2")]));
        assert!(result.is_valid, "{:?}", result.errors);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn non_object_input_fails_with_single_error() {
        for input in [json!(null), json!("packet"), json!(42), json!([1, 2]), json!(true)] {
            let result = validate_packet(&input);
            assert!(!result.is_valid);
            assert_eq!(result.errors, vec!["Packet is not an object"]);
        }
    }

    #[test]
    fn missing_top_level_keys_reported_individually() {
        let result = validate_packet(&json!({"metadata": {}}));
        assert_eq!(
            result.errors,
            vec![
                "Missing top-level key: schema_version",
                "Missing top-level key: records"
            ]
        );
    }

    #[test]
    fn metadata_not_object_aborts() {
        let mut p = packet(vec![]);
        p["metadata"] = json!("not an object");
        assert_eq!(validate_packet(&p).errors, vec!["metadata is not an object"]);

        p["metadata"] = json!(null);
        assert_eq!(validate_packet(&p).errors, vec!["metadata is not an object"]);
    }

    #[test]
    fn missing_and_null_metadata_fields() {
        let mut p = packet(vec![]);
        p["metadata"].as_object_mut().unwrap().remove("session_id");
        p["metadata"]["generated_at"] = json!(null);
        let result = validate_packet(&p);
        assert_eq!(
            result.errors,
            vec![
                "Missing or null metadata field: session_id",
                "Missing or null metadata field: generated_at"
            ]
        );
    }

    #[test]
    fn records_not_array_aborts_record_checks() {
        let mut p = packet(vec![]);
        p["records"] = json!("not an array");
        assert_eq!(validate_packet(&p).errors, vec!["records is not an array"]);

        p["records"] = json!(7);
        assert_eq!(validate_packet(&p).errors, vec!["records is not an array"]);
    }

    #[test]
    fn record_count_mismatch_names_both_values() {
        let mut p = packet(vec![record("A")]);
        p["metadata"]["record_count"] = json!(3);
        assert_eq!(
            validate_packet(&p).errors,
            vec!["record_count mismatch: metadata says 3, actual records list has 1"]
        );
    }

    #[test]
    fn float_record_count_equal_to_len_is_consistent() {
        let mut p = packet(vec![record("A")]);
        p["metadata"]["record_count"] = json!(1.0);
        assert!(validate_packet(&p).is_valid);
    }

    #[test]
    fn non_numeric_record_count_skips_count_check() {
        let mut p = packet(vec![record("A")]);
        p["metadata"]["record_count"] = json!("1");
        assert!(validate_packet(&p).is_valid);
    }

    #[test]
    fn missing_nested_key_reported_with_policy_id() {
        let mut r = record("POL-9");
        r["ai"].as_object_mut().unwrap().remove("invocation_reason");
        let result = validate_packet(&packet(vec![r]));
        assert_eq!(result.errors, vec!["Record POL-9: missing key ai.invocation_reason"]);
    }

    #[test]
    fn missing_policy_id_uses_index_label() {
        let mut r = record("X");
        r.as_object_mut().unwrap().remove("policy_id");
        let result = validate_packet(&packet(vec![r]));
        assert_eq!(result.errors, vec!["Record [index 0]: missing key policy_id"]);
    }

    #[test]
    fn non_string_policy_id_is_used_as_label() {
        let mut r = record("X");
        r["policy_id"] = json!(42);
        r.as_object_mut().unwrap().remove("tier");
        let result = validate_packet(&packet(vec![r]));
        assert_eq!(result.errors, vec!["Record 42: missing key tier"]);
    }

    #[test]
    fn falsy_policy_id_falls_back_to_index() {
        for pid in [json!(""), json!(0), json!(false), json!(null)] {
            let mut r = record("X");
            r["policy_id"] = pid;
            r.as_object_mut().unwrap().remove("tier");
            let result = validate_packet(&packet(vec![r]));
            assert_eq!(result.errors, vec!["Record [index 0]: missing key tier"]);
        }
    }

    #[test]
    fn non_object_section_reports_each_required_leaf() {
        let mut r = record("A");
        r["decision"] = json!("PASS");
        let result = validate_packet(&packet(vec![r]));
        assert_eq!(
            result.errors,
            vec![
                "Record A: missing key decision.display_status",
                "Record A: missing key decision.confidence_label",
                "Record A: missing key decision.matched",
            ]
        );
    }

    #[test]
    fn null_record_entry_does_not_panic() {
        let mut p = packet(vec![]);
        p["records"] = json!([null]);
        p["metadata"]["record_count"] = json!(1);
        let result = validate_packet(&p);
        assert!(!result.is_valid);
        assert!(result
            .errors
            .contains(&"Record at index 0 is not an object".to_string()));
    }

    #[test]
    fn unsorted_records_single_error() {
        let result = validate_packet(&packet(vec![record("C"), record("A"), record("B")]));
        assert_eq!(result.errors, vec!["Records are not sorted by policy_id"]);
    }

    #[test]
    fn ordering_is_lexicographic() {
        let result = validate_packet(&packet(vec![record("POL-10"), record("POL-9")]));
        assert!(result.is_valid);
    }

    #[test]
    fn duplicate_reported_per_extra_occurrence() {
        let result = validate_packet(&packet(vec![record("A"), record("A"), record("A")]));
        assert_eq!(
            result.errors,
            vec!["Duplicate policy_id: A", "Duplicate policy_id: A"]
        );
    }

    #[test]
    fn empty_records_is_valid() {
        assert!(validate_packet(&packet(vec![])).is_valid);
    }
}
