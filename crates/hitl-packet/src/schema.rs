//! Type-safe packet parse
//!
//! Shape checking is declarative: the packet contract is a JSON Schema
//! document evaluated by `jsonschema`, which reports every violation with its
//! instance path. Only a value that passes is handed to serde, so the typed
//! [`HitlPacket`] is never built from a half-valid document.
//!
//! Unknown keys are allowed everywhere (no `additionalProperties: false`);
//! the serde structs keep them in their `extra` maps. Cross-record invariants
//! are left to [`crate::validator`].

use crate::error::{PacketResult, SchemaError, SchemaIssue};
use crate::types::{HitlPacket, SCHEMA_VERSION};
use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, JSONSchema};
use once_cell::sync::Lazy;
use serde_json::{json, Value};

static PACKET_SCHEMA: Lazy<Result<JSONSchema, String>> = Lazy::new(|| {
    let document = packet_schema_document();
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&document)
        .map_err(|e| e.to_string())
});

/// The `hitl_packet_v1` contract as a JSON Schema (draft 7) document
#[must_use]
pub fn packet_schema_document() -> Value {
    let string = json!({"type": "string"});
    let number = json!({"type": "number"});
    let boolean = json!({"type": "boolean"});
    let count = json!({"type": "integer", "minimum": 0});
    let nullable_count = json!({"type": ["integer", "null"], "minimum": 0});

    let metadata = json!({
        "type": "object",
        "required": [
            "session_id", "generated_at", "schema_version", "record_count",
            "policies_evaluated", "policies_in_kb", "policies_filtered"
        ],
        "properties": {
            "session_id": string,
            "generated_at": string,
            "schema_version": string,
            "record_count": count,
            "policies_evaluated": nullable_count,
            "policies_in_kb": nullable_count,
            "policies_filtered": nullable_count
        }
    });

    let keyword = json!({
        "type": "object",
        "required": ["raw_score", "capped_score", "decision_score", "threshold", "quality_flags"],
        "properties": {
            "raw_score": number,
            "capped_score": number,
            "decision_score": number,
            "threshold": number,
            "quality_flags": {"type": "object", "additionalProperties": boolean}
        }
    });

    let ai = json!({
        "type": "object",
        "required": ["invoked", "invocation_reason"],
        "properties": {
            "invoked": boolean,
            "invocation_reason": string,
            "fused_score": {"type": ["number", "null"]},
            "reasoning": {"type": ["string", "null"]},
            "confidence": {"type": ["string", "null"]}
        }
    });

    let decision = json!({
        "type": "object",
        "required": ["display_status", "confidence_label", "matched"],
        "properties": {
            "display_status": string,
            "confidence_label": string,
            "matched": boolean
        }
    });

    let evidence = json!({
        "type": "object",
        "required": ["best_evidence_location", "best_evidence_excerpt"],
        "properties": {
            "best_evidence_location": string,
            "best_evidence_excerpt": string,
            "trace_completeness": {"type": ["number", "null"]}
        }
    });

    let provenance = json!({
        "type": "object",
        "required": ["keyword_source"],
        "properties": {"keyword_source": string}
    });

    let criteria = json!({
        "type": "object",
        "required": ["evidence_criteria_used"],
        "properties": {"evidence_criteria_used": boolean}
    });

    let record = json!({
        "type": "object",
        "required": [
            "session_id", "policy_id", "tier",
            "keyword", "ai", "decision", "evidence", "provenance", "criteria"
        ],
        "properties": {
            "session_id": string,
            "policy_id": string,
            "tier": string,
            "keyword": keyword,
            "ai": ai,
            "decision": decision,
            "evidence": evidence,
            "provenance": provenance,
            "criteria": criteria
        }
    });

    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": SCHEMA_VERSION,
        "type": "object",
        "required": ["schema_version", "metadata", "records"],
        "properties": {
            "schema_version": {"const": SCHEMA_VERSION},
            "metadata": metadata,
            "records": {"type": "array", "items": record}
        }
    })
}

/// Collect every shape violation in `value`
///
/// # Errors
/// Returns [`SchemaError::Compile`] only if the embedded schema is broken.
pub fn schema_issues(value: &Value) -> PacketResult<Vec<SchemaIssue>> {
    let schema = PACKET_SCHEMA
        .as_ref()
        .map_err(|e| SchemaError::Compile(e.clone()))?;

    let issues = match schema.validate(value) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|error| {
                let mut path = pointer_to_dotted(&error.instance_path.to_string());
                let message = match &error.kind {
                    ValidationErrorKind::Required { property } => {
                        let name = property.as_str().unwrap_or_default();
                        if !path.is_empty() {
                            path.push('.');
                        }
                        path.push_str(name);
                        "required field is missing".to_string()
                    }
                    _ => error.to_string(),
                };
                SchemaIssue::new(path, message)
            })
            .collect(),
    };
    Ok(issues)
}

/// Parse an untyped JSON value into a [`HitlPacket`]
///
/// # Errors
/// - [`SchemaError::Invalid`] listing every violation when the shape is wrong
/// - [`SchemaError::Compile`] if the embedded schema is broken
pub fn parse_packet(value: &Value) -> PacketResult<HitlPacket> {
    let issues = schema_issues(value)?;
    if !issues.is_empty() {
        tracing::debug!(issues = issues.len(), "packet rejected by schema");
        return Err(SchemaError::Invalid { issues });
    }

    serde_json::from_value(value.clone()).map_err(|e| SchemaError::Invalid {
        issues: vec![SchemaIssue::new("", e.to_string())],
    })
}

/// Parse JSON text into a [`HitlPacket`]
///
/// # Errors
/// [`SchemaError::Json`] for malformed text, otherwise as [`parse_packet`].
pub fn parse_packet_str(text: &str) -> PacketResult<HitlPacket> {
    let value: Value = serde_json::from_str(text)?;
    parse_packet(&value)
}

/// `/records/0/keyword` → `records.0.keyword`
fn pointer_to_dotted(pointer: &str) -> String {
    pointer
        .split('/')
        .filter(|seg| !seg.is_empty())
        .map(|seg| seg.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".")
}
