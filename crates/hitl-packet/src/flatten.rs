//! Record flattening for table display and CSV export
//!
//! [`flatten_record`] works on raw values so previews of unvalidated packets
//! never fail; [`FlatRecord::from`] is the typed equivalent. Both produce the
//! same row for the same record.

use crate::types::{FlatRecord, HitlPacket, PacketRecord};
use once_cell::sync::Lazy;
use serde_json::{Map, Value};

static EMPTY: Lazy<Map<String, Value>> = Lazy::new(Map::new);

/// Flatten one raw record into a [`FlatRecord`]
///
/// Missing or non-object sections are read as `{}`; missing fields take the
/// column default (`""`, `false`, `None`, `0.0`).
#[must_use]
pub fn flatten_record(record: &Value) -> FlatRecord {
    let kw = section(record, "keyword");
    let ai = section(record, "ai");
    let dec = section(record, "decision");
    let ev = section(record, "evidence");
    let prov = section(record, "provenance");
    let crit = section(record, "criteria");

    let top = record.as_object().unwrap_or(&*EMPTY);

    FlatRecord {
        policy_id: text(top, "policy_id"),
        tier: text(top, "tier"),
        status: text(dec, "display_status"),
        confidence: text(dec, "confidence_label"),
        matched: flag(dec, "matched"),
        raw_score: number(kw, "raw_score"),
        capped_score: number(kw, "capped_score"),
        decision_score: number(kw, "decision_score"),
        threshold: number(kw, "threshold"),
        quality_flags: compact_quality_flags(kw.get("quality_flags")),
        ai_invoked: flag(ai, "invoked"),
        ai_invocation_reason: text(ai, "invocation_reason"),
        best_evidence_location: text(ev, "best_evidence_location"),
        keyword_source: text(prov, "keyword_source"),
        evidence_criteria_used: flag(crit, "evidence_criteria_used"),
        trace_completeness: number(ev, "trace_completeness").unwrap_or(0.0),
    }
}

/// Compact a quality-flag value to the raised flag names joined with `,`
///
/// Non-object values fall back to their text form; absent or null yields `""`.
#[must_use]
pub fn compact_quality_flags(flags: Option<&Value>) -> String {
    match flags {
        None | Some(Value::Null) => String::new(),
        Some(Value::Object(map)) => join_raised(map.iter().map(|(k, v)| (k.as_str(), v))),
        Some(Value::Array(items)) => {
            let keys: Vec<String> = (0..items.len()).map(|i| i.to_string()).collect();
            join_raised(keys.iter().map(String::as_str).zip(items))
        }
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

impl From<&PacketRecord> for FlatRecord {
    fn from(rec: &PacketRecord) -> Self {
        Self {
            policy_id: rec.policy_id.clone(),
            tier: rec.tier.clone(),
            status: rec.decision.display_status.clone(),
            confidence: rec.decision.confidence_label.clone(),
            matched: rec.decision.matched,
            raw_score: Some(rec.keyword.raw_score),
            capped_score: Some(rec.keyword.capped_score),
            decision_score: Some(rec.keyword.decision_score),
            threshold: Some(rec.keyword.threshold),
            quality_flags: rec.keyword.active_flags().collect::<Vec<_>>().join(","),
            ai_invoked: rec.ai.invoked,
            ai_invocation_reason: rec.ai.invocation_reason.clone(),
            best_evidence_location: rec.evidence.best_evidence_location.clone(),
            keyword_source: rec.provenance.keyword_source.clone(),
            evidence_criteria_used: rec.criteria.evidence_criteria_used,
            trace_completeness: rec.evidence.trace_completeness.unwrap_or(0.0),
        }
    }
}

impl HitlPacket {
    /// Flatten every record, preserving record order
    #[must_use]
    pub fn flat_records(&self) -> Vec<FlatRecord> {
        self.records.iter().map(FlatRecord::from).collect()
    }
}

/// Flatten every record of a raw packet value
///
/// A missing or non-array `records` yields no rows.
#[must_use]
pub fn flatten_packet(packet: &Value) -> Vec<FlatRecord> {
    packet
        .get("records")
        .and_then(Value::as_array)
        .map(|records| records.iter().map(flatten_record).collect())
        .unwrap_or_default()
}

fn join_raised<'a>(entries: impl Iterator<Item = (&'a str, &'a Value)>) -> String {
    entries
        .filter(|(_, v)| matches!(v, Value::Bool(true)))
        .map(|(k, _)| k)
        .collect::<Vec<_>>()
        .join(",")
}

fn section<'a>(record: &'a Value, name: &str) -> &'a Map<String, Value> {
    record
        .get(name)
        .and_then(Value::as_object)
        .unwrap_or(&*EMPTY)
}

fn text(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn flag(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn number(map: &Map<String, Value>, key: &str) -> Option<f64> {
    map.get(key).and_then(Value::as_f64)
}
