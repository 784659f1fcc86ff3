//! Testing utilities for the HITL packet workspace
//!
//! Packet fixtures built as raw JSON plus a scratch packet directory.

#![allow(missing_docs)]

use serde_json::{json, Value};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

pub const TEST_SESSION: &str = "TEST_SESSION";

/// A record carrying every required key
pub fn make_record(policy_id: &str) -> Value {
    json!({
        "session_id": TEST_SESSION,
        "policy_id": policy_id,
        "tier": "TIER_1_BINARY",
        "keyword": {
            "raw_score": 5.0,
            "capped_score": 4.0,
            "decision_score": 0.8,
            "threshold": 5.0,
            "quality_flags": {
                "high_repeat_density": false,
                "low_source_diversity": false,
                "low_keyword_diversity": false
            }
        },
        "ai": {"invoked": false, "invocation_reason": "ai_disabled"},
        "decision": {
            "display_status": "PASS",
            "confidence_label": "HIGH",
            "matched": true
        },
        "evidence": {
            "best_evidence_location": "Section 1",
            "best_evidence_excerpt": "Emissions are monitored continuously.",
            "trace_completeness": 1.0
        },
        "provenance": {"keyword_source": "keyword_metadata"},
        "criteria": {"evidence_criteria_used": false}
    })
}

/// Wrap records in a packet whose declared count matches
pub fn make_packet(records: Vec<Value>) -> Value {
    json!({
        "schema_version": "hitl_packet_v1",
        "metadata": {
            "session_id": TEST_SESSION,
            "generated_at": "2026-01-15T10:30:00Z",
            "schema_version": "hitl_packet_v1",
            "record_count": records.len(),
            "policies_evaluated": records.len(),
            "policies_in_kb": 120,
            "policies_filtered": null
        },
        "records": records
    })
}

/// Valid packet with one record per id, in the given order
pub fn packet_with_ids(ids: &[&str]) -> Value {
    make_packet(ids.iter().map(|id| make_record(id)).collect())
}

/// Scratch packet directory removed on drop
pub struct PacketDir {
    dir: TempDir,
}

impl PacketDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `HITL_PACKET_<id>.json`
    pub fn write_packet(&self, id: &str, packet: &Value) -> PathBuf {
        self.write_raw(
            &format!("HITL_PACKET_{id}.json"),
            &serde_json::to_string_pretty(packet).unwrap(),
        )
    }

    /// Write `HITL_PACKET_<id>.<ext>`
    pub fn write_artifact(&self, id: &str, ext: &str, contents: &str) -> PathBuf {
        self.write_raw(&format!("HITL_PACKET_{id}.{ext}"), contents)
    }

    /// Write a file with an arbitrary name
    pub fn write_raw(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    /// Pin a file's mtime to `secs` after the epoch
    pub fn set_mtime(&self, path: &Path, secs: u64) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }
}

impl Default for PacketDir {
    fn default() -> Self {
        Self::new()
    }
}
