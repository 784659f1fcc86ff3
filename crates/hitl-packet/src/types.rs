//! Packet data model
//!
//! Typed mirror of the `hitl_packet_v1` contract emitted by the evaluation
//! engine. Every struct keeps unknown keys in an `extra` map so packets
//! written by a newer engine survive a parse/serialize cycle intact.

use crate::path::KeyPath;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// The only packet schema version this crate accepts
pub const SCHEMA_VERSION: &str = "hitl_packet_v1";

/// Dotted-path keys that must exist on every record, in reporting order.
pub const REQUIRED_RECORD_KEYS: &[&str] = &[
    "session_id",
    "policy_id",
    "tier",
    "keyword.raw_score",
    "keyword.capped_score",
    "keyword.decision_score",
    "keyword.threshold",
    "keyword.quality_flags",
    "ai.invoked",
    "ai.invocation_reason",
    "decision.display_status",
    "decision.confidence_label",
    "decision.matched",
    "evidence.best_evidence_location",
    "evidence.best_evidence_excerpt",
    "provenance.keyword_source",
    "criteria.evidence_criteria_used",
];

/// Top-level keys every packet must carry
pub const TOP_LEVEL_KEYS: &[&str] = &["schema_version", "metadata", "records"];

/// Metadata keys that must be present and non-null
pub const REQUIRED_METADATA_KEYS: &[&str] =
    &["session_id", "generated_at", "schema_version", "record_count"];

/// [`REQUIRED_RECORD_KEYS`] pre-split into [`KeyPath`]s
pub(crate) static REQUIRED_RECORD_PATHS: Lazy<Vec<KeyPath>> = Lazy::new(|| {
    REQUIRED_RECORD_KEYS
        .iter()
        .map(|key| KeyPath::new(key.split('.').map(str::to_string).collect()))
        .collect()
});

/// Unknown keys carried through untouched
pub type Extra = Map<String, Value>;

/// Quality flag name → raised, in document order
pub type QualityFlags = IndexMap<String, bool>;

// ---------------------------------------------------------------------------
// Record sections
// ---------------------------------------------------------------------------

/// Keyword scoring section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordSection {
    /// Uncapped keyword hit score
    pub raw_score: f64,
    /// Score after per-keyword capping
    pub capped_score: f64,
    /// Score compared against `threshold`
    pub decision_score: f64,
    /// Minimum `decision_score` for a match
    pub threshold: f64,
    /// Flag name → raised
    pub quality_flags: QualityFlags,
    /// Unknown keys, preserved
    #[serde(flatten)]
    pub extra: Extra,
}

impl KeywordSection {
    /// Names of raised quality flags, in document order
    pub fn active_flags(&self) -> impl Iterator<Item = &str> {
        self.quality_flags
            .iter()
            .filter(|(_, raised)| **raised)
            .map(|(name, _)| name.as_str())
    }
}

/// AI invocation section
///
/// The optional fields are only populated when the engine actually invoked
/// the model for this policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiSection {
    /// Whether the model was called for this policy
    pub invoked: bool,
    /// Why it was or was not called, e.g. `ai_disabled`
    pub invocation_reason: String,
    /// Keyword and model scores combined
    #[serde(default)]
    pub fused_score: Option<f64>,
    /// Model explanation, when invoked
    #[serde(default)]
    pub reasoning: Option<String>,
    /// Model confidence, when invoked
    #[serde(default)]
    pub confidence: Option<String>,
    /// Unknown keys, preserved
    #[serde(flatten)]
    pub extra: Extra,
}

/// Final decision section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionSection {
    /// Status shown to reviewers, e.g. `PASS`
    pub display_status: String,
    /// e.g. `HIGH`
    pub confidence_label: String,
    /// Whether the policy was judged satisfied
    pub matched: bool,
    /// Unknown keys, preserved
    #[serde(flatten)]
    pub extra: Extra,
}

/// Evidence section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSection {
    /// Where in the source document the best evidence was found
    pub best_evidence_location: String,
    /// Quoted evidence text
    pub best_evidence_excerpt: String,
    /// Share of the evidence trace that was recorded, 0.0 to 1.0
    #[serde(default)]
    pub trace_completeness: Option<f64>,
    /// Unknown keys, preserved
    #[serde(flatten)]
    pub extra: Extra,
}

/// Provenance section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceSection {
    /// Origin of the keyword list used for scoring
    pub keyword_source: String,
    /// Unknown keys, preserved
    #[serde(flatten)]
    pub extra: Extra,
}

/// Evidence criteria section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaSection {
    /// Whether policy-specific evidence criteria applied
    pub evidence_criteria_used: bool,
    /// Unknown keys, preserved
    #[serde(flatten)]
    pub extra: Extra,
}

/// Count fields that accept integral floats such as `2.0`
mod count {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Number;

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        clippy::float_cmp
    )]
    fn to_count(n: &Number) -> Option<u64> {
        n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        })
    }

    pub(super) fn required<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        let n = Number::deserialize(d)?;
        to_count(&n).ok_or_else(|| D::Error::custom(format!("invalid count: {n}")))
    }

    pub(super) fn nullable<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        Option::<Number>::deserialize(d)?
            .map(|n| to_count(&n).ok_or_else(|| D::Error::custom(format!("invalid count: {n}"))))
            .transpose()
    }
}

// ---------------------------------------------------------------------------
// Record and packet
// ---------------------------------------------------------------------------

/// One evaluated policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketRecord {
    /// Evaluation session identifier
    pub session_id: String,
    /// Unique within a packet; records are sorted by it
    pub policy_id: String,
    /// Evaluation tier, e.g. `TIER_1_BINARY`
    pub tier: String,
    /// Keyword scoring
    pub keyword: KeywordSection,
    /// Model invocation
    pub ai: AiSection,
    /// Final decision
    pub decision: DecisionSection,
    /// Supporting evidence
    pub evidence: EvidenceSection,
    /// Input provenance
    pub provenance: ProvenanceSection,
    /// Evidence criteria usage
    pub criteria: CriteriaSection,
    /// Unknown keys, preserved
    #[serde(flatten)]
    pub extra: Extra,
}

/// Session-level descriptor
///
/// The `policies_*` counters are nullable but never absent: `null` means the
/// engine did not report the figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketMetadata {
    /// Evaluation session identifier
    pub session_id: String,
    /// Engine timestamp, kept as written
    pub generated_at: String,
    /// Packet schema version
    pub schema_version: String,
    /// Declared number of records
    #[serde(deserialize_with = "count::required")]
    pub record_count: u64,
    /// Policies scored in this session
    #[serde(deserialize_with = "count::nullable")]
    pub policies_evaluated: Option<u64>,
    /// Size of the policy knowledge base
    #[serde(deserialize_with = "count::nullable")]
    pub policies_in_kb: Option<u64>,
    /// Policies excluded before scoring
    #[serde(deserialize_with = "count::nullable")]
    pub policies_filtered: Option<u64>,
    /// Unknown keys, preserved
    #[serde(flatten)]
    pub extra: Extra,
}

/// A complete, schema-valid HITL packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitlPacket {
    /// Always [`SCHEMA_VERSION`]
    pub schema_version: String,
    /// Session-level descriptor
    pub metadata: PacketMetadata,
    /// Sorted by `policy_id`
    pub records: Vec<PacketRecord>,
}

impl HitlPacket {
    /// Policy identifiers in record order
    pub fn policy_ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.policy_id.as_str())
    }

    /// Find a record by policy identifier
    #[must_use]
    pub fn record(&self, policy_id: &str) -> Option<&PacketRecord> {
        self.records.iter().find(|r| r.policy_id == policy_id)
    }
}

// ---------------------------------------------------------------------------
// Flat record
// ---------------------------------------------------------------------------

/// Single-level view of a record for tables and CSV export
///
/// Field order is the column order of the CSV export and must not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRecord {
    /// Policy identifier
    pub policy_id: String,
    /// Evaluation tier
    pub tier: String,
    /// `decision.display_status`
    pub status: String,
    /// `decision.confidence_label`
    pub confidence: String,
    /// Whether the policy was judged satisfied
    pub matched: bool,
    /// `None` when absent or not a number
    pub raw_score: Option<f64>,
    /// `keyword.capped_score`
    pub capped_score: Option<f64>,
    /// `keyword.decision_score`
    pub decision_score: Option<f64>,
    /// Minimum `decision_score` for a match
    pub threshold: Option<f64>,
    /// Raised quality flags joined with `,`
    pub quality_flags: String,
    /// `ai.invoked`
    pub ai_invoked: bool,
    /// `ai.invocation_reason`
    pub ai_invocation_reason: String,
    /// `evidence.best_evidence_location`
    pub best_evidence_location: String,
    /// `provenance.keyword_source`
    pub keyword_source: String,
    /// `criteria.evidence_criteria_used`
    pub evidence_criteria_used: bool,
    /// `0.0` when absent
    pub trace_completeness: f64,
}

impl FlatRecord {
    /// Column names in output order
    pub const COLUMNS: [&'static str; 16] = [
        "policy_id",
        "tier",
        "status",
        "confidence",
        "matched",
        "raw_score",
        "capped_score",
        "decision_score",
        "threshold",
        "quality_flags",
        "ai_invoked",
        "ai_invocation_reason",
        "best_evidence_location",
        "keyword_source",
        "evidence_criteria_used",
        "trace_completeness",
    ];
}

// ---------------------------------------------------------------------------
// Validation result
// ---------------------------------------------------------------------------

/// Outcome of the semantic invariant checks
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// `true` exactly when `errors` is empty
    pub is_valid: bool,
    /// Violations in check order
    pub errors: Vec<String>,
}

impl ValidationResult {
    /// Build a result from collected errors
    #[inline]
    #[must_use]
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// One-line status, e.g. `Valid` or `Invalid (2 errors)`
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_valid {
            return "Valid".to_string();
        }
        let n = self.errors.len();
        format!("Invalid ({n} error{})", if n == 1 { "" } else { "s" })
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Packet files sharing one session identifier
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketSession {
    /// Evaluation session identifier
    pub session_id: String,
    /// `HITL_PACKET_<id>.json`
    pub json_path: PathBuf,
    /// Sibling `.csv`, if present
    pub csv_path: Option<PathBuf>,
    /// Sibling `.md`, if present
    pub md_path: Option<PathBuf>,
    /// `None` when the metadata block is absent or malformed
    pub metadata: Option<PacketMetadata>,
    /// Modification time of the JSON file
    pub modified_at: DateTime<Utc>,
}
