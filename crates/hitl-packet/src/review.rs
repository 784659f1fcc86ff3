//! Review-facing views of packets and sessions
//!
//! Combines both validators into a single verdict and shapes discovery
//! results for listing and detail views.

use crate::error::{SchemaError, SchemaIssue};
use crate::schema::parse_packet;
use crate::types::{HitlPacket, PacketMetadata, PacketSession, ValidationResult};
use crate::validator::validate_packet;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// How a packet may be presented to a reviewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Failed the schema; must not be displayed or processed
    Rejected,
    /// Schema-valid but breaks a cross-record invariant; display with warnings
    Suspect,
    /// Passed both validators
    Clean,
}

impl Display for Verdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rejected => "rejected",
            Self::Suspect => "suspect",
            Self::Clean => "clean",
        })
    }
}

/// Outcome of running both validators over one packet
#[derive(Debug, Clone)]
pub struct PacketReview {
    /// Typed packet, present only when the schema passed
    pub packet: Option<HitlPacket>,
    /// Schema issues; empty when the schema passed
    pub schema_issues: Vec<SchemaIssue>,
    /// Semantic invariant result
    pub validation: ValidationResult,
}

impl PacketReview {
    /// Classify the packet
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        match (&self.packet, self.validation.is_valid) {
            (None, _) => Verdict::Rejected,
            (Some(_), false) => Verdict::Suspect,
            (Some(_), true) => Verdict::Clean,
        }
    }
}

/// Run schema and semantic validation on a raw packet
///
/// The semantic checks always run, so a rejected packet still reports every
/// invariant it breaks.
#[must_use]
pub fn inspect_packet(raw: &Value) -> PacketReview {
    let validation = validate_packet(raw);
    match parse_packet(raw) {
        Ok(packet) => PacketReview {
            packet: Some(packet),
            schema_issues: Vec::new(),
            validation,
        },
        Err(err) => {
            let schema_issues = match err {
                SchemaError::Invalid { issues } => issues,
                other => vec![SchemaIssue::new("", other.to_string())],
            };
            PacketReview {
                packet: None,
                schema_issues,
                validation,
            }
        }
    }
}

/// One row of a session listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Evaluation session identifier
    pub session_id: String,
    /// Engine-written CSV exists
    #[serde(rename = "hasCSV")]
    pub has_csv: bool,
    /// Engine-written Markdown report exists
    #[serde(rename = "hasMD")]
    pub has_md: bool,
    /// Session-level descriptor
    pub metadata: Option<PacketMetadata>,
    /// Modification time of the packet JSON
    pub modified_at: DateTime<Utc>,
}

impl From<&PacketSession> for SessionSummary {
    fn from(session: &PacketSession) -> Self {
        Self {
            session_id: session.session_id.clone(),
            has_csv: session.csv_path.is_some(),
            has_md: session.md_path.is_some(),
            metadata: session.metadata.clone(),
            modified_at: session.modified_at,
        }
    }
}

/// Session list with total count
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionListing {
    /// Newest first
    pub sessions: Vec<SessionSummary>,
    /// Number of sessions
    pub count: usize,
}

impl SessionListing {
    /// Summarize discovered sessions, keeping their order
    #[must_use]
    pub fn from_sessions(sessions: &[PacketSession]) -> Self {
        Self {
            sessions: sessions.iter().map(SessionSummary::from).collect(),
            count: sessions.len(),
        }
    }
}

/// Raw packet with its semantic validation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketDetail {
    /// Packet exactly as read from disk
    pub packet: Value,
    /// Semantic validation result
    pub validation: ValidationResult,
}
