//! HITL Packet Contract
//!
//! Validation, flattening and discovery for `hitl_packet_v1` review packets
//! produced by the policy evaluation engine.
//!
//! # Core Concepts
//!
//! - [`HitlPacket`]: typed packet, only built from schema-valid input
//! - [`parse_packet`]: declarative shape check that collects every issue
//! - [`validate_packet`]: cross-record invariants (count, sort, duplicates)
//! - [`FlatRecord`]: one table row per record, also the CSV column order
//! - [`PacketDirectory`]: traversal-safe lookup of packet files on disk
//!
//! # Example
//!
//! ```rust,ignore
//! use hitl_packet::prelude::*;
//!
//! let packets = PacketDirectory::from_env();
//! for session in packets.discover() {
//!     let raw = packets.load_packet(&session.session_id).unwrap();
//!     match inspect_packet(&raw).verdict() {
//!         Verdict::Rejected => continue,
//!         _ => println!("{}", to_csv_string(&flatten_packet(&raw))?),
//!     }
//! }
//! ```

#![warn(unreachable_pub)]

// Core modules
mod error;
mod path;
mod types;

pub mod config;
pub mod discovery;
pub mod export;
pub mod flatten;
pub mod review;
pub mod schema;
pub mod validator;

// Re-exports
pub use config::{DiscoveryConfig, PACKET_DIR_ENV, PACKET_PREFIX};
pub use discovery::{is_valid_session_id, ArtifactFormat, PacketDirectory};
pub use error::{DiscoveryError, ExportError, PacketResult, SchemaError, SchemaIssue};
pub use export::{to_csv_string, write_csv};
pub use flatten::{compact_quality_flags, flatten_packet, flatten_record};
pub use path::{KeyPath, PathError};
pub use review::{
    inspect_packet, PacketDetail, PacketReview, SessionListing, SessionSummary, Verdict,
};
pub use schema::{packet_schema_document, parse_packet, parse_packet_str};
pub use types::{
    AiSection, CriteriaSection, DecisionSection, EvidenceSection, Extra, FlatRecord, HitlPacket,
    KeywordSection, PacketMetadata, PacketRecord, PacketSession, ProvenanceSection, QualityFlags,
    ValidationResult, REQUIRED_METADATA_KEYS, REQUIRED_RECORD_KEYS, SCHEMA_VERSION,
    TOP_LEVEL_KEYS,
};

/// Common imports
pub mod prelude {
    pub use crate::{
        flatten_packet, flatten_record, inspect_packet, parse_packet, to_csv_string,
        validate_packet, DiscoveryConfig, FlatRecord, HitlPacket, PacketDirectory,
        PacketSession, ValidationResult, Verdict,
    };
}

pub use validator::validate_packet;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
