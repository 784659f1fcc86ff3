//! Error types for packet handling
//!
//! - Schema errors: the packet is not safely interpretable and must not be shown
//! - Discovery errors: internal reasons a session was skipped, never surfaced
//! - Export errors: CSV rendering could not be written

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

/// One field-level schema violation
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SchemaIssue {
    /// Dotted path to the offending field, empty for the packet root
    pub path: String,
    /// Human-readable reason
    pub message: String,
}

impl SchemaIssue {
    /// Create issue for path
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl Display for SchemaIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Errors from the type-safe packet parse
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Input text is not JSON
    #[error("packet is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Packet does not match the `hitl_packet_v1` shape
    #[error("packet failed schema validation with {} issue(s)", .issues.len())]
    Invalid {
        /// Every violation found, in schema evaluation order
        issues: Vec<SchemaIssue>,
    },

    /// The embedded schema document itself failed to compile
    #[error("packet schema failed to compile: {0}")]
    Compile(String),
}

impl SchemaError {
    /// Field-level issues, empty for non-shape failures
    #[must_use]
    pub fn issues(&self) -> &[SchemaIssue] {
        match self {
            Self::Invalid { issues } => issues,
            _ => &[],
        }
    }

    /// Whether any issue points at `path`
    #[must_use]
    pub fn has_issue_at(&self, path: &str) -> bool {
        self.issues().iter().any(|i| i.path == path)
    }
}

/// Reasons a discovery lookup came back empty
///
/// These are logged and then collapsed into `None` / skipped sessions so the
/// caller cannot probe which identifiers map to real paths.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// Identifier failed the allow-list check
    #[error("rejected session id")]
    InvalidSessionId,

    /// Candidate path did not sit directly inside the packet directory
    #[error("resolved path escapes packet directory")]
    OutsideBaseDir,

    /// File does not exist
    #[error("not found: {0}")]
    NotFound(PathBuf),

    /// IO error during read or stat
    #[error("io error reading {path}: {source}")]
    Io {
        /// File or directory being accessed
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File content is not JSON
    #[error("unparseable packet {path}: {source}")]
    Parse {
        /// Packet file
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl DiscoveryError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors while writing flattened records
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Underlying writer failed
    #[error("io error writing export: {0}")]
    Io(#[from] std::io::Error),

    /// Export buffer was not UTF-8
    #[error("export is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Result type alias for packet operations
pub type PacketResult<T> = Result<T, SchemaError>;
