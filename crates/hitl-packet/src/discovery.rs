//! Packet file discovery
//!
//! Scans the configured packet directory for `HITL_PACKET_<id>.json` files
//! and their optional `.csv` / `.md` siblings.
//!
//! # Path safety
//!
//! Session identifiers come from untrusted callers. Every lookup goes through
//! [`is_valid_session_id`] and then `resolve_path`, which requires the
//! candidate file to sit directly inside the normalized packet directory.
//! Any rejection is reported exactly like a missing file.

use crate::config::{DiscoveryConfig, PACKET_PREFIX};
use crate::error::DiscoveryError;
use crate::review::PacketDetail;
use crate::types::{PacketMetadata, PacketSession};
use crate::validator::validate_packet;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::env;
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Longest accepted session identifier
pub const MAX_SESSION_ID_LEN: usize = 200;

static SESSION_ID_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").ok());

/// Allow-list check for session identifiers
///
/// ASCII letters, digits, `_` and `-` only; 1 to 200 characters.
#[must_use]
pub fn is_valid_session_id(id: &str) -> bool {
    if id.is_empty() || id.len() > MAX_SESSION_ID_LEN {
        return false;
    }
    SESSION_ID_PATTERN
        .as_ref()
        .map_or(false, |re| re.is_match(id))
}

/// The three files a session may have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactFormat {
    /// Packet JSON (always present)
    Json,
    /// Engine-written CSV table
    Csv,
    /// Engine-written Markdown report
    Markdown,
}

impl ArtifactFormat {
    /// File extension without the dot
    #[inline]
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Markdown => "md",
        }
    }

    /// HTTP content type for serving the file
    #[inline]
    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv; charset=utf-8",
            Self::Markdown => "text/markdown; charset=utf-8",
        }
    }

    /// File name for a session's artifact
    #[must_use]
    pub fn file_name(self, session_id: &str) -> String {
        format!("{PACKET_PREFIX}{session_id}.{}", self.extension())
    }

    /// Suggested download file name; same as the on-disk name
    #[must_use]
    pub fn download_filename(self, session_id: &str) -> String {
        self.file_name(session_id)
    }

    /// Parse a user-supplied format name (`csv`, `md`, `markdown`, `json`)
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }
}

impl Display for ArtifactFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Read-only view of a packet directory
///
/// Holds only configuration; every call re-reads the filesystem.
#[derive(Debug, Clone)]
pub struct PacketDirectory {
    config: DiscoveryConfig,
}

impl PacketDirectory {
    /// Create directory view from config
    #[must_use]
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    /// Directory view configured from the environment
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(DiscoveryConfig::from_env())
    }

    /// Underlying config
    #[inline]
    #[must_use]
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// List every readable packet session, newest first
    ///
    /// A missing or unreadable directory yields an empty list. Sessions whose
    /// JSON cannot be read or parsed are skipped.
    #[must_use]
    pub fn discover(&self) -> Vec<PacketSession> {
        let base = match self.base_dir() {
            Ok(base) => base,
            Err(e) => {
                tracing::warn!(error = %e, "cannot resolve packet directory");
                return Vec::new();
            }
        };

        let names = match list_file_names(&base) {
            Ok(names) => names,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(dir = %base.display(), "packet directory does not exist");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(dir = %base.display(), error = %e, "cannot list packet directory");
                return Vec::new();
            }
        };
        let present: HashSet<&str> = names.iter().map(String::as_str).collect();

        let mut sessions = Vec::new();
        for name in &names {
            let Some(id) = session_id_of(name) else {
                continue;
            };
            if !is_valid_session_id(id) {
                tracing::debug!(file = %name, "skipping packet with invalid session id");
                continue;
            }
            match load_session(&base, id, &present) {
                Ok(session) => sessions.push(session),
                Err(e) => tracing::debug!(session = id, error = %e, "skipping session"),
            }
        }

        // stable: equal mtimes keep listing order
        sessions.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        tracing::info!(
            dir = %base.display(),
            sessions = sessions.len(),
            "discovered packet sessions"
        );
        sessions
    }

    /// Read and parse a session's packet JSON
    ///
    /// `None` when the id is invalid or the file is absent, unreadable or not
    /// JSON. The value is not validated.
    #[must_use]
    pub fn load_packet(&self, session_id: &str) -> Option<Value> {
        let result = self
            .resolve_path(session_id, ArtifactFormat::Json)
            .and_then(|path| read_json(&path));
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(error = %e, "packet lookup failed");
                None
            }
        }
    }

    /// Packet JSON plus its semantic validation result
    #[must_use]
    pub fn load_detail(&self, session_id: &str) -> Option<PacketDetail> {
        let packet = self.load_packet(session_id)?;
        let validation = validate_packet(&packet);
        Some(PacketDetail { packet, validation })
    }

    /// Absolute path of a session artifact, if it exists
    #[must_use]
    pub fn artifact_path(&self, session_id: &str, format: ArtifactFormat) -> Option<PathBuf> {
        match self.resolve_path(session_id, format) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::debug!(format = %format, error = %e, "artifact lookup failed");
                None
            }
        }
    }

    /// Contents of a session artifact as text
    #[must_use]
    pub fn read_artifact(&self, session_id: &str, format: ArtifactFormat) -> Option<String> {
        let path = self.artifact_path(session_id, format)?;
        match fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!(error = %DiscoveryError::io_error(&path, e), "artifact read failed");
                None
            }
        }
    }

    fn base_dir(&self) -> Result<PathBuf, DiscoveryError> {
        let dir = self.config.packet_dir();
        let absolute = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            env::current_dir()
                .map_err(|e| DiscoveryError::io_error(dir, e))?
                .join(dir)
        };
        Ok(normalize(&absolute))
    }

    /// Validated, contained, existing path for `session_id`'s artifact
    fn resolve_path(
        &self,
        session_id: &str,
        format: ArtifactFormat,
    ) -> Result<PathBuf, DiscoveryError> {
        if !is_valid_session_id(session_id) {
            return Err(DiscoveryError::InvalidSessionId);
        }
        let base = self.base_dir()?;
        let candidate = normalize(&base.join(format.file_name(session_id)));
        if candidate.parent() != Some(base.as_path()) {
            return Err(DiscoveryError::OutsideBaseDir);
        }
        if !candidate.is_file() {
            return Err(DiscoveryError::NotFound(candidate));
        }
        Ok(candidate)
    }
}

impl Default for PacketDirectory {
    fn default() -> Self {
        Self::new(DiscoveryConfig::default())
    }
}

/// `HITL_PACKET_<id>.json` → `<id>`
fn session_id_of(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix(PACKET_PREFIX)?
        .strip_suffix(".json")
}

fn list_file_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        // follows symlinks, unlike DirEntry::file_type
        if !fs::metadata(entry.path()).map_or(false, |m| m.is_file()) {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

fn load_session(
    base: &Path,
    id: &str,
    present: &HashSet<&str>,
) -> Result<PacketSession, DiscoveryError> {
    let json_path = base.join(ArtifactFormat::Json.file_name(id));
    let modified = fs::metadata(&json_path)
        .and_then(|m| m.modified())
        .map_err(|e| DiscoveryError::io_error(&json_path, e))?;
    let packet = read_json(&json_path)?;

    let sibling = |format: ArtifactFormat| {
        let name = format.file_name(id);
        present.contains(name.as_str()).then(|| base.join(name))
    };

    Ok(PacketSession {
        session_id: id.to_string(),
        csv_path: sibling(ArtifactFormat::Csv),
        md_path: sibling(ArtifactFormat::Markdown),
        metadata: extract_metadata(&packet),
        modified_at: DateTime::<Utc>::from(modified),
        json_path,
    })
}

fn extract_metadata(packet: &Value) -> Option<PacketMetadata> {
    let metadata = packet.get("metadata")?;
    serde_json::from_value(metadata.clone()).ok()
}

fn read_json(path: &Path) -> Result<Value, DiscoveryError> {
    let text = fs::read_to_string(path).map_err(|e| DiscoveryError::io_error(path, e))?;
    serde_json::from_str(&text).map_err(|source| DiscoveryError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve `.` and `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir | Component::Prefix(_))
                ) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
