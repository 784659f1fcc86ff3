//! Discovery configuration

use std::env;
use std::path::{Path, PathBuf};

/// Environment variable overriding the packet directory
pub const PACKET_DIR_ENV: &str = "HITL_PACKET_DIR";

/// File name prefix shared by every packet artifact
pub const PACKET_PREFIX: &str = "HITL_PACKET_";

/// Fallback location relative to the working directory
pub const DEFAULT_RELATIVE_DIR: &str =
    "../Regulatory-Review/1_Active_Reviews/Teck_Trail-WARP/2_Evaluation_Output";

/// Where packet files are looked up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Directory scanned for `HITL_PACKET_<id>.*` files
    pub packet_dir: PathBuf,
}

impl DiscoveryConfig {
    /// Load from environment, falling back to [`DEFAULT_RELATIVE_DIR`]
    #[must_use]
    pub fn from_env() -> Self {
        let packet_dir = env::var_os(PACKET_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map_or_else(default_packet_dir, PathBuf::from);
        tracing::debug!(dir = %packet_dir.display(), "packet directory configured");
        Self { packet_dir }
    }

    /// Override the packet directory
    #[must_use]
    pub fn with_packet_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.packet_dir = dir.into();
        self
    }

    /// Configured directory
    #[inline]
    #[must_use]
    pub fn packet_dir(&self) -> &Path {
        &self.packet_dir
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            packet_dir: default_packet_dir(),
        }
    }
}

fn default_packet_dir() -> PathBuf {
    env::current_dir()
        .unwrap_or_default()
        .join(DEFAULT_RELATIVE_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_relative_to_cwd() {
        let config = DiscoveryConfig::default();
        assert!(config
            .packet_dir()
            .ends_with("Teck_Trail-WARP/2_Evaluation_Output"));
    }

    #[test]
    fn builder_overrides_dir() {
        let config = DiscoveryConfig::default().with_packet_dir("/tmp/packets");
        assert_eq!(config.packet_dir(), Path::new("/tmp/packets"));
    }
}
