use std::path::Path;

use serde::{Deserialize, Serialize};
use sluice_types::ReferenceIdFormat;

use crate::error::{TransportError, TransportResult};

/// Hard per-message ceiling of the reference queue channel (8 KiB class).
pub const DEFAULT_CHANNEL_MAX_MESSAGE: usize = 8 * 1024;

/// Messages of this many bytes or more are spilled to blob storage. The
/// 2 KiB gap below the channel ceiling is headroom for channel-level
/// framing and encoding overhead.
pub const DEFAULT_OVERFLOW_THRESHOLD: usize = 6 * 1024;

/// Configuration for the hybrid transport.
///
/// Loadable from TOML; every field has a default:
///
/// ```toml
/// queue_name = "orders"
/// overflow_threshold = 6144
/// channel_max_message = 8192
///
/// [reference_format]
/// date_pattern = "%Y-%m-%d-%H-%M-%S"
/// fraction_digits = 4
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Name of the queue and of the blob container holding its overflow.
    pub queue_name: String,
    /// Size in bytes at or above which a message overflows to a blob.
    pub overflow_threshold: usize,
    /// Hard size ceiling enforced by the queue channel.
    pub channel_max_message: usize,
    /// Timestamp layout of reference ids.
    pub reference_format: ReferenceIdFormat,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            queue_name: "sluice".into(),
            overflow_threshold: DEFAULT_OVERFLOW_THRESHOLD,
            channel_max_message: DEFAULT_CHANNEL_MAX_MESSAGE,
            reference_format: ReferenceIdFormat::default(),
        }
    }
}

impl TransportConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> TransportResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| TransportError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file.
    pub fn load(path: &Path) -> TransportResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            TransportError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> TransportResult<String> {
        toml::to_string_pretty(self).map_err(|e| TransportError::InvalidConfig(e.to_string()))
    }

    /// Check the size limits and the reference format.
    pub fn validate(&self) -> TransportResult<()> {
        if self.queue_name.is_empty()
            || !self
                .queue_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(TransportError::InvalidConfig(format!(
                "queue_name must be non-empty ASCII alphanumerics, '-' or '_': {:?}",
                self.queue_name
            )));
        }
        if self.overflow_threshold == 0 {
            return Err(TransportError::InvalidConfig(
                "overflow_threshold must be positive".into(),
            ));
        }
        if self.overflow_threshold >= self.channel_max_message {
            return Err(TransportError::InvalidConfig(format!(
                "overflow_threshold ({}) must be below channel_max_message ({})",
                self.overflow_threshold, self.channel_max_message
            )));
        }
        self.reference_format.validate()?;
        Ok(())
    }

    /// Bytes reserved between the threshold and the channel ceiling.
    pub fn headroom(&self) -> usize {
        self.channel_max_message
            .saturating_sub(self.overflow_threshold)
    }
}
