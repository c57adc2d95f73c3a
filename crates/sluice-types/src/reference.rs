use std::fmt::{self, Write as _};

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::message_id::MessageId;

/// Length of a hyphenated UUID in text form.
const UUID_TEXT_LEN: usize = 36;

/// Timestamp layout used as the sortable prefix of a [`ReferenceId`].
///
/// The default renders `yyyy-MM-dd-HH-mm-ss-ffff`: a `chrono` strftime
/// pattern for the date and time, followed by `-` and a fixed number of
/// fractional-second digits. Every field is zero-padded, so lexicographic
/// order of the rendered text equals chronological order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceIdFormat {
    /// strftime pattern for the whole-second part.
    pub date_pattern: String,
    /// Digits of sub-second precision, clamped to `0..=9`. Zero omits the
    /// fraction together with its separator.
    pub fraction_digits: u8,
}

impl Default for ReferenceIdFormat {
    fn default() -> Self {
        Self {
            date_pattern: "%Y-%m-%d-%H-%M-%S".into(),
            fraction_digits: 4,
        }
    }
}

impl ReferenceIdFormat {
    /// Render `at` according to this format.
    pub fn format_timestamp(&self, at: &DateTime<Utc>) -> Result<String, TypeError> {
        let mut out = String::with_capacity(32);
        write!(out, "{}", at.format(&self.date_pattern)).map_err(|_| {
            TypeError::InvalidReferenceId(format!(
                "unsupported date pattern: {}",
                self.date_pattern
            ))
        })?;

        let digits = u32::from(self.fraction_digits.min(9));
        if digits > 0 {
            // Leap seconds report nanos >= 1e9.
            let nanos = at.nanosecond().min(999_999_999);
            let fraction = nanos / 10u32.pow(9 - digits);
            write!(out, "-{:0width$}", fraction, width = digits as usize)
                .map_err(|e| TypeError::InvalidReferenceId(e.to_string()))?;
        }
        Ok(out)
    }

    /// Check that the pattern renders without error.
    pub fn validate(&self) -> Result<(), TypeError> {
        self.format_timestamp(&DateTime::<Utc>::default()).map(|_| ())
    }
}

/// Blob name for an overflowed message: `<timestamp>-<message id>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferenceId(String);

impl ReferenceId {
    /// Compose a reference id from the creation time and message id.
    pub fn compose(
        format: &ReferenceIdFormat,
        created_at: &DateTime<Utc>,
        message_id: &MessageId,
    ) -> Result<Self, TypeError> {
        let stamp = format.format_timestamp(created_at)?;
        Ok(Self(format!("{stamp}-{message_id}")))
    }

    /// Parse a reference id received from the wire.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let id = Self(s.to_string());
        id.split()?;
        Ok(id)
    }

    fn split(&self) -> Result<(&str, MessageId), TypeError> {
        let s = self.0.as_str();
        if s.len() < UUID_TEXT_LEN + 2 || !s.is_char_boundary(s.len() - UUID_TEXT_LEN) {
            return Err(TypeError::InvalidReferenceId(s.to_string()));
        }
        let (head, tail) = s.split_at(s.len() - UUID_TEXT_LEN);
        let stamp = head
            .strip_suffix('-')
            .filter(|stamp| !stamp.is_empty())
            .ok_or_else(|| TypeError::InvalidReferenceId(s.to_string()))?;
        let message_id = tail
            .parse()
            .map_err(|_| TypeError::InvalidReferenceId(s.to_string()))?;
        Ok((stamp, message_id))
    }

    /// The full reference id text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The sortable timestamp prefix.
    pub fn timestamp_part(&self) -> Option<&str> {
        self.split().ok().map(|(stamp, _)| stamp)
    }

    /// The message id suffix.
    pub fn message_id_part(&self) -> Option<MessageId> {
        self.split().ok().map(|(_, id)| id)
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ReferenceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Small stand-in message pointing at a payload spilled to blob storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// Identity of the message whose body lives in the blob.
    pub message_id: MessageId,
    /// Contract name of the spilled payload.
    pub contract: String,
    /// Location of the blob container holding the body.
    pub container: String,
    /// Blob name inside `container`.
    pub reference_id: ReferenceId,
}

impl ReferenceRecord {
    pub fn new(
        message_id: MessageId,
        contract: impl Into<String>,
        container: impl Into<String>,
        reference_id: ReferenceId,
    ) -> Self {
        Self {
            message_id,
            contract: contract.into(),
            container: container.into(),
            reference_id,
        }
    }
}
