//! Message envelope header

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PROTOCOL_VERSION;
use crate::{PlaybackError, Result};

/// Header creation time, kept as the exact text found on the wire
///
/// Recorded headers are replayed verbatim, so the text is never normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    /// Current UTC time in RFC 3339 form
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    /// Text as recorded
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the text; a date without an offset is taken as UTC
    ///
    /// # Errors
    ///
    /// Returns error if the text is not an ISO 8601 date-time
    pub fn parse(&self) -> Result<DateTime<FixedOffset>> {
        if let Ok(date) = DateTime::parse_from_rfc3339(&self.0) {
            return Ok(date);
        }

        NaiveDateTime::parse_from_str(&self.0, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc().fixed_offset())
            .map_err(|e| PlaybackError::InvalidMessage(format!("date '{}': {e}", self.0)))
    }
}

impl From<&str> for Timestamp {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

/// Identity and role of a protocol message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Message type, e.g. `execute_request`
    pub msg_type: String,
    /// Unique message id
    pub msg_id: String,
    /// Protocol version
    #[serde(default)]
    pub version: String,
    /// Session id
    #[serde(default)]
    pub session: String,
    /// Originating user
    #[serde(default)]
    pub username: String,
    /// Creation time
    pub date: Timestamp,
}

impl Header {
    /// Create a header with a fresh id, stamped now
    #[must_use]
    pub fn new(msg_type: impl Into<String>, session: impl Into<String>) -> Self {
        Self {
            msg_type: msg_type.into(),
            msg_id: Uuid::new_v4().to_string(),
            version: PROTOCOL_VERSION.to_string(),
            session: session.into(),
            username: "msgplay".to_string(),
            date: Timestamp::now(),
        }
    }

    /// Copy of this header carrying a different message id
    #[must_use]
    pub fn with_msg_id(&self, msg_id: impl Into<String>) -> Self {
        Self {
            msg_id: msg_id.into(),
            ..self.clone()
        }
    }
}
