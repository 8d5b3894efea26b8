//! Protocol envelope model
//!
//! Messages are immutable values: playback builds new ones instead of
//! editing recorded messages in place.

mod content;
mod header;

use bytes::Bytes;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::PlaybackError;

pub use content::{CommClose, CommMsg, CommOpen, Content, COMM_CLOSE, COMM_MSG, COMM_OPEN};
pub use header::{Header, Timestamp};

/// Protocol version stamped on newly built headers
pub const PROTOCOL_VERSION: &str = "5.3";

/// A protocol message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireMessage")]
pub struct Message {
    /// Identity of this message
    pub header: Header,
    /// Payload
    pub content: Content,
    /// Header of the request this message answers
    #[serde(serialize_with = "serialize_parent_header")]
    pub parent_header: Option<Header>,
    /// HMAC signature
    pub signature: String,
    /// Free-form metadata
    pub metadata: Value,
    /// Routing identities
    pub identifiers: Vec<Bytes>,
    /// Binary buffers
    pub buffers: Vec<Bytes>,
    /// Socket channel, e.g. `shell` or `iopub`
    pub channel: String,
}

impl Message {
    /// Create a message with no parent on the `shell` channel
    #[must_use]
    pub fn new(header: Header, content: Content) -> Self {
        Self {
            header,
            content,
            parent_header: None,
            signature: String::new(),
            metadata: Value::Object(serde_json::Map::new()),
            identifiers: Vec::new(),
            buffers: Vec::new(),
            channel: "shell".to_string(),
        }
    }

    /// Create a message answering the request identified by `parent`
    #[must_use]
    pub fn reply_to(parent: &Header, header: Header, content: Content) -> Self {
        Self {
            parent_header: Some(parent.clone()),
            ..Self::new(header, content)
        }
    }

    /// Same message on another channel
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Message type from the header
    pub fn msg_type(&self) -> &str {
        &self.header.msg_type
    }
}

/// JSON shape of a message as found in recordings
#[derive(Deserialize)]
struct WireMessage {
    header: Header,
    #[serde(default)]
    parent_header: Value,
    #[serde(default)]
    content: Value,
    #[serde(default)]
    signature: String,
    #[serde(default = "empty_object")]
    metadata: Value,
    #[serde(default)]
    identifiers: Vec<Bytes>,
    #[serde(default)]
    buffers: Vec<Bytes>,
    #[serde(default)]
    channel: String,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl TryFrom<WireMessage> for Message {
    type Error = PlaybackError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        // The wire format uses `{}` for "no parent"
        let parent_header = match wire.parent_header {
            Value::Null => None,
            Value::Object(ref map) if map.is_empty() => None,
            other => Some(serde_json::from_value(other).map_err(|e| {
                PlaybackError::InvalidMessage(format!(
                    "parent_header of {}: {e}",
                    wire.header.msg_id
                ))
            })?),
        };

        let content = Content::from_wire(&wire.header.msg_type, wire.content)?;

        Ok(Self {
            header: wire.header,
            content,
            parent_header,
            signature: wire.signature,
            metadata: wire.metadata,
            identifiers: wire.identifiers,
            buffers: wire.buffers,
            channel: wire.channel,
        })
    }
}

#[allow(clippy::ref_option)]
fn serialize_parent_header<S>(parent: &Option<Header>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match parent {
        Some(header) => header.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}
