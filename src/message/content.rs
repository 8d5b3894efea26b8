//! Message content payloads
//!
//! Only comm payloads are modelled; every other kind is carried as opaque
//! JSON because playback never looks inside it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{PlaybackError, Result};

/// `comm_open` message type
pub const COMM_OPEN: &str = "comm_open";
/// `comm_msg` message type
pub const COMM_MSG: &str = "comm_msg";
/// `comm_close` message type
pub const COMM_CLOSE: &str = "comm_close";

/// Opens a comm channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommOpen {
    /// Channel id
    pub comm_id: String,
    /// Handler registered on the peer
    #[serde(default)]
    pub target_name: String,
    /// Payload
    #[serde(default)]
    pub data: Value,
}

/// Message on an open comm channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommMsg {
    /// Channel id
    pub comm_id: String,
    /// Payload
    #[serde(default)]
    pub data: Value,
}

/// Closes a comm channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommClose {
    /// Channel id
    pub comm_id: String,
    /// Payload
    #[serde(default)]
    pub data: Value,
}

/// Message payload, selected by the header's message type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Content {
    /// `comm_open`
    CommOpen(CommOpen),
    /// `comm_msg`
    CommMsg(CommMsg),
    /// `comm_close`
    CommClose(CommClose),
    /// Any other message kind
    Opaque(Value),
}

impl Content {
    /// Decode wire JSON according to `msg_type`
    ///
    /// # Errors
    ///
    /// Returns error if a comm payload lacks its required fields
    pub fn from_wire(msg_type: &str, value: Value) -> Result<Self> {
        let decode_err = |e: serde_json::Error| {
            PlaybackError::InvalidMessage(format!("{msg_type} content: {e}"))
        };

        match msg_type {
            COMM_OPEN => serde_json::from_value(value)
                .map(Self::CommOpen)
                .map_err(decode_err),
            COMM_MSG => serde_json::from_value(value)
                .map(Self::CommMsg)
                .map_err(decode_err),
            COMM_CLOSE => serde_json::from_value(value)
                .map(Self::CommClose)
                .map_err(decode_err),
            _ => Ok(Self::Opaque(value)),
        }
    }

    /// Comm channel id, if this is a comm payload
    pub fn comm_id(&self) -> Option<&str> {
        match self {
            Self::CommOpen(open) => Some(&open.comm_id),
            Self::CommMsg(msg) => Some(&msg.comm_id),
            Self::CommClose(close) => Some(&close.comm_id),
            Self::Opaque(_) => None,
        }
    }

    /// Short name of the payload kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CommOpen(_) => COMM_OPEN,
            Self::CommMsg(_) => COMM_MSG,
            Self::CommClose(_) => COMM_CLOSE,
            Self::Opaque(_) => "opaque",
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Self::Opaque(Value::Object(serde_json::Map::new()))
    }
}
