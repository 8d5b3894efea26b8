//! Reading recordings from disk

use std::path::Path;

use tracing::info;

use crate::message::Message;
use crate::{PlaybackError, Result};

/// Parse a recording from JSON text
///
/// Accepts either a JSON array of messages or newline-delimited JSON with
/// one message per line. Blank lines are ignored.
///
/// # Errors
///
/// Returns error if any message fails to parse
pub fn from_json_str(text: &str) -> Result<Vec<Message>> {
    if text.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(text)?);
    }

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| PlaybackError::InvalidMessage(format!("line {}: {e}", i + 1)))
        })
        .collect()
}

/// Load a recording file
///
/// # Errors
///
/// Returns error if the file is missing, unreadable or malformed
pub fn load_file(path: &Path) -> Result<Vec<Message>> {
    if !path.exists() {
        return Err(PlaybackError::FileNotFound(path.display().to_string()));
    }

    let text = std::fs::read_to_string(path)?;
    let messages = from_json_str(&text)?;

    info!(
        "Loaded recording '{}': {} messages",
        path.display(),
        messages.len()
    );

    Ok(messages)
}
