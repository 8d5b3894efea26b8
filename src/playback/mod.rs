//! Playback of recorded replies against live requests

mod correlate;
mod engine;
mod subject;

use std::sync::Arc;

use crate::message::Message;
use crate::Result;

pub use correlate::{build_reply, correlate, rewrite_content};
pub use engine::MessagePlayback;
pub use subject::{Subject, Subscription};

/// How the playback loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    /// Stopped on cancellation
    Succeeded,
    /// Stopped on an error, with its description
    Failed(String),
}

/// Playback loop state
///
/// `Running` and `Draining` alternate until the loop stops; `Stopped` is
/// final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting for requests
    Running,
    /// Emitting the replies of one request
    Draining,
    /// Finished
    Stopped(LoopOutcome),
}

impl LoopState {
    /// Whether the loop has finished
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped(_))
    }
}

/// Playback counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    /// Requests passed to `send`
    pub requests: usize,
    /// Replies published to subscribers
    pub replies_emitted: usize,
    /// Requests the recording had no replies for
    pub unmatched: usize,
    /// Recorded messages not yet consumed
    pub remaining: usize,
}

/// Outgoing half of a kernel transport
pub trait MessageSender: Send + Sync {
    /// Send a message to the peer
    ///
    /// # Errors
    ///
    /// Returns error if the transport cannot take the message
    fn send(&self, message: Message) -> Result<()>;
}

/// Incoming half of a kernel transport
pub trait MessageReceiver: Send + Sync {
    /// Subscribe to messages from the peer
    fn messages(&self) -> Subscription<Message>;
}

/// A transport that can be wired to a sender/receiver pair
pub trait MessageTracker: MessageSender + MessageReceiver {
    /// Attach the underlying connections
    fn attach(&self, sender: Arc<dyn MessageSender>, receiver: Arc<dyn MessageReceiver>);
}
