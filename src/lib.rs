//! msgplay - deterministic playback of recorded request/reply sessions
//!
//! Impersonates the remote peer of a Jupyter-style messaging protocol by
//! answering live requests with replies taken from a recording. Recorded
//! replies are correlated to live requests by message type, and their parent
//! header and comm ids are re-stamped so the client under test accepts them.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod error;
pub mod message;
pub mod playback;
pub mod recording;

pub use error::{PlaybackError, Result};
