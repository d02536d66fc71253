//! Real-time voice-turn engine: capture, VAD, endpointing, barge-in,
//! playback, the cassette-deck stream-capture transcription engine, and
//! DJ media-player IPC control.
//!
//! Module layout mirrors the teacher crate's `voice-core` library: one
//! module per concern, composed by [`turn::ConversationTurnController`]
//! rather than a module-level singleton.

pub mod audio;
pub mod barge_in;
pub mod capabilities;
pub mod config;
pub mod dj;
pub mod endpointing;
pub mod error;
pub mod playback;
pub mod recognizer;
pub mod stream_capture;
pub mod symlinks;
pub mod synthesizer;
pub mod turn;
pub mod vad;

pub use error::{VoiceError, VoiceResult};
