//! Public error kinds surfaced across component boundaries.
//!
//! Each component recovers locally from transient failures (dropped
//! frames, unparseable lines, occasional socket errors) by skipping and
//! continuing; only structural failures cross a boundary as a `VoiceError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoiceError {
    /// Capture or playback device open failed. Recoverable for the next turn.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Neural VAD missing; caller should fall back to energy detection or
    /// disable barge-in for this turn.
    #[error("VAD backend unavailable")]
    VadUnavailable,

    /// Recognizer subprocess crashed, exited non-zero, or produced no
    /// parseable lines.
    #[error("recognizer failure: {0}")]
    RecognizerFailure(String),

    /// Synthesizer HTTP error, timeout, or decode failure.
    #[error("synthesizer failure: {0}")]
    SynthesizerFailure(String),

    /// Media-player IPC socket missing/refused, or startup timed out.
    #[error("media player unreachable: {0}")]
    PlayerUnreachable(String),

    /// Unparseable recognizer line or invalid JSON from the player.
    /// Callers that see this should log at debug and continue; it is
    /// only constructed where a caller explicitly requested strict parsing.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A component invariant was violated (e.g. monitor started twice).
    /// Fatal to the component instance; callers must construct a new one.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type VoiceResult<T> = Result<T, VoiceError>;
