//! Conversation turn controller: composes playback, the barge-in monitor,
//! the endpointing recorder, and the single-shot recognizer into one
//! "speak -> listen" exchange, with an alternate mode that swaps the
//! listen half for the cassette-deck stream-capture engine.
//!
//! No direct Python file survived retrieval (`core.py`'s `converse()` was
//! cut by the retrieval cap) — grounded on the teacher's `main.rs` audio
//! processing loop (silence-timeout recording, `run_stt_and_emit`,
//! `speak_text`'s poll-until-empty-or-cancelled pattern) generalized into
//! the explicit sequence spec §4.7 describes, composing
//! `endpointing`/`barge_in`/`stream_capture` instead of the teacher's
//! wake-word-triggered loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::barge_in::BargeInMonitor;
use crate::capabilities::VadCapability;
use crate::endpointing::{self, EndpointingParams};
use crate::error::VoiceError;
use crate::playback::{self, PlaybackHandle};
use crate::recognizer::{self, RecognizerConfig};
use crate::stream_capture::{self, CaptureResult, StreamCaptureConfig};
use crate::synthesizer::{AudioFormat, Synthesizer};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// What the turn produced when the caller doesn't want a transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// `wait_for_response` was false: the message was spoken and the turn
    /// ended there.
    Spoken,
    /// The turn captured and transcribed a user reply.
    Transcript(String),
}

#[derive(Debug, Clone)]
pub struct TurnResult {
    pub outcome: TurnOutcome,
    /// Whether barge-in interrupted playback during this turn.
    pub barge_in_fired: bool,
}

/// Parameters that don't change turn-to-turn: device selection, model
/// paths, and the behavior thresholds from `VoiceCoreConfig`.
pub struct TurnConfig {
    pub device_name: Option<String>,
    pub model_dir: PathBuf,
    pub vad_capability: VadCapability,
    pub barge_in_enabled: bool,
    pub barge_in_vad_aggressiveness: u8,
    pub barge_in_min_speech_ms: u32,
    pub endpointing: EndpointingParams,
    pub recognizer: RecognizerConfig,
    pub synth_voice: String,
    pub synth_model: String,
    pub synth_speed: f32,
    pub synth_format: AudioFormat,
    pub playback_sample_rate: u32,
}

pub struct ConversationTurnController {
    synthesizer: Synthesizer,
    config: TurnConfig,
}

impl ConversationTurnController {
    pub fn new(synthesizer: Synthesizer, config: TurnConfig) -> Self {
        Self { synthesizer, config }
    }

    /// Barge-in requires the neural VAD (§4.4): the energy fallback is
    /// available but not accurate enough to arm mid-playback interruption.
    fn barge_in_available(&self) -> bool {
        self.config.barge_in_enabled && self.config.vad_capability.is_neural()
    }

    /// Speak `message`, optionally listen for a reply, and return the
    /// transcript. See spec §4.7 for the exact step sequence; deviations
    /// are documented in DESIGN.md.
    pub async fn converse(&self, message: &str, wait_for_response: bool) -> Result<TurnResult, VoiceError> {
        let samples = self
            .synthesizer
            .synthesize_pcm(
                message,
                &self.config.synth_voice,
                &self.config.synth_model,
                self.config.synth_format,
                self.config.synth_speed,
            )
            .await
            .map_err(|e| {
                warn!("Synthesis failed, degrading to text-only: {}", e);
                e
            })?;

        let handle = Arc::new(playback::play(
            samples,
            self.config.playback_sample_rate,
            self.config.device_name.as_deref(),
            None,
        )?);

        let mut monitor = if self.barge_in_available() {
            let playback_for_cb = Arc::clone(&handle);
            let mut m = BargeInMonitor::new(
                self.config.barge_in_vad_aggressiveness,
                self.config.barge_in_min_speech_ms,
                self.config.vad_capability,
                self.config.model_dir.clone(),
            )
            .with_device(self.config.device_name.clone());
            match m.start_monitoring(move || playback_for_cb.interrupt()) {
                Ok(()) => Some(m),
                Err(e) => {
                    info!("Barge-in unavailable for this turn: {}", e);
                    None
                }
            }
        } else {
            None
        };

        self.await_playback_or_barge_in(&handle, monitor.as_ref()).await;

        let barge_in_fired = monitor.as_ref().map(|m| m.voice_detected()).unwrap_or(false);
        let prefix = monitor.as_mut().and_then(|m| {
            m.stop_monitoring();
            let rate = m.captured_sample_rate();
            m.get_captured_audio().zip(rate)
        });

        if !wait_for_response {
            return Ok(TurnResult {
                outcome: TurnOutcome::Spoken,
                barge_in_fired,
            });
        }

        // Either the barge-in prefix or a fresh endpointing recording
        // supplies the audio, never both: the monitor is stopped before a
        // fresh recording starts, so there is nothing to concatenate.
        let (pcm, sample_rate) = match prefix {
            Some((prefix, rate)) => (prefix, rate),
            None => {
                let recording = endpointing::record_to_silence(
                    &self.config.endpointing,
                    self.config.vad_capability,
                    &self.config.model_dir,
                    self.config.device_name.as_deref(),
                    &|| false,
                    None,
                )?;
                (recording.samples, recording.sample_rate)
            }
        };

        let text = recognizer::transcribe(&self.config.recognizer, &pcm, sample_rate)
            .await
            .map_err(|e| {
                warn!("Recognizer failed mid-turn, discarding captured audio: {}", e);
                e
            })?;

        Ok(TurnResult {
            outcome: TurnOutcome::Transcript(text),
            barge_in_fired,
        })
    }

    /// Alternate mode: speak `message`, then replace the listen half with
    /// the cassette-deck stream-capture engine. Playback is not started
    /// again for the duration of capture.
    pub async fn converse_stream_capture(
        &self,
        message: &str,
        stream_config: &StreamCaptureConfig,
    ) -> Result<CaptureResult, VoiceError> {
        let samples = self
            .synthesizer
            .synthesize_pcm(
                message,
                &self.config.synth_voice,
                &self.config.synth_model,
                self.config.synth_format,
                self.config.synth_speed,
            )
            .await?;

        let handle = playback::play(
            samples,
            self.config.playback_sample_rate,
            self.config.device_name.as_deref(),
            None,
        )?;
        while handle.is_playing() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        stream_capture::stream_capture(stream_config).await
    }

    async fn await_playback_or_barge_in(&self, handle: &PlaybackHandle, monitor: Option<&BargeInMonitor>) {
        loop {
            if !handle.is_playing() {
                return;
            }
            if let Some(m) = monitor {
                if m.voice_detected() {
                    return;
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spoken_outcome_does_not_imply_barge_in() {
        let result = TurnResult {
            outcome: TurnOutcome::Spoken,
            barge_in_fired: false,
        };
        assert_eq!(result.outcome, TurnOutcome::Spoken);
        assert!(!result.barge_in_fired);
    }
}
