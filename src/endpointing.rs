//! Endpointing recorder: blocking record-to-silence over the audio I/O
//! layer and VAD.
//!
//! No direct Python or teacher Rust file implements this; grounded on the
//! teacher's capture/ring-buffer pair, generalized into a blocking loop,
//! with the two-counter (`speech_ms`, `trailing_silence_ms`) bookkeeping
//! taken from `barge_in.py`'s speech-accumulation pattern applied to a
//! single-recorder instead of a monitor.

use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::audio::{self, ring_buffer};
use crate::capabilities::VadCapability;
use crate::error::VoiceError;
use crate::vad::VadEngine;

const CHUNK_DURATION_MS: u32 = 20;
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Result of a single `record_to_silence` call.
#[derive(Debug, Clone)]
pub struct Recording {
    pub samples: Vec<i16>,
    pub speech_detected: bool,
    pub sample_rate: u32,
}

/// Endpointing state for the terminal visualizer side channel. Purely
/// observational — must never influence the stop decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizerState {
    Waiting,
    Active,
    Silence,
}

#[derive(Debug, Clone)]
pub struct VisualizerFrame {
    pub elapsed_ms: u64,
    pub rms_level: f32,
    pub speech_detected: bool,
    pub trailing_silence_ms: u32,
    pub state: VisualizerState,
}

/// Parameters for a single record-to-silence invocation.
pub struct EndpointingParams {
    pub max_duration: Duration,
    pub min_duration: Duration,
    pub silence_threshold_ms: u32,
    pub vad_aggressiveness: u8,
}

/// Record microphone audio until max duration, post-speech silence, or an
/// external cancel. `cancel` is polled once per frame.
pub fn record_to_silence(
    params: &EndpointingParams,
    vad_capability: VadCapability,
    model_dir: &PathBuf,
    device_name: Option<&str>,
    cancel: &dyn Fn() -> bool,
    visualizer: Option<&Sender<VisualizerFrame>>,
) -> Result<Recording, VoiceError> {
    let (producer, mut consumer) = ring_buffer::audio_ring_buffer(None);
    let (_stream, native_rate) = audio::start_capture(producer, device_name)?;

    let mut vad = VadEngine::new(vad_capability, model_dir, params.vad_aggressiveness);
    let chunk_samples = (native_rate as u64 * CHUNK_DURATION_MS as u64 / 1000) as usize;

    let mut samples: Vec<i16> = Vec::new();
    let mut speech_detected = false;
    let mut trailing_silence_ms: u32 = 0;
    let start = Instant::now();

    loop {
        let elapsed = start.elapsed();

        if elapsed >= params.max_duration {
            info!("Endpointing stopped: max duration reached");
            break;
        }
        if cancel() {
            info!("Endpointing stopped: external cancel");
            break;
        }
        if speech_detected
            && elapsed >= params.min_duration
            && trailing_silence_ms >= params.silence_threshold_ms
        {
            info!(trailing_silence_ms, "Endpointing stopped: trailing silence threshold reached");
            break;
        }

        if consumer.available() < chunk_samples {
            thread::sleep(POLL_INTERVAL);
            continue;
        }

        let mut chunk = vec![0i16; chunk_samples];
        let read = consumer.pop_slice(&mut chunk);
        chunk.truncate(read);
        if chunk.is_empty() {
            continue;
        }

        let resampled = audio::resample_to_vad_rate(&chunk, native_rate);
        let (is_speech, score) = vad.process(&resampled);

        if is_speech {
            speech_detected = true;
            trailing_silence_ms = 0;
        } else if speech_detected {
            trailing_silence_ms += CHUNK_DURATION_MS;
        }

        samples.extend_from_slice(&chunk);

        if let Some(tx) = visualizer {
            let state = if !speech_detected {
                VisualizerState::Waiting
            } else if is_speech {
                VisualizerState::Active
            } else {
                VisualizerState::Silence
            };
            let _ = tx.send(VisualizerFrame {
                elapsed_ms: elapsed.as_millis() as u64,
                rms_level: score,
                speech_detected,
                trailing_silence_ms,
                state,
            });
        }
    }

    if !speech_detected {
        warn!("Endpointing recorder captured no speech");
    }

    Ok(Recording {
        samples,
        speech_detected,
        sample_rate: native_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visualizer_state_waiting_before_any_speech() {
        let frame = VisualizerFrame {
            elapsed_ms: 0,
            rms_level: 0.0,
            speech_detected: false,
            trailing_silence_ms: 0,
            state: VisualizerState::Waiting,
        };
        assert_eq!(frame.state, VisualizerState::Waiting);
    }

    #[test]
    fn recording_defaults_to_no_speech_when_empty() {
        let recording = Recording {
            samples: Vec::new(),
            speech_detected: false,
            sample_rate: 16_000,
        };
        assert!(!recording.speech_detected);
        assert!(recording.samples.is_empty());
    }
}
