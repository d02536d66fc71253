//! Barge-in monitor: watches the microphone while synthesized speech plays
//! and fires a callback the instant the user starts talking.
//!
//! Directly grounded on `barge_in.py`'s `BargeInMonitor` — the
//! `threading.Event`/`Queue` pair becomes `AtomicBool` flags plus a
//! mutex-guarded buffer, and the monitoring thread becomes a
//! `std::thread::spawn` worker whose completion is awaited via a channel
//! with a 1 s timeout rather than an un-timed `Thread.join`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::audio::{self, ring_buffer};
use crate::capabilities::VadCapability;
use crate::error::VoiceError;
use crate::vad::VadEngine;

/// 20 ms frames, per §4.4's fixed chunk duration.
const CHUNK_DURATION_MS: u32 = 20;
const JOIN_TIMEOUT: Duration = Duration::from_secs(1);
const POLL_INTERVAL: Duration = Duration::from_millis(5);

pub struct BargeInMonitor {
    vad_aggressiveness: u8,
    min_speech_ms: u32,
    vad_capability: VadCapability,
    model_dir: PathBuf,
    device_name: Option<String>,

    stop_flag: Arc<AtomicBool>,
    voice_detected: Arc<AtomicBool>,
    callback_fired: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    audio_buffer: Arc<Mutex<Vec<i16>>>,
    captured_rate: Arc<AtomicU32>,

    worker: Option<JoinHandle<()>>,
    done_rx: Option<Receiver<()>>,
}

impl BargeInMonitor {
    pub fn new(
        vad_aggressiveness: u8,
        min_speech_ms: u32,
        vad_capability: VadCapability,
        model_dir: PathBuf,
    ) -> Self {
        debug!(
            vad_aggressiveness,
            min_speech_ms, "BargeInMonitor initialized"
        );
        Self {
            vad_aggressiveness,
            min_speech_ms,
            vad_capability,
            model_dir,
            device_name: None,
            stop_flag: Arc::new(AtomicBool::new(false)),
            voice_detected: Arc::new(AtomicBool::new(false)),
            callback_fired: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            audio_buffer: Arc::new(Mutex::new(Vec::new())),
            captured_rate: Arc::new(AtomicU32::new(0)),
            worker: None,
            done_rx: None,
        }
    }

    pub fn with_device(mut self, device_name: Option<String>) -> Self {
        self.device_name = device_name;
        self
    }

    /// Start the background monitoring worker. `on_voice_detected` runs
    /// inline on the worker thread and must do O(1) work (typically:
    /// interrupt a playback handle).
    pub fn start_monitoring<F>(&mut self, on_voice_detected: F) -> Result<(), VoiceError>
    where
        F: Fn() + Send + 'static,
    {
        if self.is_monitoring() {
            return Err(VoiceError::InvariantViolation(
                "barge-in monitor already active".into(),
            ));
        }

        if !self.vad_capability.is_neural() {
            // Matches the reference's ImportError-on-missing-webrtcvad: a
            // distinct unavailable error so the turn controller can disable
            // barge-in for this turn instead of degrading silently.
            return Err(VoiceError::VadUnavailable);
        }

        self.stop_flag.store(false, Ordering::SeqCst);
        self.voice_detected.store(false, Ordering::SeqCst);
        self.callback_fired.store(false, Ordering::SeqCst);
        self.audio_buffer.lock().unwrap().clear();

        let stop_flag = Arc::clone(&self.stop_flag);
        let voice_detected = Arc::clone(&self.voice_detected);
        let callback_fired = Arc::clone(&self.callback_fired);
        let running = Arc::clone(&self.running);
        let audio_buffer = Arc::clone(&self.audio_buffer);
        let captured_rate = Arc::clone(&self.captured_rate);
        let vad_aggressiveness = self.vad_aggressiveness;
        let model_dir = self.model_dir.clone();
        let vad_capability = self.vad_capability;
        let device_name = self.device_name.clone();
        let min_speech_ms = self.min_speech_ms;

        let (done_tx, done_rx) = mpsc::channel();

        info!(
            vad_aggressiveness,
            min_speech_ms, "Starting barge-in monitoring"
        );

        running.store(true, Ordering::SeqCst);
        let handle = thread::Builder::new()
            .name("barge-in-monitor".into())
            .spawn(move || {
                monitoring_loop(
                    device_name.as_deref(),
                    vad_capability,
                    &model_dir,
                    vad_aggressiveness,
                    min_speech_ms,
                    &stop_flag,
                    &voice_detected,
                    &callback_fired,
                    &audio_buffer,
                    &captured_rate,
                    &on_voice_detected,
                );
                running.store(false, Ordering::SeqCst);
                let _ = done_tx.send(());
            })
            .expect("failed to spawn barge-in monitor thread");

        self.worker = Some(handle);
        self.done_rx = Some(done_rx);
        Ok(())
    }

    /// Stop monitoring and wait for the worker with a 1 s timeout. Safe to
    /// call when never started, already stopped, or mid-trigger.
    pub fn stop_monitoring(&mut self) {
        if self.worker.is_none() {
            return;
        }

        debug!("Stopping barge-in monitoring");
        self.stop_flag.store(true, Ordering::SeqCst);

        if let Some(rx) = self.done_rx.take() {
            match rx.recv_timeout(JOIN_TIMEOUT) {
                Ok(()) => {}
                Err(_) => warn!("barge-in monitor did not stop cleanly within 1s"),
            }
        }

        self.worker = None;
        info!(
            voice_detected = self.voice_detected(),
            "Barge-in monitoring stopped"
        );
    }

    /// Concatenate the captured buffer. May be called once after stop.
    pub fn get_captured_audio(&self) -> Option<Vec<i16>> {
        let buf = self.audio_buffer.lock().unwrap();
        if buf.is_empty() {
            return None;
        }
        debug!(samples = buf.len(), "Returning captured barge-in audio");
        Some(buf.clone())
    }

    /// Native device sample rate the captured buffer was recorded at
    /// (the buffer holds un-resampled audio; only the VAD's copy is
    /// downsampled). `None` until the worker has opened its input stream.
    pub fn captured_sample_rate(&self) -> Option<u32> {
        match self.captured_rate.load(Ordering::SeqCst) {
            0 => None,
            rate => Some(rate),
        }
    }

    pub fn voice_detected(&self) -> bool {
        self.voice_detected.load(Ordering::SeqCst)
    }

    pub fn is_monitoring(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for BargeInMonitor {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

#[allow(clippy::too_many_arguments)]
fn monitoring_loop(
    device_name: Option<&str>,
    vad_capability: VadCapability,
    model_dir: &PathBuf,
    vad_aggressiveness: u8,
    min_speech_ms: u32,
    stop_flag: &AtomicBool,
    voice_detected: &AtomicBool,
    callback_fired: &AtomicBool,
    audio_buffer: &Mutex<Vec<i16>>,
    captured_rate: &AtomicU32,
    callback: &(dyn Fn() + Send),
) {
    let (producer, mut consumer) = ring_buffer::audio_ring_buffer(None);
    let (_stream, native_rate) = match audio::start_capture(producer, device_name) {
        Ok(pair) => pair,
        Err(e) => {
            error!("Failed to start barge-in audio stream: {}", e);
            return;
        }
    };
    captured_rate.store(native_rate, Ordering::SeqCst);

    let mut vad = VadEngine::new(vad_capability, model_dir, vad_aggressiveness);
    let chunk_samples = (native_rate as u64 * CHUNK_DURATION_MS as u64 / 1000) as usize;
    let mut speech_ms_accumulated: u32 = 0;

    debug!("Barge-in audio stream started");

    while !stop_flag.load(Ordering::SeqCst) {
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
        let (is_speech, _score) = vad.process(&resampled);

        let fired_already = callback_fired.load(Ordering::SeqCst);

        if is_speech {
            speech_ms_accumulated += CHUNK_DURATION_MS;
            audio_buffer.lock().unwrap().extend_from_slice(&chunk);

            if speech_ms_accumulated >= min_speech_ms && !fired_already {
                info!(
                    speech_ms_accumulated,
                    "Barge-in triggered"
                );
                voice_detected.store(true, Ordering::SeqCst);
                callback_fired.store(true, Ordering::SeqCst);

                if catch_unwind(AssertUnwindSafe(callback)).is_err() {
                    error!("Barge-in callback panicked; continuing worker");
                }
            }
        } else if !fired_already {
            speech_ms_accumulated = 0;
            audio_buffer.lock().unwrap().clear();
        } else {
            // Post-trigger: keep appending silence so the captured prefix
            // covers the full utterance onset (§9 Open Question 4).
            audio_buffer.lock().unwrap().extend_from_slice(&chunk);
        }
    }

    debug!("Barge-in monitoring loop ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_vad_refuses_to_start() {
        let mut monitor = BargeInMonitor::new(
            2,
            150,
            VadCapability::EnergyOnly,
            PathBuf::from("/nonexistent"),
        );
        let result = monitor.start_monitoring(|| {});
        assert!(matches!(result, Err(VoiceError::VadUnavailable)));
    }

    #[test]
    fn never_started_monitor_reports_not_monitoring() {
        let monitor = BargeInMonitor::new(
            2,
            150,
            VadCapability::Neural,
            PathBuf::from("/nonexistent"),
        );
        assert!(!monitor.is_monitoring());
        assert!(!monitor.voice_detected());
        assert!(monitor.get_captured_audio().is_none());
    }

    #[test]
    fn stop_without_start_is_a_no_op() {
        let mut monitor = BargeInMonitor::new(
            2,
            150,
            VadCapability::Neural,
            PathBuf::from("/nonexistent"),
        );
        monitor.stop_monitoring();
        monitor.stop_monitoring();
    }
}
