//! Non-blocking, interruptible playback engine.
//!
//! Grounded on the teacher's `tts::playback::AudioPlayer` (rodio `Sink`,
//! volume, stop/interrupt, the `unsafe impl Send` rationale for
//! `OutputStream`). The `on_interrupt` fire-at-most-once contract and the
//! `PlaybackHandle` wrapper are new — the teacher's `AudioPlayer` exposes
//! `stop()`/`is_playing()` but no callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait};
use rodio::{OutputStream, OutputStreamHandle, Sink};
use tracing::info;

use crate::error::VoiceError;

/// Bound on how long `stop()` waits for the in-flight buffer to flush.
const DRAIN_BOUND: Duration = Duration::from_millis(50);
const WATCH_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Interrupted,
    Done,
}

type InterruptCallback = Box<dyn FnOnce() + Send>;

/// Handle to an in-progress (or finished) playback. Owns the output stream
/// for its lifetime; dropping it tears down the audio output.
pub struct PlaybackHandle {
    _stream: OutputStream,
    _stream_handle: OutputStreamHandle,
    sink: Arc<Sink>,
    state: Arc<Mutex<PlaybackState>>,
    fired: Arc<AtomicBool>,
    on_interrupt: Arc<Mutex<Option<InterruptCallback>>>,
    watcher: Option<thread::JoinHandle<()>>,
}

impl PlaybackHandle {
    /// Immediate, idempotent interrupt. Fires `on_interrupt` at most once
    /// across any interleaving of `interrupt`/`stop`/natural completion;
    /// the callback runs before this call returns.
    pub fn interrupt(&self) {
        self.sink.stop();
        {
            let mut state = self.state.lock().unwrap();
            if *state != PlaybackState::Done {
                *state = PlaybackState::Interrupted;
            }
        }
        if self
            .fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            if let Some(cb) = self.on_interrupt.lock().unwrap().take() {
                cb();
            }
        }
    }

    /// Graceful stop: waits up to one buffer period for drain, then closes.
    /// Does not invoke `on_interrupt` — natural completion never does.
    pub fn stop(&self) {
        thread::sleep(DRAIN_BOUND);
        self.sink.stop();
        let mut state = self.state.lock().unwrap();
        if *state == PlaybackState::Playing {
            *state = PlaybackState::Done;
        }
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.lock().unwrap()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    pub fn set_volume(&self, volume: f32) {
        self.sink.set_volume(volume.clamp(0.0, 1.0));
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        if let Some(w) = self.watcher.take() {
            let _ = w.join();
        }
    }
}

// SAFETY: OutputStream carries a `PhantomData<*mut ()>` in cpal's platform
// abstraction that only exists to mark it non-Sync across its internal
// callback registration; we never touch the stream from more than one
// thread concurrently (the watcher thread only touches the Sink clone).
unsafe impl Send for PlaybackHandle {}

// SAFETY: shared via `Arc` so the turn controller can call `interrupt()`
// from a barge-in monitor's worker thread while the awaiting task polls
// `state()`; every method only goes through the `Arc`/`Mutex`-guarded
// fields above, never the raw `_stream` handle itself.
unsafe impl Sync for PlaybackHandle {}

/// Open an output device (or the system default) and begin playing `samples`
/// (mono f32 at `sample_rate`) without blocking the caller.
pub fn play(
    samples: Vec<f32>,
    sample_rate: u32,
    device_name: Option<&str>,
    on_interrupt: Option<InterruptCallback>,
) -> Result<PlaybackHandle, VoiceError> {
    let (stream, stream_handle) = open_output(device_name)?;

    let sink = Sink::try_new(&stream_handle)
        .map_err(|e| VoiceError::DeviceUnavailable(format!("create audio sink: {e}")))?;

    let source = rodio::buffer::SamplesBuffer::new(1, sample_rate, samples);
    sink.append(source);

    let sink = Arc::new(sink);
    let state = Arc::new(Mutex::new(PlaybackState::Playing));
    let fired = Arc::new(AtomicBool::new(false));
    let on_interrupt = Arc::new(Mutex::new(on_interrupt));

    let watcher = {
        let sink = Arc::clone(&sink);
        let state = Arc::clone(&state);
        let fired = Arc::clone(&fired);
        thread::Builder::new()
            .name("playback-watcher".into())
            .spawn(move || loop {
                if fired.load(Ordering::SeqCst) {
                    break;
                }
                if sink.empty() {
                    let mut st = state.lock().unwrap();
                    if *st == PlaybackState::Playing {
                        *st = PlaybackState::Done;
                    }
                    break;
                }
                thread::sleep(WATCH_POLL);
            })
            .expect("failed to spawn playback watcher thread")
    };

    info!(sample_rate, samples = "non-blocking", "Playback started");

    Ok(PlaybackHandle {
        _stream: stream,
        _stream_handle: stream_handle,
        sink,
        state,
        fired,
        on_interrupt,
        watcher: Some(watcher),
    })
}

fn open_output(
    device_name: Option<&str>,
) -> Result<(OutputStream, OutputStreamHandle), VoiceError> {
    if let Some(name) = device_name {
        let host = cpal::default_host();
        let device = host
            .output_devices()
            .map_err(|e| VoiceError::DeviceUnavailable(format!("enumerate output devices: {e}")))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false));

        if let Some(dev) = device {
            let dev_name = dev.name().unwrap_or_else(|_| "unknown".into());
            info!(device = %dev_name, "Selected output device");
            return OutputStream::try_from_device(&dev)
                .map_err(|e| VoiceError::DeviceUnavailable(format!("open output '{name}': {e}")));
        }
        info!(requested = %name, "Output device not found, falling back to default");
    }

    OutputStream::try_default()
        .map_err(|e| VoiceError::DeviceUnavailable(format!("open default audio output: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_guard_fires_exactly_once() {
        let calls = Arc::new(Mutex::new(0usize));
        let calls_clone = Arc::clone(&calls);
        let fired = Arc::new(AtomicBool::new(false));

        let guard_and_call = || {
            if fired
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                *calls_clone.lock().unwrap() += 1;
            }
        };

        guard_and_call();
        guard_and_call();
        guard_and_call();

        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
