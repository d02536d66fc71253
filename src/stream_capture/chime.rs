//! Short audio feedback played on cassette-deck state transitions (§4.6:
//! "play 'pause' feedback chime" / "resume chime" / "terminal chime").
//!
//! Grounded on the teacher's `tts::playback` non-blocking player — a chime
//! is just a short synthesized tone pushed through the same
//! [`crate::playback::play`] path the turn controller uses for speech, so
//! a single playback engine backs both.

use std::time::Duration;

use tracing::debug;

use crate::playback;

const CHIME_SAMPLE_RATE: u32 = 16_000;
/// Linear fade at each end avoids a click from a hard-edged tone.
const FADE_MS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChimeKind {
    Pause,
    Resume,
    Terminal,
}

impl ChimeKind {
    fn tone(self) -> (f32, u32) {
        match self {
            // Falling-ish/low tone: recording has paused.
            ChimeKind::Pause => (440.0, 90),
            // Higher tone: recording has resumed.
            ChimeKind::Resume => (660.0, 90),
            // Distinct two-tone-length beep for send/stop/play termination.
            ChimeKind::Terminal => (880.0, 140),
        }
    }
}

fn tone_samples(freq: f32, duration_ms: u32, sample_rate: u32) -> Vec<f32> {
    let n = (sample_rate as u64 * duration_ms as u64 / 1000) as usize;
    let fade_n = ((sample_rate as u64 * FADE_MS as u64 / 1000) as usize).min(n / 2);
    (0..n)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let mut amp = (2.0 * std::f32::consts::PI * freq * t).sin() * 0.2;
            if i < fade_n {
                amp *= i as f32 / fade_n.max(1) as f32;
            } else if i >= n - fade_n {
                amp *= (n - i) as f32 / fade_n.max(1) as f32;
            }
            amp
        })
        .collect()
}

/// Play `kind`'s chime on a blocking thread so the async read loop in
/// [`super::stream_capture`] never waits on it; failures (no output
/// device available, say, in a headless test runner) are logged and
/// otherwise ignored — a missed chime must never affect the state machine.
pub fn spawn_chime(device_name: Option<String>, kind: ChimeKind) {
    tokio::task::spawn_blocking(move || {
        if let Err(e) = play_blocking(device_name.as_deref(), kind) {
            debug!("chime playback skipped: {}", e);
        }
    });
}

fn play_blocking(device_name: Option<&str>, kind: ChimeKind) -> Result<(), crate::error::VoiceError> {
    let (freq, duration_ms) = kind.tone();
    let samples = tone_samples(freq, duration_ms, CHIME_SAMPLE_RATE);
    let handle = playback::play(samples, CHIME_SAMPLE_RATE, device_name, None)?;
    while handle.is_playing() {
        std::thread::sleep(Duration::from_millis(5));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_samples_has_expected_length() {
        let samples = tone_samples(440.0, 100, 16_000);
        assert_eq!(samples.len(), 1_600);
    }

    #[test]
    fn fade_in_starts_near_zero() {
        let samples = tone_samples(440.0, 100, 16_000);
        assert!(samples[0].abs() < 0.01);
    }

    #[test]
    fn each_kind_has_a_distinct_frequency() {
        let (pause_freq, _) = ChimeKind::Pause.tone();
        let (resume_freq, _) = ChimeKind::Resume.tone();
        let (terminal_freq, _) = ChimeKind::Terminal.tone();
        assert_ne!(pause_freq, resume_freq);
        assert_ne!(resume_freq, terminal_freq);
    }
}
