//! Voice activity detection: neural (Silero/ONNX) with an energy-threshold
//! fallback, selected once via [`crate::capabilities::VadCapability`] rather
//! than probed per call.

pub mod energy;
pub mod silero;

use std::path::Path;

use crate::capabilities::VadCapability;
use silero::SileroVad;

/// Sample rate the VAD model and energy fallback both expect.
pub const VAD_SAMPLE_RATE: u32 = 16_000;

/// A VAD window is evaluated over fixed-duration chunks; 20 ms is the
/// default configured chunk duration (`vad_chunk_duration_ms`).
pub const DEFAULT_CHUNK_DURATION_MS: u32 = 20;

/// Stateful VAD engine wrapping the neural/energy backends behind one
/// `process` call. Aggressiveness (0..=3) only affects the energy
/// fallback's threshold; the neural model's probability threshold is fixed.
pub struct VadEngine {
    inner: SileroVad,
    capability: VadCapability,
    aggressiveness: u8,
}

impl VadEngine {
    /// Construct a VAD engine. If `capability` is `Neural`, attempts to load
    /// the model from `model_dir`; on load failure, falls back to energy
    /// detection for the lifetime of this engine (consistent with the
    /// teacher's per-instance capability, not re-probed on every call).
    pub fn new(capability: VadCapability, model_dir: &Path, aggressiveness: u8) -> Self {
        let mut inner = SileroVad::new();
        if capability.is_neural() {
            inner.load(model_dir);
        }
        Self {
            inner,
            capability,
            aggressiveness,
        }
    }

    pub fn capability(&self) -> VadCapability {
        self.capability
    }

    /// Reset any stateful model buffers (LSTM hidden state), used at the
    /// start of a new listening/recording session.
    pub fn reset(&mut self) {
        self.inner.reset();
    }

    /// Evaluate a 16 kHz mono f32 chunk. Returns `(is_speech, score)` where
    /// `score` is a speech probability (neural) or energy level (fallback).
    pub fn process(&mut self, chunk_16k: &[f32]) -> (bool, f32) {
        self.inner.process(chunk_16k, self.aggressiveness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn energy_only_engine_flags_loud_chunk_as_speech() {
        let mut engine = VadEngine::new(VadCapability::EnergyOnly, &PathBuf::from("/nonexistent"), 2);
        let loud = vec![0.5f32; 320];
        let (is_speech, _score) = engine.process(&loud);
        assert!(is_speech);
    }

    #[test]
    fn energy_only_engine_flags_silence_as_not_speech() {
        let mut engine = VadEngine::new(VadCapability::EnergyOnly, &PathBuf::from("/nonexistent"), 2);
        let silence = vec![0.0f32; 320];
        let (is_speech, _score) = engine.process(&silence);
        assert!(!is_speech);
    }

    #[test]
    fn higher_aggressiveness_requires_more_energy() {
        let mut lenient = VadEngine::new(VadCapability::EnergyOnly, &PathBuf::from("/nonexistent"), 0);
        let mut strict = VadEngine::new(VadCapability::EnergyOnly, &PathBuf::from("/nonexistent"), 3);
        let moderate = vec![0.01f32; 320];
        let (lenient_speech, _) = lenient.process(&moderate);
        let (strict_speech, _) = strict.process(&moderate);
        assert!(lenient_speech);
        assert!(!strict_speech);
    }
}
