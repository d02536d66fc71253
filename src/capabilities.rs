//! Capability detection, replacing the "if VAD_AVAILABLE" dynamic-import
//! pattern with an explicit value callers thread through construction.

use std::path::Path;

/// Which VAD back-end is active. Every component that can run with either
/// back-end takes one of these as a constructor argument instead of
/// probing for it itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadCapability {
    /// Neural (ONNX Silero) VAD model loaded and ready.
    Neural,
    /// No neural model available; energy-threshold fallback only.
    EnergyOnly,
}

impl VadCapability {
    pub fn is_neural(self) -> bool {
        matches!(self, Self::Neural)
    }
}

/// Snapshot of optional capabilities resolved once at startup.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub vad: VadCapability,
}

/// Probe the environment for optional capabilities.
///
/// `model_dir` is searched for `silero_vad.onnx`; if the `onnx` feature is
/// compiled out or the model file is absent, the neural VAD capability is
/// reported unavailable and every caller degrades consistently instead of
/// discovering it mid-operation.
pub fn detect_capabilities(model_dir: &Path) -> Capabilities {
    let vad = if cfg!(feature = "onnx") && model_dir.join("silero_vad.onnx").exists() {
        VadCapability::Neural
    } else {
        VadCapability::EnergyOnly
    };
    Capabilities { vad }
}
