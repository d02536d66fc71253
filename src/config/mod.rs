//! Configuration: behavior thresholds, paths, and JSON file loading.
//!
//! Mirrors the teacher crate's `read_voice_settings` pattern — a single
//! JSON file under the platform data directory, deserialized with
//! `#[serde(default)]` fields so partial/missing config degrades to
//! documented defaults rather than failing to start.

pub mod paths;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use paths::get_data_dir;

fn default_sample_rate() -> u32 {
    16_000
}
fn default_channels() -> u16 {
    1
}
fn default_vad_chunk_ms() -> u32 {
    20
}
fn default_barge_in_aggressiveness() -> u8 {
    2
}
fn default_barge_in_min_speech_ms() -> u32 {
    150
}
fn default_volume() -> u8 {
    50
}
fn default_true() -> bool {
    true
}
fn default_socket_path() -> String {
    "/tmp/voicemode-mpv.sock".to_string()
}

/// Top-level runtime configuration, read from `<data_dir>/voice_config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VoiceCoreConfig {
    #[serde(default = "default_true")]
    pub barge_in_enabled: bool,

    #[serde(default = "default_barge_in_aggressiveness")]
    pub barge_in_vad_aggressiveness: u8,

    #[serde(default = "default_barge_in_min_speech_ms")]
    pub barge_in_min_speech_ms: u32,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_channels")]
    pub channels: u16,

    #[serde(default = "default_vad_chunk_ms")]
    pub vad_chunk_duration_ms: u32,

    #[serde(default = "default_volume")]
    pub default_volume: u8,

    /// Path to the recognizer model (ggml whisper.cpp model file).
    #[serde(default)]
    pub recognizer_model_path: Option<PathBuf>,

    /// Base directory for TTS/STT audio artifacts (see `symlinks`).
    #[serde(default)]
    pub audio_base_dir: Option<PathBuf>,

    /// Path to the media-player IPC socket.
    #[serde(default = "default_socket_path")]
    pub media_player_socket: String,
}

impl Default for VoiceCoreConfig {
    fn default() -> Self {
        Self {
            barge_in_enabled: default_true(),
            barge_in_vad_aggressiveness: default_barge_in_aggressiveness(),
            barge_in_min_speech_ms: default_barge_in_min_speech_ms(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            vad_chunk_duration_ms: default_vad_chunk_ms(),
            default_volume: default_volume(),
            recognizer_model_path: None,
            audio_base_dir: None,
            media_player_socket: default_socket_path(),
        }
    }
}

impl VoiceCoreConfig {
    /// Resolve the audio artifact base directory, falling back to the
    /// platform data directory's `audio` subfolder.
    pub fn audio_dir(&self) -> PathBuf {
        self.audio_base_dir
            .clone()
            .unwrap_or_else(paths::get_audio_dir)
    }
}

/// Read `voice_config.json` from the platform data directory.
///
/// Missing or unparseable config silently degrades to `Default::default()`
/// (consistent with the teacher's `read_voice_settings`); a parse error is
/// logged at `warn` so the operator can notice a malformed file.
pub fn read_voice_config() -> VoiceCoreConfig {
    read_voice_config_from(&get_data_dir().join("voice_config.json"))
}

pub fn read_voice_config_from(path: &Path) -> VoiceCoreConfig {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                VoiceCoreConfig::default()
            }
        },
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to read {}: {}", path.display(), e);
            }
            VoiceCoreConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = read_voice_config_from(Path::new("/nonexistent/voice_config.json"));
        assert!(cfg.barge_in_enabled);
        assert_eq!(cfg.sample_rate, 16_000);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voice_config.json");
        std::fs::write(&path, r#"{"barge_in_min_speech_ms": 300}"#).unwrap();
        let cfg = read_voice_config_from(&path);
        assert_eq!(cfg.barge_in_min_speech_ms, 300);
        assert_eq!(cfg.default_volume, 50);
    }
}
