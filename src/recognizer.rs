//! Single-shot recognizer client: synchronous WAV-file transcription used
//! by the turn controller after endpointing (§6, distinct from the
//! streaming cassette-deck engine in `stream_capture`).

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{info, warn};

use crate::error::VoiceError;
use crate::stream_capture::parse_whisper_line;

pub struct RecognizerConfig {
    pub model_path: PathBuf,
    pub threads: u32,
}

impl RecognizerConfig {
    pub fn new(model_path: PathBuf) -> Self {
        Self {
            model_path,
            threads: 6,
        }
    }
}

/// Write `samples` (mono i16 PCM) to a temporary WAV file at `sample_rate`
/// and run the recognizer against it, returning the assembled transcript.
pub async fn transcribe(
    config: &RecognizerConfig,
    samples: &[i16],
    sample_rate: u32,
) -> Result<String, VoiceError> {
    if !config.model_path.exists() {
        return Err(VoiceError::RecognizerFailure(format!(
            "recognizer model not found: {}",
            config.model_path.display()
        )));
    }

    let wav_path = write_temp_wav(samples, sample_rate)?;
    let result = transcribe_wav_file(config, &wav_path).await;
    let _ = std::fs::remove_file(&wav_path);
    result
}

/// Run the recognizer against an already-materialized WAV file.
pub async fn transcribe_wav_file(config: &RecognizerConfig, wav_path: &Path) -> Result<String, VoiceError> {
    info!(path = %wav_path.display(), "Running single-shot recognizer");

    let output = Command::new("whisper-cli")
        .arg("-m")
        .arg(&config.model_path)
        .arg("-t")
        .arg(config.threads.to_string())
        .arg("-f")
        .arg(wav_path)
        .output()
        .await
        .map_err(|e| VoiceError::RecognizerFailure(format!("failed to spawn recognizer: {e}")))?;

    if !output.status.success() {
        return Err(VoiceError::RecognizerFailure(format!(
            "recognizer exited with {}",
            output.status
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let text = assemble_transcript(&stdout);
    if text.is_empty() {
        warn!("Recognizer produced no parseable lines");
        return Err(VoiceError::RecognizerFailure("no parseable output".into()));
    }

    Ok(text)
}

/// Join recognized segment text (or bare lines, for recognizers that don't
/// emit timestamp headers in single-shot mode) into one transcript.
fn assemble_transcript(stdout: &str) -> String {
    let parts: Vec<String> = stdout
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return None;
            }
            if let Some(seg) = parse_whisper_line(trimmed) {
                return Some(seg.text);
            }
            if trimmed.starts_with("###")
                || trimmed.starts_with("whisper")
                || trimmed.starts_with("main:")
                || trimmed.starts_with("init:")
                || trimmed == "[Start speaking]"
            {
                return None;
            }
            Some(trimmed.to_string())
        })
        .collect();
    parts.join(" ").trim().to_string()
}

fn write_temp_wav(samples: &[i16], sample_rate: u32) -> Result<PathBuf, VoiceError> {
    let path = std::env::temp_dir().join(format!("voicemode-{}.wav", uuid::Uuid::new_v4()));

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(&path, spec)
        .map_err(|e| VoiceError::RecognizerFailure(format!("failed to create WAV file: {e}")))?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| VoiceError::RecognizerFailure(format!("failed to write WAV sample: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| VoiceError::RecognizerFailure(format!("failed to finalize WAV file: {e}")))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_timestamped_and_bare_lines() {
        let stdout = "### Transcription 1 START | t0 = 0 ms | t1 = 1 ms\n\
             [00:00:00.000 --> 00:00:02.000] hello there\n\
             whisper_print_timings: noise\n";
        assert_eq!(assemble_transcript(stdout), "hello there");
    }

    #[test]
    fn empty_output_yields_empty_transcript() {
        assert_eq!(assemble_transcript(""), "");
    }

    #[test]
    fn write_temp_wav_round_trips_sample_count() {
        let samples = vec![0i16, 100, -100, 32000];
        let path = write_temp_wav(&samples, 16_000).unwrap();
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.len(), samples.len() as u32);
        let _ = std::fs::remove_file(&path);
    }
}
