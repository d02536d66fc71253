//! Synthesizer HTTP client.
//!
//! Grounded on the teacher's `tts::cloud::OpenAiTts` (reqwest POST, bearer
//! auth, PCM response decode), generalized to the spec's generic
//! `{text, voice, model, format, speed}` request body, configurable audio
//! format, and the 30 s connect / 60 s total timeout budget instead of the
//! teacher's hardcoded `tts-1`/`pcm`.

use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::error::VoiceError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const TOTAL_TIMEOUT: Duration = Duration::from_secs(60);

/// Audio encodings the synthesizer endpoint may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
    Flac,
    Aac,
    Opus,
    Ogg,
    /// Raw signed 16-bit PCM, decoded directly without a container.
    Pcm,
}

impl AudioFormat {
    fn as_str(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Flac => "flac",
            Self::Aac => "aac",
            Self::Opus => "opus",
            Self::Ogg => "ogg",
            Self::Pcm => "pcm",
        }
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    voice: &'a str,
    model: &'a str,
    format: &'a str,
    speed: f32,
}

/// Client for a generic `/audio/speech`-shaped synthesizer endpoint.
pub struct Synthesizer {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl Synthesizer {
    /// `base_url` should point at the synthesizer's speech endpoint, e.g.
    /// `https://api.openai.com/v1/audio/speech`.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(TOTAL_TIMEOUT)
            .build()
            .expect("failed to build synthesizer HTTP client");

        Self {
            base_url: base_url.into(),
            api_key,
            client,
        }
    }

    /// Synthesize `text` and return decoded mono f32 PCM. `format` selects
    /// the wire encoding; `Pcm` is decoded as raw signed 16-bit samples,
    /// `Mp3` is decoded via `symphonia`, and other container formats are
    /// rejected (callers wanting them should use [`Self::synthesize_raw`]
    /// and decode themselves).
    pub async fn synthesize_pcm(
        &self,
        text: &str,
        voice: &str,
        model: &str,
        format: AudioFormat,
        speed: f32,
    ) -> Result<Vec<f32>, VoiceError> {
        let bytes = self.synthesize_raw(text, voice, model, format, speed).await?;

        let samples = match format {
            AudioFormat::Pcm => bytes
                .chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / 32768.0)
                .collect(),
            AudioFormat::Mp3 => decode_mp3_to_f32(&bytes)?,
            other => {
                return Err(VoiceError::SynthesizerFailure(format!(
                    "decoding {} is not supported; use synthesize_raw",
                    other.as_str()
                )))
            }
        };

        info!(samples = samples.len(), "Synthesizer PCM decode complete");
        Ok(samples)
    }

    /// Synthesize `text` and return the raw response bytes, undecoded.
    pub async fn synthesize_raw(
        &self,
        text: &str,
        voice: &str,
        model: &str,
        format: AudioFormat,
        speed: f32,
    ) -> Result<Vec<u8>, VoiceError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        info!(voice, model, format = format.as_str(), text_len = text.len(), "Synthesizer request");

        let body = SpeechRequest {
            text,
            voice,
            model,
            format: format.as_str(),
            speed,
        };

        let mut req = self.client.post(&self.base_url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| VoiceError::SynthesizerFailure(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(VoiceError::SynthesizerFailure(format!(
                "HTTP {status}: {body}"
            )));
        }

        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| VoiceError::SynthesizerFailure(format!("failed to read response: {e}")))
    }
}

/// Decode MP3 bytes to mono f32 PCM, ported from the Tauri crate's
/// `voice::tts::mp3_decode::decode_mp3_to_f32` (symphonia probe + decode
/// loop, downmixing multi-channel output by averaging) — `voice-core`'s
/// own cloud TTS client never finished this path.
fn decode_mp3_to_f32(mp3_bytes: &[u8]) -> Result<Vec<f32>, VoiceError> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let cursor = std::io::Cursor::new(mp3_bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("mp3");

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| VoiceError::SynthesizerFailure(format!("MP3 probe failed: {e}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| VoiceError::SynthesizerFailure("no audio track in MP3".into()))?;
    let track_id = track.id;
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| VoiceError::SynthesizerFailure(format!("MP3 decoder init failed: {e}")))?;

    let mut all_samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(VoiceError::SynthesizerFailure(format!("MP3 decode error: {e}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("MP3 packet decode error (skipping): {}", e);
                continue;
            }
        };
        let spec = *decoded.spec();
        let duration = decoded.capacity();
        let mut sample_buf = SampleBuffer::<f32>::new(duration as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let samples = sample_buf.samples();

        if channels == 1 {
            all_samples.extend_from_slice(samples);
        } else {
            for chunk in samples.chunks(channels) {
                let sum: f32 = chunk.iter().sum();
                all_samples.push(sum / channels as f32);
            }
        }
    }

    Ok(all_samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_strings_match_contract() {
        assert_eq!(AudioFormat::Mp3.as_str(), "mp3");
        assert_eq!(AudioFormat::Pcm.as_str(), "pcm");
        assert_eq!(AudioFormat::Ogg.as_str(), "ogg");
    }
}
