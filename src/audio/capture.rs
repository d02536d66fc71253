//! Audio capture via cpal.
//!
//! Opens an input device at its native sample rate and pushes mono i16
//! frames into a ring buffer at that native rate — no fixed resampling
//! happens on the capture thread. VAD-facing consumers resample their own
//! 16 kHz copy from the native-rate samples (§4.1/§4.2); the native-rate
//! samples themselves flow on to the recognizer and the Recording result.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use tracing::{error, info};

use super::ring_buffer::AudioProducer;
use crate::error::VoiceError;

/// List available input device names.
pub fn list_devices() -> Vec<String> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    if let Ok(devices) = host.input_devices() {
        for dev in devices {
            if let Ok(name) = dev.name() {
                names.push(name);
            }
        }
    }
    names
}

/// List available output device names.
pub fn list_output_devices() -> Vec<String> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    if let Ok(devices) = host.output_devices() {
        for dev in devices {
            if let Ok(name) = dev.name() {
                names.push(name);
            }
        }
    }
    names
}

/// Resolved info about the audio input we will use.
pub struct CaptureConfig {
    device: cpal::Device,
    stream_config: StreamConfig,
    sample_format: cpal::SampleFormat,
    pub native_rate: u32,
    pub channels: u16,
}

/// Find and configure the input device, discovering its native sample rate
/// rather than forcing a fixed one.
pub fn resolve_device(device_name: Option<&str>) -> Result<CaptureConfig, VoiceError> {
    let host = cpal::default_host();

    let device = if let Some(name) = device_name {
        host.input_devices()
            .map_err(|e| VoiceError::DeviceUnavailable(format!("enumerate input devices: {e}")))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| VoiceError::DeviceUnavailable(format!("input device not found: {name}")))?
    } else {
        host.default_input_device()
            .ok_or_else(|| VoiceError::DeviceUnavailable("no default input device".into()))?
    };

    let dev_name = device.name().unwrap_or_else(|_| "unknown".into());
    info!(device = %dev_name, "Selected input device");

    let default_config = device
        .default_input_config()
        .map_err(|e| VoiceError::DeviceUnavailable(format!("default input config: {e}")))?;

    let native_rate = default_config.sample_rate().0;
    let channels = default_config.channels();
    let sample_format = default_config.sample_format();

    let stream_config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(native_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    info!(
        native_rate,
        channels,
        ?sample_format,
        "Input device native configuration resolved"
    );

    Ok(CaptureConfig {
        device,
        stream_config,
        sample_format,
        native_rate,
        channels,
    })
}

/// Linear resampler from `from_rate` to `to_rate`. Operates on mono f32 samples.
pub fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return input.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((input.len() as f64) / ratio).floor() as usize;
    let mut output = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src_idx = i as f64 * ratio;
        let idx0 = src_idx.floor() as usize;
        let frac = (src_idx - idx0 as f64) as f32;
        let s0 = input.get(idx0).copied().unwrap_or(0.0);
        let s1 = input.get(idx0 + 1).copied().unwrap_or(s0);
        output.push(s0 + frac * (s1 - s0));
    }
    output
}

/// Down-mix multi-channel i16 audio to mono by averaging channels.
pub fn to_mono_i16(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let ch = channels as usize;
    samples
        .chunks_exact(ch)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / ch as i32) as i16
        })
        .collect()
}

/// Convert i16 PCM to normalized f32 in [-1.0, 1.0].
pub fn i16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Convert normalized f32 in [-1.0, 1.0] back to i16 PCM.
pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect()
}

/// Resample native-rate i16 PCM down to 16 kHz f32, for VAD consumption.
pub fn resample_to_vad_rate(native: &[i16], native_rate: u32) -> Vec<f32> {
    let as_f32 = i16_to_f32(native);
    resample_linear(&as_f32, native_rate, crate::vad::VAD_SAMPLE_RATE)
}

/// Down-mix multi-channel f32 audio to mono by averaging channels.
fn to_mono_f32(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let ch = channels as usize;
    samples
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

fn push_mono_i16(producer: &mut AudioProducer, mono: &[i16]) {
    let written = producer.push_slice(mono);
    if written < mono.len() {
        // Ring buffer full — oldest audio is effectively lost;
        // the consumer will simply catch up from here.
    }
}

/// Start audio capture. Returns the cpal `Stream` (must be kept alive for
/// the duration of capture) plus the resolved native rate.
///
/// Samples are down-mixed to mono at the device's native rate and pushed
/// into the ring buffer producer as i16 — no resampling happens here. cpal's
/// default input format varies by backend (CoreAudio and many ALSA/WASAPI
/// defaults report `f32`), so the callback is built to match whatever format
/// the device actually reports rather than forcing `i16`, converting f32
/// samples down to i16 for the ring buffer as the teacher does.
pub fn start_capture(
    mut producer: AudioProducer,
    device_name: Option<&str>,
) -> Result<(Stream, u32), VoiceError> {
    let cfg = resolve_device(device_name)?;
    let channels = cfg.channels;
    let native_rate = cfg.native_rate;
    let needs_downmix = channels > 1;

    let stream = match cfg.sample_format {
        cpal::SampleFormat::F32 => cfg
            .device
            .build_input_stream(
                &cfg.stream_config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    let mono = if needs_downmix {
                        to_mono_f32(data, channels)
                    } else {
                        data.to_vec()
                    };
                    push_mono_i16(&mut producer, &f32_to_i16(&mono));
                },
                move |err| {
                    error!("Audio input stream error: {}", err);
                },
                None,
            )
            .map_err(|e| VoiceError::DeviceUnavailable(format!("build input stream: {e}")))?,
        cpal::SampleFormat::I16 => cfg
            .device
            .build_input_stream(
                &cfg.stream_config,
                move |data: &[i16], _info: &cpal::InputCallbackInfo| {
                    let mono = if needs_downmix {
                        to_mono_i16(data, channels)
                    } else {
                        data.to_vec()
                    };
                    push_mono_i16(&mut producer, &mono);
                },
                move |err| {
                    error!("Audio input stream error: {}", err);
                },
                None,
            )
            .map_err(|e| VoiceError::DeviceUnavailable(format!("build input stream: {e}")))?,
        other => {
            return Err(VoiceError::DeviceUnavailable(format!(
                "unsupported input sample format: {other:?}"
            )))
        }
    };

    stream
        .play()
        .map_err(|e| VoiceError::DeviceUnavailable(format!("start input stream: {e}")))?;

    info!(native_rate, "Audio capture started");

    Ok((stream, native_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_identity_when_rates_match() {
        let input = vec![0.1, 0.2, 0.3, 0.4];
        let out = resample_linear(&input, 16_000, 16_000);
        assert_eq!(out, input);
    }

    #[test]
    fn resample_halves_length_for_double_rate() {
        let input = vec![0.0; 320]; // 20ms at 32kHz
        let out = resample_linear(&input, 32_000, 16_000);
        assert_eq!(out.len(), 160);
    }

    #[test]
    fn downmix_averages_channels() {
        let stereo = vec![100i16, 200, 300, 400];
        let mono = to_mono_i16(&stereo, 2);
        assert_eq!(mono, vec![150, 350]);
    }

    #[test]
    fn downmix_f32_averages_channels() {
        let stereo = vec![0.1f32, 0.3, 0.2, 0.4];
        let mono = to_mono_f32(&stereo, 2);
        assert_eq!(mono, vec![0.2, 0.3]);
    }

    #[test]
    fn mono_passthrough_unchanged() {
        let samples = vec![1i16, 2, 3];
        assert_eq!(to_mono_i16(&samples, 1), samples);
    }

    #[test]
    fn i16_f32_round_trip_is_close() {
        let samples = vec![0i16, 16384, -16384, 32767, -32768];
        let f = i16_to_f32(&samples);
        let back = f32_to_i16(&f);
        for (a, b) in samples.iter().zip(back.iter()) {
            assert!((*a as i32 - *b as i32).abs() <= 1);
        }
    }
}
