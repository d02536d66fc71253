//! Thin demonstration binary: wires the library's components into a
//! runnable stdin/stdout conversational loop.
//!
//! Reads one line of text from stdin per turn, speaks it, listens for a
//! reply, and prints the transcript to stdout. This binary owns every
//! context value explicitly (model dir, device names, synthesizer client)
//! rather than reaching for module-level singletons.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use voicemode_core::capabilities::{detect_capabilities, VadCapability};
use voicemode_core::config::paths::get_data_dir;
use voicemode_core::config::read_voice_config;
use voicemode_core::endpointing::EndpointingParams;
use voicemode_core::recognizer::RecognizerConfig;
use voicemode_core::synthesizer::{AudioFormat, Synthesizer};
use voicemode_core::turn::{ConversationTurnController, TurnConfig, TurnOutcome};

#[tokio::main]
async fn main() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let data_dir = get_data_dir();
    let use_file = std::fs::create_dir_all(&data_dir).is_ok();

    let _guard: Option<tracing_appender::non_blocking::WorkerGuard>;
    if use_file {
        let file_appender = tracing_appender::rolling::never(&data_dir, "voicemode-core.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        _guard = Some(guard);
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(non_blocking)
            .with_ansi(false)
            .init();
    } else {
        _guard = None;
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = read_voice_config();
    let model_dir = data_dir.join("models");
    let capabilities = detect_capabilities(&model_dir);

    info!(
        vad = ?capabilities.vad,
        barge_in_enabled = config.barge_in_enabled,
        "VoiceMode core starting"
    );

    let recognizer_model = config
        .recognizer_model_path
        .clone()
        .unwrap_or_else(|| model_dir.join("ggml-base.en.bin"));

    let synthesizer = Synthesizer::new(
        std::env::var("VOICEMODE_TTS_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8880/v1/audio/speech".to_string()),
        std::env::var("VOICEMODE_TTS_API_KEY").ok(),
    );

    let turn_config = TurnConfig {
        device_name: None,
        model_dir: model_dir.clone(),
        vad_capability: capabilities.vad,
        barge_in_enabled: config.barge_in_enabled,
        barge_in_vad_aggressiveness: config.barge_in_vad_aggressiveness,
        barge_in_min_speech_ms: config.barge_in_min_speech_ms,
        endpointing: EndpointingParams {
            max_duration: Duration::from_secs(30),
            min_duration: Duration::from_secs(0),
            silence_threshold_ms: 1_000,
            vad_aggressiveness: config.barge_in_vad_aggressiveness,
        },
        recognizer: RecognizerConfig::new(recognizer_model),
        synth_voice: "default".to_string(),
        synth_model: "tts-1".to_string(),
        synth_speed: 1.0,
        synth_format: AudioFormat::Pcm,
        playback_sample_rate: config.sample_rate,
    };

    if !matches!(capabilities.vad, VadCapability::Neural) && config.barge_in_enabled {
        warn!("Neural VAD unavailable; barge-in will be disabled for every turn");
    }

    let controller = ConversationTurnController::new(synthesizer, turn_config);

    println!("VoiceMode core ready. Type a line to speak it; Ctrl-D to exit.");
    print!("> ");
    let _ = io::stdout().flush();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let message = line.trim();
        if message.is_empty() {
            print!("> ");
            let _ = io::stdout().flush();
            continue;
        }

        match controller.converse(message, true).await {
            Ok(result) => match result.outcome {
                TurnOutcome::Transcript(text) => {
                    println!("heard: {text}");
                    if result.barge_in_fired {
                        println!("(interrupted by barge-in)");
                    }
                }
                TurnOutcome::Spoken => {
                    println!("(spoken, no reply requested)");
                }
            },
            Err(e) => {
                warn!("Turn failed: {}", e);
                println!("error: {e}");
            }
        }

        print!("> ");
        let _ = io::stdout().flush();
    }

    info!("VoiceMode core shutting down");
}
