//! Energy-based voice activity detection (fallback).
//!
//! Uses mean absolute amplitude as a simple energy metric.
//! Used when the neural Silero VAD model is not available.

/// Compute the energy level of an audio chunk.
///
/// Returns the mean absolute value of the samples — a simple proxy for
/// signal energy that works well enough for speech/silence discrimination.
pub fn detect(chunk: &[f32]) -> f32 {
    if chunk.is_empty() {
        return 0.0;
    }
    let sum: f32 = chunk.iter().map(|s| s.abs()).sum();
    sum / chunk.len() as f32
}

/// Map a VAD aggressiveness level (0..=3, least to most aggressive about
/// rejecting borderline audio as noise) to an energy floor. Higher
/// aggressiveness requires louder audio before it is considered speech.
pub fn threshold_for_aggressiveness(aggressiveness: u8) -> f32 {
    match aggressiveness {
        0 => 0.002,
        1 => 0.005,
        3 => 0.02,
        _ => 0.01, // 2, and anything out of range clamps to the default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_has_zero_energy() {
        assert_eq!(detect(&[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn empty_chunk_has_zero_energy() {
        assert_eq!(detect(&[]), 0.0);
    }

    #[test]
    fn aggressiveness_levels_match_table() {
        assert_eq!(threshold_for_aggressiveness(0), 0.002);
        assert_eq!(threshold_for_aggressiveness(1), 0.005);
        assert_eq!(threshold_for_aggressiveness(2), 0.01);
        assert_eq!(threshold_for_aggressiveness(3), 0.02);
        assert_eq!(threshold_for_aggressiveness(99), 0.01);
    }
}
