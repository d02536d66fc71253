//! Audio capture and ring buffer.

pub mod capture;
pub mod ring_buffer;

pub use capture::{i16_to_f32, list_devices, list_output_devices, resample_to_vad_rate, start_capture};
pub use ring_buffer::{audio_ring_buffer, AudioConsumer, AudioProducer};
