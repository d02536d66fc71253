//! Lock-free SPSC ring buffer for audio samples.
//!
//! Uses the `ringbuf` crate to provide a single-producer single-consumer
//! buffer suitable for passing native-rate i16 PCM samples from the cpal
//! callback thread to the processing thread without locks. Samples stay at
//! the device's native rate here; consumers resample their own copy when
//! they need 16 kHz (VAD), matching the discovered-native-rate path (§4.1).

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapRb,
};

/// Default capacity: ~10 seconds of 48 kHz mono audio, generous enough for
/// most native device rates without growing unbounded.
const DEFAULT_CAPACITY: usize = 480_000;

/// Producer half — lives in the cpal audio callback thread.
pub struct AudioProducer {
    inner: ringbuf::HeapProd<i16>,
}

/// Consumer half — lives in the audio processing thread.
pub struct AudioConsumer {
    inner: ringbuf::HeapCons<i16>,
}

/// Create a matched producer/consumer pair backed by a lock-free ring buffer.
pub fn audio_ring_buffer(capacity: Option<usize>) -> (AudioProducer, AudioConsumer) {
    let cap = capacity.unwrap_or(DEFAULT_CAPACITY);
    let rb = HeapRb::<i16>::new(cap);
    let (prod, cons) = rb.split();
    (AudioProducer { inner: prod }, AudioConsumer { inner: cons })
}

impl AudioProducer {
    /// Push a slice of samples into the ring buffer.
    /// Returns the number of samples actually written (may be less than
    /// `samples.len()` if the buffer is full).
    pub fn push_slice(&mut self, samples: &[i16]) -> usize {
        self.inner.push_slice(samples)
    }
}

// Safety: the ringbuf producer is designed to be used from a single thread.
// cpal callbacks run on a dedicated audio thread, so this is fine.
unsafe impl Send for AudioProducer {}

impl AudioConsumer {
    /// Pop up to `buf.len()` samples from the ring buffer into `buf`.
    /// Returns the number of samples actually read.
    pub fn pop_slice(&mut self, buf: &mut [i16]) -> usize {
        self.inner.pop_slice(buf)
    }

    /// Number of samples currently available for reading.
    pub fn available(&self) -> usize {
        self.inner.occupied_len()
    }

    /// Drain all available samples into a Vec.
    pub fn drain_all(&mut self) -> Vec<i16> {
        let n = self.available();
        if n == 0 {
            return Vec::new();
        }
        let mut buf = vec![0i16; n];
        let read = self.pop_slice(&mut buf);
        buf.truncate(read);
        buf
    }
}

unsafe impl Send for AudioConsumer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_samples_in_order() {
        let (mut prod, mut cons) = audio_ring_buffer(Some(16));
        let written = prod.push_slice(&[1, 2, 3, 4]);
        assert_eq!(written, 4);
        assert_eq!(cons.drain_all(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn reports_full_buffer_short_write() {
        let (mut prod, _cons) = audio_ring_buffer(Some(4));
        let written = prod.push_slice(&[1, 2, 3, 4, 5, 6]);
        assert!(written <= 4);
    }
}
