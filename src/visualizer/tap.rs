//! Audio output taps.

use std::sync::{PoisonError, RwLock};

/// Bytes in one time-domain read.
pub const TAP_SIZE: usize = 128;

/// Midpoint of an unsigned 8-bit sample (silence).
pub const TAP_CENTER: u8 = 128;

/// Read access to the evaluator's audio output.
///
/// Samples are unsigned bytes centred on [`TAP_CENTER`], as delivered by a
/// time-domain analyser.
pub trait SignalTap: Send + Sync {
    /// Number of samples one read fills.
    fn buffer_len(&self) -> usize {
        TAP_SIZE
    }

    /// Copies the latest time-domain samples into `buf`.
    fn read_time_domain(&self, buf: &mut [u8]);
}

/// Tap backed by a shared buffer that a producer overwrites.
#[derive(Debug)]
pub struct BufferTap {
    samples: RwLock<Vec<u8>>,
}

impl BufferTap {
    /// Creates a silent tap of `len` samples.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            samples: RwLock::new(vec![TAP_CENTER; len]),
        }
    }

    /// Replaces the buffered samples; extra input is dropped and a short
    /// input leaves the tail untouched.
    pub fn write(&self, input: &[u8]) {
        let mut samples = self.samples.write().unwrap_or_else(PoisonError::into_inner);
        let n = input.len().min(samples.len());
        samples[..n].copy_from_slice(&input[..n]);
    }
}

impl Default for BufferTap {
    fn default() -> Self {
        Self::new(TAP_SIZE)
    }
}

impl SignalTap for BufferTap {
    fn buffer_len(&self) -> usize {
        self.samples.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn read_time_domain(&self, buf: &mut [u8]) {
        let samples = self.samples.read().unwrap_or_else(PoisonError::into_inner);
        let n = buf.len().min(samples.len());
        buf[..n].copy_from_slice(&samples[..n]);
    }
}
