//! Value Compression Module
//!
//! Transparently compresses large payloads with LZ4, falling back to the
//! original bytes whenever compression fails or does not pay for itself.

use tracing::debug;

// == Constants ==
/// A compressed result is kept only if it is at least this much smaller
/// than the original, expressed as (numerator, denominator): 20% smaller
/// means compressed_len <= original_len * 4 / 5.
const MIN_SAVINGS_NUM: usize = 4;
const MIN_SAVINGS_DEN: usize = 5;

// == Compression ==
/// Threshold-gated LZ4 compression for stored values.
#[derive(Debug, Clone)]
pub struct Compression {
    enabled: bool,
    threshold: usize,
}

impl Compression {
    // == Constructor ==
    /// Creates a compression manager.
    ///
    /// # Arguments
    /// * `enabled` - Master switch; when false all values pass through
    /// * `threshold` - Minimum payload size in bytes before compression is attempted
    pub fn new(enabled: bool, threshold: usize) -> Self {
        Self { enabled, threshold }
    }

    // == Maybe Compress ==
    /// Compresses `value` if it is large enough and compresses well.
    ///
    /// Returns the bytes to store and whether they are compressed. Values
    /// below the threshold, incompressible values, and LZ4 failures all
    /// yield the original bytes; a cache failure must never be worse than
    /// storing uncompressed.
    pub fn maybe_compress(&self, value: &[u8]) -> (Vec<u8>, bool) {
        if !self.enabled || value.len() < self.threshold {
            return (value.to_vec(), false);
        }

        match lz4::block::compress(value, None, true) {
            Ok(compressed) => {
                if compressed.len() * MIN_SAVINGS_DEN <= value.len() * MIN_SAVINGS_NUM {
                    (compressed, true)
                } else {
                    // Incompressible payload, keep the original
                    (value.to_vec(), false)
                }
            }
            Err(e) => {
                debug!("Compression failed, storing uncompressed: {}", e);
                (value.to_vec(), false)
            }
        }
    }

    // == Decompress ==
    /// Decompresses bytes produced by [`maybe_compress`](Self::maybe_compress).
    pub fn decompress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        lz4::block::decompress(data, None)
    }
}
