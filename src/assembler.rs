use log::{debug, trace};

use crate::error::{ConfigError, Error, Result};
use crate::utils::exact_log2;

/// Reassembles fixed-length capture chunks into 50%-overlapping analysis frames.
///
/// The overlap queue is one flat buffer of `slots * n/2` samples. Slot 0 holds the
/// carry-over half frame from the previous chunk; slots `1..` receive the new chunk.
/// Frame `i` is the contiguous slice starting at slot `i`, so frames are handed out
/// without copying.
pub struct ChunkAssembler {
    resolution: usize,
    half: usize,
    slots: usize,
    capture_len: usize,
    queue: Vec<i16>,
    chunks: u64,
}

impl ChunkAssembler {
    /// # Arguments
    ///
    /// * `resolution` - Analysis frame length `n`, a power of two.
    /// * `capture_len` - Length of every chunk passed to [`ChunkAssembler::ingest`],
    ///   a non-zero multiple of `n/2`.
    pub fn new(resolution: usize, capture_len: usize) -> std::result::Result<Self, ConfigError> {
        if exact_log2(resolution).is_none() || resolution < 2 {
            return Err(ConfigError::NotPowerOfTwo(resolution));
        }
        let half = resolution / 2;
        if capture_len == 0 || capture_len % half != 0 {
            return Err(ConfigError::CaptureLength {
                capture_len,
                half_frame: half,
            });
        }

        let slots = capture_len / half + 1;
        debug!(
            "Chunk assembler: n = {}, capture length = {}, {} slots, {} frames per chunk",
            resolution,
            capture_len,
            slots,
            slots - 1
        );
        Ok(Self {
            resolution,
            half,
            slots,
            capture_len,
            queue: vec![0; slots * half],
            chunks: 0,
        })
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn capture_len(&self) -> usize {
        self.capture_len
    }

    /// Number of overlap queue slots, `capture_len / (n/2) + 1`.
    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn frames_per_chunk(&self) -> usize {
        self.slots - 1
    }

    /// Feeds one capture chunk and calls `on_frame` once per produced frame, in order.
    ///
    /// The first error returned by `on_frame` aborts the chunk; the carry-over slot
    /// is still updated so the stream stays aligned for the next chunk.
    pub fn ingest<F>(&mut self, chunk: &[i16], mut on_frame: F) -> Result<usize>
    where
        F: FnMut(&[i16]) -> Result<()>,
    {
        if chunk.len() != self.capture_len {
            return Err(Error::Precondition(format!(
                "capture chunk has {} samples, assembler was configured for {}",
                chunk.len(),
                self.capture_len
            )));
        }

        self.queue[self.half..].copy_from_slice(chunk);

        let mut outcome = Ok(0);
        for i in 0..self.slots - 1 {
            let start = i * self.half;
            if let Err(e) = on_frame(&self.queue[start..start + self.resolution]) {
                outcome = Err(e);
                break;
            }
            outcome = Ok(i + 1);
        }

        // Last slot becomes the earlier half of the next chunk's first frame
        let last = (self.slots - 1) * self.half;
        self.queue.copy_within(last.., 0);
        self.chunks += 1;

        if self.chunks % 1000 == 0 {
            trace!("Assembled {} chunks", self.chunks);
        }
        outcome
    }

    /// Zeroes the carry-over slot, as if the stream started fresh.
    pub fn reset(&mut self) {
        self.queue.fill(0);
        self.chunks = 0;
    }

    pub fn chunks_ingested(&self) -> u64 {
        self.chunks
    }
}
