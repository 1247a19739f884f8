use std::f64::consts::PI;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::audio_stream::{CaptureError, CaptureSource};
use crate::conversion::f32_to_i16;
use crate::utils::{round_up_to_multiple, DEFAULT_MIN_CAPTURE_LEN};

/// Deterministic capture source producing a sum of sines.
///
/// Stands in for a microphone in the demo binary and in tests. Partials with a
/// non-positive frequency or amplitude are ignored; when the amplitudes add up to
/// more than full scale the signal is normalized so it never clips.
#[derive(Debug, Clone)]
pub struct SyntheticCapture {
    sampling_rate: u32,
    partials: Vec<(f32, f32)>,
    min_capture_len: usize,
    paced: bool,
    fail_every: Option<u64>,
    sample_index: u64,
    reads: u64,
    started_at: Option<Instant>,
    delivered: u64,
}

impl SyntheticCapture {
    /// # Arguments
    ///
    /// * `sampling_rate` - Sample rate in Hz.
    /// * `partials` - Vector of (frequency, amplitude) pairs, amplitude in full-scale units.
    pub fn new(sampling_rate: u32, partials: Vec<(f32, f32)>) -> Self {
        Self {
            sampling_rate,
            partials: partials
                .into_iter()
                .filter(|&(f, a)| f > 0.0 && a > 0.0)
                .collect(),
            min_capture_len: DEFAULT_MIN_CAPTURE_LEN,
            paced: false,
            fail_every: None,
            sample_index: 0,
            reads: 0,
            started_at: None,
            delivered: 0,
        }
    }

    /// Delivers chunks no faster than real time.
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    /// Capture length before rounding to the requested multiple.
    pub fn min_capture_len(mut self, len: usize) -> Self {
        self.min_capture_len = len.max(1);
        self
    }

    /// Makes every `every`-th read fail with a transient error, like a buffer overrun.
    pub fn fail_every(mut self, every: u64) -> Self {
        self.fail_every = if every == 0 { None } else { Some(every) };
        self
    }

    pub fn sampling_rate(&self) -> u32 {
        self.sampling_rate
    }

    pub fn partials(&self) -> &[(f32, f32)] {
        &self.partials
    }

    fn sample_at(&self, index: u64) -> f32 {
        let total: f32 = self.partials.iter().map(|&(_, a)| a).sum();
        let norm = if total > 1.0 { total } else { 1.0 };
        let t = index as f64 / self.sampling_rate as f64;
        let value: f64 = self
            .partials
            .iter()
            .map(|&(f, a)| a as f64 * (2.0 * PI * f as f64 * t).sin())
            .sum();
        value as f32 / norm
    }

    fn pace(&mut self, samples: usize) {
        let started = *self.started_at.get_or_insert_with(Instant::now);
        self.delivered += samples as u64;
        let due = Duration::from_secs_f64(self.delivered as f64 / self.sampling_rate as f64);
        let elapsed = started.elapsed();
        if due > elapsed {
            thread::sleep(due - elapsed);
        }
    }
}

impl CaptureSource for SyntheticCapture {
    fn prepare(&mut self, multiple: usize) -> Result<usize, CaptureError> {
        if self.sampling_rate == 0 {
            return Err(CaptureError::Device("sampling rate is zero".into()));
        }
        let len = round_up_to_multiple(self.min_capture_len, multiple);
        info!(
            "Synthetic capture at {} Hz, {} samples per chunk, partials: {}",
            self.sampling_rate,
            len,
            format_partials(&self.partials)
        );
        Ok(len)
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        self.started_at = None;
        self.delivered = 0;
        Ok(())
    }

    fn read(&mut self, buffer: &mut [i16]) -> Result<(), CaptureError> {
        self.reads += 1;
        if let Some(every) = self.fail_every {
            if self.reads % every == 0 {
                debug!("Synthetic capture dropping read {}", self.reads);
                return Err(CaptureError::Transient(format!("simulated overrun on read {}", self.reads)));
            }
        }

        for (i, sample) in buffer.iter_mut().enumerate() {
            *sample = f32_to_i16(self.sample_at(self.sample_index + i as u64));
        }
        self.sample_index += buffer.len() as u64;

        if self.paced {
            self.pace(buffer.len());
        }
        Ok(())
    }

    fn release(&mut self) {
        debug!("Synthetic capture released after {} samples", self.sample_index);
        self.sample_index = 0;
        self.reads = 0;
    }
}

/// Formats partials for log output.
pub fn format_partials(partials: &[(f32, f32)]) -> String {
    if partials.is_empty() {
        return "silence".to_string();
    }
    partials
        .iter()
        .map(|&(freq, amp)| format!("({:.1} Hz, {:.3})", freq, amp))
        .collect::<Vec<_>>()
        .join(", ")
}
