use std::sync::Arc;

use log::debug;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::conversion::samples_to_f32;
use crate::error::{ConfigError, Error, Result};
use crate::utils::exact_log2;
use crate::window::{Window, WindowType};

/// In-place complex FFT over split real/imaginary buffers of a fixed power-of-two length.
///
/// Plans and scratch space are built once in [`SpectralTransform::new`]; `forward` and
/// `inverse` never allocate.
pub struct SpectralTransform {
    len: usize,
    log2n: u32,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectralTransform {
    /// Plans forward and inverse transforms of length `len`.
    ///
    /// # Arguments
    ///
    /// * `len` - Transform length, must be a power of two.
    pub fn new(len: usize) -> std::result::Result<Self, ConfigError> {
        let log2n = exact_log2(len).ok_or(ConfigError::NotPowerOfTwo(len))?;

        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        debug!("Planned FFT of length {} (log2n = {})", len, log2n);
        Ok(Self {
            len,
            log2n,
            forward,
            inverse,
            buffer: vec![Complex::new(0.0, 0.0); len],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn log2n(&self) -> u32 {
        self.log2n
    }

    /// Unnormalized forward transform of `(re, im)` in place.
    pub fn forward(&mut self, re: &mut [f32], im: &mut [f32], log2n: u32) -> Result<()> {
        self.check(re, im, log2n)?;
        self.load(re, im);
        self.forward.process_with_scratch(&mut self.buffer, &mut self.scratch);
        self.store(re, im, 1.0);
        Ok(())
    }

    /// Inverse transform of `(re, im)` in place, scaled by `1/n` so that
    /// `inverse(forward(x)) == x`.
    pub fn inverse(&mut self, re: &mut [f32], im: &mut [f32], log2n: u32) -> Result<()> {
        self.check(re, im, log2n)?;
        self.load(re, im);
        self.inverse.process_with_scratch(&mut self.buffer, &mut self.scratch);
        self.store(re, im, 1.0 / self.len as f32);
        Ok(())
    }

    fn check(&self, re: &[f32], im: &[f32], log2n: u32) -> Result<()> {
        if log2n != self.log2n {
            return Err(Error::Precondition(format!(
                "log2n {} does not match planned transform length {}",
                log2n, self.len
            )));
        }
        if re.len() != self.len || im.len() != self.len {
            return Err(Error::Precondition(format!(
                "transform buffers have lengths {}/{}, expected {}",
                re.len(),
                im.len(),
                self.len
            )));
        }
        Ok(())
    }

    fn load(&mut self, re: &[f32], im: &[f32]) {
        for ((c, &r), &i) in self.buffer.iter_mut().zip(re).zip(im) {
            *c = Complex::new(r, i);
        }
    }

    fn store(&self, re: &mut [f32], im: &mut [f32], scale: f32) {
        for ((c, r), i) in self.buffer.iter().zip(re.iter_mut()).zip(im.iter_mut()) {
            *r = c.re * scale;
            *i = c.im * scale;
        }
    }
}

/// Converts rectangular `(re, im)` to polar in place: `re` becomes the magnitude
/// and `im` the phase in radians.
pub fn to_polar(re: &mut [f32], im: &mut [f32]) {
    for (r, i) in re.iter_mut().zip(im.iter_mut()) {
        let magnitude = r.hypot(*i);
        let phase = i.atan2(*r);
        *r = magnitude;
        *i = phase;
    }
}

/// Converts polar `(magnitude, phase)` back to rectangular in place.
pub fn to_cartesian(magnitude: &mut [f32], phase: &mut [f32]) {
    for (m, p) in magnitude.iter_mut().zip(phase.iter_mut()) {
        let (sin, cos) = p.sin_cos();
        let re = *m * cos;
        let im = *m * sin;
        *m = re;
        *p = im;
    }
}

/// Per-frame analysis: integer samples in, magnitude and phase spectrum out.
///
/// Owns every buffer the hot path touches. A new `Analyzer` is built whenever
/// the resolution or window changes.
pub struct Analyzer {
    transform: SpectralTransform,
    window: Window,
    real: Vec<f32>,
    imag: Vec<f32>,
    wave: Vec<f32>,
    frames: u64,
}

impl Analyzer {
    pub fn new(resolution: usize, window_type: WindowType) -> std::result::Result<Self, ConfigError> {
        let transform = SpectralTransform::new(resolution)?;
        Ok(Self {
            transform,
            window: Window::new(window_type, resolution),
            real: vec![0.0; resolution],
            imag: vec![0.0; resolution],
            wave: vec![0.0; resolution],
            frames: 0,
        })
    }

    pub fn resolution(&self) -> usize {
        self.transform.len()
    }

    pub fn window_type(&self) -> WindowType {
        self.window.kind()
    }

    /// Runs one analysis frame through conversion, windowing, FFT and polar conversion.
    ///
    /// # Arguments
    ///
    /// * `frame` - Exactly `resolution` capture samples.
    pub fn process(&mut self, frame: &[i16]) -> Result<()> {
        let n = self.resolution();
        if frame.len() != n {
            return Err(Error::Precondition(format!(
                "analysis frame has {} samples, expected {}",
                frame.len(),
                n
            )));
        }

        samples_to_f32(frame, &mut self.real);
        self.wave.copy_from_slice(&self.real);
        self.imag.fill(0.0);
        self.window.apply(&mut self.real);

        let log2n = self.transform.log2n();
        self.transform.forward(&mut self.real, &mut self.imag, log2n)?;
        to_polar(&mut self.real, &mut self.imag);

        self.frames += 1;
        Ok(())
    }

    /// Magnitude spectrum of the last frame. Only `[0, n/2)` maps to `[0, nyquist)`.
    pub fn magnitudes(&self) -> &[f32] {
        &self.real
    }

    /// Time-domain samples of the last frame, before windowing.
    pub fn waveform(&self) -> &[f32] {
        &self.wave
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }
}

/// Frequency in Hz of the largest bin below Nyquist of an `n`-point magnitude spectrum.
pub fn peak_frequency(magnitudes: &[f32], sampling_rate: u32) -> Option<f32> {
    let n = magnitudes.len();
    let (bin, _) = magnitudes[..n / 2]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    Some(bin as f32 * sampling_rate as f32 / n as f32)
}
