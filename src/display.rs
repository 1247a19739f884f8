use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::axis::{frequency_ticks, Scale, Tick};
use crate::canvas::{Blit, ScrollingCanvas};
use crate::color::{Argb, Palette, BLACK, DARK_GREY, LIGHT_GREY, WHITE};
use crate::error::{Error, Result};
use crate::fft_analysis::peak_frequency;
use crate::utils::{COLOR_BAR_PAINTED, COLOR_BAR_WIDTH, DEFAULT_RESOLUTION, DEFAULT_SAMPLING_RATE, LABEL_WIDTH};

/// View background for the given night mode setting.
pub fn background(night_mode: bool) -> Argb {
    if night_mode {
        BLACK
    } else {
        WHITE
    }
}

/// Text placed on a frame, `y` being the baseline in rows from the top.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub x: usize,
    pub y: f32,
}

/// Display-owned snapshot of a rendered frequency view.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<Argb>,
    pub labels: Vec<Label>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    // Reuses the pixel allocation when the size is unchanged
    fn reset(&mut self, width: usize, height: usize, fill: Argb) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize(width * height, fill);
        self.labels.clear();
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Argb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y * self.width + x).copied()
    }

    fn fill_rect(&mut self, x0: usize, x1: usize, color: Argb) {
        let x1 = x1.min(self.width);
        for y in 0..self.height {
            let row = y * self.width;
            self.pixels[row + x0.min(x1)..row + x1].fill(color);
        }
    }
}

/// What the display has to draw for the frequency view: the raster blits (in
/// raster columns, offset by `raster_x` in the view) and the axis labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub raster_x: usize,
    pub blits: Vec<Blit>,
    pub labels_x: usize,
    pub ticks: Vec<Tick>,
}

/// Spectrogram view: color bar, scrolling raster and frequency labels.
#[derive(Debug, Clone)]
pub struct FrequencyView {
    sampling_rate: u32,
    scale: Scale,
    palette: Palette,
    night_mode: bool,
    magnitudes: Vec<f32>,
    canvas: ScrollingCanvas,
    view_width: usize,
    view_height: usize,
}

impl Default for FrequencyView {
    fn default() -> Self {
        Self::new(DEFAULT_RESOLUTION, DEFAULT_SAMPLING_RATE)
    }
}

impl FrequencyView {
    pub fn new(resolution: usize, sampling_rate: u32) -> Self {
        Self {
            sampling_rate,
            scale: Scale::default(),
            palette: Palette::default(),
            night_mode: true,
            magnitudes: vec![0.0; resolution],
            canvas: ScrollingCanvas::new(),
            view_width: 0,
            view_height: 0,
        }
    }

    pub fn set_resolution(&mut self, resolution: usize) {
        self.magnitudes = vec![0.0; resolution];
    }

    pub fn resolution(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn set_sampling_rate(&mut self, sampling_rate: u32) {
        self.sampling_rate = sampling_rate;
    }

    pub fn sampling_rate(&self) -> u32 {
        self.sampling_rate
    }

    pub fn set_scale(&mut self, scale: Scale) {
        self.scale = scale;
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn set_night_mode(&mut self, night_mode: bool) {
        self.night_mode = night_mode;
    }

    pub fn set_magnitudes(&mut self, magnitudes: &[f32]) -> Result<()> {
        if magnitudes.len() != self.magnitudes.len() {
            return Err(Error::Precondition(format!(
                "magnitude spectrum has {} bins, view expects {}",
                magnitudes.len(),
                self.magnitudes.len()
            )));
        }
        self.magnitudes.copy_from_slice(magnitudes);
        Ok(())
    }

    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Frequency of the loudest bin in the latest published spectrum.
    pub fn peak_frequency(&self) -> Option<f32> {
        peak_frequency(&self.magnitudes, self.sampling_rate)
    }

    /// Width of the scrolling raster for a view of `view_width` pixels.
    pub fn render_width(view_width: usize) -> usize {
        view_width.saturating_sub(COLOR_BAR_WIDTH + LABEL_WIDTH)
    }

    /// Sets the view size; any change in raster size discards the history.
    pub fn resize(&mut self, view_width: usize, view_height: usize) {
        if (view_width, view_height) != (self.view_width, self.view_height) {
            debug!("Frequency view resized to {}x{}", view_width, view_height);
        }
        self.view_width = view_width;
        self.view_height = view_height;
        self.canvas.resize(Self::render_width(view_width), view_height);
    }

    pub fn canvas(&self) -> &ScrollingCanvas {
        &self.canvas
    }

    /// Paints the current magnitudes as the next raster column.
    pub fn append_column(&mut self) {
        let nyquist = self.sampling_rate as f32 / 2.0;
        self.canvas
            .append_column(&self.magnitudes, nyquist, self.scale, &self.palette);
    }

    /// Clears the raster without changing its size.
    pub fn clear(&mut self) {
        self.canvas.clear();
    }

    pub fn compose(&self) -> Composition {
        let render_width = self.canvas.width();
        Composition {
            raster_x: COLOR_BAR_WIDTH,
            blits: self.canvas.compose(),
            labels_x: COLOR_BAR_WIDTH + render_width,
            ticks: if render_width > 0 {
                frequency_ticks(self.sampling_rate, self.view_height, self.scale)
            } else {
                Vec::new()
            },
        }
    }

    /// Renders the whole view into `frame`. A view too small for the raster
    /// leaves `frame` empty.
    pub fn render_into(&self, frame: &mut Frame) {
        let render_width = self.canvas.width();
        if render_width == 0 {
            frame.reset(0, 0, BLACK);
            return;
        }
        let width = self.view_width;
        let height = self.view_height;
        frame.reset(width, height, background(self.night_mode));

        self.canvas.draw_into(&mut frame.pixels, width, COLOR_BAR_WIDTH);

        // Color bar: black strip with the palette over its left part, low intensity on top
        frame.fill_rect(0, COLOR_BAR_WIDTH, BLACK);
        for y in 0..height {
            let color = self.palette.interpolate(y as f32 / height as f32);
            frame.pixels[y * width..y * width + COLOR_BAR_PAINTED].fill(color);
        }

        let labels_x = COLOR_BAR_WIDTH + render_width;
        frame.fill_rect(labels_x, width, BLACK);
        frame.labels.push(Label {
            text: "kHz".to_string(),
            x: labels_x,
            y: 12.0,
        });
        frame.labels.extend(
            frequency_ticks(self.sampling_rate, height, self.scale)
                .into_iter()
                .map(|tick| Label {
                    text: tick.text,
                    x: labels_x,
                    y: tick.y,
                }),
        );
    }
}

/// Straight line between two points in view coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Everything needed to draw the waveform view.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub background: Argb,
    pub axis: Segment,
    pub axis_color: Argb,
    pub segments: Vec<Segment>,
    pub trace_color: Argb,
    pub line_width: u32,
}

/// Waveform view of the latest analysis frame.
#[derive(Debug, Clone)]
pub struct TimeView {
    wave: Vec<f32>,
    gain: f32,
    night_mode: bool,
    line_width: u32,
}

impl Default for TimeView {
    fn default() -> Self {
        Self::new(DEFAULT_RESOLUTION)
    }
}

impl TimeView {
    pub fn new(resolution: usize) -> Self {
        Self {
            wave: vec![0.0; resolution],
            gain: 1.0,
            night_mode: true,
            line_width: 1,
        }
    }

    pub fn set_resolution(&mut self, resolution: usize) {
        self.wave = vec![0.0; resolution];
    }

    pub fn resolution(&self) -> usize {
        self.wave.len()
    }

    pub fn set_waveform(&mut self, wave: &[f32]) -> Result<()> {
        if wave.len() != self.wave.len() {
            return Err(Error::Precondition(format!(
                "waveform has {} samples, view expects {}",
                wave.len(),
                self.wave.len()
            )));
        }
        self.wave.copy_from_slice(wave);
        Ok(())
    }

    pub fn waveform(&self) -> &[f32] {
        &self.wave
    }

    pub fn set_night_mode(&mut self, night_mode: bool) {
        self.night_mode = night_mode;
    }

    pub fn set_line_width(&mut self, line_width: u32) {
        self.line_width = line_width.max(1);
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    /// Vertical scroll gesture: each unit of `dy` changes the gain by 1%.
    pub fn scroll(&mut self, dy: f32) {
        self.gain *= 1.0 + dy * 0.01;
    }

    /// Polyline of the waveform for a `width` x `height` view.
    pub fn trace(&self, width: usize, height: usize) -> Trace {
        let w = width as f32;
        let h = height as f32;
        let (axis_color, trace_color) = if self.night_mode {
            (DARK_GREY, WHITE)
        } else {
            (LIGHT_GREY, BLACK)
        };

        let mut segments = Vec::with_capacity(self.wave.len());
        let n = self.wave.len();
        if let Some(&first) = self.wave.first() {
            let level = |s: f32| h * (0.5 + 0.5 * self.gain * s);
            let mut x1 = 0.0f32;
            let mut y1 = level(first);
            for (i, &s) in self.wave.iter().enumerate().skip(1) {
                let x2 = w * i as f32 / n as f32;
                let y2 = level(s);
                if x1 > 0.0 && x1 < w && x2 > 0.0 && x2 < w {
                    segments.push(Segment {
                        x1,
                        y1: h - y1,
                        x2,
                        y2: h - y2,
                    });
                }
                x1 = x2;
                y1 = y2;
            }
        }

        Trace {
            background: background(self.night_mode),
            axis: Segment {
                x1: 0.0,
                y1: h / 2.0,
                x2: w,
                y2: h / 2.0,
            },
            axis_color,
            segments,
            trace_color,
            line_width: self.line_width,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct Views {
    frequency: FrequencyView,
    time: TimeView,
}

/// Shared handle between the capture worker (producer) and the display (consumer).
///
/// Both views sit behind one lock. The worker publishes a whole frame at a time and
/// the display copies a snapshot out, so neither side ever sees a half-written
/// column or a waveform from a different frame than the raster.
#[derive(Debug, Clone, Default)]
pub struct DisplayHandle {
    views: Arc<Mutex<Views>>,
}

impl DisplayHandle {
    pub fn new(frequency: FrequencyView, time: TimeView) -> Self {
        Self {
            views: Arc::new(Mutex::new(Views { frequency, time })),
        }
    }

    /// Publishes one analysed frame: waveform to the time view, magnitudes plus a
    /// new raster column to the frequency view. On error neither view changes.
    pub fn publish(&self, magnitudes: &[f32], waveform: &[f32]) -> Result<()> {
        let mut views = lock(&self.views);
        let expected = (views.frequency.resolution(), views.time.resolution());
        if (magnitudes.len(), waveform.len()) != expected {
            return Err(Error::Precondition(format!(
                "frame has {} bins and {} samples, views expect {} and {}",
                magnitudes.len(),
                waveform.len(),
                expected.0,
                expected.1
            )));
        }
        views.time.set_waveform(waveform)?;
        views.frequency.set_magnitudes(magnitudes)?;
        views.frequency.append_column();
        Ok(())
    }

    pub fn with_frequency<R>(&self, f: impl FnOnce(&mut FrequencyView) -> R) -> R {
        f(&mut lock(&self.views).frequency)
    }

    pub fn with_time<R>(&self, f: impl FnOnce(&mut TimeView) -> R) -> R {
        f(&mut lock(&self.views).time)
    }

    pub fn resize(&self, view_width: usize, view_height: usize) {
        lock(&self.views).frequency.resize(view_width, view_height);
    }

    pub fn render_into(&self, frame: &mut Frame) {
        lock(&self.views).frequency.render_into(frame);
    }

    /// Renders the spectrogram and traces the waveform of the same published frame.
    pub fn snapshot(&self, frame: &mut Frame, trace_width: usize, trace_height: usize) -> Trace {
        let views = lock(&self.views);
        views.frequency.render_into(frame);
        views.time.trace(trace_width, trace_height)
    }

    pub fn compose(&self) -> Composition {
        lock(&self.views).frequency.compose()
    }

    pub fn trace(&self, width: usize, height: usize) -> Trace {
        lock(&self.views).time.trace(width, height)
    }

    /// Columns appended since the raster was last allocated.
    pub fn columns(&self) -> u64 {
        lock(&self.views).frequency.canvas().position()
    }
}
