use log::debug;

use crate::axis::{value_from_relative_position, Scale};
use crate::color::{Argb, Palette, BLACK, TRANSPARENT};
use crate::conversion::magnitude_to_intensity;

/// A horizontal copy from the raster into the visible area: columns
/// `[src_x, src_x + width)` of the raster land at `dest_x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blit {
    pub src_x: usize,
    pub dest_x: usize,
    pub width: usize,
}

/// Size state of the canvas. History only exists while `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasState {
    Unsized,
    Ready { width: usize, height: usize },
}

// Bin lookup per display row, valid for one (height, bins, nyquist, scale) combination
#[derive(Debug, Clone, PartialEq)]
struct RowMap {
    height: usize,
    bins: usize,
    nyquist: f32,
    scale: Scale,
    rows: Vec<usize>,
}

impl RowMap {
    fn build(height: usize, bins: usize, nyquist: f32, scale: Scale) -> Self {
        let h = height as f32;
        let rows = (0..height)
            .map(|y| {
                let value = value_from_relative_position((h - y as f32) / h, nyquist, scale);
                let bin = (value / nyquist * bins as f32) as usize;
                bin.min(bins.saturating_sub(1))
            })
            .collect();
        Self {
            height,
            bins,
            nyquist,
            scale,
            rows,
        }
    }

    fn matches(&self, height: usize, bins: usize, nyquist: f32, scale: Scale) -> bool {
        self.height == height && self.bins == bins && self.nyquist == nyquist && self.scale == scale
    }
}

/// Persistent spectrogram raster that scrolls by moving a circular write cursor.
///
/// One column is written per analysis frame at `pos % width`; a black delimiter
/// marks the column after it when the raster is wider than one column. Nothing is ever shifted, composition reorders the
/// two halves instead.
#[derive(Debug, Clone)]
pub struct ScrollingCanvas {
    state: CanvasState,
    pixels: Vec<Argb>,
    pos: u64,
    row_map: Option<RowMap>,
}

impl Default for ScrollingCanvas {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrollingCanvas {
    pub fn new() -> Self {
        Self {
            state: CanvasState::Unsized,
            pixels: Vec::new(),
            pos: 0,
            row_map: None,
        }
    }

    pub fn state(&self) -> CanvasState {
        self.state
    }

    pub fn width(&self) -> usize {
        match self.state {
            CanvasState::Ready { width, .. } => width,
            CanvasState::Unsized => 0,
        }
    }

    pub fn height(&self) -> usize {
        match self.state {
            CanvasState::Ready { height, .. } => height,
            CanvasState::Unsized => 0,
        }
    }

    /// Columns appended since the last (re)allocation.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Row-major raster, `width * height` pixels.
    pub fn pixels(&self) -> &[Argb] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Argb> {
        let width = self.width();
        if x >= width || y >= self.height() {
            return None;
        }
        self.pixels.get(y * width + x).copied()
    }

    /// Sizes the raster. Any change discards the history; a zero dimension leaves
    /// the canvas `Unsized`. Returns whether the buffer was reallocated.
    pub fn resize(&mut self, width: usize, height: usize) -> bool {
        if width == 0 || height == 0 {
            if self.state != CanvasState::Unsized {
                debug!("Canvas unsized ({}x{})", width, height);
            }
            self.state = CanvasState::Unsized;
            self.pixels = Vec::new();
            self.pos = 0;
            return false;
        }
        if self.state == (CanvasState::Ready { width, height }) {
            return false;
        }

        debug!("Canvas allocated at {}x{}, history discarded", width, height);
        self.state = CanvasState::Ready { width, height };
        self.pixels = vec![TRANSPARENT; width * height];
        self.pos = 0;
        true
    }

    /// Drops the column history while keeping the current size.
    pub fn clear(&mut self) {
        self.pixels.fill(TRANSPARENT);
        self.pos = 0;
    }

    /// Paints one column from `magnitudes` (length `n`, bins `[0, n/2)` used) and
    /// advances the cursor. A no-op while `Unsized`.
    ///
    /// # Arguments
    ///
    /// * `magnitudes` - Magnitude spectrum of one frame.
    /// * `nyquist` - Half the sampling rate in Hz.
    /// * `scale` - Frequency axis scale.
    /// * `palette` - Palette used for the intensity of each row.
    pub fn append_column(&mut self, magnitudes: &[f32], nyquist: f32, scale: Scale, palette: &Palette) {
        let (width, height) = match self.state {
            CanvasState::Ready { width, height } => (width, height),
            CanvasState::Unsized => return,
        };
        let bins = magnitudes.len() / 2;
        if bins == 0 {
            return;
        }

        let stale = self
            .row_map
            .as_ref()
            .map_or(true, |m| !m.matches(height, bins, nyquist, scale));
        if stale {
            self.row_map = Some(RowMap::build(height, bins, nyquist, scale));
        }
        let rows = match &self.row_map {
            Some(map) => &map.rows,
            None => return,
        };

        let x = (self.pos % width as u64) as usize;
        // A single-column raster has no room for a delimiter
        let delimiter = Some((x + 1) % width).filter(|&d| d != x);
        for (y, &bin) in rows.iter().enumerate() {
            let row = y * width;
            self.pixels[row + x] = palette.interpolate(magnitude_to_intensity(magnitudes[bin]));
            if let Some(d) = delimiter {
                self.pixels[row + d] = BLACK;
            }
        }
        self.pos += 1;
    }

    /// Blits that lay the raster out oldest-to-newest from left to right.
    ///
    /// Until the raster has wrapped the whole buffer is drawn once; afterwards it is
    /// split at the cursor.
    pub fn compose(&self) -> Vec<Blit> {
        let width = self.width();
        if width == 0 {
            return Vec::new();
        }
        if self.pos < width as u64 {
            return vec![Blit {
                src_x: 0,
                dest_x: 0,
                width,
            }];
        }

        let cursor = (self.pos % width as u64) as usize;
        let mut blits = vec![Blit {
            src_x: cursor,
            dest_x: 0,
            width: width - cursor,
        }];
        if cursor > 0 {
            blits.push(Blit {
                src_x: 0,
                dest_x: width - cursor,
                width: cursor,
            });
        }
        blits
    }

    /// Copies the composed raster into `target` (row stride `stride`) at column `offset_x`.
    pub fn draw_into(&self, target: &mut [Argb], stride: usize, offset_x: usize) {
        let width = self.width();
        for blit in self.compose() {
            for y in 0..self.height() {
                let src = y * width + blit.src_x;
                let dest = y * stride + offset_x + blit.dest_x;
                if let (Some(from), Some(to)) = (
                    self.pixels.get(src..src + blit.width),
                    target.get_mut(dest..dest + blit.width),
                ) {
                    to.copy_from_slice(from);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::PaletteKind;

    fn quiet(n: usize) -> Vec<f32> {
        vec![0.0; n]
    }

    #[test]
    fn starts_unsized_and_ignores_appends() {
        let mut canvas = ScrollingCanvas::new();
        assert_eq!(canvas.state(), CanvasState::Unsized);
        canvas.append_column(&quiet(16), 22050.0, Scale::Linear, &Palette::default());
        assert_eq!(canvas.position(), 0);
        assert!(canvas.compose().is_empty());
    }

    #[test]
    fn zero_dimensions_are_a_no_op() {
        let mut canvas = ScrollingCanvas::new();
        assert!(!canvas.resize(0, 100));
        assert!(!canvas.resize(100, 0));
        assert_eq!(canvas.state(), CanvasState::Unsized);
    }

    #[test]
    fn resize_discards_history() {
        let mut canvas = ScrollingCanvas::new();
        assert!(canvas.resize(4, 3));
        canvas.append_column(&quiet(8), 100.0, Scale::Linear, &Palette::default());
        assert_eq!(canvas.position(), 1);

        assert!(!canvas.resize(4, 3));
        assert_eq!(canvas.position(), 1);

        assert!(canvas.resize(5, 3));
        assert_eq!(canvas.position(), 0);
        assert!(canvas.pixels().iter().all(|&p| p == TRANSPARENT));
        assert_eq!(canvas.pixels().len(), 15);
    }

    #[test]
    fn writes_column_and_delimiter() {
        let mut canvas = ScrollingCanvas::new();
        canvas.resize(4, 2);
        let palette = PaletteKind::Grey.palette();
        // Unit magnitude is 0 dB, the first palette color
        canvas.append_column(&[1.0; 8], 100.0, Scale::Linear, &palette);
        for y in 0..2 {
            assert_eq!(canvas.pixel(0, y), Some(palette.first()));
            assert_eq!(canvas.pixel(1, y), Some(BLACK));
            assert_eq!(canvas.pixel(2, y), Some(TRANSPARENT));
        }

        // Wrapping puts the delimiter back at column 0
        for _ in 0..3 {
            canvas.append_column(&[1.0; 8], 100.0, Scale::Linear, &palette);
        }
        assert_eq!(canvas.position(), 4);
        assert_eq!(canvas.pixel(3, 0), Some(palette.first()));
        assert_eq!(canvas.pixel(0, 0), Some(BLACK));
    }

    #[test]
    fn top_row_reads_highest_bin() {
        let mut canvas = ScrollingCanvas::new();
        canvas.resize(2, 4);
        let palette = PaletteKind::Grey.palette();
        let mut magnitudes = vec![0.0; 8];
        magnitudes[3] = 1.0;
        canvas.append_column(&magnitudes, 100.0, Scale::Linear, &palette);
        assert_eq!(canvas.pixel(0, 0), Some(palette.first()));
        assert_eq!(canvas.pixel(0, 3), Some(palette.last()));
    }

    #[test]
    fn one_column_raster_keeps_its_data() {
        let mut canvas = ScrollingCanvas::new();
        assert!(canvas.resize(1, 2));
        let palette = PaletteKind::Grey.palette();
        canvas.append_column(&[1.0; 8], 100.0, Scale::Linear, &palette);
        assert_eq!(canvas.pixel(0, 0), Some(palette.first()));
        assert_eq!(canvas.pixel(0, 1), Some(palette.first()));
        canvas.append_column(&[0.0; 8], 100.0, Scale::Linear, &palette);
        assert_eq!(canvas.pixel(0, 0), Some(palette.last()));
        assert_eq!(canvas.compose(), vec![Blit { src_x: 0, dest_x: 0, width: 1 }]);
    }

    #[test]
    fn log_rows_read_bins_by_relative_position() {
        use crate::axis::relative_position;

        let mut canvas = ScrollingCanvas::new();
        canvas.resize(1, 4);
        let palette = PaletteKind::Grey.palette();
        // 1000 bins over 1000 Hz: bin k covers [k, k + 1) Hz
        let nyquist = 1000.0f32;
        let freq = 10f32.powf(1.5);
        let mut magnitudes = vec![0.0; 2000];
        for bin in 30..=33 {
            magnitudes[bin] = 1.0;
        }
        canvas.append_column(&magnitudes, nyquist, Scale::Logarithmic, &palette);

        let r = relative_position(freq, nyquist, Scale::Logarithmic);
        let loud_row = ((1.0 - r) * 4.0).round() as usize;
        assert_eq!(loud_row, 2);
        for y in 0..4 {
            let expected = if y == loud_row { palette.first() } else { palette.last() };
            assert_eq!(canvas.pixel(0, y), Some(expected), "row {}", y);
        }

        // Linear mapping puts the same row near 500 Hz, away from the loud bins
        canvas.clear();
        canvas.append_column(&magnitudes, nyquist, Scale::Linear, &palette);
        assert_eq!(canvas.pixel(0, loud_row), Some(palette.last()));
    }

    #[test]
    fn single_blit_before_wrap() {
        let mut canvas = ScrollingCanvas::new();
        canvas.resize(300, 8);
        for _ in 0..299 {
            canvas.append_column(&quiet(16), 22050.0, Scale::Linear, &Palette::default());
        }
        assert_eq!(
            canvas.compose(),
            vec![Blit { src_x: 0, dest_x: 0, width: 300 }]
        );
    }

    #[test]
    fn splits_at_cursor_after_wrap() {
        let mut canvas = ScrollingCanvas::new();
        canvas.resize(300, 8);
        for _ in 0..305 {
            canvas.append_column(&quiet(16), 22050.0, Scale::Logarithmic, &Palette::default());
        }
        let blits = canvas.compose();
        assert_eq!(
            blits,
            vec![
                Blit { src_x: 5, dest_x: 0, width: 295 },
                Blit { src_x: 0, dest_x: 295, width: 5 },
            ]
        );
        assert_eq!(blits.iter().map(|b| b.width).sum::<usize>(), 300);
    }

    #[test]
    fn exact_wrap_needs_one_blit() {
        let mut canvas = ScrollingCanvas::new();
        canvas.resize(10, 2);
        for _ in 0..20 {
            canvas.append_column(&quiet(4), 50.0, Scale::Linear, &Palette::default());
        }
        assert_eq!(
            canvas.compose(),
            vec![Blit { src_x: 0, dest_x: 0, width: 10 }]
        );
    }

    #[test]
    fn draw_into_reorders_columns() {
        let mut canvas = ScrollingCanvas::new();
        canvas.resize(3, 1);
        let palette = PaletteKind::Grey.palette();
        // Columns alternate loud/quiet: after 4 appends the cursor sits at 1
        for m in [1.0, 0.0, 1.0, 0.0] {
            canvas.append_column(&[m, m], 100.0, Scale::Linear, &palette);
        }
        let mut target = vec![0u32; 5];
        canvas.draw_into(&mut target, 5, 1);
        assert_eq!(target[0], 0);
        // Oldest surviving column is 1 (delimiter), then 2 (loud), then 0 (newest, quiet)
        assert_eq!(&target[1..4], &[BLACK, palette.first(), palette.last()]);
    }
}
