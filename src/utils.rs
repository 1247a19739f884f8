use log::debug;

pub const DEFAULT_SAMPLING_RATE: u32 = 44100;
pub const DEFAULT_RESOLUTION: usize = 1024;

/// dB to unit intensity calibration, ≈111 dB of dynamic range across the palette.
/// Shared by every palette; changing it changes the perceptual output.
pub const INTENSITY_SCALE: f32 = 0.009;

/// Full-scale divisor for 16-bit capture samples.
pub const SAMPLE_FULL_SCALE: f32 = 32768.0;

/// Width of the color legend strip on the left of the frequency view.
pub const COLOR_BAR_WIDTH: usize = 10;
/// Part of the legend strip actually painted with the palette.
pub const COLOR_BAR_PAINTED: usize = COLOR_BAR_WIDTH - 5;
/// Width of the frequency label strip on the right of the frequency view.
pub const LABEL_WIDTH: usize = 30;

/// Smallest capture buffer the synthetic source hands out before rounding.
pub const DEFAULT_MIN_CAPTURE_LEN: usize = 3528;

/// Rounds `len` up to the next multiple of `multiple` (a multiple of 1 is a no-op).
pub fn round_up_to_multiple(len: usize, multiple: usize) -> usize {
    if multiple <= 1 {
        return len;
    }
    let rounded = match len % multiple {
        0 => len,
        r => len + (multiple - r),
    };
    debug!("Rounded capture length {} to {} (multiple of {})", len, rounded, multiple);
    rounded
}

/// Exact base-2 logarithm of `n`, or `None` when `n` is not a power of two.
pub fn exact_log2(n: usize) -> Option<u32> {
    if n.is_power_of_two() {
        Some(n.trailing_zeros())
    } else {
        None
    }
}
