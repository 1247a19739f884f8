// Sample and level conversions shared by the analyzer and the views.

use crate::utils::{INTENSITY_SCALE, SAMPLE_FULL_SCALE};

/// Trait for capture sample types that can be turned into floating amplitude.
pub trait AudioSample: Copy {
    fn to_f32(self) -> f32;
}

impl AudioSample for i16 {
    fn to_f32(self) -> f32 {
        self as f32 / SAMPLE_FULL_SCALE
    }
}

impl AudioSample for f32 {
    fn to_f32(self) -> f32 {
        self
    }
}

/// Converts `input` into `output` element by element without allocating.
/// Extra elements on either side are left alone.
pub fn samples_to_f32<S: AudioSample>(input: &[S], output: &mut [f32]) {
    for (out, &sample) in output.iter_mut().zip(input) {
        *out = sample.to_f32();
    }
}

pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * SAMPLE_FULL_SCALE)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Attenuation in dB below unit magnitude, floored at 0.
///
/// A zero magnitude maps to `+inf`, which the color mapper clamps to the
/// last palette entry.
pub fn magnitude_to_db(magnitude: f32) -> f32 {
    (-20.0 * magnitude.log10()).max(0.0)
}

/// Unit intensity used to index a palette for a given magnitude.
pub fn magnitude_to_intensity(magnitude: f32) -> f32 {
    magnitude_to_db(magnitude) * INTENSITY_SCALE
}
