use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Window function types, selectable by name from the preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowType {
    Rectangular, // No window (identity)
    Triangular,
    Welch,
    Hanning,
    Hamming, // Similar to Hanning but doesn't go to zero at edges
    Blackman,
    Nuttall,
    #[serde(rename = "Blackman-Nuttall")]
    BlackmanNuttall,
    #[serde(rename = "Blackman-Harris")]
    BlackmanHarris,
}

impl WindowType {
    pub const ALL: [WindowType; 9] = [
        WindowType::Rectangular,
        WindowType::Triangular,
        WindowType::Welch,
        WindowType::Hanning,
        WindowType::Hamming,
        WindowType::Blackman,
        WindowType::Nuttall,
        WindowType::BlackmanNuttall,
        WindowType::BlackmanHarris,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WindowType::Rectangular => "Rectangular",
            WindowType::Triangular => "Triangular",
            WindowType::Welch => "Welch",
            WindowType::Hanning => "Hanning",
            WindowType::Hamming => "Hamming",
            WindowType::Blackman => "Blackman",
            WindowType::Nuttall => "Nuttall",
            WindowType::BlackmanNuttall => "Blackman-Nuttall",
            WindowType::BlackmanHarris => "Blackman-Harris",
        }
    }

    /// Taper value at index `i` of a window of length `len`.
    pub fn coefficient(self, i: usize, len: usize) -> f32 {
        if len < 2 {
            return 1.0;
        }
        let last = (len - 1) as f32;
        let x = 2.0 * PI * i as f32 / last;
        match self {
            WindowType::Rectangular => 1.0,
            WindowType::Triangular => {
                let half = last / 2.0;
                1.0 - ((i as f32 - half) / half).abs()
            }
            WindowType::Welch => {
                let half = last / 2.0;
                let t = (i as f32 - half) / half;
                1.0 - t * t
            }
            WindowType::Hanning => 0.5 - 0.5 * x.cos(),
            WindowType::Hamming => 0.54 - 0.46 * x.cos(),
            WindowType::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
            WindowType::Nuttall => cosine_sum(x, [0.355768, 0.487396, 0.144232, 0.012604]),
            WindowType::BlackmanNuttall => {
                cosine_sum(x, [0.3635819, 0.4891775, 0.1365995, 0.0106411])
            }
            WindowType::BlackmanHarris => cosine_sum(x, [0.35875, 0.48829, 0.14128, 0.01168]),
        }
    }

    /// Applies the taper to `signal` in place.
    pub fn apply(self, signal: &mut [f32]) {
        if self == WindowType::Rectangular {
            return;
        }
        let len = signal.len();
        for (i, s) in signal.iter_mut().enumerate() {
            *s *= self.coefficient(i, len);
        }
    }
}

// Four-term cosine sum shared by the Blackman family
fn cosine_sum(x: f32, a: [f32; 4]) -> f32 {
    a[0] - a[1] * x.cos() + a[2] * (2.0 * x).cos() - a[3] * (3.0 * x).cos()
}

impl Default for WindowType {
    fn default() -> Self {
        WindowType::Hanning
    }
}

impl fmt::Display for WindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WindowType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        WindowType::ALL
            .iter()
            .copied()
            .find(|w| w.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ConfigError::UnknownWindow(s.to_string()))
    }
}

/// Precomputed taper for a fixed frame length, so the per-frame path does no trig.
#[derive(Debug, Clone)]
pub struct Window {
    kind: WindowType,
    coefficients: Vec<f32>,
}

impl Window {
    pub fn new(kind: WindowType, len: usize) -> Self {
        let coefficients = (0..len).map(|i| kind.coefficient(i, len)).collect();
        Self { kind, coefficients }
    }

    pub fn kind(&self) -> WindowType {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    pub fn coefficients(&self) -> &[f32] {
        &self.coefficients
    }

    /// Multiplies `signal` by the table. Lengths are expected to match;
    /// any excess on either side is ignored.
    pub fn apply(&self, signal: &mut [f32]) {
        if self.kind == WindowType::Rectangular {
            return;
        }
        for (s, &w) in signal.iter_mut().zip(&self.coefficients) {
            *s *= w;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn hanning_and_hamming_edges() {
        for len in [2usize, 16, 1024] {
            let hann = Window::new(WindowType::Hanning, len);
            let hamming = Window::new(WindowType::Hamming, len);
            assert_abs_diff_eq!(hann.coefficients()[0], 0.0, epsilon = 1e-6);
            assert_abs_diff_eq!(hamming.coefficients()[0], 0.08, epsilon = 1e-6);
        }
    }

    #[test]
    fn rectangular_is_identity() {
        let original: Vec<f32> = (0..64).map(|i| (i as f32 * 0.37).sin()).collect();
        let mut signal = original.clone();
        WindowType::Rectangular.apply(&mut signal);
        assert_eq!(signal, original);
        Window::new(WindowType::Rectangular, 64).apply(&mut signal);
        assert_eq!(signal, original);
    }

    #[test]
    fn blackman_family_vanishes_at_both_ends() {
        for kind in [
            WindowType::Hanning,
            WindowType::Blackman,
            WindowType::Nuttall,
            WindowType::BlackmanNuttall,
            WindowType::BlackmanHarris,
            WindowType::Triangular,
            WindowType::Welch,
        ] {
            let w = Window::new(kind, 512);
            assert_abs_diff_eq!(w.coefficients()[0], 0.0, epsilon = 1e-3);
            assert_abs_diff_eq!(w.coefficients()[511], 0.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn tapers_are_symmetric() {
        for kind in WindowType::ALL {
            let w = Window::new(kind, 256);
            let c = w.coefficients();
            for i in 0..128 {
                assert_abs_diff_eq!(c[i], c[255 - i], epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn polynomial_tapers_peak_near_centre() {
        // Odd length puts a sample exactly on the centre
        let tri = Window::new(WindowType::Triangular, 9);
        let welch = Window::new(WindowType::Welch, 9);
        assert_relative_eq!(tri.coefficients()[4], 1.0);
        assert_relative_eq!(welch.coefficients()[4], 1.0);
        assert_relative_eq!(tri.coefficients()[2], 0.5);
        assert_relative_eq!(welch.coefficients()[2], 0.75);
    }

    #[test]
    fn table_matches_direct_application() {
        let mut direct: Vec<f32> = vec![1.0; 128];
        let mut table = direct.clone();
        WindowType::BlackmanHarris.apply(&mut direct);
        Window::new(WindowType::BlackmanHarris, 128).apply(&mut table);
        assert_eq!(direct, table);
    }

    #[test]
    fn parses_names() {
        assert_eq!("Blackman-Nuttall".parse::<WindowType>().unwrap(), WindowType::BlackmanNuttall);
        assert_eq!("hanning".parse::<WindowType>().unwrap(), WindowType::Hanning);
        assert!(matches!(
            "Kaiser".parse::<WindowType>(),
            Err(ConfigError::UnknownWindow(name)) if name == "Kaiser"
        ));
    }

    #[test]
    fn names_round_trip_through_display() {
        for kind in WindowType::ALL {
            assert_eq!(kind.to_string().parse::<WindowType>().unwrap(), kind);
        }
    }
}
