use std::fmt;
use std::str::FromStr;

use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Frequency axis scale of the spectrogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Scale {
    #[default]
    Linear,
    Logarithmic,
}

impl Scale {
    pub fn is_logarithmic(self) -> bool {
        self == Scale::Logarithmic
    }

    pub fn name(self) -> &'static str {
        match self {
            Scale::Linear => "Linear",
            Scale::Logarithmic => "Logarithmic",
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scale {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(Scale::Linear),
            "logarithmic" | "log" => Ok(Scale::Logarithmic),
            _ => Err(ConfigError::UnknownScale(s.to_string())),
        }
    }
}

/// Maps `value` in `[1, max_value]` to a relative position in `[0, 1]`.
///
/// Logarithmic mode is undefined below 1, so `value` is floored to 1 first.
pub fn relative_position<T: Float>(value: T, max_value: T, scale: Scale) -> T {
    let one = T::one();
    match scale {
        Scale::Linear => (value - one) / (max_value - one),
        Scale::Logarithmic => value.max(one).log10() / max_value.log10(),
    }
}

/// Inverse of [`relative_position`].
pub fn value_from_relative_position<T: Float>(position: T, max_value: T, scale: Scale) -> T {
    let one = T::one();
    match scale {
        Scale::Linear => one + position * (max_value - one),
        Scale::Logarithmic => T::from(10.0)
            .map(|ten| ten.powf(position * max_value.log10()))
            .unwrap_or(one),
    }
}

/// One frequency axis label, positioned in view rows from the top.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub text: String,
    pub y: f32,
}

/// Frequency axis ticks for a view of `height` rows.
///
/// Linear axes get one tick per kHz, logarithmic axes one per decade from 10 Hz.
pub fn frequency_ticks(sampling_rate: u32, height: usize, scale: Scale) -> Vec<Tick> {
    let h = height as f32;
    let nyquist = sampling_rate as f32 / 2.0;
    match scale {
        Scale::Linear => {
            let limit = sampling_rate.saturating_sub(500) / 2;
            (0..limit)
                .step_by(1000)
                .map(|hz| Tick {
                    text: format!(" {}", hz / 1000),
                    y: h * (1.0 - hz as f32 / nyquist),
                })
                .collect()
        }
        Scale::Logarithmic => (1..=4)
            .map(|k| {
                let hz = 10f32.powi(k);
                Tick {
                    text: format!("1e{}", k),
                    y: (1.0 - relative_position(hz, nyquist, scale)) * h,
                }
            })
            .collect(),
    }
}
