use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::axis::Scale;
use crate::color::PaletteKind;
use crate::error::ConfigError;
use crate::utils::{DEFAULT_RESOLUTION, DEFAULT_SAMPLING_RATE};
use crate::window::WindowType;

pub const KEY_SAMPLING_RATE: &str = "sampling_rate";
pub const KEY_FFT_RESOLUTION: &str = "fft_resolution";
pub const KEY_WINDOW_TYPE: &str = "window_type";
pub const KEY_COLOR_SCALE: &str = "color_scale";
pub const KEY_FREQUENCY_SCALE: &str = "frequency_scale";
pub const KEY_NIGHT_MODE: &str = "night_mode";
pub const KEY_LINE_WIDTH: &str = "line_width";

/// Key/value store the settings are read from.
pub trait Preferences {
    fn get_string(&self, key: &str) -> Option<String>;
}

impl Preferences for BTreeMap<String, String> {
    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Flat YAML mapping of preference keys to scalars.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YamlPreferences {
    values: BTreeMap<String, String>,
}

impl YamlPreferences {
    /// Loads preferences from `path`. A missing file yields empty preferences, so
    /// every key falls back to its default.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No preferences file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        info!("Loading preferences from {}", path.display());
        let yaml_str = fs::read_to_string(path)?;
        yaml_str.parse()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromStr for YamlPreferences {
    type Err = ConfigError;

    fn from_str(yaml_str: &str) -> Result<Self, Self::Err> {
        let mut values = BTreeMap::new();
        if yaml_str.trim().is_empty() {
            return Ok(Self { values });
        }

        let mapping = match serde_yaml::from_str::<Value>(yaml_str)? {
            Value::Mapping(mapping) => mapping,
            Value::Null => return Ok(Self { values }),
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "<root>".to_string(),
                    value: format!("{:?}", other),
                })
            }
        };

        for (key, value) in mapping {
            let key = match key.as_str() {
                Some(key) => key.to_string(),
                None => {
                    warn!("Ignoring non-string preference key {:?}", key);
                    continue;
                }
            };
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    warn!("Ignoring non-scalar preference '{}': {:?}", key, other);
                    continue;
                }
            };
            values.insert(key, value);
        }
        Ok(Self { values })
    }
}

impl Preferences for YamlPreferences {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Validated pipeline and display configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub sampling_rate: u32,
    pub fft_resolution: usize,
    pub window_type: WindowType,
    pub color_scale: PaletteKind,
    pub frequency_scale: Scale,
    pub night_mode: bool,
    pub line_width: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sampling_rate: DEFAULT_SAMPLING_RATE,
            fft_resolution: DEFAULT_RESOLUTION,
            window_type: WindowType::Hanning,
            color_scale: PaletteKind::Rainbow,
            frequency_scale: Scale::Linear,
            night_mode: true,
            line_width: 1,
        }
    }
}

fn read<T, F>(prefs: &dyn Preferences, key: &str, default: T, parse: F) -> Result<T, ConfigError>
where
    F: FnOnce(&str) -> Result<T, ConfigError>,
{
    match prefs.get_string(key) {
        Some(raw) => parse(raw.trim()),
        None => Ok(default),
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

impl Settings {
    /// Reads and validates every setting, falling back to defaults for missing keys.
    pub fn load(prefs: &dyn Preferences) -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        let settings = Settings {
            sampling_rate: read(prefs, KEY_SAMPLING_RATE, defaults.sampling_rate, |v| {
                v.parse().map_err(|_| invalid(KEY_SAMPLING_RATE, v))
            })?,
            fft_resolution: read(prefs, KEY_FFT_RESOLUTION, defaults.fft_resolution, |v| {
                v.parse().map_err(|_| invalid(KEY_FFT_RESOLUTION, v))
            })?,
            window_type: read(prefs, KEY_WINDOW_TYPE, defaults.window_type, str::parse)?,
            color_scale: read(prefs, KEY_COLOR_SCALE, defaults.color_scale, str::parse)?,
            frequency_scale: read(prefs, KEY_FREQUENCY_SCALE, defaults.frequency_scale, str::parse)?,
            night_mode: read(prefs, KEY_NIGHT_MODE, defaults.night_mode, |v| {
                parse_bool(KEY_NIGHT_MODE, v)
            })?,
            line_width: read(prefs, KEY_LINE_WIDTH, defaults.line_width, |v| {
                v.parse().map_err(|_| invalid(KEY_LINE_WIDTH, v))
            })?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fft_resolution < 2 || !self.fft_resolution.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo(self.fft_resolution));
        }
        if self.sampling_rate == 0 {
            return Err(invalid(KEY_SAMPLING_RATE, "0"));
        }
        if self.line_width == 0 {
            return Err(invalid(KEY_LINE_WIDTH, "0"));
        }
        Ok(())
    }

    pub fn nyquist(&self) -> f32 {
        self.sampling_rate as f32 / 2.0
    }

    /// Duration covered by one analysis frame.
    pub fn frame_duration_ms(&self) -> f32 {
        1000.0 * self.fft_resolution as f32 / self.sampling_rate as f32
    }

    pub fn time_header(&self) -> String {
        format!("{:.1} ms", self.frame_duration_ms())
    }

    pub fn frequency_header(&self) -> String {
        format!("{} points, {}", self.fft_resolution, self.window_type)
    }
}
