use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Packed `0xAARRGGBB` color.
pub type Argb = u32;

pub const BLACK: Argb = 0xFF00_0000;
pub const WHITE: Argb = 0xFFFF_FFFF;
pub const DARK_GREY: Argb = 0xFF44_4444;
pub const LIGHT_GREY: Argb = 0xFFCC_CCCC;
pub const TRANSPARENT: Argb = 0x0000_0000;

pub fn argb(a: u8, r: u8, g: u8, b: u8) -> Argb {
    (a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32
}

/// Splits a packed color into `[a, r, g, b]`.
pub fn channels(color: Argb) -> [u8; 4] {
    color.to_be_bytes()
}

const RAINBOW: &[Argb] = &[
    0xFFFF_FFFF,
    0xFFFF_00FF,
    0xFFFF_0000,
    0xFFFF_FF00,
    0xFF00_FF00,
    0xFF00_FFFF,
    0xFF00_00FF,
    0xFF00_0000,
];
const FIRE: &[Argb] = &[0xFFFF_FFFF, 0xFFFF_FF00, 0xFFFF_0000, 0xFF00_0000];
const ICE: &[Argb] = &[0xFFFF_FFFF, 0xFF00_FFFF, 0xFF00_00FF, 0xFF00_0000];
const GREY: &[Argb] = &[0xFFFF_FFFF, 0xFF00_0000];

/// Built-in palettes, selectable by name from the preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PaletteKind {
    #[default]
    Rainbow,
    Fire,
    Ice,
    Grey,
}

impl PaletteKind {
    pub const ALL: [PaletteKind; 4] = [
        PaletteKind::Rainbow,
        PaletteKind::Fire,
        PaletteKind::Ice,
        PaletteKind::Grey,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PaletteKind::Rainbow => "Rainbow",
            PaletteKind::Fire => "Fire",
            PaletteKind::Ice => "Ice",
            PaletteKind::Grey => "Grey",
        }
    }

    pub fn colors(self) -> &'static [Argb] {
        match self {
            PaletteKind::Rainbow => RAINBOW,
            PaletteKind::Fire => FIRE,
            PaletteKind::Ice => ICE,
            PaletteKind::Grey => GREY,
        }
    }

    pub fn palette(self) -> Palette {
        Palette {
            colors: self.colors().to_vec(),
        }
    }
}

impl fmt::Display for PaletteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PaletteKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        PaletteKind::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ConfigError::UnknownPalette(s.to_string()))
    }
}

/// Ordered control-point colors spread evenly over `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Argb>,
}

impl Palette {
    /// Builds a custom palette; at least two control points are required.
    pub fn new(colors: Vec<Argb>) -> Option<Self> {
        if colors.len() < 2 {
            return None;
        }
        Some(Self { colors })
    }

    pub fn colors(&self) -> &[Argb] {
        &self.colors
    }

    pub fn first(&self) -> Argb {
        self.colors[0]
    }

    pub fn last(&self) -> Argb {
        self.colors[self.colors.len() - 1]
    }

    /// Color at intensity `u`, clamped to `[0, 1]` (NaN reads as 0).
    ///
    /// Each channel is interpolated on its own and rounded half up.
    pub fn interpolate(&self, u: f32) -> Argb {
        let u = if u.is_nan() { 0.0 } else { u.clamp(0.0, 1.0) };
        let segments = (self.colors.len() - 1) as f32;
        let scaled = u * segments;
        let i = scaled.floor() as usize;
        if i >= self.colors.len() - 1 {
            return self.last();
        }
        let p = scaled - i as f32;

        let c0 = channels(self.colors[i]);
        let c1 = channels(self.colors[i + 1]);
        let mut out = [0u8; 4];
        for ((o, &a), &b) in out.iter_mut().zip(&c0).zip(&c1) {
            let delta = (p * (b as f32 - a as f32) + 0.5).floor();
            *o = (a as f32 + delta).clamp(0.0, 255.0) as u8;
        }
        u32::from_be_bytes(out)
    }
}

impl Default for Palette {
    fn default() -> Self {
        PaletteKind::default().palette()
    }
}

impl From<PaletteKind> for Palette {
    fn from(kind: PaletteKind) -> Self {
        kind.palette()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_return_control_points() {
        for kind in PaletteKind::ALL {
            let palette = kind.palette();
            assert_eq!(palette.interpolate(0.0), palette.first());
            assert_eq!(palette.interpolate(1.0), palette.last());
        }
    }

    #[test]
    fn clamps_out_of_range_intensity() {
        let palette = PaletteKind::Fire.palette();
        assert_eq!(palette.interpolate(-3.0), WHITE);
        assert_eq!(palette.interpolate(7.5), BLACK);
        assert_eq!(palette.interpolate(f32::INFINITY), BLACK);
        assert_eq!(palette.interpolate(f32::NAN), WHITE);
    }

    #[test]
    fn interpolates_each_channel() {
        let palette = PaletteKind::Grey.palette();
        assert_eq!(palette.interpolate(0.5), argb(0xFF, 0x80, 0x80, 0x80));

        let palette = Palette::new(vec![argb(0, 0, 100, 200), argb(200, 100, 0, 0)]).unwrap();
        assert_eq!(palette.interpolate(0.25), argb(50, 25, 75, 150));
    }

    #[test]
    fn hits_interior_control_points() {
        let palette = PaletteKind::Ice.palette();
        assert_eq!(palette.interpolate(1.0 / 3.0), 0xFF00_FFFF);
    }

    #[test]
    fn interpolation_is_continuous() {
        let palette = PaletteKind::Rainbow.palette();
        let distance = |a: Argb, b: Argb| -> i32 {
            channels(a)
                .iter()
                .zip(channels(b).iter())
                .map(|(&x, &y)| (x as i32 - y as i32).abs())
                .max()
                .unwrap_or(0)
        };
        for step in 0..1000 {
            let u = step as f32 / 1000.0;
            let coarse = distance(palette.interpolate(u), palette.interpolate(u + 1e-2));
            let fine = distance(palette.interpolate(u), palette.interpolate(u + 1e-4));
            assert!(fine <= coarse.max(1));
            assert!(coarse <= 20);
        }
    }

    #[test]
    fn rejects_degenerate_palette() {
        assert!(Palette::new(vec![WHITE]).is_none());
    }

    #[test]
    fn parses_palette_names() {
        assert_eq!("fire".parse::<PaletteKind>().unwrap(), PaletteKind::Fire);
        assert!(matches!(
            "Viridis".parse::<PaletteKind>(),
            Err(ConfigError::UnknownPalette(_))
        ));
    }
}
