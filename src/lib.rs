//! Live spectrogram pipeline.
//!
//! A capture source delivers fixed-length chunks of 16-bit mono samples on a worker
//! thread. Chunks are cut into 50%-overlapping frames, windowed, transformed to a
//! magnitude spectrum and painted as one column of a scrolling raster, which a
//! display thread reads back as a composed frame.

pub mod assembler;
pub mod audio_stream;
pub mod axis;
pub mod canvas;
pub mod color;
pub mod config;
pub mod conversion;
pub mod display;
pub mod engine;
pub mod error;
pub mod fft_analysis;
pub mod make_waves;
pub mod utils;
pub mod window;

pub use assembler::ChunkAssembler;
pub use audio_stream::{CancellationToken, CaptureError, CaptureSource, Recorder, RecorderOptions};
pub use axis::{relative_position, value_from_relative_position, Scale};
pub use canvas::{Blit, CanvasState, ScrollingCanvas};
pub use color::{Argb, Palette, PaletteKind};
pub use config::{Preferences, Settings, YamlPreferences};
pub use display::{DisplayHandle, Frame, FrequencyView, TimeView};
pub use engine::Spectrogram;
pub use error::{ConfigError, Error, Result};
pub use fft_analysis::{peak_frequency, to_cartesian, to_polar, Analyzer, SpectralTransform};
pub use make_waves::SyntheticCapture;
pub use window::{Window, WindowType};
