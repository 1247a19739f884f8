use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::assembler::ChunkAssembler;
use crate::audio_stream::{CaptureSource, Recorder, RecorderOptions};
use crate::config::Settings;
use crate::display::{DisplayHandle, FrequencyView, TimeView};
use crate::error::{Error, Result};
use crate::fft_analysis::Analyzer;

pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Live spectrogram pipeline: capture, framing, analysis and display state.
///
/// The capture worker runs the whole chain for every chunk; the display side reads
/// through [`Spectrogram::display`] at its own pace.
pub struct Spectrogram {
    settings: Settings,
    display: DisplayHandle,
    recorder: Option<Recorder>,
    options: RecorderOptions,
    stop_timeout: Duration,
    frames: Arc<AtomicU64>,
}

fn configure_views(display: &DisplayHandle, settings: &Settings) {
    display.with_frequency(|view| {
        view.set_resolution(settings.fft_resolution);
        view.set_sampling_rate(settings.sampling_rate);
        view.set_scale(settings.frequency_scale);
        view.set_palette(settings.color_scale.palette());
        view.set_night_mode(settings.night_mode);
        view.clear();
    });
    display.with_time(|view| {
        view.set_resolution(settings.fft_resolution);
        view.set_night_mode(settings.night_mode);
        view.set_line_width(settings.line_width);
    });
}

impl Spectrogram {
    pub fn new(settings: Settings) -> Result<Self> {
        Self::with_options(settings, RecorderOptions::default())
    }

    pub fn with_options(settings: Settings, options: RecorderOptions) -> Result<Self> {
        settings.validate()?;
        let display = DisplayHandle::new(
            FrequencyView::new(settings.fft_resolution, settings.sampling_rate),
            TimeView::new(settings.fft_resolution),
        );
        configure_views(&display, &settings);
        Ok(Self {
            settings,
            display,
            recorder: None,
            options,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            frames: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Bound on how long [`Spectrogram::stop`] waits for the capture worker.
    pub fn set_stop_timeout(&mut self, timeout: Duration) {
        self.stop_timeout = timeout;
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Handle for the display side; cheap to clone and safe to use from any thread.
    pub fn display(&self) -> DisplayHandle {
        self.display.clone()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.recorder.as_ref().map_or(false, Recorder::is_running)
    }

    /// Starts capturing from `source`, replacing any previous source.
    pub fn start(&mut self, source: Box<dyn CaptureSource>) -> Result<()> {
        self.halt()?;
        if let Some(mut previous) = self.recorder.take() {
            previous.release()?;
        }
        self.recorder = Some(Recorder::with_options(source, self.options.clone()));
        self.launch()
    }

    /// Starts the current source again after a [`Spectrogram::stop`].
    pub fn resume(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        self.launch()
    }

    fn launch(&mut self) -> Result<()> {
        let recorder = self
            .recorder
            .as_mut()
            .ok_or_else(|| Error::Precondition("no capture source".into()))?;

        let n = self.settings.fft_resolution;
        let capture_len = recorder.prepare(n)?;
        let mut assembler = ChunkAssembler::new(n, capture_len)?;
        let mut analyzer = Analyzer::new(n, self.settings.window_type)?;
        let display = self.display.clone();
        let frames = Arc::clone(&self.frames);

        info!(
            "Starting spectrogram: {} Hz, {}, {} frames per chunk",
            self.settings.sampling_rate,
            self.settings.frequency_header(),
            assembler.frames_per_chunk()
        );

        recorder.start(move |chunk| {
            assembler.ingest(chunk, |frame| {
                analyzer.process(frame)?;
                display.publish(analyzer.magnitudes(), analyzer.waveform())?;
                frames.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })?;
            Ok(())
        })
    }

    /// Stops capture, waiting at most the stop timeout. Idempotent.
    pub fn stop(&mut self) -> Result<()> {
        match self.recorder.as_mut() {
            Some(recorder) => {
                let result = recorder.stop(self.stop_timeout);
                info!("Spectrogram stopped after {} frames", self.frames_processed());
                result
            }
            None => Ok(()),
        }
    }

    // Only a timeout is fatal here; a failure of the previous run is logged
    fn halt(&mut self) -> Result<()> {
        match self.stop() {
            Err(Error::StopTimeout(timeout)) => Err(Error::StopTimeout(timeout)),
            Err(e) => {
                warn!("Previous capture run failed: {}", e);
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    /// Stops capture and releases the source.
    pub fn release(&mut self) -> Result<()> {
        let stopped = self.stop();
        if matches!(stopped, Err(Error::StopTimeout(_))) {
            // Worker still owned so stop can be retried
            return stopped;
        }
        if let Some(mut recorder) = self.recorder.take() {
            recorder.release()?;
        }
        stopped
    }

    /// Applies new settings, rebuilding framing, analysis and views as one unit.
    /// A running pipeline is stopped and restarted around the change.
    pub fn apply_settings(&mut self, settings: Settings) -> Result<()> {
        settings.validate()?;
        let was_running = self.is_running();
        self.halt()?;

        info!("Applying settings: {}, {}", settings.frequency_header(), settings.time_header());
        self.settings = settings;
        configure_views(&self.display, &self.settings);

        if was_running {
            self.launch()?;
        }
        Ok(())
    }
}

impl Drop for Spectrogram {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Spectrogram did not shut down cleanly: {}", e);
        }
    }
}
