use std::f32::consts::PI;
use std::thread;
use std::time::{Duration, Instant};

use live_spectrogram::axis::{relative_position, value_from_relative_position};
use live_spectrogram::canvas::Blit;
use live_spectrogram::{
    Analyzer, CaptureError, CaptureSource, ChunkAssembler, Error, Frame, PaletteKind, Recorder,
    RecorderOptions, Scale, ScrollingCanvas, Settings, Spectrogram, SyntheticCapture, WindowType,
};

fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
}

fn fast_retries() -> RecorderOptions {
    RecorderOptions {
        max_consecutive_errors: 3,
        backoff_step: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
    }
}

#[test]
fn sine_shows_up_at_its_bin_through_the_whole_chain() {
    let rate = 44100;
    let n = 1024;
    let freq = 3000.0;
    let mut source = SyntheticCapture::new(rate, vec![(freq, 0.5)]);
    let capture_len = source.prepare(n).unwrap();
    let mut assembler = ChunkAssembler::new(n, capture_len).unwrap();
    let mut analyzer = Analyzer::new(n, WindowType::Hanning).unwrap();

    let mut chunk = vec![0i16; capture_len];
    let mut peaks = Vec::new();
    for _ in 0..3 {
        source.read(&mut chunk).unwrap();
        assembler
            .ingest(&chunk, |frame| {
                analyzer.process(frame)?;
                let peak = analyzer.magnitudes()[..n / 2]
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(bin, _)| bin)
                    .unwrap_or(0);
                peaks.push(peak as i64);
                Ok(())
            })
            .unwrap();
    }

    let expected = (freq * n as f32 / rate as f32).round() as i64;
    assert_eq!(peaks.len(), 3 * (capture_len / (n / 2)));
    // The first frame is half silence but still peaks at the tone
    assert!(peaks.iter().all(|&p| (p - expected).abs() <= 1), "{:?}", peaks);
}

#[test]
fn overlapping_frames_shift_by_half_a_frame() {
    let n = 256;
    let mut source = SyntheticCapture::new(8000, vec![(700.0, 0.5)]).min_capture_len(1024);
    let capture_len = source.prepare(n / 2).unwrap();
    let mut assembler = ChunkAssembler::new(n, capture_len).unwrap();

    let mut stream = Vec::new();
    let mut frames: Vec<Vec<i16>> = Vec::new();
    let mut chunk = vec![0i16; capture_len];
    for _ in 0..2 {
        source.read(&mut chunk).unwrap();
        stream.extend_from_slice(&chunk);
        assembler
            .ingest(&chunk, |frame| {
                frames.push(frame.to_vec());
                Ok(())
            })
            .unwrap();
    }

    // Frame i covers stream[(i-1)*n/2 .. (i+1)*n/2]
    for (i, frame) in frames.iter().enumerate().skip(1) {
        let start = (i - 1) * n / 2;
        assert_eq!(&frame[..], &stream[start..start + n]);
    }
    for pair in frames.windows(2) {
        assert_eq!(pair[0][n / 2..], pair[1][..n / 2]);
    }
}

#[test]
fn axis_round_trip_and_monotonicity() {
    for scale in [Scale::Linear, Scale::Logarithmic] {
        for value in [1.0f32, 2.0, 50.0, 999.0, 1000.0, 11025.0, 22050.0] {
            let r = relative_position(value, 22050.0, scale);
            let back = value_from_relative_position(r, 22050.0, scale);
            assert!((back - value).abs() <= value * 1e-4, "{:?} {} -> {}", scale, value, back);
        }
    }
    let log = Scale::Logarithmic;
    assert!(relative_position(100.0f32, 22050.0, log) < relative_position(1000.0f32, 22050.0, log));
    assert!(relative_position(1000.0f32, 22050.0, log) < relative_position(10000.0f32, 22050.0, log));
}

#[test]
fn canvas_of_300_columns_after_305_frames() {
    let mut canvas = ScrollingCanvas::new();
    canvas.resize(300, 64);
    let palette = PaletteKind::Fire.palette();
    let mut analyzer = Analyzer::new(256, WindowType::Hamming).unwrap();
    let mut source = SyntheticCapture::new(8000, vec![(1200.0, 0.3)]);
    let mut frame = vec![0i16; 256];
    for _ in 0..305 {
        source.read(&mut frame).unwrap();
        analyzer.process(&frame).unwrap();
        canvas.append_column(analyzer.magnitudes(), 4000.0, Scale::Linear, &palette);
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
fn live_pipeline_renders_frames_and_stops_idempotently() {
    let settings = Settings {
        sampling_rate: 8000,
        fft_resolution: 256,
        color_scale: PaletteKind::Grey,
        frequency_scale: Scale::Logarithmic,
        ..Settings::default()
    };
    let mut spectrogram = Spectrogram::new(settings).unwrap();
    let display = spectrogram.display();
    display.resize(140, 80);

    spectrogram
        .start(Box::new(SyntheticCapture::new(8000, vec![(1000.0, 0.5)])))
        .unwrap();
    wait_for(|| spectrogram.frames_processed() >= 150);

    // Render concurrently with the worker
    let mut frame = Frame::new();
    display.render_into(&mut frame);
    assert_eq!((frame.width, frame.height), (140, 80));
    assert_eq!(frame.labels[0].text, "kHz");
    assert_eq!(frame.labels.len(), 5);
    // Past the wrap the raster is split at the cursor, unless it sits exactly on column 0
    let blits = display.compose().blits;
    assert!(!blits.is_empty() && blits.len() <= 2);
    assert_eq!(blits.iter().map(|b| b.width).sum::<usize>(), 100);

    spectrogram.stop().unwrap();
    spectrogram.stop().unwrap();
    assert!(!spectrogram.is_running());
    assert_eq!(display.columns(), spectrogram.frames_processed());
    spectrogram.release().unwrap();
    spectrogram.release().unwrap();
}

#[test]
fn transient_capture_errors_are_retried() {
    let mut spectrogram = Spectrogram::with_options(
        Settings {
            sampling_rate: 8000,
            fft_resolution: 256,
            ..Settings::default()
        },
        fast_retries(),
    )
    .unwrap();
    spectrogram
        .start(Box::new(
            SyntheticCapture::new(8000, vec![(440.0, 0.5)]).fail_every(2),
        ))
        .unwrap();
    wait_for(|| spectrogram.frames_processed() >= 50);
    assert!(spectrogram.is_running());
    spectrogram.stop().unwrap();
    assert!(spectrogram.frames_processed() >= 50);
}

struct Broken;

impl CaptureSource for Broken {
    fn prepare(&mut self, multiple: usize) -> Result<usize, CaptureError> {
        Ok(multiple * 4)
    }

    fn read(&mut self, _buffer: &mut [i16]) -> Result<(), CaptureError> {
        Err(CaptureError::Transient("no data".into()))
    }
}

#[test]
fn persistent_capture_errors_are_surfaced() {
    let mut recorder = Recorder::with_options(Box::new(Broken), fast_retries());
    recorder.prepare(256).unwrap();
    recorder.start(|_| Ok(())).unwrap();
    wait_for(|| !recorder.is_running());
    assert!(matches!(
        recorder.stop(Duration::from_secs(2)),
        Err(Error::Capture(CaptureError::Transient(_)))
    ));
    assert!(recorder.stop(Duration::from_secs(2)).is_ok());
}

#[test]
fn forward_inverse_round_trip() {
    use live_spectrogram::{to_cartesian, to_polar, SpectralTransform};

    for log2n in [1u32, 4, 8, 10] {
        let n = 1usize << log2n;
        let original: Vec<f32> = (0..n).map(|i| (2.0 * PI * 3.0 * i as f32 / n as f32).cos()).collect();
        let mut fft = SpectralTransform::new(n).unwrap();
        let mut re = original.clone();
        let mut im = vec![0.0; n];
        fft.forward(&mut re, &mut im, log2n).unwrap();
        to_polar(&mut re, &mut im);
        to_cartesian(&mut re, &mut im);
        fft.inverse(&mut re, &mut im, log2n).unwrap();
        for (a, b) in re.iter().zip(&original) {
            assert!((a - b).abs() < 1e-3);
        }
    }
}
