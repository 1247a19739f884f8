use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info};

use live_spectrogram::display::Frame;
use live_spectrogram::{Settings, Spectrogram, SyntheticCapture, YamlPreferences};

const DEFAULT_PREFERENCES: &str = "spectrogram.yaml";
const VIEW_WIDTH: usize = 640;
const VIEW_HEIGHT: usize = 256;
const REPORT_INTERVAL: Duration = Duration::from_millis(500);

fn main() {
    let enable_logs = std::env::args().any(|arg| arg == "--enable-logs");
    if enable_logs {
        // Don't override RUST_LOG if it's already set
        if std::env::var("RUST_LOG").is_err() {
            std::env::set_var("RUST_LOG", "live_spectrogram=info");
        }
        env_logger::init();
    }

    if let Err(e) = run() {
        if enable_logs {
            error!("Application encountered an error: {:?}", e);
        } else {
            eprintln!("Error: {:?}", e);
        }
        std::process::exit(1);
    }
}

struct Args {
    preferences: String,
    duration: Option<Duration>,
}

fn parse_args() -> Result<Args> {
    let mut preferences = None;
    let mut duration = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--enable-logs" => {}
            "--duration" => {
                let secs = args
                    .next()
                    .ok_or_else(|| anyhow!("--duration needs a number of seconds"))?;
                let secs: f64 = secs
                    .parse()
                    .with_context(|| format!("invalid duration '{}'", secs))?;
                duration = Some(Duration::from_secs_f64(secs.max(0.0)));
            }
            other if other.starts_with("--") => return Err(anyhow!("unknown option {}", other)),
            other => preferences = Some(other.to_string()),
        }
    }
    Ok(Args {
        preferences: preferences.unwrap_or_else(|| DEFAULT_PREFERENCES.to_string()),
        duration,
    })
}

fn run() -> Result<()> {
    let args = parse_args()?;
    let prefs = YamlPreferences::load(&args.preferences)
        .with_context(|| format!("failed to read preferences from {}", args.preferences))?;
    let settings = Settings::load(&prefs).context("invalid preferences")?;
    debug!("Effective settings:\n{}", serde_yaml::to_string(&settings)?);

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to install Ctrl-C handler")?;

    let mut spectrogram = Spectrogram::new(settings.clone())?;
    let display = spectrogram.display();
    display.resize(VIEW_WIDTH, VIEW_HEIGHT);

    let source = SyntheticCapture::new(
        settings.sampling_rate,
        vec![(440.0, 0.4), (2500.0, 0.2), (9000.0, 0.05)],
    )
    .paced(true);
    spectrogram.start(Box::new(source))?;

    println!(
        "{} | {} | {} palette, {} axis. Press Ctrl-C to stop.",
        settings.time_header(),
        settings.frequency_header(),
        settings.color_scale,
        settings.frequency_scale
    );

    let started = Instant::now();
    let mut frame = Frame::new();
    while running.load(Ordering::SeqCst) {
        thread::sleep(REPORT_INTERVAL);
        if args.duration.map_or(false, |d| started.elapsed() >= d) {
            break;
        }
        if !spectrogram.is_running() {
            // The worker exited on its own; stop() below reports why
            break;
        }

        let trace = display.snapshot(&mut frame, VIEW_WIDTH, VIEW_HEIGHT / 2);
        let peak_hz = display.with_frequency(|view| view.peak_frequency());

        info!(
            "{} frames, {} columns, {}x{} frame, {} labels, {} trace segments, peak {:.0} Hz",
            spectrogram.frames_processed(),
            display.columns(),
            frame.width,
            frame.height,
            frame.labels.len(),
            trace.segments.len(),
            peak_hz.unwrap_or(0.0)
        );
    }

    info!("Shutting down");
    let stopped = spectrogram.stop().context("capture worker failed");
    spectrogram.release().context("failed to release capture source")?;
    stopped?;
    println!("Processed {} frames", spectrogram.frames_processed());
    Ok(())
}
