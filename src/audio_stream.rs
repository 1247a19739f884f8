use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use thiserror::Error;

use crate::error::{Error, Result};

/// Failure reported by a capture source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// A read failed but the device is still usable; the worker retries.
    #[error("transient capture failure: {0}")]
    Transient(String),

    #[error("capture device failure: {0}")]
    Device(String),
}

impl CaptureError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CaptureError::Transient(_))
    }
}

/// Mono 16-bit capture device.
///
/// Call order is `prepare`, then any number of `start`/`read`/`stop` cycles, then
/// `release`. `read` blocks until `buffer` is full.
pub trait CaptureSource: Send {
    /// Prepares the device and returns the capture length in samples, rounded up to a
    /// multiple of `multiple` (a multiple of 1 leaves it unchanged).
    fn prepare(&mut self, multiple: usize) -> std::result::Result<usize, CaptureError>;

    fn start(&mut self) -> std::result::Result<(), CaptureError> {
        Ok(())
    }

    fn read(&mut self, buffer: &mut [i16]) -> std::result::Result<(), CaptureError>;

    fn stop(&mut self) {}

    fn release(&mut self) {}
}

#[derive(Debug)]
struct CancelState {
    cancelled: AtomicBool,
    // Dropped on cancel, which disconnects `wake` and wakes every sleeper
    trigger: Mutex<Option<Sender<()>>>,
    wake: Receiver<()>,
}

/// Cooperative cancellation flag shared between the owner and the worker.
#[derive(Debug, Clone)]
pub struct CancellationToken(Arc<CancelState>);

impl Default for CancellationToken {
    fn default() -> Self {
        let (trigger, wake) = bounded(0);
        Self(Arc::new(CancelState {
            cancelled: AtomicBool::new(false),
            trigger: Mutex::new(Some(trigger)),
            wake,
        }))
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0
            .trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Sleeps for up to `duration`, waking as soon as the token is cancelled.
    /// Returns whether the token was cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        match self.0.wake.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => self.is_cancelled(),
            _ => true,
        }
    }
}

/// Retry policy of the capture worker.
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderOptions {
    /// Transient read failures tolerated in a row before the worker gives up.
    pub max_consecutive_errors: u32,
    pub backoff_step: Duration,
    pub max_backoff: Duration,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            max_consecutive_errors: 5,
            backoff_step: Duration::from_millis(50),
            max_backoff: Duration::from_millis(500),
        }
    }
}

impl RecorderOptions {
    fn backoff(&self, consecutive_errors: u32) -> Duration {
        (self.backoff_step * consecutive_errors).min(self.max_backoff)
    }
}

type WorkerOutput = (Box<dyn CaptureSource>, Result<()>);

struct Worker {
    token: CancellationToken,
    // Disconnects when the worker thread exits, panicking or not
    done: Receiver<()>,
    handle: JoinHandle<WorkerOutput>,
}

/// Runs a [`CaptureSource`] on a dedicated thread and hands every chunk to a callback.
pub struct Recorder {
    source: Option<Box<dyn CaptureSource>>,
    capture_len: Option<usize>,
    options: RecorderOptions,
    worker: Option<Worker>,
}

impl Recorder {
    pub fn new(source: Box<dyn CaptureSource>) -> Self {
        Self::with_options(source, RecorderOptions::default())
    }

    pub fn with_options(source: Box<dyn CaptureSource>, options: RecorderOptions) -> Self {
        Self {
            source: Some(source),
            capture_len: None,
            options,
            worker: None,
        }
    }

    /// Prepares the source; the returned capture length is a multiple of `multiple`.
    pub fn prepare(&mut self, multiple: usize) -> Result<usize> {
        if self.worker.is_some() {
            return Err(Error::Precondition("cannot prepare a running recorder".into()));
        }
        let source = self
            .source
            .as_mut()
            .ok_or_else(|| Error::Precondition("capture source was lost".into()))?;
        let len = source.prepare(multiple.max(1))?;
        if len == 0 || len % multiple.max(1) != 0 {
            return Err(Error::Precondition(format!(
                "capture source returned length {} for multiple {}",
                len, multiple
            )));
        }
        info!("Capture prepared: {} samples per chunk", len);
        self.capture_len = Some(len);
        Ok(len)
    }

    pub fn capture_len(&self) -> Option<usize> {
        self.capture_len
    }

    /// Whether a worker thread exists and has not exited yet.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map_or(false, |w| !w.handle.is_finished())
    }

    /// Spawns the capture worker. Starting a recorder that already has a worker is a no-op.
    ///
    /// # Arguments
    ///
    /// * `on_chunk` - Called on the worker thread with every captured chunk. An error
    ///   stops the worker and is returned by [`Recorder::stop`].
    pub fn start<F>(&mut self, mut on_chunk: F) -> Result<()>
    where
        F: FnMut(&[i16]) -> Result<()> + Send + 'static,
    {
        if self.worker.is_some() {
            debug!("Recorder already started");
            return Ok(());
        }
        let capture_len = self
            .capture_len
            .ok_or_else(|| Error::Precondition("recorder started before prepare".into()))?;
        let mut source = self
            .source
            .take()
            .ok_or_else(|| Error::Precondition("capture source was lost".into()))?;

        if let Err(e) = source.start() {
            self.source = Some(source);
            return Err(e.into());
        }

        let token = CancellationToken::new();
        let worker_token = token.clone();
        let options = self.options.clone();
        let (done_tx, done) = bounded::<()>(0);

        let handle = thread::spawn(move || {
            let _done = done_tx;
            let result = capture_loop(&mut *source, capture_len, &options, &worker_token, &mut on_chunk);
            source.stop();
            match &result {
                Ok(()) => info!("Capture worker stopped"),
                Err(e) => error!("Capture worker exited: {}", e),
            }
            (source, result)
        });

        info!("Capture worker started");
        self.worker = Some(Worker {
            token,
            done,
            handle,
        });
        Ok(())
    }

    /// Cancels the worker and waits up to `timeout` for it to exit.
    ///
    /// Returns the worker's own result. Stopping a stopped recorder is `Ok(())`. On
    /// `Error::StopTimeout` the worker is still owned and `stop` can be called again.
    pub fn stop(&mut self, timeout: Duration) -> Result<()> {
        let worker = match self.worker.take() {
            Some(worker) => worker,
            None => return Ok(()),
        };
        worker.token.cancel();

        match worker.done.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                warn!("Capture worker still running after {:?}", timeout);
                self.worker = Some(worker);
                return Err(Error::StopTimeout(timeout));
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
        }

        match worker.handle.join() {
            Ok((source, result)) => {
                self.source = Some(source);
                result
            }
            Err(_) => {
                error!("Capture worker panicked, capture source lost");
                Err(Error::WorkerPanicked)
            }
        }
    }

    /// Releases the source. The recorder must be stopped and prepared again before reuse.
    pub fn release(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(Error::Precondition("release called on a running recorder".into()));
        }
        if let Some(source) = self.source.as_mut() {
            if self.capture_len.take().is_some() {
                source.release();
                info!("Capture source released");
            }
        }
        Ok(())
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(e) = self.stop(Duration::from_secs(1)) {
                warn!("Capture worker did not shut down cleanly: {}", e);
            }
        }
    }
}

fn capture_loop(
    source: &mut dyn CaptureSource,
    capture_len: usize,
    options: &RecorderOptions,
    token: &CancellationToken,
    on_chunk: &mut dyn FnMut(&[i16]) -> Result<()>,
) -> Result<()> {
    let mut buffer = vec![0i16; capture_len];
    let mut consecutive_errors = 0u32;
    let mut chunks = 0u64;

    while !token.is_cancelled() {
        match source.read(&mut buffer) {
            Ok(()) => {
                if consecutive_errors > 0 {
                    info!("Capture recovered after {} failed reads", consecutive_errors);
                }
                consecutive_errors = 0;
            }
            Err(e) if e.is_transient() => {
                consecutive_errors += 1;
                if consecutive_errors > options.max_consecutive_errors {
                    return Err(e.into());
                }
                let backoff = options.backoff(consecutive_errors);
                warn!(
                    "Capture read failed ({} in a row), retrying in {:?}: {}",
                    consecutive_errors, backoff, e
                );
                token.sleep(backoff);
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        // A cancelled read may have been cut short
        if token.is_cancelled() {
            break;
        }
        on_chunk(&buffer)?;
        chunks += 1;
        if chunks % 500 == 0 {
            debug!("Captured {} chunks", chunks);
        }
    }
    Ok(())
}
