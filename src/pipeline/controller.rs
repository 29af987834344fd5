//! Pipeline lifecycle.
//!
//! [`PipelineController`] owns the capture source, the ingest queue, the
//! dispatcher thread, the worker pool and the packet store, and moves the
//! whole pipeline between Stopped and Running.
//!
//! # Data flow
//!
//! ```text
//! CaptureSource --sink--> IngestQueue --dispatcher--> WorkerPool --decode--> PacketStore
//! ```
//!
//! # Shutdown order
//!
//! `stop()` halts the source first, so nothing can be pushed after the
//! end-of-stream marker. The dispatcher then drains every queued frame into
//! the pool before it sees the marker, and the pool runs every submitted task
//! before its shutdown returns. Every frame delivered before `stop()` returns
//! is therefore in the store.
//!
//! Lifecycle transitions are serialized by one control lock. `is_running`,
//! the counters and `store` never take it. `current_device` and
//! `pool_stats` do, so they wait for a transition in progress to finish.
//!
//! `restart()` resets both counters: the store is cleared and frames the
//! source delivered before the restart no longer count as captured.

use super::pool::{panic_message, PoolStats, WorkerPool};
use super::queue::{IngestQueue, QueueItem};
use super::store::PacketStore;
use crate::capture::{CaptureSource, FrameSink};
use crate::decoder;
use crate::error::{Result, ResultExt};
use crate::types::{DeviceInfo, RawFrame};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// State guarded by the control lock
struct ControlState {
    pool: Arc<WorkerPool>,
    dispatcher: Option<JoinHandle<()>>,
    /// Device of the last successful start
    device: Option<String>,
}

/// Coordinates capture, decoding and storage
pub struct PipelineController {
    source: Arc<dyn CaptureSource>,
    queue: Arc<IngestQueue<RawFrame>>,
    store: Arc<PacketStore>,
    worker_count: usize,
    running: AtomicBool,
    /// Source count at the last restart
    captured_baseline: AtomicU64,
    control: Mutex<ControlState>,
}

impl PipelineController {
    /// Create a stopped pipeline around `source`
    ///
    /// Fails only if the worker threads cannot be spawned.
    pub fn new(source: Arc<dyn CaptureSource>, worker_count: usize) -> Result<Self> {
        let worker_count = worker_count.max(1);
        let pool = WorkerPool::new(worker_count)?;

        Ok(Self {
            source,
            queue: Arc::new(IngestQueue::new()),
            store: Arc::new(PacketStore::new()),
            worker_count,
            running: AtomicBool::new(false),
            captured_baseline: AtomicU64::new(0),
            control: Mutex::new(ControlState {
                pool: Arc::new(pool),
                dispatcher: None,
                device: None,
            }),
        })
    }

    /// Start capturing on `device`
    ///
    /// Returns `false` if the pipeline is already running or the source
    /// refused to start; the reason is logged.
    pub fn start(&self, device: &str) -> bool {
        let mut control = self.lock_control();
        self.start_locked(&mut control, device)
    }

    /// Stop capturing and wait until every delivered frame is stored
    ///
    /// Does nothing when the pipeline is stopped.
    pub fn stop(&self) {
        let mut control = self.lock_control();
        self.stop_locked(&mut control);
    }

    /// Stop, discard all captured data and start again on the last device
    ///
    /// Returns `false` if no capture was ever started or the new start fails.
    pub fn restart(&self) -> bool {
        let mut control = self.lock_control();
        let Some(device) = control.device.clone() else {
            tracing::warn!("Restart requested before any capture was started");
            return false;
        };

        self.stop_locked(&mut control);

        self.store.clear();
        self.captured_baseline
            .store(self.source.captured_count(), Ordering::SeqCst);
        let dropped = self.queue.clear();
        if dropped > 0 {
            tracing::debug!("Discarded {} queued items on restart", dropped);
        }

        match WorkerPool::new(self.worker_count) {
            Ok(pool) => control.pool = Arc::new(pool),
            Err(e) => {
                tracing::error!("Failed to create worker pool: {}", e);
                return false;
            }
        }

        tracing::info!("Restarting capture on {}", device);
        self.start_locked(&mut control, &device)
    }

    /// Whether the pipeline is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Frames waiting for the dispatcher (advisory)
    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }

    /// Frames delivered by the capture source since the last restart
    pub fn captured_count(&self) -> u64 {
        self.source
            .captured_count()
            .saturating_sub(self.captured_baseline.load(Ordering::SeqCst))
    }

    /// Packets decoded and stored
    pub fn processed_count(&self) -> usize {
        self.store.count()
    }

    /// Devices offered by the capture source
    pub fn list_available_devices(&self) -> Vec<DeviceInfo> {
        self.source.list_devices()
    }

    /// Shared handle to the packet store
    pub fn store(&self) -> Arc<PacketStore> {
        self.store.clone()
    }

    /// Device of the last successful start
    pub fn current_device(&self) -> Option<String> {
        self.lock_control().device.clone()
    }

    /// Task counters of the current worker pool
    pub fn pool_stats(&self) -> PoolStats {
        self.lock_control().pool.stats()
    }

    /// Number of decode workers
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    fn start_locked(&self, control: &mut ControlState, device: &str) -> bool {
        if self.running.load(Ordering::SeqCst) {
            tracing::warn!("Capture already running; ignoring start on {}", device);
            return false;
        }

        if control.pool.is_stopped() {
            match WorkerPool::new(self.worker_count) {
                Ok(pool) => control.pool = Arc::new(pool),
                Err(e) => {
                    tracing::error!("Failed to create worker pool: {}", e);
                    return false;
                }
            }
        }

        let queue = self.queue.clone();
        let sink: FrameSink = Arc::new(move |frame| queue.push_data(frame));
        if let Err(e) = self.source.start(device, Some(sink)) {
            tracing::warn!("Failed to start capture on {}: {}", device, e);
            return false;
        }

        let queue = self.queue.clone();
        let pool = control.pool.clone();
        let store = self.store.clone();
        let spawned = thread::Builder::new()
            .name("packetscope-dispatcher".to_string())
            .spawn(move || dispatch_loop(&queue, |frame| submit_decode(&pool, &store, frame)));

        match spawned {
            Ok(handle) => control.dispatcher = Some(handle),
            Err(e) => {
                tracing::error!("Failed to spawn dispatcher thread: {}", e);
                self.source.stop();
                self.queue.clear();
                return false;
            }
        }

        control.device = Some(device.to_string());
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(
            "Capture started on {} with {} workers",
            device,
            control.pool.worker_count()
        );
        true
    }

    fn stop_locked(&self, control: &mut ControlState) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }

        // Source first: no frame may land behind the end-of-stream marker.
        self.source.stop();
        self.queue.push_end_of_stream();

        if let Some(dispatcher) = control.dispatcher.take() {
            if dispatcher.join().is_err() {
                tracing::error!("Dispatcher thread terminated abnormally");
            }
        }
        control.pool.shutdown();

        self.running.store(false, Ordering::SeqCst);
        tracing::info!(
            "Capture stopped: {} captured, {} processed",
            self.captured_count(),
            self.store.count()
        );
    }

    fn lock_control(&self) -> MutexGuard<'_, ControlState> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for PipelineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineController")
            .field("running", &self.is_running())
            .field("worker_count", &self.worker_count)
            .field("queue_size", &self.queue_size())
            .field("processed", &self.processed_count())
            .finish()
    }
}

/// Outcome of one dispatcher iteration
enum Dispatch {
    Submitted,
    Refused,
    EndOfStream,
}

/// Queue a decode-and-store task for `frame`; `false` if the pool refused it
fn submit_decode(pool: &WorkerPool, store: &Arc<PacketStore>, frame: RawFrame) -> bool {
    let store = store.clone();
    pool.submit(move || {
        let packet = decoder::decode(&frame)
            .with_context(|| format!("Frame captured at {}", frame.timestamp))?;
        store.add_packet(packet);
        Ok(())
    })
}

/// Pop frames and hand them to `dispatch` until the end-of-stream marker
///
/// A panic inside `dispatch` costs only the frame being dispatched.
fn dispatch_loop<F>(queue: &IngestQueue<RawFrame>, mut dispatch: F)
where
    F: FnMut(RawFrame) -> bool,
{
    tracing::debug!("Dispatcher started");

    loop {
        let step = panic::catch_unwind(AssertUnwindSafe(|| match queue.pop() {
            QueueItem::EndOfStream => Dispatch::EndOfStream,
            QueueItem::Data(frame) => {
                if dispatch(frame) {
                    Dispatch::Submitted
                } else {
                    Dispatch::Refused
                }
            }
        }));

        match step {
            Ok(Dispatch::Submitted) => {}
            Ok(Dispatch::Refused) => tracing::warn!("Worker pool is stopped; frame dropped"),
            Ok(Dispatch::EndOfStream) => break,
            Err(payload) => {
                tracing::error!("Dispatcher failed on a frame: {}", panic_message(&payload));
            }
        }
    }

    tracing::debug!("Dispatcher exiting");
}
