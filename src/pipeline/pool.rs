//! Fixed-size worker pool with sentinel-based shutdown.
//!
//! Workers pull [`PoolMessage`]s from a shared crossbeam channel. Each worker
//! exits when it receives [`PoolMessage::Shutdown`]; `shutdown()` sends
//! exactly one per worker after closing submission, so every task accepted
//! before shutdown began is executed before shutdown returns.
//!
//! A task that returns an error or panics is logged and counted as failed;
//! the worker keeps serving.

use crate::error::{PacketScopeError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// A unit of work executed by the pool
pub type Task = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// Messages consumed by worker threads
enum PoolMessage {
    /// Run a task
    Run(Task),
    /// Leave the worker loop
    Shutdown,
}

/// Task counters shared by all workers
#[derive(Debug, Default)]
struct PoolCounters {
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of pool task statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Tasks that returned `Ok`
    pub tasks_completed: u64,
    /// Tasks that returned an error or panicked
    pub tasks_failed: u64,
}

impl PoolStats {
    /// Total number of tasks that ran to an outcome
    pub fn tasks_executed(&self) -> u64 {
        self.tasks_completed + self.tasks_failed
    }
}

/// A fixed set of worker threads executing fire-and-forget tasks
pub struct WorkerPool {
    /// `None` once shutdown has begun
    sender: Mutex<Option<Sender<PoolMessage>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
    counters: Arc<PoolCounters>,
}

impl WorkerPool {
    /// Spawn a pool with `worker_count` threads (at least one)
    pub fn new(worker_count: usize) -> Result<Self> {
        let worker_count = worker_count.max(1);
        let (tx, rx) = unbounded();
        let counters = Arc::new(PoolCounters::default());

        tracing::debug!("Creating worker pool with {} threads", worker_count);

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let rx = rx.clone();
            let counters = counters.clone();
            let spawned = thread::Builder::new()
                .name(format!("packetscope-worker-{}", index))
                .spawn(move || worker_loop(index, rx, counters));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Release the threads that did start before reporting.
                    for _ in 0..workers.len() {
                        let _ = tx.send(PoolMessage::Shutdown);
                    }
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(PacketScopeError::Io(e).with_context("Failed to spawn worker thread"));
                }
            }
        }

        Ok(Self {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            worker_count,
            counters,
        })
    }

    /// Queue a task for execution
    ///
    /// Returns `false` (and drops the task) once shutdown has begun.
    pub fn submit<F>(&self, task: F) -> bool
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let sender = lock(&self.sender);
        match sender.as_ref() {
            Some(tx) => tx.send(PoolMessage::Run(Box::new(task))).is_ok(),
            None => false,
        }
    }

    /// Stop accepting tasks, drain the queue and join every worker
    ///
    /// Only the first call does any work; later calls return immediately.
    pub fn shutdown(&self) {
        let Some(tx) = lock(&self.sender).take() else {
            return;
        };
        let handles = std::mem::take(&mut *lock(&self.workers));

        tracing::debug!("Shutting down worker pool ({} workers)", handles.len());

        for _ in 0..handles.len() {
            let _ = tx.send(PoolMessage::Shutdown);
        }
        drop(tx);

        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("Worker thread terminated abnormally");
            }
        }

        tracing::debug!("Worker pool stopped");
    }

    /// Whether `shutdown` has been called
    ///
    /// A stopped pool never runs tasks again; build a new one to resume work.
    pub fn is_stopped(&self) -> bool {
        lock(&self.sender).is_none()
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Current task statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            tasks_completed: self.counters.completed.load(Ordering::SeqCst),
            tasks_failed: self.counters.failed.load(Ordering::SeqCst),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker_count", &self.worker_count)
            .field("stopped", &self.is_stopped())
            .field("stats", &self.stats())
            .finish()
    }
}

fn worker_loop(index: usize, rx: Receiver<PoolMessage>, counters: Arc<PoolCounters>) {
    tracing::debug!(worker = index, "Worker thread started");

    loop {
        let task = match rx.recv() {
            Ok(PoolMessage::Run(task)) => task,
            Ok(PoolMessage::Shutdown) | Err(_) => break,
        };

        match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(Ok(())) => {
                counters.completed.fetch_add(1, Ordering::SeqCst);
            }
            Ok(Err(e)) => {
                counters.failed.fetch_add(1, Ordering::SeqCst);
                tracing::error!(worker = index, "Task failed: {}", e);
            }
            Err(payload) => {
                counters.failed.fetch_add(1, Ordering::SeqCst);
                tracing::error!(worker = index, "Task panicked: {}", panic_message(&payload));
            }
        }
    }

    tracing::debug!(worker = index, "Worker thread exiting");
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_zero_workers_means_one() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.worker_count(), 1);
    }

    #[test]
    fn test_all_submitted_tasks_run_before_shutdown_returns() {
        let pool = WorkerPool::new(4).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..500 {
            let counter = counter.clone();
            assert!(pool.submit(move || {
                thread::sleep(Duration::from_micros(10));
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }));
        }

        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 500);
        assert_eq!(pool.stats().tasks_completed, 500);
    }

    #[test]
    fn test_submit_after_shutdown_is_dropped() {
        let pool = WorkerPool::new(2).unwrap();
        pool.shutdown();
        assert!(pool.is_stopped());

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        assert!(!pool.submit(move || {
            ran_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_shutdown_twice_is_safe() {
        let pool = WorkerPool::new(3).unwrap();
        pool.submit(|| Ok(()));
        pool.shutdown();
        let stats = pool.stats();
        pool.shutdown();
        assert!(pool.is_stopped());
        assert_eq!(pool.stats(), stats);
    }

    #[test]
    fn test_failing_tasks_do_not_kill_workers() {
        let pool = WorkerPool::new(1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        pool.submit(|| Err(PacketScopeError::MalformedFrame("bad".to_string())));
        pool.submit(|| panic!("decoder exploded"));
        for _ in 0..10 {
            let counter = counter.clone();
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        let stats = pool.stats();
        assert_eq!(stats.tasks_failed, 2);
        assert_eq!(stats.tasks_completed, 10);
        assert_eq!(stats.tasks_executed(), 12);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(&payload), "static message");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(&payload), "owned message");
        let payload: Box<dyn Any + Send> = Box::new(7u32);
        assert_eq!(panic_message(&payload), "unknown panic payload");
    }
}
