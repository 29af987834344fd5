//! Capture pipeline.
//!
//! Frames flow from a capture source through a blocking queue to a single
//! dispatcher thread, which hands each one to a worker pool for decoding.
//! Workers append decoded packets to a shared store.
//!
//! # Architecture
//!
//! ```text
//! [CaptureSource] ──► [IngestQueue] ──► [dispatcher] ──► [WorkerPool] ──► [PacketStore]
//!   delivery thread      FIFO          one thread        K threads        RwLock
//! ```
//!
//! # Design
//!
//! - **Explicit end-of-stream**: the queue and the pool stop on a tagged
//!   marker, never on an empty payload.
//! - **Ordered shutdown**: source, marker, dispatcher, pool. Nothing delivered
//!   before `stop()` is lost.
//! - **Ordering**: frames reach the pool in capture order, but with more than
//!   one worker the store's id order follows insertion, not capture.

pub mod controller;
pub mod pool;
pub mod queue;
pub mod store;

pub use controller::PipelineController;
pub use pool::{PoolStats, Task, WorkerPool};
pub use queue::{IngestQueue, QueueItem};
pub use store::PacketStore;
