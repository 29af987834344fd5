//! # packetscope: live packet capture pipeline
//!
//! Captures frames from a network device, decodes them on a pool of worker
//! threads and keeps the results in an in-memory store that any thread can
//! query while the capture runs.
//!
//! ## Architecture
//!
//! - **Capture**: a [`CaptureSource`](capture::CaptureSource) delivers raw frames from its own thread
//! - **Pipeline**: queue, dispatcher and worker pool, driven by [`PipelineController`]
//! - **Decoder**: layer-by-layer protocol dissection into [`DecodedPacket`]s
//! - **Store**: append-only, id-addressed [`PacketStore`]
//!
//! ## Configuration
//!
//! Settings are read from `config.toml` in the platform data directory under
//! `packetscope` (see [`config`]).
//!
//! ## Example
//!
//! ```ignore
//! use packetscope::{capture::MockCaptureSource, FramePattern, PipelineController};
//! use std::sync::Arc;
//!
//! let source = Arc::new(MockCaptureSource::new().with_generated(FramePattern::Mixed, 100));
//! let controller = PipelineController::new(source, 4)?;
//!
//! controller.start("mock0");
//! // ... later
//! controller.stop();
//! for packet in controller.store().get_all_packets() {
//!     println!("{} {} -> {} {}", packet.id, packet.src_addr, packet.dst_addr, packet.protocol);
//! }
//! ```

pub mod capture;
pub mod config;
pub mod decoder;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod types;

// Re-export commonly used types
pub use capture::{CaptureSource, FramePattern, FrameSink, MockCaptureSource};
pub use config::AppConfig;
pub use error::{PacketScopeError, Result};
pub use pipeline::{PacketStore, PipelineController};
pub use types::{DecodedPacket, DeviceInfo, LinkType, RawFrame};
