//! Capture sources
//!
//! A [`CaptureSource`] enumerates devices and, once started, delivers
//! [`RawFrame`]s to a [`FrameSink`] from a thread the source owns.
//!
//! # Implementations
//!
//! - [`MockCaptureSource`] - scripted and generated frames, no hardware needed
//! - `PcapCaptureSource` - live capture through libpcap (feature `live-capture`)
//!
//! All methods take `&self`; implementations keep their state behind interior
//! mutability so status queries never wait on a running capture.

pub mod frames;
pub mod mock;
#[cfg(feature = "live-capture")]
pub mod pcap;

pub use mock::{FramePattern, MockCaptureSource};
#[cfg(feature = "live-capture")]
pub use self::pcap::PcapCaptureSource;

use crate::error::Result;
use crate::types::{DeviceInfo, RawFrame};
use std::sync::Arc;

/// Callback receiving every captured frame
///
/// Called from the source's delivery thread (or any thread, for the mock),
/// possibly concurrently. It must not block.
pub type FrameSink = Arc<dyn Fn(RawFrame) + Send + Sync>;

/// A producer of raw frames
pub trait CaptureSource: Send + Sync {
    /// Enumerate capture devices
    ///
    /// Backend failures are logged and produce an empty list.
    fn list_devices(&self) -> Vec<DeviceInfo>;

    /// Begin delivering frames from `device` to `sink`
    ///
    /// Fails without changing state when no sink is given, a capture is
    /// already active, or the device cannot be found, opened or started.
    fn start(&self, device: &str, sink: Option<FrameSink>) -> Result<()>;

    /// Halt delivery and release the device
    ///
    /// Returns once the delivery thread has finished. Safe to call when not
    /// running.
    fn stop(&self);

    /// Whether a capture is active
    fn is_running(&self) -> bool;

    /// Frames delivered since the source was created
    fn captured_count(&self) -> u64;
}

/// Look a device up by name
pub fn find_device(source: &dyn CaptureSource, name: &str) -> Option<DeviceInfo> {
    source.list_devices().into_iter().find(|d| d.name == name)
}
