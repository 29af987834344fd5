//! Mock capture source for testing
//!
//! This module provides a capture source that needs no network hardware or
//! privileges. It replays a script of frames from its own delivery thread
//! when started, and lets tests push extra frames with [`MockCaptureSource::inject`].
//!
//! # Features
//!
//! - **Configurable devices**: any device list, looked up by name on `start`
//! - **Scripted frames**: replayed in order on every `start`
//! - **Generated traffic**: [`FramePattern`] builds realistic frames
//! - **Failure switches**: refuse to open or to start a device
//!
//! # Example
//!
//! ```ignore
//! use packetscope::capture::{CaptureSource, FramePattern, MockCaptureSource};
//!
//! let source = MockCaptureSource::new().with_generated(FramePattern::Mixed, 100);
//! source.start("mock0", Some(sink))?;
//! ```

use super::frames::{self, tcp_flags};
use super::{CaptureSource, FrameSink};
use crate::error::{PacketScopeError, Result};
use crate::types::{DeviceInfo, LinkType, RawFrame};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const MOCK_SRC_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
const MOCK_DST_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x02];

/// Kind of traffic produced by [`FramePattern::build`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePattern {
    /// TCP segments from an HTTP client
    Tcp,
    /// DNS queries over UDP
    Dns,
    /// ARP requests
    Arp,
    /// ICMP echo requests
    Icmp,
    /// UDP over IPv6
    Ipv6,
    /// Random bytes with no recognizable header
    Garbage,
    /// Cycle through all of the above
    #[default]
    Mixed,
}

impl FramePattern {
    const CYCLE: [FramePattern; 6] = [
        FramePattern::Tcp,
        FramePattern::Dns,
        FramePattern::Arp,
        FramePattern::Icmp,
        FramePattern::Ipv6,
        FramePattern::Garbage,
    ];

    /// Build the `seq`-th frame of this pattern
    ///
    /// Frames are deterministic in `seq`; ports and addresses vary with it.
    pub fn build(&self, seq: u64) -> RawFrame {
        let host = (seq % 250) as u8 + 2;
        let client = Ipv4Addr::new(192, 168, 0, host);
        let server = Ipv4Addr::new(10, 0, 0, 1);
        let ephemeral = 49152 + (seq % 16000) as u16;

        let data = match self {
            FramePattern::Mixed => {
                let pattern = Self::CYCLE[(seq % Self::CYCLE.len() as u64) as usize];
                return pattern.build(seq);
            }
            FramePattern::Tcp => {
                let request = format!("GET /item/{} HTTP/1.1\r\nHost: mock\r\n\r\n", seq);
                let segment = frames::tcp(
                    ephemeral,
                    80,
                    seq as u32,
                    tcp_flags::PSH | tcp_flags::ACK,
                    request.as_bytes(),
                );
                let packet = frames::ipv4(client, server, frames::IPPROTO_TCP, &segment);
                frames::ethernet(MOCK_SRC_MAC, MOCK_DST_MAC, frames::ETHERTYPE_IPV4, &packet)
            }
            FramePattern::Dns => {
                let name = format!("host{}.example.com", seq);
                let query = frames::dns_query(seq as u16, &name);
                let datagram = frames::udp(ephemeral, 53, &query);
                let packet = frames::ipv4(client, server, frames::IPPROTO_UDP, &datagram);
                frames::ethernet(MOCK_SRC_MAC, MOCK_DST_MAC, frames::ETHERTYPE_IPV4, &packet)
            }
            FramePattern::Arp => {
                let arp = frames::arp_request(MOCK_SRC_MAC, client, server);
                frames::ethernet(MOCK_SRC_MAC, [0xff; 6], frames::ETHERTYPE_ARP, &arp)
            }
            FramePattern::Icmp => {
                let echo = frames::icmp_echo(0x4d4b, seq as u16, false, b"packetscope");
                let packet = frames::ipv4(client, server, frames::IPPROTO_ICMP, &echo);
                frames::ethernet(MOCK_SRC_MAC, MOCK_DST_MAC, frames::ETHERTYPE_IPV4, &packet)
            }
            FramePattern::Ipv6 => {
                let src = Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, u16::from(host));
                let dst = Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 1);
                let datagram = frames::udp(ephemeral, 9000, &seq.to_be_bytes());
                let packet = frames::ipv6(src, dst, frames::IPPROTO_UDP, &datagram);
                frames::ethernet(MOCK_SRC_MAC, MOCK_DST_MAC, frames::ETHERTYPE_IPV6, &packet)
            }
            FramePattern::Garbage => {
                // Short enough that no Ethernet header fits.
                let len = 1 + (seq % 13) as usize;
                let mut state = seq.wrapping_mul(0x9e37_79b9_7f4a_7c15) | 1;
                (0..len)
                    .map(|_| {
                        state ^= state << 13;
                        state ^= state >> 7;
                        state ^= state << 17;
                        state as u8
                    })
                    .collect()
            }
        };

        RawFrame::new(data, LinkType::Ethernet)
    }
}

#[derive(Default)]
struct MockState {
    /// Device of the active capture
    device: Option<String>,
    sink: Option<FrameSink>,
    delivery: Option<JoinHandle<()>>,
}

/// Capture source producing scripted and generated frames
pub struct MockCaptureSource {
    devices: Vec<DeviceInfo>,
    script: Vec<RawFrame>,
    frame_interval: Duration,
    fail_open: AtomicBool,
    fail_start: AtomicBool,
    state: Mutex<MockState>,
    running: AtomicBool,
    stop_requested: Arc<AtomicBool>,
    captured: Arc<AtomicU64>,
}

impl MockCaptureSource {
    /// Create a mock source with two devices and an empty script
    pub fn new() -> Self {
        Self {
            devices: vec![
                DeviceInfo::new("mock0", "Mock Ethernet adapter"),
                DeviceInfo::new("mock1", "Mock loopback adapter"),
            ],
            script: Vec::new(),
            frame_interval: Duration::ZERO,
            fail_open: AtomicBool::new(false),
            fail_start: AtomicBool::new(false),
            state: Mutex::new(MockState::default()),
            running: AtomicBool::new(false),
            stop_requested: Arc::new(AtomicBool::new(false)),
            captured: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Replace the device list
    pub fn with_devices(mut self, devices: Vec<DeviceInfo>) -> Self {
        self.devices = devices;
        self
    }

    /// Append frames to the script
    pub fn with_frames(mut self, frames: impl IntoIterator<Item = RawFrame>) -> Self {
        self.script.extend(frames);
        self
    }

    /// Append `count` frames of `pattern` to the script
    pub fn with_generated(self, pattern: FramePattern, count: usize) -> Self {
        self.with_frames((0..count as u64).map(|seq| pattern.build(seq)))
    }

    /// Pause between scripted frames
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Make `start` fail as if the device could not be opened
    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Make `start` fail as if the capture mechanism refused to start
    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Device of the active capture
    pub fn current_device(&self) -> Option<String> {
        lock(&self.state).device.clone()
    }

    /// Deliver one frame from the calling thread
    ///
    /// Returns `false` (dropping the frame) when no capture is active.
    pub fn inject(&self, frame: RawFrame) -> bool {
        // Holding the lock keeps delivery and `stop` strictly ordered.
        let state = lock(&self.state);
        match &state.sink {
            Some(sink) => {
                sink(frame);
                self.captured.fetch_add(1, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Whether the scripted replay of the current capture has finished
    pub fn replay_finished(&self) -> bool {
        lock(&self.state)
            .delivery
            .as_ref()
            .map_or(true, |handle| handle.is_finished())
    }
}

impl Default for MockCaptureSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for MockCaptureSource {
    fn list_devices(&self) -> Vec<DeviceInfo> {
        self.devices.clone()
    }

    fn start(&self, device: &str, sink: Option<FrameSink>) -> Result<()> {
        let sink = sink.ok_or(PacketScopeError::NoFrameSink)?;
        let mut state = lock(&self.state);

        if let Some(active) = &state.device {
            return Err(PacketScopeError::AlreadyCapturing {
                device: active.clone(),
            });
        }
        if !self.devices.iter().any(|d| d.name == device) {
            return Err(PacketScopeError::DeviceNotFound(device.to_string()));
        }
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(PacketScopeError::DeviceOpen {
                device: device.to_string(),
                message: "simulated open failure".to_string(),
            });
        }
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(PacketScopeError::CaptureStart {
                device: device.to_string(),
                message: "simulated start failure".to_string(),
            });
        }

        let script = self.script.clone();
        let interval = self.frame_interval;
        let stop_requested = self.stop_requested.clone();
        let captured = self.captured.clone();
        let delivery_sink = sink.clone();
        stop_requested.store(false, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name("packetscope-mock-capture".to_string())
            .spawn(move || {
                for frame in script {
                    if stop_requested.load(Ordering::SeqCst) {
                        break;
                    }
                    if !interval.is_zero() {
                        thread::sleep(interval);
                    }
                    delivery_sink(frame);
                    captured.fetch_add(1, Ordering::SeqCst);
                }
                tracing::debug!("Mock capture replay finished");
            })
            .map_err(|e| PacketScopeError::CaptureStart {
                device: device.to_string(),
                message: e.to_string(),
            })?;

        state.device = Some(device.to_string());
        state.sink = Some(sink);
        state.delivery = Some(handle);
        self.running.store(true, Ordering::SeqCst);

        tracing::info!("Mock capture started on {}", device);
        Ok(())
    }

    fn stop(&self) {
        let mut state = lock(&self.state);
        let Some(device) = state.device.take() else {
            return;
        };

        self.stop_requested.store(true, Ordering::SeqCst);
        state.sink = None;
        if let Some(handle) = state.delivery.take() {
            if handle.join().is_err() {
                tracing::error!("Mock delivery thread panicked");
            }
        }
        self.running.store(false, Ordering::SeqCst);

        tracing::info!("Mock capture stopped on {}", device);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn captured_count(&self) -> u64 {
        self.captured.load(Ordering::SeqCst)
    }
}

impl Drop for MockCaptureSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
