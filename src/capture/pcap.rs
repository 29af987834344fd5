//! Live capture through libpcap
//!
//! Opens a device with the parameters from [`CaptureConfig`] and reads it on
//! a dedicated thread. Reads time out periodically so the thread can notice a
//! stop request without closing the handle underneath a blocked read, so
//! the timeout is never allowed to be zero (libpcap would block forever).
//!
//! When the device runs dry or fails, the read thread clears the running
//! flag itself; `stop()` still has to be called to release the device.

use super::{CaptureSource, FrameSink};
use crate::config::CaptureConfig;
use crate::error::{PacketScopeError, Result};
use crate::types::{DeviceInfo, LinkType, RawFrame};
use chrono::{DateTime, Utc};
use pcap::{Activated, Active, Capture, Device};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

#[derive(Default)]
struct LiveState {
    device: Option<String>,
    reader: Option<JoinHandle<()>>,
}

/// Capture source backed by libpcap
pub struct PcapCaptureSource {
    config: CaptureConfig,
    state: Mutex<LiveState>,
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
    captured: Arc<AtomicU64>,
}

impl PcapCaptureSource {
    /// Create a source using the given capture parameters
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LiveState::default()),
            running: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
            captured: Arc::new(AtomicU64::new(0)),
        }
    }

    fn open(&self, device: &str) -> Result<Capture<Active>> {
        let to_open_error = |e: pcap::Error| PacketScopeError::DeviceOpen {
            device: device.to_string(),
            message: e.to_string(),
        };

        Capture::from_device(device)
            .map_err(to_open_error)?
            .promisc(self.config.promiscuous)
            .snaplen(i32::try_from(self.config.snaplen).unwrap_or(i32::MAX))
            .timeout(read_timeout_ms(self.config.read_timeout_ms))
            .immediate_mode(self.config.immediate_mode)
            .open()
            .map_err(to_open_error)
    }
}

impl CaptureSource for PcapCaptureSource {
    fn list_devices(&self) -> Vec<DeviceInfo> {
        match Device::list() {
            Ok(devices) => devices
                .into_iter()
                .map(|d| DeviceInfo::new(d.name, d.desc.unwrap_or_default()))
                .collect(),
            Err(e) => {
                tracing::error!("Failed to list capture devices: {}", e);
                Vec::new()
            }
        }
    }

    fn start(&self, device: &str, sink: Option<FrameSink>) -> Result<()> {
        let sink = sink.ok_or(PacketScopeError::NoFrameSink)?;
        let mut state = lock(&self.state);

        if state.device.is_some() && !self.running.load(Ordering::SeqCst) {
            if let Some(reader) = state.reader.take() {
                if reader.join().is_err() {
                    tracing::error!("Capture thread panicked");
                }
            }
            state.device = None;
        }
        if let Some(active) = &state.device {
            return Err(PacketScopeError::AlreadyCapturing {
                device: active.clone(),
            });
        }
        if super::find_device(self, device).is_none() {
            return Err(PacketScopeError::DeviceNotFound(device.to_string()));
        }

        let capture = self.open(device)?;
        let link_type = LinkType::from_dlt(capture.get_datalink().0);
        tracing::debug!("Opened {} with link type {}", device, link_type);

        let reader_state = ReaderState {
            stop_requested: self.stop_requested.clone(),
            running: self.running.clone(),
            captured: self.captured.clone(),
        };
        reader_state.stop_requested.store(false, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);

        let spawned = thread::Builder::new()
            .name("packetscope-pcap".to_string())
            .spawn(move || read_loop(capture, link_type, sink, reader_state));
        let reader = spawned.map_err(|e| {
            self.running.store(false, Ordering::SeqCst);
            PacketScopeError::CaptureStart {
                device: device.to_string(),
                message: e.to_string(),
            }
        })?;

        state.device = Some(device.to_string());
        state.reader = Some(reader);

        tracing::info!("Live capture started on {}", device);
        Ok(())
    }

    fn stop(&self) {
        let mut state = lock(&self.state);
        let Some(device) = state.device.take() else {
            return;
        };

        self.stop_requested.store(true, Ordering::SeqCst);
        if let Some(reader) = state.reader.take() {
            if reader.join().is_err() {
                tracing::error!("Capture thread panicked");
            }
        }
        self.running.store(false, Ordering::SeqCst);

        tracing::info!("Live capture stopped on {}", device);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn captured_count(&self) -> u64 {
        self.captured.load(Ordering::SeqCst)
    }
}

impl Drop for PcapCaptureSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Flags shared between the source and its read thread
struct ReaderState {
    stop_requested: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    captured: Arc<AtomicU64>,
}

fn read_loop<T: Activated + ?Sized>(
    mut capture: Capture<T>,
    link_type: LinkType,
    sink: FrameSink,
    state: ReaderState,
) {
    while !state.stop_requested.load(Ordering::SeqCst) {
        match capture.next_packet() {
            Ok(packet) => {
                let header = packet.header;
                let frame = RawFrame::new(packet.data.to_vec(), link_type)
                    .with_timestamp(timeval_to_utc(
                        header.ts.tv_sec as i64,
                        header.ts.tv_usec as i64,
                    ))
                    .with_frame_len(header.len as usize);
                sink(frame);
                state.captured.fetch_add(1, Ordering::SeqCst);
            }
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(pcap::Error::NoMorePackets) => {
                tracing::info!("Capture source reached end of stream");
                break;
            }
            Err(e) => {
                tracing::error!("Capture read failed: {}", e);
                break;
            }
        }
    }
    state.running.store(false, Ordering::SeqCst);
    tracing::debug!("Capture thread exiting");
}

/// libpcap treats a zero timeout as "block until a packet arrives"
fn read_timeout_ms(configured: u32) -> i32 {
    i32::try_from(configured.max(1)).unwrap_or(i32::MAX)
}

fn timeval_to_utc(secs: i64, micros: i64) -> DateTime<Utc> {
    let nanos = u32::try_from(micros.clamp(0, 999_999) * 1_000).unwrap_or(0);
    DateTime::from_timestamp(secs, nanos).unwrap_or_else(Utc::now)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
