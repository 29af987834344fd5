//! Core data types for packetscope
//!
//! This module contains the records that flow through the capture pipeline.
//!
//! # Main Types
//!
//! - [`LinkType`] - Link-layer framing of a captured frame
//! - [`RawFrame`] - Bytes and metadata exactly as delivered by a capture source
//! - [`DecodedPacket`] - Structured, addressed and labeled record kept in the store
//! - [`DeviceInfo`] - A capture device as reported by a capture source
//!
//! A `RawFrame` is produced once per delivery and consumed once by the
//! decoder. The resulting `DecodedPacket` carries its own copy of the bytes
//! so it can be inspected long after the frame is gone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Protocol label used when no layer of a frame was recognized
pub const UNKNOWN_PROTOCOL: &str = "Unknown";

/// Link-layer framing of a captured frame
///
/// Values map to libpcap DLT numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LinkType {
    /// BSD loopback encapsulation (DLT_NULL)
    Null,
    /// Ethernet II (DLT_EN10MB)
    #[default]
    Ethernet,
    /// Raw IPv4/IPv6 without a link header (DLT_RAW and its aliases)
    RawIp,
    /// Linux "cooked" capture (DLT_LINUX_SLL)
    LinuxSll,
    /// Any other DLT the decoder does not understand
    Other(i32),
}

impl LinkType {
    /// Map a libpcap DLT number to a link type
    pub fn from_dlt(dlt: i32) -> Self {
        match dlt {
            0 => LinkType::Null,
            1 => LinkType::Ethernet,
            12 | 14 | 101 => LinkType::RawIp,
            113 => LinkType::LinuxSll,
            other => LinkType::Other(other),
        }
    }

    /// The canonical libpcap DLT number
    pub fn dlt(&self) -> i32 {
        match self {
            LinkType::Null => 0,
            LinkType::Ethernet => 1,
            LinkType::RawIp => 101,
            LinkType::LinuxSll => 113,
            LinkType::Other(dlt) => *dlt,
        }
    }
}

impl std::fmt::Display for LinkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkType::Null => write!(f, "Null/Loopback"),
            LinkType::Ethernet => write!(f, "Ethernet"),
            LinkType::RawIp => write!(f, "Raw IP"),
            LinkType::LinuxSll => write!(f, "Linux cooked"),
            LinkType::Other(dlt) => write!(f, "DLT {}", dlt),
        }
    }
}

/// A frame exactly as delivered by a capture source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Capture timestamp
    pub timestamp: DateTime<Utc>,
    /// Captured bytes (owned)
    pub data: Vec<u8>,
    /// Number of bytes captured (equals `data.len()` for a well-formed frame)
    pub captured_len: usize,
    /// Length of the frame on the wire (may exceed `captured_len` when truncated by snaplen)
    pub frame_len: usize,
    /// Link-layer framing
    pub link_type: LinkType,
}

impl RawFrame {
    /// Create a frame whose captured and wire lengths equal the buffer length
    pub fn new(data: Vec<u8>, link_type: LinkType) -> Self {
        let len = data.len();
        Self {
            timestamp: Utc::now(),
            data,
            captured_len: len,
            frame_len: len,
            link_type,
        }
    }

    /// Set the capture timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the original wire length
    pub fn with_frame_len(mut self, frame_len: usize) -> Self {
        self.frame_len = frame_len;
        self
    }

    /// Whether the capture truncated the frame
    pub fn is_truncated(&self) -> bool {
        self.captured_len < self.frame_len
    }
}

/// A decoded packet as kept by the [`PacketStore`](crate::pipeline::PacketStore)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPacket {
    /// Sequential id assigned by the store (1-based, 0 = not stored yet)
    pub id: u64,
    /// Capture timestamp
    pub timestamp: DateTime<Utc>,
    /// Copy of the captured bytes
    pub data: Vec<u8>,
    /// Number of bytes captured
    pub captured_len: usize,
    /// Length of the frame on the wire
    pub frame_len: usize,
    /// Source address (IP when present, otherwise link-layer)
    pub src_addr: String,
    /// Destination address (IP when present, otherwise link-layer)
    pub dst_addr: String,
    /// Label of the highest recognized protocol layer
    pub protocol: String,
    /// Summary of the highest recognized layer
    pub info: String,
    /// One summary line per decoded layer, lowest layer first
    pub layer_summaries: Vec<String>,
}

impl DecodedPacket {
    /// Whether the store has assigned an id to this packet
    pub fn is_stored(&self) -> bool {
        self.id != 0
    }

    /// Whether no layer of the frame was recognized
    pub fn is_unknown(&self) -> bool {
        self.protocol == UNKNOWN_PROTOCOL
    }
}

/// A capture device as reported by a capture source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name used to start a capture (e.g. "eth0")
    pub name: String,
    /// Human readable description
    pub description: String,
}

impl DeviceInfo {
    /// Create a new device entry
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

impl std::fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.description.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} ({})", self.name, self.description)
        }
    }
}
