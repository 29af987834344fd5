//! Protocol decoder
//!
//! Turns a [`RawFrame`] into a [`DecodedPacket`] by walking the layer chain
//! from the link layer upward.
//!
//! # Architecture
//!
//! ```text
//! link (Ethernet / SLL / Loopback / raw IP)
//!   -> network (VLAN, ARP, IPv4, IPv6, ICMP)
//!     -> transport (TCP, UDP)
//!       -> application (DNS, HTTP, TLS, SSH, FTP, DHCP, NTP)
//! ```
//!
//! Each stage consumes its header and tells the walker what comes next
//! through [`Next`]. Anything a stage cannot parse becomes a
//! [`Layer::Payload`]; bytes beyond an IP datagram's declared length become a
//! [`Layer::Trailer`]. Decoding never fails on damaged protocol data.
//!
//! # Labeling
//!
//! - The protocol label is the last recognized layer (payload and trailers
//!   never count), or [`UNKNOWN_PROTOCOL`] if nothing was recognized.
//! - Addresses come from the last address-bearing layer, so IP addresses
//!   replace MAC addresses.
//! - `info` is the summary of the layer that set the label.

mod application;
mod layer;
mod link;
mod network;
mod transport;

pub use layer::{Layer, MacAddr, TcpFlags};

use crate::error::{PacketScopeError, Result};
use crate::types::{DecodedPacket, LinkType, RawFrame, UNKNOWN_PROTOCOL};

/// What the walker should decode after the current layer
#[derive(Debug)]
pub(crate) enum Next<'a> {
    /// Bytes framed by an EtherType
    EtherType(u16, &'a [u8]),
    /// Bytes framed by an IP protocol number
    IpProtocol(u8, &'a [u8]),
    /// Transport payload with its ports
    Application {
        transport: Transport,
        src_port: u16,
        dst_port: u16,
        payload: &'a [u8],
    },
    /// Bytes no stage understands
    Payload(&'a [u8]),
    /// Nothing left to decode
    Done,
}

/// Transport that carried an application payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transport {
    Tcp,
    Udp,
}

/// Layers collected during one walk
#[derive(Debug, Default)]
pub(crate) struct Dissection {
    pub layers: Vec<Layer>,
    /// Trailer lengths, outermost datagram first
    pub trailers: Vec<usize>,
}

impl Dissection {
    pub fn push(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn push_trailer(&mut self, len: usize) {
        if len > 0 {
            self.trailers.push(len);
        }
    }
}

/// Upper bound on decoded layers; stops pathological tunnel nesting
const MAX_LAYERS: usize = 32;

/// Decode a captured frame
///
/// The returned packet has no id yet; the store assigns one. Fails only when
/// the frame's captured length disagrees with its buffer.
pub fn decode(frame: &RawFrame) -> Result<DecodedPacket> {
    if frame.captured_len != frame.data.len() {
        return Err(PacketScopeError::MalformedFrame(format!(
            "captured length {} does not match buffer length {}",
            frame.captured_len,
            frame.data.len()
        )));
    }

    let layers = dissect(frame.link_type, &frame.data);

    let mut protocol: Option<&'static str> = None;
    let mut info = String::new();
    let mut src_addr = String::new();
    let mut dst_addr = String::new();
    let mut layer_summaries = Vec::with_capacity(layers.len());

    for layer in &layers {
        let summary = layer.to_string();
        if let Some(label) = layer.protocol() {
            protocol = Some(label);
            info.clone_from(&summary);
        }
        if let Some((src, dst)) = layer.addresses() {
            src_addr = src;
            dst_addr = dst;
        }
        layer_summaries.push(summary);
    }

    Ok(DecodedPacket {
        id: 0,
        timestamp: frame.timestamp,
        data: frame.data.clone(),
        captured_len: frame.captured_len,
        frame_len: frame.frame_len,
        src_addr,
        dst_addr,
        protocol: protocol.unwrap_or(UNKNOWN_PROTOCOL).to_string(),
        info,
        layer_summaries,
    })
}

/// Split raw bytes into protocol layers, lowest first
pub fn dissect(link_type: LinkType, data: &[u8]) -> Vec<Layer> {
    let mut out = Dissection::default();

    let mut next = match link_type {
        LinkType::Ethernet => link::ethernet(data, &mut out),
        LinkType::LinuxSll => link::linux_sll(data, &mut out),
        LinkType::Null => link::loopback(data, &mut out),
        LinkType::RawIp => network::raw_ip(data),
        LinkType::Other(_) => Next::Payload(data),
    };

    loop {
        if out.layers.len() >= MAX_LAYERS {
            if let Some(rest) = remaining(&next) {
                next = Next::Payload(rest);
            }
        }
        next = match next {
            Next::EtherType(ether_type, rest) => network::by_ether_type(ether_type, rest, &mut out),
            Next::IpProtocol(protocol, rest) => transport::by_ip_protocol(protocol, rest, &mut out),
            Next::Application {
                transport,
                src_port,
                dst_port,
                payload,
            } => application::detect(transport, src_port, dst_port, payload, &mut out),
            Next::Payload(rest) => {
                if !rest.is_empty() {
                    out.push(Layer::Payload { len: rest.len() });
                }
                break;
            }
            Next::Done => break,
        };
    }

    // Inner trailers sit before outer ones in the byte stream.
    for len in out.trailers.iter().rev() {
        out.layers.push(Layer::Trailer { len: *len });
    }
    out.layers
}

fn remaining<'a>(next: &Next<'a>) -> Option<&'a [u8]> {
    match next {
        Next::EtherType(_, rest) | Next::IpProtocol(_, rest) | Next::Payload(rest) => Some(rest),
        Next::Application { payload, .. } => Some(payload),
        Next::Done => None,
    }
}

/// Read a big-endian u16 at `offset`, if present
pub(crate) fn be_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Read a big-endian u32 at `offset`, if present
pub(crate) fn be_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
