//! Test data builders for creating frames and packets

use chrono::Utc;
use packetscope::capture::frames;
use packetscope::{DecodedPacket, LinkType, RawFrame};
use std::net::{Ipv4Addr, Ipv6Addr};

pub const CLIENT_MAC: [u8; 6] = [0x00, 0x1b, 0x21, 0x0a, 0x0b, 0x0c];
pub const SERVER_MAC: [u8; 6] = [0x3c, 0x22, 0xfb, 0x01, 0x02, 0x03];

/// Transport carried by a [`FrameBuilder`] frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    Tcp { flags: u8 },
    Udp,
}

/// Builder for Ethernet/IP/TCP-or-UDP test frames
pub struct FrameBuilder {
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
    transport: Transport,
    payload: Vec<u8>,
    padding: usize,
    vlan: Option<u16>,
}

impl FrameBuilder {
    /// A TCP SYN from 192.168.1.10:40000 to 192.168.1.20:`dst_port`
    pub fn tcp(dst_port: u16) -> Self {
        Self::new(dst_port, Transport::Tcp {
            flags: frames::tcp_flags::SYN,
        })
    }

    /// A UDP datagram from 192.168.1.10:40000 to 192.168.1.20:`dst_port`
    pub fn udp(dst_port: u16) -> Self {
        Self::new(dst_port, Transport::Udp)
    }

    fn new(dst_port: u16, transport: Transport) -> Self {
        Self {
            src_ip: Ipv4Addr::new(192, 168, 1, 10),
            dst_ip: Ipv4Addr::new(192, 168, 1, 20),
            src_port: 40000,
            dst_port,
            transport,
            payload: Vec::new(),
            padding: 0,
            vlan: None,
        }
    }

    pub fn src(mut self, ip: Ipv4Addr, port: u16) -> Self {
        self.src_ip = ip;
        self.src_port = port;
        self
    }

    pub fn dst_ip(mut self, ip: Ipv4Addr) -> Self {
        self.dst_ip = ip;
        self
    }

    pub fn tcp_flags(mut self, flags: u8) -> Self {
        self.transport = Transport::Tcp { flags };
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    /// Zero bytes appended after the IP datagram
    pub fn padding(mut self, len: usize) -> Self {
        self.padding = len;
        self
    }

    /// Wrap the IP packet in an 802.1Q tag
    pub fn vlan(mut self, vlan_id: u16) -> Self {
        self.vlan = Some(vlan_id);
        self
    }

    pub fn build(self) -> RawFrame {
        let (protocol, segment) = match self.transport {
            Transport::Tcp { flags } => (
                frames::IPPROTO_TCP,
                frames::tcp(self.src_port, self.dst_port, 1, flags, &self.payload),
            ),
            Transport::Udp => (
                frames::IPPROTO_UDP,
                frames::udp(self.src_port, self.dst_port, &self.payload),
            ),
        };
        let mut packet = frames::ipv4(self.src_ip, self.dst_ip, protocol, &segment);
        packet.extend(std::iter::repeat(0u8).take(self.padding));

        let data = match self.vlan {
            Some(vlan_id) => frames::ethernet(
                CLIENT_MAC,
                SERVER_MAC,
                frames::ETHERTYPE_VLAN,
                &frames::vlan_tag(vlan_id, 0, frames::ETHERTYPE_IPV4, &packet),
            ),
            None => frames::ethernet(CLIENT_MAC, SERVER_MAC, frames::ETHERTYPE_IPV4, &packet),
        };
        RawFrame::new(data, LinkType::Ethernet)
    }
}

/// An Ethernet frame with an unassigned EtherType and opaque body
pub fn opaque_ethernet_frame(body_len: usize) -> RawFrame {
    let body = vec![0xa5; body_len];
    RawFrame::new(
        frames::ethernet(CLIENT_MAC, SERVER_MAC, 0x88b5, &body),
        LinkType::Ethernet,
    )
}

/// An ICMPv6 echo request over Ethernet
pub fn icmpv6_echo_frame() -> RawFrame {
    let src = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1);
    let dst = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 2);
    let echo = frames::icmp_echo(1, 1, true, b"ping");
    let packet = frames::ipv6(src, dst, frames::IPPROTO_ICMPV6, &echo);
    RawFrame::new(
        frames::ethernet(CLIENT_MAC, SERVER_MAC, frames::ETHERTYPE_IPV6, &packet),
        LinkType::Ethernet,
    )
}

/// A minimal decoded packet for store tests
pub fn decoded_packet(protocol: &str) -> DecodedPacket {
    DecodedPacket {
        id: 0,
        timestamp: Utc::now(),
        data: vec![0u8; 4],
        captured_len: 4,
        frame_len: 4,
        src_addr: "10.0.0.1".to_string(),
        dst_addr: "10.0.0.2".to_string(),
        protocol: protocol.to_string(),
        info: String::new(),
        layer_summaries: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_builder_lengths() {
        let frame = FrameBuilder::udp(9999).payload(b"abcd").padding(3).build();
        assert_eq!(frame.data.len(), 14 + 20 + 8 + 4 + 3);
        assert_eq!(frame.captured_len, frame.data.len());
    }
}
