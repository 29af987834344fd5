//! Builders for synthetic frames
//!
//! Used by [`MockCaptureSource`](super::MockCaptureSource) to generate
//! traffic and by tests and benchmarks to craft specific packets. Each
//! function returns the bytes of one header followed by its payload, so
//! frames are built inside-out:
//!
//! ```ignore
//! let frame = ethernet(SRC_MAC, DST_MAC, ETHERTYPE_IPV4,
//!     &ipv4(src, dst, IPPROTO_UDP, &udp(5353, 53, &dns_query(7, "example.com"))));
//! ```

use std::net::{Ipv4Addr, Ipv6Addr};

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETHERTYPE_IPV6: u16 = 0x86dd;
pub const ETHERTYPE_VLAN: u16 = 0x8100;

pub const IPPROTO_ICMP: u8 = 1;
pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;
pub const IPPROTO_ICMPV6: u8 = 58;

/// TCP flag bits
pub mod tcp_flags {
    pub const FIN: u8 = 0x01;
    pub const SYN: u8 = 0x02;
    pub const RST: u8 = 0x04;
    pub const PSH: u8 = 0x08;
    pub const ACK: u8 = 0x10;
}

/// Ethernet II header plus payload
pub fn ethernet(src: [u8; 6], dst: [u8; 6], ether_type: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(14 + payload.len());
    frame.extend_from_slice(&dst);
    frame.extend_from_slice(&src);
    frame.extend_from_slice(&ether_type.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// 802.1Q tag plus payload (goes after an Ethernet header with [`ETHERTYPE_VLAN`])
pub fn vlan_tag(vlan_id: u16, priority: u8, ether_type: u16, payload: &[u8]) -> Vec<u8> {
    let tci = (u16::from(priority & 0x07) << 13) | (vlan_id & 0x0fff);
    let mut tag = Vec::with_capacity(4 + payload.len());
    tag.extend_from_slice(&tci.to_be_bytes());
    tag.extend_from_slice(&ether_type.to_be_bytes());
    tag.extend_from_slice(payload);
    tag
}

/// IPv4 header (no options, valid checksum) plus payload
pub fn ipv4(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, payload: &[u8]) -> Vec<u8> {
    let total_len = (20 + payload.len()).min(usize::from(u16::MAX)) as u16;
    let mut packet = Vec::with_capacity(20 + payload.len());
    packet.extend_from_slice(&[0x45, 0x00]);
    packet.extend_from_slice(&total_len.to_be_bytes());
    // Identification 0, don't fragment
    packet.extend_from_slice(&[0x00, 0x00, 0x40, 0x00]);
    packet.extend_from_slice(&[64, protocol, 0x00, 0x00]);
    packet.extend_from_slice(&src.octets());
    packet.extend_from_slice(&dst.octets());

    let checksum = internet_checksum(&packet[..20]);
    packet[10..12].copy_from_slice(&checksum.to_be_bytes());
    packet.extend_from_slice(payload);
    packet
}

/// IPv6 header plus payload
pub fn ipv6(src: Ipv6Addr, dst: Ipv6Addr, next_header: u8, payload: &[u8]) -> Vec<u8> {
    let payload_len = payload.len().min(usize::from(u16::MAX)) as u16;
    let mut packet = Vec::with_capacity(40 + payload.len());
    packet.extend_from_slice(&[0x60, 0x00, 0x00, 0x00]);
    packet.extend_from_slice(&payload_len.to_be_bytes());
    packet.extend_from_slice(&[next_header, 64]);
    packet.extend_from_slice(&src.octets());
    packet.extend_from_slice(&dst.octets());
    packet.extend_from_slice(payload);
    packet
}

/// TCP header (no options) plus payload
pub fn tcp(src_port: u16, dst_port: u16, seq: u32, flags: u8, payload: &[u8]) -> Vec<u8> {
    let mut segment = Vec::with_capacity(20 + payload.len());
    segment.extend_from_slice(&src_port.to_be_bytes());
    segment.extend_from_slice(&dst_port.to_be_bytes());
    segment.extend_from_slice(&seq.to_be_bytes());
    let ack = if flags & tcp_flags::ACK != 0 { 1u32 } else { 0 };
    segment.extend_from_slice(&ack.to_be_bytes());
    segment.extend_from_slice(&[0x50, flags]);
    segment.extend_from_slice(&65535u16.to_be_bytes());
    segment.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    segment.extend_from_slice(payload);
    segment
}

/// UDP header plus payload
pub fn udp(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let length = (8 + payload.len()).min(usize::from(u16::MAX)) as u16;
    let mut datagram = Vec::with_capacity(8 + payload.len());
    datagram.extend_from_slice(&src_port.to_be_bytes());
    datagram.extend_from_slice(&dst_port.to_be_bytes());
    datagram.extend_from_slice(&length.to_be_bytes());
    datagram.extend_from_slice(&[0x00, 0x00]);
    datagram.extend_from_slice(payload);
    datagram
}

/// ARP request for Ethernet/IPv4 ("who has `target_ip`?")
pub fn arp_request(sender_mac: [u8; 6], sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Vec<u8> {
    let mut arp = Vec::with_capacity(28);
    arp.extend_from_slice(&[0x00, 0x01]);
    arp.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
    arp.extend_from_slice(&[6, 4, 0x00, 0x01]);
    arp.extend_from_slice(&sender_mac);
    arp.extend_from_slice(&sender_ip.octets());
    arp.extend_from_slice(&[0; 6]);
    arp.extend_from_slice(&target_ip.octets());
    arp
}

/// ICMP echo request (or ICMPv6 echo request when `v6`)
pub fn icmp_echo(identifier: u16, sequence: u16, v6: bool, payload: &[u8]) -> Vec<u8> {
    let icmp_type = if v6 { 128 } else { 8 };
    let mut message = Vec::with_capacity(8 + payload.len());
    message.extend_from_slice(&[icmp_type, 0, 0x00, 0x00]);
    message.extend_from_slice(&identifier.to_be_bytes());
    message.extend_from_slice(&sequence.to_be_bytes());
    message.extend_from_slice(payload);
    if !v6 {
        let checksum = internet_checksum(&message);
        message[2..4].copy_from_slice(&checksum.to_be_bytes());
    }
    message
}

/// DNS query for an A record of `name`
pub fn dns_query(transaction_id: u16, name: &str) -> Vec<u8> {
    let mut message = Vec::with_capacity(12 + name.len() + 6);
    message.extend_from_slice(&transaction_id.to_be_bytes());
    // Standard query, recursion desired, one question
    message.extend_from_slice(&[0x01, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
    for label in name.split('.').filter(|l| !l.is_empty()) {
        let label = &label.as_bytes()[..label.len().min(63)];
        message.push(label.len() as u8);
        message.extend_from_slice(label);
    }
    message.push(0);
    message.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
    message
}

/// RFC 1071 one's complement checksum
fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = data
        .chunks(2)
        .map(|pair| u32::from(u16::from_be_bytes([pair[0], *pair.get(1).unwrap_or(&0)])))
        .sum();
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}
