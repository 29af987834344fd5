//! Decoded protocol layers.
//!
//! [`Layer`] is a closed set: every protocol the decoder recognizes is one
//! variant, plus [`Layer::Payload`] for unrecognized bytes and
//! [`Layer::Trailer`] for bytes past the end of an IP datagram. Adding a
//! protocol means adding a variant and its three match arms below.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// A 48-bit hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", a, b, c, d, e, g)
    }
}

/// TCP control flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpFlags {
    pub syn: bool,
    pub ack: bool,
    pub fin: bool,
    pub rst: bool,
    pub psh: bool,
    pub urg: bool,
}

impl fmt::Display for TcpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (self.syn, "SYN"),
            (self.fin, "FIN"),
            (self.rst, "RST"),
            (self.psh, "PSH"),
            (self.ack, "ACK"),
            (self.urg, "URG"),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, name)| *name)
        .collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// One decoded protocol layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layer {
    /// Ethernet II header
    Ethernet {
        src: MacAddr,
        dst: MacAddr,
        ether_type: u16,
    },
    /// Linux cooked capture header
    LinuxSll {
        packet_type: u16,
        link_addr: Vec<u8>,
        protocol: u16,
    },
    /// BSD loopback header
    Loopback { family: u32 },
    /// 802.1Q / 802.1ad tag
    Vlan {
        vlan_id: u16,
        priority: u8,
        ether_type: u16,
    },
    /// Address Resolution Protocol
    Arp {
        operation: u16,
        sender_ip: Option<Ipv4Addr>,
        target_ip: Option<Ipv4Addr>,
    },
    /// IPv4 header
    Ipv4 {
        src: Ipv4Addr,
        dst: Ipv4Addr,
        protocol: u8,
        ttl: u8,
        total_len: u16,
    },
    /// IPv6 header
    Ipv6 {
        src: Ipv6Addr,
        dst: Ipv6Addr,
        next_header: u8,
        hop_limit: u8,
        payload_len: u16,
    },
    /// ICMP for IPv4
    Icmp { icmp_type: u8, code: u8 },
    /// ICMP for IPv6
    Icmpv6 { icmp_type: u8, code: u8 },
    /// TCP header
    Tcp {
        src_port: u16,
        dst_port: u16,
        seq: u32,
        ack: u32,
        flags: TcpFlags,
        window: u16,
    },
    /// UDP header
    Udp {
        src_port: u16,
        dst_port: u16,
        length: u16,
    },
    /// DNS message header
    Dns {
        transaction_id: u16,
        is_response: bool,
        questions: u16,
        answers: u16,
    },
    /// HTTP request or status line
    Http { start_line: String },
    /// TLS record header
    Tls { content_type: u8, version: u16 },
    /// SSH, with the identification banner when visible
    Ssh { banner: Option<String> },
    /// FTP control channel line
    Ftp { line: String },
    /// DHCP/BOOTP message
    Dhcp { op: u8, transaction_id: u32 },
    /// NTP message
    Ntp { version: u8, mode: u8 },
    /// Bytes no decoder recognized
    Payload { len: usize },
    /// Bytes after the end of the IP datagram (padding, FCS)
    Trailer { len: usize },
}

impl Layer {
    /// Display label of a recognized protocol
    ///
    /// `None` for unrecognized payload and trailers, which never change the
    /// packet's protocol label.
    pub fn protocol(&self) -> Option<&'static str> {
        let label = match self {
            Layer::Ethernet { .. } => "Ethernet",
            Layer::LinuxSll { .. } => "SLL",
            Layer::Loopback { .. } => "Loopback",
            Layer::Vlan { .. } => "VLAN",
            Layer::Arp { .. } => "ARP",
            Layer::Ipv4 { .. } => "IPv4",
            Layer::Ipv6 { .. } => "IPv6",
            Layer::Icmp { .. } => "ICMP",
            Layer::Icmpv6 { .. } => "ICMPv6",
            Layer::Tcp { .. } => "TCP",
            Layer::Udp { .. } => "UDP",
            Layer::Dns { .. } => "DNS",
            Layer::Http { .. } => "HTTP",
            Layer::Tls { .. } => "TLS",
            Layer::Ssh { .. } => "SSH",
            Layer::Ftp { .. } => "FTP",
            Layer::Dhcp { .. } => "DHCP",
            Layer::Ntp { .. } => "NTP",
            Layer::Payload { .. } | Layer::Trailer { .. } => return None,
        };
        Some(label)
    }

    /// Source and destination addresses carried by this layer
    ///
    /// Only link and IP headers carry packet addresses. A Linux cooked
    /// header records the sender alone, so its destination is empty.
    pub fn addresses(&self) -> Option<(String, String)> {
        match self {
            Layer::Ethernet { src, dst, .. } => Some((src.to_string(), dst.to_string())),
            Layer::LinuxSll { link_addr, .. } if !link_addr.is_empty() => {
                Some((format_link_addr(link_addr), String::new()))
            }
            Layer::Ipv4 { src, dst, .. } => Some((src.to_string(), dst.to_string())),
            Layer::Ipv6 { src, dst, .. } => Some((src.to_string(), dst.to_string())),
            _ => None,
        }
    }

    /// Whether this layer was recognized as a specific protocol
    pub fn is_recognized(&self) -> bool {
        self.protocol().is_some()
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Ethernet {
                src,
                dst,
                ether_type,
            } => write!(
                f,
                "Ethernet II Layer, Src: {}, Dst: {}, Type: 0x{:04x}",
                src, dst, ether_type
            ),
            Layer::LinuxSll {
                packet_type,
                link_addr,
                protocol,
            } => write!(
                f,
                "Linux cooked capture, Packet type: {}, Src: {}, Protocol: 0x{:04x}",
                packet_type,
                format_link_addr(link_addr),
                protocol
            ),
            Layer::Loopback { family } => write!(f, "Null/Loopback Layer, Family: {}", family),
            Layer::Vlan {
                vlan_id,
                priority,
                ether_type,
            } => write!(
                f,
                "VLAN Layer, Priority: {}, Vlan ID: {}, Type: 0x{:04x}",
                priority, vlan_id, ether_type
            ),
            Layer::Arp {
                operation,
                sender_ip,
                target_ip,
            } => match (operation, sender_ip, target_ip) {
                (1, Some(sender), Some(target)) => {
                    write!(f, "ARP Layer, ARP request, who has {} ? Tell {}", target, sender)
                }
                (2, Some(sender), Some(_)) => {
                    write!(f, "ARP Layer, ARP reply, {} is at sender MAC", sender)
                }
                _ => write!(f, "ARP Layer, Operation: {}", operation),
            },
            Layer::Ipv4 {
                src,
                dst,
                protocol,
                ttl,
                total_len,
            } => write!(
                f,
                "IPv4 Layer, Src: {}, Dst: {}, Protocol: {}, TTL: {}, Length: {}",
                src, dst, protocol, ttl, total_len
            ),
            Layer::Ipv6 {
                src,
                dst,
                next_header,
                hop_limit,
                payload_len,
            } => write!(
                f,
                "IPv6 Layer, Src: {}, Dst: {}, Next header: {}, Hop limit: {}, Payload length: {}",
                src, dst, next_header, hop_limit, payload_len
            ),
            Layer::Icmp { icmp_type, code } => write!(
                f,
                "ICMP Layer, {} (type {}, code {})",
                icmp_type_name(*icmp_type),
                icmp_type,
                code
            ),
            Layer::Icmpv6 { icmp_type, code } => write!(
                f,
                "ICMPv6 Layer, {} (type {}, code {})",
                icmpv6_type_name(*icmp_type),
                icmp_type,
                code
            ),
            Layer::Tcp {
                src_port,
                dst_port,
                seq,
                ack,
                flags,
                window,
            } => write!(
                f,
                "TCP Layer, {}, Src port: {}, Dst port: {}, Seq: {}, Ack: {}, Win: {}",
                flags, src_port, dst_port, seq, ack, window
            ),
            Layer::Udp {
                src_port,
                dst_port,
                length,
            } => write!(
                f,
                "UDP Layer, Src port: {}, Dst port: {}, Length: {}",
                src_port, dst_port, length
            ),
            Layer::Dns {
                transaction_id,
                is_response,
                questions,
                answers,
            } => write!(
                f,
                "DNS {}, ID: 0x{:04x}, Questions: {}, Answers: {}",
                if *is_response { "response" } else { "query" },
                transaction_id,
                questions,
                answers
            ),
            Layer::Http { start_line } => write!(f, "HTTP Layer, {}", start_line),
            Layer::Tls {
                content_type,
                version,
            } => write!(
                f,
                "TLS Layer, {}, Version: {}",
                tls_content_type_name(*content_type),
                tls_version_name(*version)
            ),
            Layer::Ssh { banner } => match banner {
                Some(banner) => write!(f, "SSH Layer, {}", banner),
                None => write!(f, "SSH Layer, Encrypted packet"),
            },
            Layer::Ftp { line } => write!(f, "FTP Layer, {}", line),
            Layer::Dhcp { op, transaction_id } => write!(
                f,
                "DHCP Layer, {}, Transaction ID: 0x{:08x}",
                if *op == 1 { "Boot request" } else { "Boot reply" },
                transaction_id
            ),
            Layer::Ntp { version, mode } => {
                write!(f, "NTP Layer, Version: {}, Mode: {}", version, ntp_mode_name(*mode))
            }
            Layer::Payload { len } => write!(f, "Payload Layer, Data length: {} [Bytes]", len),
            Layer::Trailer { len } => write!(f, "Packet Trailer, Length: {} [Bytes]", len),
        }
    }
}

fn format_link_addr(addr: &[u8]) -> String {
    addr.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

fn icmp_type_name(icmp_type: u8) -> &'static str {
    match icmp_type {
        0 => "Echo reply",
        3 => "Destination unreachable",
        5 => "Redirect",
        8 => "Echo request",
        11 => "Time exceeded",
        _ => "Other",
    }
}

fn icmpv6_type_name(icmp_type: u8) -> &'static str {
    match icmp_type {
        1 => "Destination unreachable",
        3 => "Time exceeded",
        128 => "Echo request",
        129 => "Echo reply",
        133 => "Router solicitation",
        134 => "Router advertisement",
        135 => "Neighbor solicitation",
        136 => "Neighbor advertisement",
        _ => "Other",
    }
}

fn tls_content_type_name(content_type: u8) -> &'static str {
    match content_type {
        20 => "Change cipher spec",
        21 => "Alert",
        22 => "Handshake",
        23 => "Application data",
        _ => "Unknown record",
    }
}

fn tls_version_name(version: u16) -> &'static str {
    match version {
        0x0300 => "SSL 3.0",
        0x0301 => "TLS 1.0",
        0x0302 => "TLS 1.1",
        0x0303 => "TLS 1.2",
        0x0304 => "TLS 1.3",
        _ => "unknown",
    }
}

fn ntp_mode_name(mode: u8) -> &'static str {
    match mode {
        1 => "symmetric active",
        2 => "symmetric passive",
        3 => "client",
        4 => "server",
        5 => "broadcast",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_display() {
        let mac = MacAddr([0x00, 0x1b, 0x2c, 0xaa, 0xbb, 0xff]);
        assert_eq!(mac.to_string(), "00:1b:2c:aa:bb:ff");
    }

    #[test]
    fn test_tcp_flags_display() {
        let flags = TcpFlags {
            syn: true,
            ack: true,
            ..Default::default()
        };
        assert_eq!(flags.to_string(), "[SYN, ACK]");
        assert_eq!(TcpFlags::default().to_string(), "[]");
    }

    #[test]
    fn test_payload_and_trailer_are_not_recognized() {
        assert_eq!(Layer::Payload { len: 4 }.protocol(), None);
        assert_eq!(Layer::Trailer { len: 4 }.protocol(), None);
        assert!(!Layer::Payload { len: 4 }.is_recognized());
        assert_eq!(Layer::Icmp { icmp_type: 8, code: 0 }.protocol(), Some("ICMP"));
    }

    #[test]
    fn test_only_address_layers_report_addresses() {
        let ip = Layer::Ipv4 {
            src: Ipv4Addr::new(10, 0, 0, 1),
            dst: Ipv4Addr::new(10, 0, 0, 2),
            protocol: 6,
            ttl: 64,
            total_len: 40,
        };
        assert_eq!(
            ip.addresses(),
            Some(("10.0.0.1".to_string(), "10.0.0.2".to_string()))
        );

        let udp = Layer::Udp {
            src_port: 1,
            dst_port: 2,
            length: 8,
        };
        assert_eq!(udp.addresses(), None);
    }

    #[test]
    fn test_arp_request_summary() {
        let arp = Layer::Arp {
            operation: 1,
            sender_ip: Some(Ipv4Addr::new(192, 168, 1, 1)),
            target_ip: Some(Ipv4Addr::new(192, 168, 1, 7)),
        };
        assert_eq!(
            arp.to_string(),
            "ARP Layer, ARP request, who has 192.168.1.7 ? Tell 192.168.1.1"
        );
    }
}
