//! Network-layer headers: ARP, IPv4, IPv6

use super::{be_u16, link, Dissection, Layer, Next};
use etherparse::{Ipv4HeaderSlice, Ipv6HeaderSlice};
use std::net::Ipv4Addr;

pub(crate) const ETHERTYPE_IPV4: u16 = 0x0800;
pub(crate) const ETHERTYPE_ARP: u16 = 0x0806;
pub(crate) const ETHERTYPE_IPV6: u16 = 0x86dd;
const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERTYPE_QINQ: u16 = 0x88a8;
const ETHERTYPE_QINQ_LEGACY: u16 = 0x9100;

/// IPv6 extension headers walked through to reach the upper protocol
mod ext {
    pub const HOP_BY_HOP: u8 = 0;
    pub const ROUTING: u8 = 43;
    pub const FRAGMENT: u8 = 44;
    pub const DESTINATION: u8 = 60;
}

pub(crate) fn by_ether_type<'a>(ether_type: u16, data: &'a [u8], out: &mut Dissection) -> Next<'a> {
    match ether_type {
        ETHERTYPE_IPV4 => ipv4(data, out),
        ETHERTYPE_IPV6 => ipv6(data, out),
        ETHERTYPE_ARP => arp(data, out),
        ETHERTYPE_VLAN | ETHERTYPE_QINQ | ETHERTYPE_QINQ_LEGACY => link::vlan(data, out),
        _ => Next::Payload(data),
    }
}

/// Link-less IP: the version nibble selects the header
pub(crate) fn raw_ip(data: &[u8]) -> Next<'_> {
    match data.first().map(|b| b >> 4) {
        Some(4) => Next::EtherType(ETHERTYPE_IPV4, data),
        Some(6) => Next::EtherType(ETHERTYPE_IPV6, data),
        _ => Next::Payload(data),
    }
}

pub(crate) fn ipv4<'a>(data: &'a [u8], out: &mut Dissection) -> Next<'a> {
    let ip = match Ipv4HeaderSlice::from_slice(data) {
        Ok(ip) => ip,
        Err(e) => {
            tracing::trace!("IPv4 parse error: {}", e);
            return Next::Payload(data);
        }
    };

    let header_len = ip.slice().len();
    let total_len = ip.total_len();
    let protocol = ip.protocol().0;

    out.push(Layer::Ipv4 {
        src: ip.source_addr(),
        dst: ip.destination_addr(),
        protocol,
        ttl: ip.ttl(),
        total_len,
    });

    // A zero total length shows up with TCP segmentation offload; trust the capture.
    let datagram_end = if total_len == 0 {
        data.len()
    } else {
        usize::from(total_len).clamp(header_len, data.len())
    };
    out.push_trailer(data.len() - datagram_end);

    let payload = &data[header_len..datagram_end];
    let flags_and_offset = be_u16(ip.slice(), 6).unwrap_or(0);
    if flags_and_offset & 0x1fff != 0 {
        // Non-first fragment: no upper-layer header here.
        return Next::Payload(payload);
    }

    Next::IpProtocol(protocol, payload)
}

pub(crate) fn ipv6<'a>(data: &'a [u8], out: &mut Dissection) -> Next<'a> {
    let ip = match Ipv6HeaderSlice::from_slice(data) {
        Ok(ip) => ip,
        Err(e) => {
            tracing::trace!("IPv6 parse error: {}", e);
            return Next::Payload(data);
        }
    };

    let header_len = ip.slice().len();
    let payload_len = ip.payload_length();

    out.push(Layer::Ipv6 {
        src: ip.source_addr(),
        dst: ip.destination_addr(),
        next_header: ip.next_header().0,
        hop_limit: ip.hop_limit(),
        payload_len,
    });

    // Jumbograms declare zero here.
    let datagram_end = if payload_len == 0 {
        data.len()
    } else {
        (header_len + usize::from(payload_len)).min(data.len())
    };
    out.push_trailer(data.len() - datagram_end);

    skip_extension_headers(ip.next_header().0, &data[header_len..datagram_end])
}

fn skip_extension_headers(mut next_header: u8, mut data: &[u8]) -> Next<'_> {
    loop {
        match next_header {
            ext::HOP_BY_HOP | ext::ROUTING | ext::DESTINATION => {
                let Some(len_units) = data.get(1) else {
                    return Next::Payload(data);
                };
                let len = (usize::from(*len_units) + 1) * 8;
                if data.len() < len {
                    return Next::Payload(data);
                }
                next_header = data[0];
                data = &data[len..];
            }
            ext::FRAGMENT => {
                let (Some(&following), Some(offset)) = (data.first(), be_u16(data, 2)) else {
                    return Next::Payload(data);
                };
                if offset >> 3 != 0 || data.len() < 8 {
                    return Next::Payload(data);
                }
                next_header = following;
                data = &data[8..];
            }
            _ => return Next::IpProtocol(next_header, data),
        }
    }
}

fn arp<'a>(data: &'a [u8], out: &mut Dissection) -> Next<'a> {
    let (Some(hardware_type), Some(protocol_type), Some(operation)) =
        (be_u16(data, 0), be_u16(data, 2), be_u16(data, 6))
    else {
        return Next::Payload(data);
    };
    let hardware_size = usize::from(data[4]);
    let protocol_size = usize::from(data[5]);
    let body_len = 8 + 2 * (hardware_size + protocol_size);
    if data.len() < body_len {
        return Next::Payload(data);
    }

    let ipv4_at = |offset: usize| -> Option<Ipv4Addr> {
        if hardware_type == 1 && protocol_type == ETHERTYPE_IPV4 && protocol_size == 4 {
            let b = &data[offset..offset + 4];
            Some(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
        } else {
            None
        }
    };

    out.push(Layer::Arp {
        operation,
        sender_ip: ipv4_at(8 + hardware_size),
        target_ip: ipv4_at(8 + 2 * hardware_size + protocol_size),
    });

    // Whatever follows the ARP body is link padding.
    Next::Payload(&data[body_len..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::dissect;
    use crate::types::LinkType;
    use std::net::Ipv6Addr;

    fn arp_request() -> Vec<u8> {
        let mut data = vec![0x00, 0x01, 0x08, 0x00, 6, 4, 0x00, 0x01];
        data.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x01]);
        data.extend_from_slice(&[10, 0, 0, 1]);
        data.extend_from_slice(&[0; 6]);
        data.extend_from_slice(&[10, 0, 0, 2]);
        data
    }

    #[test]
    fn test_arp_request() {
        let mut out = Dissection::default();
        let data = arp_request();
        let next = by_ether_type(ETHERTYPE_ARP, &data, &mut out);
        assert!(matches!(next, Next::Payload(rest) if rest.is_empty()));
        assert_eq!(
            out.layers[0],
            Layer::Arp {
                operation: 1,
                sender_ip: Some(Ipv4Addr::new(10, 0, 0, 1)),
                target_ip: Some(Ipv4Addr::new(10, 0, 0, 2)),
            }
        );
    }

    #[test]
    fn test_short_arp_is_payload() {
        let mut out = Dissection::default();
        let data = [0x00, 0x01, 0x08, 0x00, 6, 4, 0x00];
        assert!(matches!(by_ether_type(ETHERTYPE_ARP, &data, &mut out), Next::Payload(_)));
        assert!(out.layers.is_empty());
    }

    #[test]
    fn test_ipv6_with_hop_by_hop_reaches_icmpv6() {
        let mut data = vec![0x60, 0, 0, 0];
        data.extend_from_slice(&16u16.to_be_bytes());
        data.extend_from_slice(&[ext::HOP_BY_HOP, 255]);
        data.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        data.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        // Hop-by-hop: next = ICMPv6, length 0 (8 bytes total)
        data.extend_from_slice(&[58, 0, 0, 0, 0, 0, 0, 0]);
        data.extend_from_slice(&[128, 0, 0, 0, 0, 1, 0, 1]);

        let layers = dissect(LinkType::RawIp, &data);
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[1], Layer::Icmpv6 { icmp_type: 128, code: 0 });
    }

    #[test]
    fn test_ipv4_fragment_is_payload() {
        let mut data = vec![0x45, 0x00, 0x00, 0x1c, 0x00, 0x01, 0x00, 0x10, 64, 17, 0, 0];
        data.extend_from_slice(&[10, 0, 0, 1, 10, 0, 0, 2]);
        data.extend_from_slice(&[0xaa; 8]);

        let layers = dissect(LinkType::RawIp, &data);
        assert_eq!(layers[1], Layer::Payload { len: 8 });
    }
}
