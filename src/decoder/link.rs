//! Link-layer headers

use super::{be_u16, Dissection, Layer, MacAddr, Next};
use etherparse::Ethernet2HeaderSlice;

/// Linux cooked capture header length (SLL v1)
const SLL_HEADER_LEN: usize = 16;

/// BSD loopback header length
const LOOPBACK_HEADER_LEN: usize = 4;

/// Address families that carry IPv6 on the various BSDs
const AF_INET6_VALUES: [u32; 3] = [24, 28, 30];
const AF_INET: u32 = 2;

pub(crate) fn ethernet<'a>(data: &'a [u8], out: &mut Dissection) -> Next<'a> {
    let eth = match Ethernet2HeaderSlice::from_slice(data) {
        Ok(eth) => eth,
        Err(_) => return Next::Payload(data),
    };

    let ether_type = eth.ether_type().0;
    out.push(Layer::Ethernet {
        src: MacAddr(eth.source()),
        dst: MacAddr(eth.destination()),
        ether_type,
    });

    Next::EtherType(ether_type, &data[eth.slice().len()..])
}

pub(crate) fn linux_sll<'a>(data: &'a [u8], out: &mut Dissection) -> Next<'a> {
    if data.len() < SLL_HEADER_LEN {
        return Next::Payload(data);
    }

    let packet_type = u16::from_be_bytes([data[0], data[1]]);
    let addr_len = usize::from(u16::from_be_bytes([data[4], data[5]])).min(8);
    let protocol = u16::from_be_bytes([data[14], data[15]]);

    out.push(Layer::LinuxSll {
        packet_type,
        link_addr: data[6..6 + addr_len].to_vec(),
        protocol,
    });

    Next::EtherType(protocol, &data[SLL_HEADER_LEN..])
}

pub(crate) fn loopback<'a>(data: &'a [u8], out: &mut Dissection) -> Next<'a> {
    let Some(header) = data.get(..LOOPBACK_HEADER_LEN) else {
        return Next::Payload(data);
    };

    // The family is written in the capturing host's byte order.
    let mut family = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    if family > 0xffff {
        family = family.swap_bytes();
    }

    out.push(Layer::Loopback { family });

    let rest = &data[LOOPBACK_HEADER_LEN..];
    if family == AF_INET {
        Next::EtherType(super::network::ETHERTYPE_IPV4, rest)
    } else if AF_INET6_VALUES.contains(&family) {
        Next::EtherType(super::network::ETHERTYPE_IPV6, rest)
    } else {
        Next::Payload(rest)
    }
}

/// 802.1Q/802.1ad tag following an Ethernet header
pub(crate) fn vlan<'a>(data: &'a [u8], out: &mut Dissection) -> Next<'a> {
    let (Some(tci), Some(ether_type)) = (be_u16(data, 0), be_u16(data, 2)) else {
        return Next::Payload(data);
    };

    out.push(Layer::Vlan {
        vlan_id: tci & 0x0fff,
        priority: (tci >> 13) as u8,
        ether_type,
    });

    Next::EtherType(ether_type, &data[4..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::dissect;
    use crate::types::LinkType;

    #[test]
    fn test_linux_sll_source_address() {
        let mut data = vec![0x00, 0x00, 0x00, 0x01, 0x00, 0x06];
        data.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01, 0x00, 0x00]);
        data.extend_from_slice(&0x88b5u16.to_be_bytes());
        data.extend_from_slice(&[1, 2, 3]);

        let layers = dissect(LinkType::LinuxSll, &data);
        assert_eq!(
            layers[0],
            Layer::LinuxSll {
                packet_type: 0,
                link_addr: vec![0xde, 0xad, 0xbe, 0xef, 0x00, 0x01],
                protocol: 0x88b5,
            }
        );
        assert_eq!(
            layers[0].addresses(),
            Some(("de:ad:be:ef:00:01".to_string(), String::new()))
        );
        assert_eq!(layers[1], Layer::Payload { len: 3 });
    }

    #[test]
    fn test_loopback_family_in_either_byte_order() {
        let le = [2u8, 0, 0, 0, 0xff];
        let be = [0u8, 0, 0, 2, 0xff];
        for data in [&le[..], &be[..]] {
            let layers = dissect(LinkType::Null, data);
            assert_eq!(layers[0], Layer::Loopback { family: 2 });
        }
    }

    #[test]
    fn test_short_sll_is_payload() {
        let layers = dissect(LinkType::LinuxSll, &[0u8; 10]);
        assert_eq!(layers, vec![Layer::Payload { len: 10 }]);
    }

    #[test]
    fn test_vlan_tag() {
        let mut data = vec![0xff; 12];
        data.extend_from_slice(&0x8100u16.to_be_bytes());
        data.extend_from_slice(&[0x20, 0x64]);
        data.extend_from_slice(&0x88b5u16.to_be_bytes());

        let layers = dissect(LinkType::Ethernet, &data);
        assert_eq!(
            layers[1],
            Layer::Vlan {
                vlan_id: 100,
                priority: 1,
                ether_type: 0x88b5,
            }
        );
        assert_eq!(layers.len(), 2);
    }
}
