//! Transport-layer headers and ICMP

use super::{network, Dissection, Layer, Next, TcpFlags, Transport};
use etherparse::{TcpHeaderSlice, UdpHeaderSlice};

/// IP protocol numbers
mod ip_number {
    pub const ICMP: u8 = 1;
    pub const IPV4_IN_IP: u8 = 4;
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
    pub const IPV6_IN_IP: u8 = 41;
    pub const ICMPV6: u8 = 58;
}

pub(crate) fn by_ip_protocol<'a>(protocol: u8, data: &'a [u8], out: &mut Dissection) -> Next<'a> {
    match protocol {
        ip_number::TCP => tcp(data, out),
        ip_number::UDP => udp(data, out),
        ip_number::ICMP => icmp(data, out, false),
        ip_number::ICMPV6 => icmp(data, out, true),
        ip_number::IPV4_IN_IP => network::ipv4(data, out),
        ip_number::IPV6_IN_IP => network::ipv6(data, out),
        _ => Next::Payload(data),
    }
}

fn tcp<'a>(data: &'a [u8], out: &mut Dissection) -> Next<'a> {
    let tcp = match TcpHeaderSlice::from_slice(data) {
        Ok(tcp) => tcp,
        Err(e) => {
            tracing::trace!("TCP parse error: {}", e);
            return Next::Payload(data);
        }
    };

    let src_port = tcp.source_port();
    let dst_port = tcp.destination_port();
    out.push(Layer::Tcp {
        src_port,
        dst_port,
        seq: tcp.sequence_number(),
        ack: tcp.acknowledgment_number(),
        flags: TcpFlags {
            syn: tcp.syn(),
            ack: tcp.ack(),
            fin: tcp.fin(),
            rst: tcp.rst(),
            psh: tcp.psh(),
            urg: tcp.urg(),
        },
        window: tcp.window_size(),
    });

    let payload = &data[tcp.slice().len()..];
    if payload.is_empty() {
        return Next::Done;
    }
    Next::Application {
        transport: Transport::Tcp,
        src_port,
        dst_port,
        payload,
    }
}

fn udp<'a>(data: &'a [u8], out: &mut Dissection) -> Next<'a> {
    let udp = match UdpHeaderSlice::from_slice(data) {
        Ok(udp) => udp,
        Err(e) => {
            tracing::trace!("UDP parse error: {}", e);
            return Next::Payload(data);
        }
    };

    let src_port = udp.source_port();
    let dst_port = udp.destination_port();
    let length = udp.length();
    out.push(Layer::Udp {
        src_port,
        dst_port,
        length,
    });

    let header_len = udp.slice().len();
    let end = usize::from(length).clamp(header_len, data.len());
    let payload = &data[header_len..end];
    if payload.is_empty() {
        return Next::Done;
    }
    Next::Application {
        transport: Transport::Udp,
        src_port,
        dst_port,
        payload,
    }
}

/// ICMP carries no further decodable layer here; its body is part of the message
fn icmp<'a>(data: &'a [u8], out: &mut Dissection, v6: bool) -> Next<'a> {
    if data.len() < 4 {
        return Next::Payload(data);
    }
    let (icmp_type, code) = (data[0], data[1]);

    out.push(if v6 {
        Layer::Icmpv6 { icmp_type, code }
    } else {
        Layer::Icmp { icmp_type, code }
    });
    Next::Done
}
