//! Application protocols, detected by well-known port plus a payload signature
//!
//! An application layer consumes the rest of the transport payload. When no
//! detector accepts the payload it is reported as generic payload.

use super::{be_u16, be_u32, Dissection, Layer, Next, Transport};

const DNS_PORTS: [u16; 2] = [53, 5353];
const HTTP_PORTS: [u16; 4] = [80, 8000, 8008, 8080];
const TLS_PORTS: [u16; 6] = [443, 465, 636, 853, 993, 995];
const SSH_PORT: u16 = 22;
const FTP_PORT: u16 = 21;
const DHCP_PORTS: [u16; 2] = [67, 68];
const NTP_PORT: u16 = 123;

const DNS_HEADER_LEN: usize = 12;
const NTP_MESSAGE_LEN: usize = 48;
const DHCP_MAGIC_COOKIE: u32 = 0x6382_5363;
const DHCP_COOKIE_OFFSET: usize = 236;

/// Longest start line kept in a summary
const MAX_LINE_LEN: usize = 120;

const HTTP_METHODS: [&[u8]; 9] = [
    b"GET ",
    b"POST ",
    b"PUT ",
    b"DELETE ",
    b"HEAD ",
    b"OPTIONS ",
    b"PATCH ",
    b"CONNECT ",
    b"TRACE ",
];

pub(crate) fn detect<'a>(
    transport: Transport,
    src_port: u16,
    dst_port: u16,
    payload: &'a [u8],
    out: &mut Dissection,
) -> Next<'a> {
    let on_port = |ports: &[u16]| ports.contains(&src_port) || ports.contains(&dst_port);

    let layer = match transport {
        Transport::Udp if on_port(&DNS_PORTS) => dns(payload),
        Transport::Udp if on_port(&DHCP_PORTS) => dhcp(payload),
        Transport::Udp if on_port(&[NTP_PORT]) => ntp(payload),
        // DNS over TCP prefixes each message with its length.
        Transport::Tcp if on_port(&DNS_PORTS) => payload.get(2..).and_then(dns),
        Transport::Tcp if on_port(&HTTP_PORTS) => http(payload),
        Transport::Tcp if on_port(&TLS_PORTS) => tls(payload),
        // Only the banner is plaintext; later SSH packets are matched by port alone.
        Transport::Tcp if on_port(&[SSH_PORT]) || payload.starts_with(b"SSH-") => Some(ssh(payload)),
        Transport::Tcp if on_port(&[FTP_PORT]) => ftp(payload),
        Transport::Udp | Transport::Tcp => None,
    };

    match layer {
        Some(layer) => {
            out.push(layer);
            Next::Done
        }
        None => Next::Payload(payload),
    }
}

fn dns(payload: &[u8]) -> Option<Layer> {
    if payload.len() < DNS_HEADER_LEN {
        return None;
    }
    let flags = be_u16(payload, 2)?;
    // Opcodes above 6 are unassigned; treat them as not-DNS.
    if (flags >> 11) & 0x0f > 6 {
        return None;
    }
    Some(Layer::Dns {
        transaction_id: be_u16(payload, 0)?,
        is_response: flags & 0x8000 != 0,
        questions: be_u16(payload, 4)?,
        answers: be_u16(payload, 6)?,
    })
}

fn http(payload: &[u8]) -> Option<Layer> {
    let is_request = HTTP_METHODS.iter().any(|method| payload.starts_with(method));
    if !is_request && !payload.starts_with(b"HTTP/1.") {
        return None;
    }
    Some(Layer::Http {
        start_line: first_line(payload),
    })
}

fn tls(payload: &[u8]) -> Option<Layer> {
    let content_type = *payload.first()?;
    let version = be_u16(payload, 1)?;
    if !(20..=23).contains(&content_type) || version >> 8 != 0x03 || version & 0xff > 0x04 {
        return None;
    }
    Some(Layer::Tls {
        content_type,
        version,
    })
}

fn ssh(payload: &[u8]) -> Layer {
    let banner = payload.starts_with(b"SSH-").then(|| first_line(payload));
    Layer::Ssh { banner }
}

fn ftp(payload: &[u8]) -> Option<Layer> {
    let line = first_line(payload);
    let printable = !line.is_empty()
        && line
            .chars()
            .all(|c| c.is_ascii_graphic() || c == ' ');
    printable.then_some(Layer::Ftp { line })
}

fn dhcp(payload: &[u8]) -> Option<Layer> {
    if be_u32(payload, DHCP_COOKIE_OFFSET)? != DHCP_MAGIC_COOKIE {
        return None;
    }
    let op = payload[0];
    if op != 1 && op != 2 {
        return None;
    }
    Some(Layer::Dhcp {
        op,
        transaction_id: be_u32(payload, 4)?,
    })
}

fn ntp(payload: &[u8]) -> Option<Layer> {
    if payload.len() < NTP_MESSAGE_LEN {
        return None;
    }
    let version = (payload[0] >> 3) & 0x07;
    let mode = payload[0] & 0x07;
    if !(1..=4).contains(&version) {
        return None;
    }
    Some(Layer::Ntp { version, mode })
}

/// Text up to the first line break, lossily decoded and capped
fn first_line(payload: &[u8]) -> String {
    let end = payload
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(payload.len())
        .min(MAX_LINE_LEN);
    String::from_utf8_lossy(&payload[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(transport: Transport, src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<Layer> {
        let mut out = Dissection::default();
        if let Next::Payload(rest) = detect(transport, src_port, dst_port, payload, &mut out) {
            out.push(Layer::Payload { len: rest.len() });
        }
        out.layers
    }

    #[test]
    fn test_http_request_line() {
        let layers = run(Transport::Tcp, 51000, 80, b"GET /index.html HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(
            layers,
            vec![Layer::Http {
                start_line: "GET /index.html HTTP/1.1".to_string()
            }]
        );
    }

    #[test]
    fn test_http_port_without_signature_is_payload() {
        let layers = run(Transport::Tcp, 51000, 80, &[0x17, 0x00, 0x01]);
        assert_eq!(layers, vec![Layer::Payload { len: 3 }]);
    }

    #[test]
    fn test_dns_query() {
        let payload = [0x12, 0x34, 0x01, 0x00, 0, 1, 0, 0, 0, 0, 0, 0, 3, b'w', b'w', b'w'];
        let layers = run(Transport::Udp, 40000, 53, &payload);
        assert_eq!(
            layers,
            vec![Layer::Dns {
                transaction_id: 0x1234,
                is_response: false,
                questions: 1,
                answers: 0,
            }]
        );
    }

    #[test]
    fn test_tls_handshake() {
        let layers = run(Transport::Tcp, 443, 50123, &[22, 0x03, 0x03, 0x00, 0x10]);
        assert_eq!(
            layers,
            vec![Layer::Tls {
                content_type: 22,
                version: 0x0303,
            }]
        );
        assert_eq!(layers[0].to_string(), "TLS Layer, Handshake, Version: TLS 1.2");
    }

    #[test]
    fn test_ssh_banner_on_any_port() {
        let layers = run(Transport::Tcp, 2222, 50000, b"SSH-2.0-OpenSSH_9.6\r\n");
        assert_eq!(
            layers,
            vec![Layer::Ssh {
                banner: Some("SSH-2.0-OpenSSH_9.6".to_string())
            }]
        );
    }

    #[test]
    fn test_ssh_port_without_banner_is_encrypted_ssh() {
        let layers = run(Transport::Tcp, 50000, 22, &[0, 1, 2, 3]);
        assert_eq!(layers, vec![Layer::Ssh { banner: None }]);
        assert_eq!(layers[0].to_string(), "SSH Layer, Encrypted packet");

        let layers = run(Transport::Tcp, 50000, 8022, &[0, 1, 2, 3]);
        assert_eq!(layers, vec![Layer::Payload { len: 4 }]);
    }

    #[test]
    fn test_ntp_client_request() {
        let mut payload = [0u8; 48];
        payload[0] = 0x23;
        let layers = run(Transport::Udp, 50000, 123, &payload);
        assert_eq!(layers, vec![Layer::Ntp { version: 4, mode: 3 }]);
    }

    #[test]
    fn test_dhcp_requires_magic_cookie() {
        let mut payload = vec![0u8; 240];
        payload[0] = 1;
        assert_eq!(run(Transport::Udp, 68, 67, &payload), vec![Layer::Payload { len: 240 }]);

        payload[236..240].copy_from_slice(&DHCP_MAGIC_COOKIE.to_be_bytes());
        payload[4..8].copy_from_slice(&0xcafe_babeu32.to_be_bytes());
        assert_eq!(
            run(Transport::Udp, 68, 67, &payload),
            vec![Layer::Dhcp {
                op: 1,
                transaction_id: 0xcafe_babe,
            }]
        );
    }

    #[test]
    fn test_first_line_is_capped() {
        let long = vec![b'a'; 500];
        assert_eq!(first_line(&long).len(), MAX_LINE_LEN);
    }
}
