//! The few message shapes an observer sends, built on [`coap_lite::Packet`].

use std::net::IpAddr;

use coap_lite::{CoapOption, MessageClass, MessageType, ObserveOption, Packet, RequestType};
use seatwatch_core::ResourceUri;

/// GET carrying an Observe option for `uri`. Uri-Host is only sent for names.
pub(crate) fn observe_request(
    mtype: MessageType,
    message_id: u16,
    token: &[u8],
    uri: &ResourceUri,
    observe: ObserveOption,
) -> Packet {
    let mut packet = Packet::new();
    packet.header.set_type(mtype);
    packet.header.code = MessageClass::Request(RequestType::Get);
    packet.header.message_id = message_id;
    packet.set_token(token.to_vec());
    packet.set_observe_value(observe as u32);
    if uri.host.parse::<IpAddr>().is_err() {
        packet.add_option(CoapOption::UriHost, uri.host.as_bytes().to_vec());
    }
    for segment in &uri.path {
        packet.add_option(CoapOption::UriPath, segment.as_bytes().to_vec());
    }
    packet
}

/// Empty ACK or RST answering `message_id`.
pub(crate) fn empty(mtype: MessageType, message_id: u16) -> Packet {
    let mut packet = Packet::new();
    packet.header.set_type(mtype);
    packet.header.code = MessageClass::Empty;
    packet.header.message_id = message_id;
    packet
}

pub(crate) fn is_empty(packet: &Packet) -> bool {
    packet.header.code == MessageClass::Empty
}

/// Observe sequence number, if the option is present and well formed.
pub(crate) fn observe(packet: &Packet) -> Option<u32> {
    packet.get_observe_value().and_then(Result::ok)
}

/// Response class: 2 for success, 4 and 5 for errors.
pub(crate) fn class(code: MessageClass) -> u8 {
    u8::from(code) >> 5
}

/// Dotted `c.dd` form, e.g. `4.04`.
pub(crate) fn code_text(code: MessageClass) -> String {
    let raw = u8::from(code);
    format!("{}.{:02}", raw >> 5, raw & 0x1f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coap_lite::ResponseType;

    fn uri(host: &str) -> ResourceUri {
        ResourceUri {
            host: host.into(),
            port: None,
            path: vec!["seats".into(), "1".into(), "available".into()],
        }
    }

    #[test]
    fn request_carries_host_only_for_names() {
        let req = observe_request(
            MessageType::Confirmable,
            1,
            &[1],
            &uri("train.local"),
            ObserveOption::Register,
        );
        let host = req.get_option(CoapOption::UriHost).and_then(|v| v.front());
        assert_eq!(host.map(Vec::as_slice), Some(&b"train.local"[..]));
        assert_eq!(observe(&req), Some(0));

        let req = observe_request(
            MessageType::NonConfirmable,
            1,
            &[1],
            &uri("127.0.0.1"),
            ObserveOption::Deregister,
        );
        assert!(req.get_option(CoapOption::UriHost).is_none());
        assert_eq!(observe(&req), Some(1));
    }

    #[test]
    fn request_survives_the_wire() {
        let req = observe_request(
            MessageType::Confirmable,
            0x7d34,
            &[0xA1, 0xB2],
            &uri("127.0.0.1"),
            ObserveOption::Register,
        );
        let decoded = Packet::from_bytes(&req.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.header.get_type(), MessageType::Confirmable);
        assert_eq!(decoded.header.message_id, 0x7d34);
        assert_eq!(decoded.get_token(), &[0xA1, 0xB2][..]);
        let path: Vec<&[u8]> = decoded
            .get_option(CoapOption::UriPath)
            .map(|segments| segments.iter().map(Vec::as_slice).collect())
            .unwrap_or_default();
        assert_eq!(path, vec![&b"seats"[..], b"1", b"available"]);
    }

    #[test]
    fn codes_render_dotted() {
        let content = MessageClass::Response(ResponseType::Content);
        let not_found = MessageClass::Response(ResponseType::NotFound);
        assert_eq!(code_text(content), "2.05");
        assert_eq!(code_text(not_found), "4.04");
        assert_eq!(class(content), 2);
        assert_eq!(class(not_found), 4);
        assert!(is_empty(&empty(MessageType::Acknowledgement, 9)));
    }
}
