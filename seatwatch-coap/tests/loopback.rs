use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use coap_lite::{CoapOption, MessageClass, MessageType, Packet, RequestType, ResponseType};
use seatwatch_coap::{TransmissionParams, UdpTransport};
use seatwatch_core::{
    changed_only, FatalKind, ObservationSession, Observation, ObserverFn, Opened, ResourceUri,
    SessionConfig, SessionEnd, Shutdown, Transport, TransportError,
};
use tokio::net::UdpSocket;

struct Server {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl Server {
    async fn bind() -> (Self, u16) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind server");
        let port = socket.local_addr().expect("local addr").port();
        (
            Self {
                socket,
                buf: vec![0u8; 1500],
            },
            port,
        )
    }

    async fn recv(&mut self) -> (Packet, SocketAddr) {
        let (n, peer) = self.socket.recv_from(&mut self.buf).await.expect("recv");
        (
            Packet::from_bytes(&self.buf[..n]).expect("client sends valid CoAP"),
            peer,
        )
    }

    async fn send(&self, packet: &Packet, peer: SocketAddr) {
        let bytes = packet.to_bytes().expect("encodable packet");
        self.socket.send_to(&bytes, peer).await.expect("send");
    }

    /// Send a 2.05 notification with the given type, sequence number and body.
    async fn notify(
        &self,
        mtype: MessageType,
        mid: u16,
        token: &[u8],
        observe: Option<u32>,
        body: &str,
        peer: SocketAddr,
    ) {
        let packet = response(mtype, ResponseType::Content, mid, token, observe, body);
        self.send(&packet, peer).await;
    }
}

fn response(
    mtype: MessageType,
    code: ResponseType,
    mid: u16,
    token: &[u8],
    observe: Option<u32>,
    body: &str,
) -> Packet {
    let mut packet = Packet::new();
    packet.header.set_type(mtype);
    packet.header.code = MessageClass::Response(code);
    packet.header.message_id = mid;
    packet.set_token(token.to_vec());
    if let Some(seq) = observe {
        packet.set_observe_value(seq);
    }
    packet.payload = body.as_bytes().to_vec();
    packet
}

/// Piggybacked 2.05 answering `req`.
fn piggybacked(req: &Packet, observe: u32, body: &str) -> Packet {
    response(
        MessageType::Acknowledgement,
        ResponseType::Content,
        req.header.message_id,
        req.get_token(),
        Some(observe),
        body,
    )
}

fn observe_of(packet: &Packet) -> Option<u32> {
    packet.get_observe_value().and_then(Result::ok)
}

fn uri_path(packet: &Packet) -> Vec<String> {
    packet
        .get_option(CoapOption::UriPath)
        .map(|segments| {
            segments
                .iter()
                .map(|s| String::from_utf8_lossy(s).into_owned())
                .collect()
        })
        .unwrap_or_default()
}

fn get() -> MessageClass {
    MessageClass::Request(RequestType::Get)
}

fn uri(port: u16, target: &str) -> ResourceUri {
    ResourceUri {
        host: "127.0.0.1".into(),
        port: Some(port),
        path: vec!["seats".into(), target.into(), "available".into()],
    }
}

async fn within<T>(fut: impl std::future::Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("test timed out")
}

#[tokio::test]
async fn receives_initial_value_and_notifications() {
    let (mut server, port) = Server::bind().await;

    let server_task = tokio::spawn(async move {
        let (req, peer) = server.recv().await;
        let token = req.get_token().to_vec();
        assert_eq!(req.header.code, get());
        assert_eq!(req.header.get_type(), MessageType::Confirmable);
        assert_eq!(observe_of(&req), Some(0));
        assert_eq!(uri_path(&req), vec!["seats", "3", "available"]);

        server.send(&piggybacked(&req, 1, "24"), peer).await;

        server
            .notify(MessageType::Confirmable, 100, &token, Some(2), "18", peer)
            .await;
        let (client_ack, _) = server.recv().await;
        assert_eq!(client_ack.header.get_type(), MessageType::Acknowledgement);
        assert_eq!(client_ack.header.message_id, 100);

        server
            .notify(MessageType::NonConfirmable, 101, &token, Some(3), "6", peer)
            .await;
        // stale sequence number, must be dropped
        server
            .notify(MessageType::NonConfirmable, 102, &token, Some(2), "99", peer)
            .await;
        // foreign token, must be ignored
        server
            .notify(MessageType::NonConfirmable, 103, &[0xEE], Some(4), "77", peer)
            .await;
        // final response without Observe ends the observation
        server
            .notify(MessageType::NonConfirmable, 104, &token, None, "5", peer)
            .await;
    });

    let transport = UdpTransport::default();
    let Opened {
        initial,
        mut subscription,
    } = within(transport.open(&uri(port, "3"))).await.expect("open");
    assert_eq!(initial, b"24");

    let mut received = Vec::new();
    while let Some(next) = within(subscription.next_notification()).await {
        received.push(String::from_utf8(next.expect("notification")).unwrap());
    }
    assert_eq!(received, vec!["18", "6", "5"]);
    subscription.close().await.expect("close");
    within(server_task).await.expect("server task");
}

#[tokio::test]
async fn close_deregisters_observation() {
    let (mut server, port) = Server::bind().await;

    let server_task = tokio::spawn(async move {
        let (req, peer) = server.recv().await;
        server.send(&piggybacked(&req, 7, "10"), peer).await;

        let (dereg, _) = server.recv().await;
        (req.get_token().to_vec(), dereg)
    });

    let transport = UdpTransport::default();
    let Opened {
        mut subscription, ..
    } = within(transport.open(&uri(port, "1"))).await.expect("open");
    subscription.close().await.expect("close");
    // second close is a no-op
    subscription.close().await.expect("close again");
    assert!(subscription.next_notification().await.is_none());

    let (token, dereg) = within(server_task).await.expect("server task");
    assert_eq!(dereg.header.get_type(), MessageType::NonConfirmable);
    assert_eq!(dereg.header.code, get());
    assert_eq!(observe_of(&dereg), Some(1));
    assert_eq!(dereg.get_token().to_vec(), token);
    assert_eq!(uri_path(&dereg), vec!["seats", "1", "available"]);
}

#[tokio::test]
async fn handles_separate_response() {
    let (mut server, port) = Server::bind().await;

    let server_task = tokio::spawn(async move {
        let (req, peer) = server.recv().await;
        let mut empty_ack = Packet::new();
        empty_ack.header.set_type(MessageType::Acknowledgement);
        empty_ack.header.code = MessageClass::Empty;
        empty_ack.header.message_id = req.header.message_id;
        server.send(&empty_ack, peer).await;
        server
            .notify(MessageType::Confirmable, 500, req.get_token(), Some(1), "12", peer)
            .await;
        let (client_ack, _) = server.recv().await;
        client_ack
    });

    let transport = UdpTransport::default();
    let opened = within(transport.open(&uri(port, "2"))).await.expect("open");
    assert_eq!(opened.initial, b"12");

    let client_ack = within(server_task).await.expect("server task");
    assert_eq!(client_ack.header.get_type(), MessageType::Acknowledgement);
    assert_eq!(client_ack.header.message_id, 500);
}

#[tokio::test]
async fn error_response_is_fatal() {
    let (mut server, port) = Server::bind().await;

    tokio::spawn(async move {
        let (req, peer) = server.recv().await;
        let nack = response(
            MessageType::Acknowledgement,
            ResponseType::NotFound,
            req.header.message_id,
            req.get_token(),
            None,
            "",
        );
        server.send(&nack, peer).await;
    });

    let transport = UdpTransport::default();
    let err = within(transport.open(&uri(port, "11")))
        .await
        .err()
        .expect("4.04 must fail");
    assert!(matches!(
        err,
        TransportError::Fatal {
            kind: FatalKind::Response,
            ..
        }
    ));
    assert!(err.to_string().contains("4.04"));
}

#[tokio::test]
async fn unreachable_server_is_retryable() {
    let port = {
        let probe = std::net::UdpSocket::bind("127.0.0.1:0").expect("probe");
        probe.local_addr().expect("addr").port()
    };
    let transport = UdpTransport::new(TransmissionParams {
        ack_timeout: Duration::from_millis(100),
        max_retransmit: 1,
    });

    let err = within(transport.open(&uri(port, "4")))
        .await
        .err()
        .expect("nobody is listening");
    assert!(err.is_retryable(), "unexpected error {err:?}");
}

#[tokio::test]
async fn session_over_udp_deduplicates() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let (mut server, port) = Server::bind().await;
    tokio::spawn(async move {
        let (req, peer) = server.recv().await;
        let token = req.get_token().to_vec();
        server.send(&piggybacked(&req, 1, "24"), peer).await;
        for (i, body) in ["24", "18", "18", "6"].into_iter().enumerate() {
            let (mid, seq) = (200 + i as u16, i as u32 + 2);
            server
                .notify(MessageType::NonConfirmable, mid, &token, Some(seq), body, peer)
                .await;
        }
        server
            .notify(MessageType::NonConfirmable, 300, &token, None, "6", peer)
            .await;
    });

    let config = SessionConfig {
        host: "127.0.0.1".into(),
        port: Some(port),
        ..SessionConfig::default()
    };
    let seen = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&seen);
    let observer: ObserverFn =
        Arc::new(move |o: &Observation| captured.lock().unwrap().push(o.value));
    let mut session = ObservationSession::for_target(Arc::new(UdpTransport::default()), &config, 3)
        .expect("valid target")
        .with_observer(changed_only(observer));

    let end = within(session.run(Shutdown::never())).await;

    assert_eq!(end, Ok(SessionEnd::Ended));
    assert_eq!(&*seen.lock().unwrap(), &[24, 18, 6]);
}
