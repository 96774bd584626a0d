//! Observe subscriptions over UDP.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use seatwatch_core::{
    CleanupError, FatalKind, Opened, Payload, ResourceUri, RetryableKind, Subscription, Transport,
    TransportError,
};
use coap_lite::{MessageType, ObserveOption, Packet};
use tokio::net::UdpSocket;
use tokio::time::Instant;

use crate::packet::{class, code_text, empty, is_empty, observe, observe_request};

pub const DEFAULT_PORT: u16 = 5683;
const MAX_DATAGRAM: usize = 1152;
/// RFC 7641 §3.4: sequence numbers older than this are always stale.
const OBSERVE_WRAP: u32 = 1 << 23;
const FRESHNESS_WINDOW: Duration = Duration::from_secs(128);
/// Stand-in for "no deadline" when a configured wait does not fit an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Retransmission parameters for the registration request (RFC 7252 §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmissionParams {
    pub ack_timeout: Duration,
    pub max_retransmit: u32,
}

impl Default for TransmissionParams {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(2),
            max_retransmit: 4,
        }
    }
}

impl TransmissionParams {
    /// Upper bound on waiting for a response after the last retransmission.
    fn exchange_deadline(&self) -> Duration {
        let factor = 1u32
            .checked_shl(self.max_retransmit.saturating_add(1))
            .map_or(u32::MAX, |f| f - 1);
        self.ack_timeout.saturating_mul(factor)
    }
}

fn deadline_after(from: Instant, wait: Duration) -> Instant {
    from.checked_add(wait).unwrap_or(from + FAR_FUTURE)
}

/// CoAP client transport: one UDP socket per subscription.
#[derive(Debug, Clone, Default)]
pub struct UdpTransport {
    params: TransmissionParams,
}

impl UdpTransport {
    pub fn new(params: TransmissionParams) -> Self {
        Self { params }
    }
}

fn protocol_error(err: impl std::fmt::Display) -> TransportError {
    TransportError::fatal(FatalKind::Protocol, err.to_string())
}

fn decode(datagram: &[u8]) -> Result<Packet, TransportError> {
    Packet::from_bytes(datagram)
        .map_err(|e| protocol_error(format!("malformed datagram: {e:?}")))
}

fn encode(packet: &Packet) -> Result<Vec<u8>, TransportError> {
    packet
        .to_bytes()
        .map_err(|e| protocol_error(format!("cannot encode message: {e:?}")))
}

fn io_error(err: std::io::Error) -> TransportError {
    TransportError::from_io(&err)
}

async fn resolve(uri: &ResourceUri) -> Result<SocketAddr, TransportError> {
    let port = uri.port.unwrap_or(DEFAULT_PORT);
    tokio::net::lookup_host((uri.host.as_str(), port))
        .await
        .map_err(io_error)?
        .next()
        .ok_or_else(|| {
            TransportError::retryable(
                RetryableKind::Network,
                format!("no address found for {}", uri.host),
            )
        })
}

#[async_trait]
impl Transport for UdpTransport {
    async fn open(&self, uri: &ResourceUri) -> Result<Opened, TransportError> {
        let addr = resolve(uri).await?;
        let bind: SocketAddr = if addr.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind).await.map_err(io_error)?;
        // Connected sockets surface ICMP port-unreachable as ConnectionRefused.
        socket.connect(addr).await.map_err(io_error)?;

        let token: [u8; 4] = rand::random();
        let message_id: u16 = rand::random();
        let request = observe_request(
            MessageType::Confirmable,
            message_id,
            &token,
            uri,
            ObserveOption::Register,
        );
        tracing::debug!(%uri, %addr, message_id, "sending observe registration");

        let response = exchange(&socket, &request, self.params).await?;
        match class(response.header.code) {
            2 => {}
            4 | 5 => {
                return Err(TransportError::fatal(
                    FatalKind::Response,
                    format!("{} answered {}", uri, code_text(response.header.code)),
                ))
            }
            _ => {
                return Err(protocol_error(format!(
                    "unexpected response code {}",
                    code_text(response.header.code)
                )))
            }
        }

        let observing = observe(&response);
        if observing.is_none() {
            tracing::info!(%uri, "server did not accept the observe registration");
        }
        let subscription = UdpSubscription {
            socket: Some(socket),
            uri: uri.clone(),
            token: token.to_vec(),
            next_message_id: message_id.wrapping_add(1),
            last_sequence: observing.map(|seq| (seq, Instant::now())),
            ended: observing.is_none(),
        };
        Ok(Opened {
            initial: response.payload,
            subscription: Box::new(subscription),
        })
    }
}

/// Send a confirmable request and wait for its response, retransmitting with
/// exponential back-off until acknowledged.
async fn exchange(
    socket: &UdpSocket,
    request: &Packet,
    params: TransmissionParams,
) -> Result<Packet, TransportError> {
    let bytes = encode(request)?;
    let message_id = request.header.message_id;
    let started = Instant::now();
    let mut timeout = params.ack_timeout;
    let mut transmissions = 0u32;
    let mut acknowledged = false;
    let mut buf = vec![0u8; MAX_DATAGRAM];

    socket.send(&bytes).await.map_err(io_error)?;
    let mut deadline = deadline_after(Instant::now(), timeout);

    loop {
        let received = tokio::time::timeout_at(deadline, socket.recv(&mut buf)).await;
        let n = match received {
            Ok(result) => result.map_err(io_error)?,
            Err(_) if !acknowledged && transmissions < params.max_retransmit => {
                transmissions += 1;
                timeout = timeout.saturating_mul(2);
                tracing::debug!(transmissions, "retransmitting observe registration");
                socket.send(&bytes).await.map_err(io_error)?;
                deadline = deadline_after(Instant::now(), timeout);
                continue;
            }
            Err(_) => {
                return Err(TransportError::retryable(
                    RetryableKind::Timeout,
                    format!("no response after {:?}", started.elapsed()),
                ))
            }
        };

        let message = decode(&buf[..n])?;
        let mtype = message.header.get_type();
        let ours = message.get_token() == request.get_token();
        match mtype {
            MessageType::Acknowledgement if message.header.message_id == message_id => {
                if is_empty(&message) {
                    // Separate response follows.
                    acknowledged = true;
                    deadline = deadline_after(started, params.exchange_deadline());
                    continue;
                }
                if !ours {
                    return Err(protocol_error("acknowledgement carries a foreign token"));
                }
                return Ok(message);
            }
            MessageType::Reset if message.header.message_id == message_id => {
                return Err(protocol_error("server reset the observe registration"));
            }
            MessageType::Confirmable | MessageType::NonConfirmable
                if ours && !is_empty(&message) =>
            {
                if mtype == MessageType::Confirmable {
                    acknowledge(socket, &message).await?;
                }
                return Ok(message);
            }
            MessageType::Confirmable => {
                reset(socket, &message).await?;
            }
            _ => tracing::debug!(
                message_id = message.header.message_id,
                "ignoring unrelated message"
            ),
        }
    }
}

async fn acknowledge(socket: &UdpSocket, message: &Packet) -> Result<(), TransportError> {
    let ack = empty(MessageType::Acknowledgement, message.header.message_id);
    socket.send(&encode(&ack)?).await.map_err(io_error)?;
    Ok(())
}

async fn reset(socket: &UdpSocket, message: &Packet) -> Result<(), TransportError> {
    let rst = empty(MessageType::Reset, message.header.message_id);
    socket.send(&encode(&rst)?).await.map_err(io_error)?;
    Ok(())
}

/// RFC 7641 §3.4 freshness of notification `new` against the last accepted one.
fn is_fresh(last: (u32, Instant), new: u32, now: Instant) -> bool {
    let (v1, t1) = last;
    let v2 = new;
    (v1 < v2 && v2 - v1 < OBSERVE_WRAP)
        || (v1 > v2 && v1 - v2 > OBSERVE_WRAP)
        || now > t1 + FRESHNESS_WINDOW
}

/// Active observe registration on one socket.
pub struct UdpSubscription {
    socket: Option<UdpSocket>,
    uri: ResourceUri,
    token: Vec<u8>,
    next_message_id: u16,
    last_sequence: Option<(u32, Instant)>,
    ended: bool,
}

impl UdpSubscription {
    fn take_message_id(&mut self) -> u16 {
        let id = self.next_message_id;
        self.next_message_id = self.next_message_id.wrapping_add(1);
        id
    }
}

#[async_trait]
impl Subscription for UdpSubscription {
    async fn next_notification(&mut self) -> Option<Result<Payload, TransportError>> {
        if self.ended {
            return None;
        }
        let socket = self.socket.as_ref()?;
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            let n = match socket.recv(&mut buf).await {
                Ok(n) => n,
                Err(err) => return Some(Err(io_error(err))),
            };
            let message = match decode(&buf[..n]) {
                Ok(message) => message,
                Err(err) => return Some(Err(err)),
            };
            let mtype = message.header.get_type();

            if message.get_token() != self.token.as_slice() || is_empty(&message) {
                if mtype == MessageType::Confirmable {
                    if let Err(err) = reset(socket, &message).await {
                        return Some(Err(err));
                    }
                }
                continue;
            }
            if mtype == MessageType::Confirmable {
                if let Err(err) = acknowledge(socket, &message).await {
                    return Some(Err(err));
                }
            }

            if class(message.header.code) >= 4 {
                self.ended = true;
                return Some(Err(TransportError::fatal(
                    FatalKind::Response,
                    format!("{} answered {}", self.uri, code_text(message.header.code)),
                )));
            }

            match observe(&message) {
                None => {
                    // Final response: the server removed us from its observers.
                    tracing::info!(uri = %self.uri, "observation ended by server");
                    self.ended = true;
                    return Some(Ok(message.payload));
                }
                Some(sequence) => {
                    let now = Instant::now();
                    if let Some(last) = self.last_sequence {
                        if !is_fresh(last, sequence, now) {
                            tracing::debug!(sequence, "dropping stale notification");
                            continue;
                        }
                    }
                    self.last_sequence = Some((sequence, now));
                    return Some(Ok(message.payload));
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), CleanupError> {
        let Some(socket) = self.socket.take() else {
            return Ok(());
        };
        if self.ended {
            return Ok(());
        }
        let message_id = self.take_message_id();
        let deregister = observe_request(
            MessageType::NonConfirmable,
            message_id,
            &self.token,
            &self.uri,
            ObserveOption::Deregister,
        );
        let bytes = encode(&deregister).map_err(|e| CleanupError {
            message: e.to_string(),
        })?;
        socket
            .send(&bytes)
            .await
            .map(|_| ())
            .map_err(|e| CleanupError {
                message: e.to_string(),
            })
    }
}
