//! CoAP observe transport for seatwatch.
//!
//! Registers as an RFC 7641 observer of a plain-text resource, receives
//! notifications and deregisters. Wire encoding is `coap-lite`'s; this crate
//! owns the socket, retransmission, freshness and subscription lifecycle.
//! No DTLS, no block-wise transfer.

mod packet;
mod transport;

pub use transport::{TransmissionParams, UdpSubscription, UdpTransport, DEFAULT_PORT};
