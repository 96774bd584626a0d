use crate::error::{FatalKind, TransportError};
use crate::value_sink::SeatCount;

/// Raw notification body as delivered by the transport.
pub type Payload = Vec<u8>;

/// Decode a plain-text decimal seat count.
///
/// Empty, non-UTF-8 or non-numeric payloads are fatal decode errors.
pub fn decode_seat_count(payload: &[u8]) -> Result<SeatCount, TransportError> {
    if payload.is_empty() {
        return Err(TransportError::fatal(FatalKind::Decode, "empty payload"));
    }
    let text = std::str::from_utf8(payload).map_err(|e| {
        TransportError::fatal(FatalKind::Decode, format!("payload is not UTF-8: {e}"))
    })?;
    text.trim().parse::<SeatCount>().map_err(|_| {
        TransportError::fatal(
            FatalKind::Decode,
            format!("payload {:?} is not an integer", text),
        )
    })
}
