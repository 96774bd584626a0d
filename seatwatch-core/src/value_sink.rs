use serde::Serialize;

/// Decoded seat count. Not clamped to capacity; the resource is trusted.
pub type SeatCount = i64;

/// A value that differs from the previously recorded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Changed {
    pub value: SeatCount,
    pub previous: Option<SeatCount>,
}

/// Deduplicating consumer: remembers the last value and only reports changes.
#[derive(Debug, Default, Clone)]
pub struct ValueSink {
    last_known: Option<SeatCount>,
}

impl ValueSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_known(&self) -> Option<SeatCount> {
        self.last_known
    }

    /// Record `value`; returns `None` when it equals the last known value.
    pub fn update(&mut self, value: SeatCount) -> Option<Changed> {
        if self.last_known == Some(value) {
            return None;
        }
        let previous = self.last_known.replace(value);
        Some(Changed { value, previous })
    }
}
