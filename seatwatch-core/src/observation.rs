use std::time::SystemTime;

use serde::Serialize;

use crate::target::TargetId;
use crate::value_sink::SeatCount;

/// One value delivered by a session, tagged with whether it differs from the
/// previous one.
///
/// Every received value produces an observation; consumers that only care
/// about changes wrap their observer in [`changed_only`](crate::changed_only).
///
/// Equality ignores `ts`.
#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    pub target: TargetId,
    pub value: SeatCount,
    pub changed: bool,
    #[serde(skip)]
    pub ts: SystemTime,
}

impl Observation {
    pub fn new(target: TargetId, value: SeatCount, changed: bool) -> Self {
        Self {
            target,
            value,
            changed,
            ts: SystemTime::now(),
        }
    }
}

impl PartialEq for Observation {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target && self.value == other.value && self.changed == other.changed
    }
}

impl Eq for Observation {}
