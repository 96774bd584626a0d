use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "secs")]
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    pub fn start(&self) -> RetryState {
        RetryState {
            attempt: 1,
            max_attempts: self.max_attempts,
            delay: self.delay,
        }
    }
}

/// Attempt counter for one `run()`. Never reset on recovery: failures are
/// cumulative across the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryState {
    pub fn has_attempts_left(&self) -> bool {
        self.attempt <= self.max_attempts
    }

    /// Whether the current attempt is the final one allowed.
    pub fn is_last(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    pub fn advance(&mut self) {
        self.attempt += 1;
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(delay: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(delay.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_counts_up_to_max() {
        let mut state = RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
        .start();
        let mut seen = Vec::new();
        while state.has_attempts_left() {
            seen.push((state.attempt, state.is_last()));
            state.advance();
        }
        assert_eq!(seen, vec![(1, false), (2, false), (3, true)]);
    }

    #[test]
    fn policy_reads_delay_in_seconds() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"max_attempts": 2, "delay": 0.5}"#).unwrap();
        assert_eq!(policy.delay, Duration::from_millis(500));
        assert_eq!(policy.max_attempts, 2);
    }
}
