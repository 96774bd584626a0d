use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// Lifecycle events emitted by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Status {
    Connecting { attempt: u32, max_attempts: u32 },
    Connected,
    Retrying {
        delay: Duration,
        attempt: u32,
        max_attempts: u32,
    },
    Failed { attempts: u32 },
    Error { detail: String },
    Ended,
    Cancelled,
}

fn fmt_secs(delay: &Duration) -> String {
    if delay.subsec_nanos() == 0 {
        format!("{}s", delay.as_secs())
    } else {
        format!("{:.1}s", delay.as_secs_f64())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Connecting {
                attempt,
                max_attempts,
            } => write!(f, "connecting ({attempt}/{max_attempts})"),
            Status::Connected => f.write_str("connected"),
            Status::Retrying {
                delay,
                attempt,
                max_attempts,
            } => write!(
                f,
                "retrying in {} ({attempt}/{max_attempts})",
                fmt_secs(delay)
            ),
            Status::Failed { attempts } => write!(f, "failed after {attempts} attempts"),
            Status::Error { detail } => write!(f, "error: {detail}"),
            Status::Ended => f.write_str("observation ended by server"),
            Status::Cancelled => f.write_str("stopped"),
        }
    }
}

/// Receives session lifecycle events.
///
/// Implementations must not block and must swallow their own failures; the
/// session never reacts to what happens here. A panic inside a sink is
/// caught and logged by the session.
pub trait StatusSink: Send + Sync {
    fn status(&self, status: &Status);
}

impl<F> StatusSink for F
where
    F: Fn(&Status) + Send + Sync,
{
    fn status(&self, status: &Status) {
        self(status)
    }
}

/// Forwards events over a channel. A closed receiver is ignored.
impl StatusSink for UnboundedSender<Status> {
    fn status(&self, status: &Status) {
        let _ = self.send(status.clone());
    }
}

/// Logs every event through `tracing`.
pub struct TracingStatus;

impl StatusSink for TracingStatus {
    fn status(&self, status: &Status) {
        match status {
            Status::Failed { .. } | Status::Error { .. } => {
                tracing::error!(target: "seatwatch::status", "{}", status);
            }
            Status::Retrying { .. } => {
                tracing::warn!(target: "seatwatch::status", "{}", status);
            }
            _ => tracing::info!(target: "seatwatch::status", "{}", status),
        }
    }
}

/// Fan out to several sinks in order.
pub struct TeeStatus(pub Vec<Box<dyn StatusSink>>);

impl StatusSink for TeeStatus {
    fn status(&self, status: &Status) {
        for sink in &self.0 {
            sink.status(status);
        }
    }
}
