//! Terminal presentation of observations and lifecycle events.

use serde::Serialize;
use seatwatch_core::{Observation, SeatCount, Status, TargetId};
use tokio::sync::mpsc::UnboundedReceiver;

/// How full a carriage looks, as a fraction of capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    /// At least three quarters free.
    Plenty,
    Moderate,
    Filling,
    AlmostFull,
}

impl Band {
    /// The value is clamped into `[0, capacity]` first, like
    /// [`occupancy_pct`].
    pub fn for_value(value: SeatCount, capacity: SeatCount) -> Self {
        let capacity = i128::from(capacity.max(0));
        let value = i128::from(value).clamp(0, capacity);
        if value * 4 >= capacity * 3 {
            Band::Plenty
        } else if value * 2 >= capacity {
            Band::Moderate
        } else if value * 4 >= capacity {
            Band::Filling
        } else {
            Band::AlmostFull
        }
    }

    fn label(self) -> &'static str {
        match self {
            Band::Plenty => "plenty",
            Band::Moderate => "moderate",
            Band::Filling => "filling up",
            Band::AlmostFull => "almost full",
        }
    }
}

/// Occupied share in percent. The value is clamped into `[0, capacity]`
/// here and only here.
pub fn occupancy_pct(value: SeatCount, capacity: SeatCount) -> f64 {
    if capacity <= 0 {
        return 0.0;
    }
    let available = value.clamp(0, capacity);
    (capacity - available) as f64 / capacity as f64 * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum JsonLine<'a> {
    Value {
        carriage: TargetId,
        value: SeatCount,
        changed: bool,
        capacity: SeatCount,
        occupancy_pct: f64,
        band: Band,
    },
    Status {
        carriage: TargetId,
        #[serde(flatten)]
        status: &'a Status,
        message: String,
    },
}

pub struct Renderer {
    target: TargetId,
    capacity: SeatCount,
    format: OutputFormat,
}

impl Renderer {
    pub fn new(target: TargetId, capacity: SeatCount, format: OutputFormat) -> Self {
        Self {
            target,
            capacity,
            format,
        }
    }

    pub fn observation_line(&self, observation: &Observation) -> String {
        let pct = occupancy_pct(observation.value, self.capacity);
        let band = Band::for_value(observation.value, self.capacity);
        match self.format {
            OutputFormat::Text => format!(
                "carriage {}: {}/{} seats available ({:.1}% occupied) [{}]",
                observation.target,
                observation.value,
                self.capacity,
                pct,
                band.label()
            ),
            OutputFormat::Json => to_json(&JsonLine::Value {
                carriage: observation.target,
                value: observation.value,
                changed: observation.changed,
                capacity: self.capacity,
                occupancy_pct: pct,
                band,
            }),
        }
    }

    pub fn status_line(&self, status: &Status) -> String {
        match self.format {
            OutputFormat::Text => format!("carriage {}: {}", self.target, status),
            OutputFormat::Json => to_json(&JsonLine::Status {
                carriage: self.target,
                status,
                message: status.to_string(),
            }),
        }
    }

    /// Print until both channels close.
    pub async fn run(
        self,
        mut observations: UnboundedReceiver<Observation>,
        mut statuses: UnboundedReceiver<Status>,
    ) {
        let mut observations_open = true;
        let mut statuses_open = true;
        while observations_open || statuses_open {
            tokio::select! {
                observation = observations.recv(), if observations_open => match observation {
                    Some(observation) => println!("{}", self.observation_line(&observation)),
                    None => observations_open = false,
                },
                status = statuses.recv(), if statuses_open => match status {
                    Some(status) => println!("{}", self.status_line(&status)),
                    None => statuses_open = false,
                },
            }
        }
    }
}

fn to_json<T: Serialize>(line: &T) -> String {
    serde_json::to_string(line)
        .unwrap_or_else(|e| format!(r#"{{"type":"error","message":"{e}"}}"#))
}
