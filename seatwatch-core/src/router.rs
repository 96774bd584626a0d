use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::observer::{channel_observer, ObserverFn};
use crate::status::{Status, StatusSink};
use crate::Observation;

/// Channel-backed router a session uses to hand observations and status
/// events to consumers on other tasks or threads.
#[derive(Clone)]
pub struct Router {
    observation_tx: UnboundedSender<Observation>,
    status_tx: UnboundedSender<Status>,
}

impl Router {
    /// Create a new router around existing channels.
    pub fn new(
        observation_tx: UnboundedSender<Observation>,
        status_tx: UnboundedSender<Status>,
    ) -> Self {
        Self {
            observation_tx,
            status_tx,
        }
    }

    /// Observer that forwards every observation into the channel.
    pub fn observer(&self) -> ObserverFn {
        channel_observer(self.observation_tx.clone())
    }
}

impl StatusSink for Router {
    fn status(&self, status: &Status) {
        let _ = self.status_tx.send(status.clone());
    }
}

/// Paired channel endpoints owned by the consumer.
pub struct RouterChannels {
    pub router: Router,
    pub observation_rx: UnboundedReceiver<Observation>,
    pub status_rx: UnboundedReceiver<Status>,
}

impl RouterChannels {
    /// Allocate an observation/status channel pair and return the router plus receivers.
    pub fn new() -> Self {
        let (observation_tx, observation_rx) = unbounded_channel();
        let (status_tx, status_rx) = unbounded_channel();
        Self {
            router: Router::new(observation_tx, status_tx),
            observation_rx,
            status_rx,
        }
    }
}

impl Default for RouterChannels {
    fn default() -> Self {
        Self::new()
    }
}
