use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::mailbox::Mailbox;
use crate::Observation;

/// Observer function type
pub type ObserverFn = Arc<dyn Fn(&Observation) + Send + Sync>;

/// No-op observer
pub fn no_op_observer() -> ObserverFn {
    Arc::new(|_observation: &Observation| {})
}

/// Tracing observer - logs to tracing crate
pub fn tracing_observer() -> ObserverFn {
    Arc::new(|observation: &Observation| {
        if observation.changed {
            tracing::info!(
                target: "seatwatch::value",
                carriage = observation.target.get(),
                value = observation.value,
                "available seats changed"
            );
        } else {
            tracing::debug!(
                target: "seatwatch::value",
                carriage = observation.target.get(),
                value = observation.value,
                "available seats unchanged"
            );
        }
    })
}

/// Only pass observations whose value differs from the previous one
pub fn changed_only(wrapped: ObserverFn) -> ObserverFn {
    filter_with(wrapped, |observation| observation.changed)
}

/// Filter observer with custom predicate
pub fn filter_with<F>(wrapped: ObserverFn, predicate: F) -> ObserverFn
where
    F: Fn(&Observation) -> bool + Send + Sync + 'static,
{
    Arc::new(move |observation: &Observation| {
        if predicate(observation) {
            wrapped(observation);
        }
    })
}

/// Tee observer - call multiple observers
pub fn tee_observer(observers: Vec<ObserverFn>) -> ObserverFn {
    Arc::new(move |observation: &Observation| {
        for observer in &observers {
            observer(observation);
        }
    })
}

/// Channel observer - hands observations to another task
pub fn channel_observer(sender: UnboundedSender<Observation>) -> ObserverFn {
    Arc::new(move |observation: &Observation| {
        let _ = sender.send(observation.clone());
    })
}

/// Mailbox observer - keeps only the latest observation
pub fn mailbox_observer(mailbox: Mailbox) -> ObserverFn {
    Arc::new(move |observation: &Observation| mailbox.post(observation.clone()))
}
