use tokio::sync::watch;

use crate::Observation;

/// Single-slot hand-off: writers overwrite, readers see the latest value.
///
/// Suited to render loops that only ever need the current state.
#[derive(Clone)]
pub struct Mailbox {
    tx: watch::Sender<Option<Observation>>,
}

impl Mailbox {
    pub fn new() -> (Self, watch::Receiver<Option<Observation>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }

    pub fn post(&self, observation: Observation) {
        self.tx.send_replace(Some(observation));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TargetRange;

    #[tokio::test]
    async fn latest_post_wins() {
        let target = TargetRange::default().validate(1).unwrap();
        let (mailbox, mut rx) = Mailbox::new();
        mailbox.post(Observation::new(target, 20, true));
        mailbox.post(Observation::new(target, 12, true));
        rx.changed().await.expect("sender alive");
        let latest = rx.borrow_and_update().clone();
        assert_eq!(latest.map(|o| o.value), Some(12));
    }
}
