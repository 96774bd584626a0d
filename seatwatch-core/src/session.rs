//! Observation session: subscribe, consume notifications, retry on transient
//! failure.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{SessionError, SetupError, TransportError};
use crate::observer::{tracing_observer, ObserverFn};
use crate::payload::decode_seat_count;
use crate::retry::RetryPolicy;
use crate::shutdown::Shutdown;
use crate::status::{Status, StatusSink, TracingStatus};
use crate::target::{ResourceUri, TargetId};
use crate::transport::{Opened, Subscription, Transport};
use crate::value_sink::{SeatCount, ValueSink};
use crate::Observation;

/// How a session finished without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The server ended the observation.
    Ended,
    /// The shutdown signal fired.
    Cancelled,
}

/// Result of one subscribe attempt.
#[derive(Debug)]
enum AttemptOutcome {
    Ended,
    Retry(TransportError),
    Fatal(TransportError),
    Cancelled,
}

impl From<TransportError> for AttemptOutcome {
    fn from(err: TransportError) -> Self {
        if err.is_retryable() {
            AttemptOutcome::Retry(err)
        } else {
            AttemptOutcome::Fatal(err)
        }
    }
}

/// Keeps one target's seat count fresh and deduplicated.
///
/// Owns the retry policy, the deduplicating [`ValueSink`] and, while
/// connected, exactly one subscription handle.
pub struct ObservationSession {
    transport: Arc<dyn Transport>,
    target: TargetId,
    uri: ResourceUri,
    capacity: SeatCount,
    retry: RetryPolicy,
    values: ValueSink,
    observer: ObserverFn,
    status: Arc<dyn StatusSink>,
    attempts: u32,
}

impl ObservationSession {
    /// Build a session for an already validated target. Fails if `config`
    /// does not pass [`SessionConfig::validate`].
    pub fn new(
        transport: Arc<dyn Transport>,
        config: &SessionConfig,
        target: TargetId,
    ) -> Result<Self, SetupError> {
        config.validate()?;
        Ok(Self {
            transport,
            target,
            uri: ResourceUri::seats_available(config.host.clone(), config.port, target),
            capacity: config.capacity,
            retry: config.retry,
            values: ValueSink::new(),
            observer: tracing_observer(),
            status: Arc::new(TracingStatus),
            attempts: 0,
        })
    }

    /// Validate a raw carriage number against the configured range, then
    /// build the session. Nothing touches the network here.
    pub fn for_target(
        transport: Arc<dyn Transport>,
        config: &SessionConfig,
        raw_target: i64,
    ) -> Result<Self, SetupError> {
        config.validate()?;
        let target = config.targets.validate(raw_target)?;
        Self::new(transport, config, target)
    }

    pub fn with_observer(mut self, observer: ObserverFn) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_status(mut self, status: impl StatusSink + 'static) -> Self {
        self.status = Arc::new(status);
        self
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn uri(&self) -> &ResourceUri {
        &self.uri
    }

    /// Attempts made by the last `run()`.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_known(&self) -> Option<SeatCount> {
        self.values.last_known()
    }

    /// Drive the subscription until the server ends it, the shutdown signal
    /// fires, a fatal error occurs or the retry budget runs out.
    pub async fn run(&mut self, mut shutdown: Shutdown) -> Result<SessionEnd, SessionError> {
        let mut retry = self.retry.start();
        info!(carriage = self.target.get(), uri = %self.uri, "starting observation");

        while retry.has_attempts_left() {
            self.attempts = retry.attempt;
            self.emit(Status::Connecting {
                attempt: retry.attempt,
                max_attempts: retry.max_attempts,
            });

            match self.attempt(&mut shutdown).await {
                AttemptOutcome::Ended => {
                    self.emit(Status::Ended);
                    return Ok(SessionEnd::Ended);
                }
                AttemptOutcome::Cancelled => {
                    self.emit(Status::Cancelled);
                    return Ok(SessionEnd::Cancelled);
                }
                AttemptOutcome::Fatal(err) => {
                    self.emit(Status::Error {
                        detail: err.to_string(),
                    });
                    return Err(SessionError::Fatal(err));
                }
                AttemptOutcome::Retry(err) => {
                    warn!(
                        carriage = self.target.get(),
                        attempt = retry.attempt,
                        error = %err,
                        "subscription failed"
                    );
                    if retry.is_last() {
                        break;
                    }
                    self.emit(Status::Retrying {
                        delay: retry.delay,
                        attempt: retry.attempt,
                        max_attempts: retry.max_attempts,
                    });
                    tokio::select! {
                        biased;
                        _ = shutdown.wait() => {
                            self.emit(Status::Cancelled);
                            return Ok(SessionEnd::Cancelled);
                        }
                        _ = tokio::time::sleep(retry.delay) => {}
                    }
                    retry.advance();
                }
            }
        }

        self.emit(Status::Failed {
            attempts: retry.max_attempts,
        });
        Err(SessionError::RetriesExhausted {
            attempts: retry.max_attempts,
            delay: retry.delay,
        })
    }

    async fn attempt(&mut self, shutdown: &mut Shutdown) -> AttemptOutcome {
        debug!(uri = %self.uri, "opening subscription");
        let opened = tokio::select! {
            biased;
            _ = shutdown.wait() => return AttemptOutcome::Cancelled,
            opened = self.transport.open(&self.uri) => opened,
        };
        let Opened {
            initial,
            mut subscription,
        } = match opened {
            Ok(opened) => opened,
            Err(err) => return err.into(),
        };

        let outcome = self.consume(&initial, subscription.as_mut(), shutdown).await;

        // A close failure is secondary; the outcome above always wins.
        if let Err(err) = subscription.close().await {
            warn!(uri = %self.uri, error = %err, "ignoring close failure");
        }
        outcome
    }

    async fn consume(
        &mut self,
        initial: &[u8],
        subscription: &mut dyn Subscription,
        shutdown: &mut Shutdown,
    ) -> AttemptOutcome {
        if let Err(err) = self.deliver(initial) {
            return AttemptOutcome::Fatal(err);
        }
        self.emit(Status::Connected);

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.wait() => return AttemptOutcome::Cancelled,
                next = subscription.next_notification() => next,
            };
            match next {
                None => return AttemptOutcome::Ended,
                Some(Ok(payload)) => {
                    if let Err(err) = self.deliver(&payload) {
                        return AttemptOutcome::Fatal(err);
                    }
                }
                Some(Err(err)) => return err.into(),
            }
        }
    }

    fn deliver(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let value = decode_seat_count(payload)?;
        if !(0..=self.capacity).contains(&value) {
            debug!(
                carriage = self.target.get(),
                value,
                capacity = self.capacity,
                "value outside capacity, forwarding unclamped"
            );
        }
        let changed = self.values.update(value).is_some();
        (self.observer)(&Observation::new(self.target, value, changed));
        Ok(())
    }

    fn emit(&self, status: Status) {
        if catch_unwind(AssertUnwindSafe(|| self.status.status(&status))).is_err() {
            warn!(carriage = self.target.get(), %status, "status sink panicked");
        }
    }
}
