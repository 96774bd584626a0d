mod config;
mod error;
mod mailbox;
mod observation;
mod observer;
mod payload;
mod retry;
mod router;
mod session;
mod shutdown;
mod status;
mod target;
mod transport;
mod value_sink;

pub use config::{SessionConfig, DEFAULT_CAPACITY, DEFAULT_HOST};
pub use error::{
    CleanupError, ConfigError, FatalKind, RetryableKind, SessionError, SetupError,
    TransportError, ValidationError,
};
pub use mailbox::Mailbox;
pub use observation::Observation;
pub use observer::{
    changed_only, channel_observer, filter_with, mailbox_observer, no_op_observer, tee_observer,
    tracing_observer, ObserverFn,
};
pub use payload::{decode_seat_count, Payload};
pub use retry::{RetryPolicy, RetryState};
pub use router::{Router, RouterChannels};
pub use session::{ObservationSession, SessionEnd};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use status::{Status, StatusSink, TeeStatus, TracingStatus};
pub use target::{ResourceUri, TargetId, TargetRange};
pub use transport::{Opened, Subscription, Transport};
pub use value_sink::{Changed, SeatCount, ValueSink};
