//! Transport seam consumed by the session.

use async_trait::async_trait;

use crate::error::{CleanupError, TransportError};
use crate::payload::Payload;
use crate::target::ResourceUri;

/// A freshly opened observe registration: its first response plus the handle
/// that yields the following notifications.
pub struct Opened {
    pub initial: Payload,
    pub subscription: Box<dyn Subscription>,
}

/// Opens observe subscriptions on a remote resource.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, uri: &ResourceUri) -> Result<Opened, TransportError>;
}

/// One active observe registration.
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next pushed payload. `None` means the server ended the
    /// observation cleanly.
    async fn next_notification(&mut self) -> Option<Result<Payload, TransportError>>;

    /// Deregister and release the underlying resources.
    async fn close(&mut self) -> Result<(), CleanupError>;
}
