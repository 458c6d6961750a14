use crate::{
    error::GatewayError,
    group::GroupRecord,
    session::{OutgoingContent, SessionEvent},
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Live, authenticated handle to the messaging network.
#[async_trait]
pub trait Session: Send + Sync {
    /// Send a message to a normalized address. Returns the message id.
    async fn send(
        &self,
        recipient: &str,
        content: OutgoingContent,
    ) -> Result<String, GatewayError>;

    /// Enumerate every group the account participates in.
    async fn participating_groups(&self) -> Result<Vec<GroupRecord>, GatewayError>;

    /// Tear the session down. Must be safe to call more than once.
    async fn close(&self);
}

/// Session factory: the entry point into the WhatsApp client library.
///
/// `open` loads the persisted credential state and starts a session whose
/// lifecycle events are pushed into `events`. The returned handle is usable
/// for sending only after a [`SessionEvent::Opened`] has been delivered.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(
        &self,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Arc<dyn Session>, GatewayError>;
}

/// Persistence hooks for the opaque credential state.
pub trait CredentialStore: Send + Sync {
    /// Whether credentials from a previous pairing exist.
    fn exists(&self) -> bool;

    /// Record that the library updated its credentials.
    fn save(&self) -> Result<(), GatewayError>;

    /// Delete all persisted credentials.
    fn reset(&self) -> Result<(), GatewayError>;
}
