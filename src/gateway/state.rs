//! Shared session slot: connection state plus the live handle.

use std::sync::Arc;
use tokio::sync::RwLock;
use wagate_core::{error::GatewayError, session::ConnectionState, traits::Session};

/// Written only by the connection manager; read by handlers and the
/// refresh scheduler.
#[derive(Default)]
pub struct SessionState {
    state: RwLock<ConnectionState>,
    session: RwLock<Option<Arc<dyn Session>>>,
}

impl SessionState {
    pub async fn connection(&self) -> ConnectionState {
        self.state.read().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.is_connected()
    }

    pub async fn pairing_code(&self) -> Option<String> {
        self.state.read().await.pairing_code().map(str::to_string)
    }

    /// The session handle, if the session is open.
    pub async fn live_session(&self) -> Result<Arc<dyn Session>, GatewayError> {
        if !self.is_connected().await {
            return Err(GatewayError::NotConnected);
        }
        self.session
            .read()
            .await
            .clone()
            .ok_or(GatewayError::NotConnected)
    }

    pub(super) async fn set_connection(&self, state: ConnectionState) {
        *self.state.write().await = state;
    }

    pub(super) async fn set_session(&self, session: Arc<dyn Session>) {
        *self.session.write().await = Some(session);
    }

    pub(super) async fn take_session(&self) -> Option<Arc<dyn Session>> {
        self.session.write().await.take()
    }
}
