//! Bot lifecycle: building and running a `whatsapp-rust` bot per session.

use super::events::translate;
use super::session::WhatsAppSession;
use super::store::SessionStore;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use wagate_core::{
    error::GatewayError,
    session::SessionEvent,
    traits::{Connector, Session},
};
use whatsapp_rust::bot::Bot;
use whatsapp_rust_sqlite_storage::SqliteStore;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

/// Opens WhatsApp Web sessions backed by the credential database in a
/// [`SessionStore`].
pub struct WhatsAppConnector {
    store: SessionStore,
    device_name: String,
}

impl WhatsAppConnector {
    pub fn new(store: SessionStore, device_name: impl Into<String>) -> Self {
        Self {
            store,
            device_name: device_name.into(),
        }
    }
}

#[async_trait]
impl Connector for WhatsAppConnector {
    async fn open(
        &self,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Arc<dyn Session>, GatewayError> {
        let db_path = self.store.db_path()?;
        info!("WhatsApp bot building (session: {db_path})...");

        let backend = Arc::new(SqliteStore::new(&db_path).await.map_err(|e| {
            GatewayError::Collaborator(format!("whatsapp store init failed: {e}"))
        })?);

        let mut bot = Bot::builder()
            .with_backend(backend)
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .with_device_props(
                Some(self.device_name.clone()),
                None,
                Some(waproto::whatsapp::device_props::PlatformType::Desktop),
            )
            .on_event(move |event, _client| {
                let events = events.clone();
                async move {
                    if let Some(translated) = translate(&event) {
                        if events.send(translated).await.is_err() {
                            warn!("session event receiver dropped");
                        }
                    }
                }
            })
            .build()
            .await
            .map_err(|e| GatewayError::Collaborator(format!("whatsapp bot build failed: {e}")))?;

        let client = bot.client();
        let handle = bot
            .run()
            .await
            .map_err(|e| GatewayError::Collaborator(format!("whatsapp bot run failed: {e}")))?;

        info!("WhatsApp bot started");
        Ok(Arc::new(WhatsAppSession::new(client, handle)))
    }
}
