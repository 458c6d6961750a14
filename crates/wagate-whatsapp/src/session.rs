//! `Session` implementation over a running `whatsapp-rust` client.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use wacore_binary::jid::Jid;
use wagate_core::{
    error::GatewayError, group::GroupRecord, session::OutgoingContent, traits::Session,
};
use whatsapp_rust::client::Client;

/// A live WhatsApp client plus the background task driving it.
pub struct WhatsAppSession {
    client: Arc<Client>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WhatsAppSession {
    pub(crate) fn new(client: Arc<Client>, handle: JoinHandle<()>) -> Self {
        Self {
            client,
            handle: Mutex::new(Some(handle)),
        }
    }

    fn parse_jid(recipient: &str) -> Result<Jid, GatewayError> {
        recipient.parse().map_err(|e| {
            GatewayError::Validation(format!("invalid whatsapp JID '{recipient}': {e}"))
        })
    }

    async fn build_message(
        &self,
        content: OutgoingContent,
    ) -> Result<waproto::whatsapp::Message, GatewayError> {
        let msg = match content {
            OutgoingContent::Text(text) => waproto::whatsapp::Message {
                conversation: Some(text),
                ..Default::default()
            },
            OutgoingContent::Image {
                data,
                mimetype,
                caption,
            } => {
                let upload = self
                    .client
                    .upload(data, whatsapp_rust::download::MediaType::Image)
                    .await
                    .map_err(|e| {
                        GatewayError::Collaborator(format!("whatsapp image upload failed: {e}"))
                    })?;

                waproto::whatsapp::Message {
                    image_message: Some(Box::new(waproto::whatsapp::message::ImageMessage {
                        mimetype: Some(mimetype),
                        caption,
                        url: Some(upload.url),
                        direct_path: Some(upload.direct_path),
                        media_key: Some(upload.media_key),
                        file_enc_sha256: Some(upload.file_enc_sha256),
                        file_sha256: Some(upload.file_sha256),
                        file_length: Some(upload.file_length),
                        ..Default::default()
                    })),
                    ..Default::default()
                }
            }
        };
        Ok(msg)
    }
}

#[async_trait]
impl Session for WhatsAppSession {
    async fn send(
        &self,
        recipient: &str,
        content: OutgoingContent,
    ) -> Result<String, GatewayError> {
        let jid = Self::parse_jid(recipient)?;
        let msg = self.build_message(content).await?;
        let msg_id = self
            .client
            .send_message(jid, msg)
            .await
            .map_err(|e| GatewayError::Collaborator(format!("whatsapp send failed: {e}")))?;
        debug!("sent whatsapp message {msg_id} to {recipient}");
        Ok(msg_id)
    }

    async fn participating_groups(&self) -> Result<Vec<GroupRecord>, GatewayError> {
        let groups = self
            .client
            .groups()
            .get_participating()
            .await
            .map_err(|e| {
                GatewayError::Collaborator(format!("whatsapp group enumeration failed: {e}"))
            })?;

        Ok(groups
            .into_values()
            .map(|meta| GroupRecord {
                id: meta.id.to_string(),
                subject: Some(meta.subject),
                participants: Some(
                    meta.participants
                        .iter()
                        .map(|p| p.jid.to_string())
                        .collect(),
                ),
                created_at: None,
            })
            .collect())
    }

    async fn close(&self) {
        let handle = match self.handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            handle.abort();
            info!("WhatsApp session closed");
        }
    }
}
