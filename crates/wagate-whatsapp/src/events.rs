//! Translation of `whatsapp-rust` events into gateway session events.

use tracing::{debug, info, warn};
use wacore::types::events::Event;
use wagate_core::session::{CloseReason, SessionEvent};

/// Map a library event to the subset the connection manager reacts to.
pub(crate) fn translate(event: &Event) -> Option<SessionEvent> {
    match event {
        Event::PairingQrCode { code, .. } => {
            info!("WhatsApp QR code generated (scan to pair)");
            debug!("QR data: {code}");
            Some(SessionEvent::PairingCode(code.clone()))
        }
        Event::PairSuccess(_) => {
            info!("WhatsApp pairing successful");
            Some(SessionEvent::CredentialsUpdated)
        }
        Event::Connected(_) => {
            info!("WhatsApp connected");
            Some(SessionEvent::Opened)
        }
        Event::LoggedOut(_) => {
            warn!("WhatsApp logged out, session invalidated");
            Some(SessionEvent::Closed(CloseReason::LoggedOut))
        }
        Event::Disconnected(_) => {
            warn!("WhatsApp disconnected");
            Some(SessionEvent::Closed(CloseReason::Other(
                "connection lost".to_string(),
            )))
        }
        Event::StreamError(err) => {
            warn!("WhatsApp stream error: {err:?}");
            Some(SessionEvent::Closed(CloseReason::Other(format!(
                "stream error: {err:?}"
            ))))
        }
        Event::JoinedGroup(_) | Event::GroupInfoUpdate { .. } => {
            debug!("WhatsApp group change event");
            Some(SessionEvent::GroupsChanged)
        }
        _ => None,
    }
}
