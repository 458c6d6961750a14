//! # wagate-whatsapp
//!
//! WhatsApp Web session via `whatsapp-rust` (Noise handshake + Signal
//! encryption). Pairing is done by scanning a QR code. Credentials are
//! persisted to `{session_dir}/whatsapp.db` by the library's SQLite store.

mod connector;
mod events;
mod qr;
mod session;
mod store;


pub use connector::WhatsAppConnector;
pub use qr::{generate_qr_image, generate_qr_terminal};
pub use session::WhatsAppSession;
pub use store::SessionStore;
