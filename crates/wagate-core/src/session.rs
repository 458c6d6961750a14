//! Session lifecycle types shared between the connection manager and the
//! WhatsApp client adapter.

/// Connectivity of the single WhatsApp session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session. `terminal` is set once the phone logged the device out;
    /// no reconnect is attempted from that state.
    Disconnected { terminal: bool },
    /// Waiting for the phone to scan the given pairing payload.
    AwaitingScan(String),
    /// Session open and usable.
    Connected,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Disconnected { terminal: false }
    }
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Current pairing payload, if a scan is pending.
    pub fn pairing_code(&self) -> Option<&str> {
        match self {
            Self::AwaitingScan(code) => Some(code),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected { terminal: true })
    }
}

/// Why a session closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The device was unlinked from the phone. Credentials are void.
    LoggedOut,
    /// Anything else (network drop, stream error, server restart).
    Other(String),
}

/// Events pushed by the client adapter into the connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new pairing QR payload was issued.
    PairingCode(String),
    /// The session is authenticated and ready.
    Opened,
    /// The session closed.
    Closed(CloseReason),
    /// The library changed the persisted credential state.
    CredentialsUpdated,
    /// Group membership or metadata changed.
    GroupsChanged,
}

/// Message body handed to [`crate::traits::Session::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingContent {
    Text(String),
    Image {
        data: Vec<u8>,
        mimetype: String,
        caption: Option<String>,
    },
}
