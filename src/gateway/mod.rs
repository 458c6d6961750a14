//! Connection manager: owns the single WhatsApp session, keeps the
//! connection state in step with session events, and reconnects on drops.

mod scheduler;
mod state;


pub use scheduler::{DelayedRefresh, RefreshScheduler, RefreshTrigger};
pub use state::SessionState;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};
use wagate_core::{
    error::GatewayError,
    session::{CloseReason, ConnectionState, SessionEvent},
    traits::{Connector, CredentialStore, Session},
};

use crate::notify::Notifier;

/// Floor for the pause between failed `open` attempts.
const MIN_OPEN_RETRY: Duration = Duration::from_secs(1);

const EVENT_BUFFER: usize = 64;

pub const SCAN_PROMPT: &str = "Scan the QR code to connect";
pub const CONNECTED_MESSAGE: &str = "WhatsApp connected";
pub const LOGGED_OUT_MESSAGE: &str =
    "Logged out from WhatsApp. Restart with --reset-session to pair again";

/// Session events tagged with the connect attempt that produced them.
type Tagged = (u64, SessionEvent);

pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialStore>,
    shared: Arc<SessionState>,
    notifier: Notifier,
    scheduler: Arc<dyn RefreshScheduler>,
    reconnect_delay: Duration,
    /// Held for the duration of a connect; serializes session creation.
    connecting: Mutex<()>,
    generation: AtomicU64,
    events_tx: mpsc::Sender<Tagged>,
    events_rx: Mutex<Option<mpsc::Receiver<Tagged>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn CredentialStore>,
        shared: Arc<SessionState>,
        notifier: Notifier,
        scheduler: Arc<dyn RefreshScheduler>,
        reconnect_delay: Duration,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            connector,
            credentials,
            shared,
            notifier,
            scheduler,
            reconnect_delay,
            connecting: Mutex::new(()),
            generation: AtomicU64::new(0),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            shutdown_tx,
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.shared.connection().await
    }

    pub async fn is_connected(&self) -> bool {
        self.shared.is_connected().await
    }

    pub async fn pairing_code(&self) -> Option<String> {
        self.shared.pairing_code().await
    }

    /// The live session, or `NotConnected`.
    pub async fn session(&self) -> Result<Arc<dyn Session>, GatewayError> {
        self.shared.live_session().await
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Open a new session through the connector.
    ///
    /// Returns immediately if another connect is already in flight. Any
    /// previous session is closed first; its late events are discarded.
    pub async fn connect(&self) -> Result<(), GatewayError> {
        let Ok(_guard) = self.connecting.try_lock() else {
            debug!("connect already in progress, skipping");
            return Ok(());
        };

        if let Some(old) = self.shared.take_session().await {
            old.close().await;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let events = self.forwarder(generation);

        info!("opening WhatsApp session (attempt {generation})");
        match self.connector.open(events).await {
            Ok(session) => {
                self.shared.set_session(session).await;
                Ok(())
            }
            Err(e) => {
                error!("connect failed: {e}");
                self.notifier
                    .status(false, format!("Connection failed: {e}"));
                Err(e)
            }
        }
    }

    /// Spawn a task that tags events from one session with its generation.
    fn forwarder(&self, generation: u64) -> mpsc::Sender<SessionEvent> {
        let (tx, mut rx) = mpsc::channel::<SessionEvent>(EVENT_BUFFER);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if events.send((generation, event)).await.is_err() {
                    break;
                }
            }
        });
        tx
    }

    /// Drain session events until [`shutdown`](Self::shutdown) is called.
    pub async fn run(self: Arc<Self>) {
        let Some(mut rx) = self.events_rx.lock().await.take() else {
            warn!("connection manager already running");
            return;
        };
        let mut shutdown = self.shutdown_tx.subscribe();
        if *shutdown.borrow() {
            return;
        }

        loop {
            tokio::select! {
                tagged = rx.recv() => {
                    let Some((generation, event)) = tagged else { break };
                    if generation != self.generation.load(Ordering::SeqCst) {
                        debug!("dropping stale event from session {generation}: {event:?}");
                        continue;
                    }
                    self.handle_event(event).await;
                }
                _ = shutdown.changed() => break,
            }
        }
        info!("connection manager stopped");
    }

    /// Single dispatch point for events of the current session.
    ///
    /// After a logout every event is ignored until restart.
    pub async fn handle_event(&self, event: SessionEvent) {
        if self.shared.connection().await.is_terminal() {
            debug!("logged out, ignoring {event:?}");
            return;
        }
        match event {
            SessionEvent::PairingCode(code) => {
                self.shared
                    .set_connection(ConnectionState::AwaitingScan(code.clone()))
                    .await;
                self.notifier.qr(code);
                self.notifier.status(false, SCAN_PROMPT);
            }
            SessionEvent::Opened => {
                self.shared.set_connection(ConnectionState::Connected).await;
                self.notifier.status(true, CONNECTED_MESSAGE);
                self.scheduler.schedule(RefreshTrigger::Connected);
            }
            SessionEvent::Closed(CloseReason::LoggedOut) => {
                warn!("session logged out; not reconnecting");
                // Anything the dead session still emits is stale from here on.
                self.generation.fetch_add(1, Ordering::SeqCst);
                self.shared
                    .set_connection(ConnectionState::Disconnected { terminal: true })
                    .await;
                if let Some(session) = self.shared.take_session().await {
                    session.close().await;
                }
                self.notifier.status(false, LOGGED_OUT_MESSAGE);
            }
            SessionEvent::Closed(CloseReason::Other(reason)) => {
                info!("session closed ({reason}), reconnecting");
                self.shared
                    .set_connection(ConnectionState::Disconnected { terminal: false })
                    .await;
                self.notifier
                    .status(false, format!("Disconnected ({reason}). Reconnecting..."));
                self.reconnect().await;
            }
            SessionEvent::CredentialsUpdated => {
                if let Err(e) = self.credentials.save() {
                    warn!("failed to save credentials: {e}");
                }
            }
            SessionEvent::GroupsChanged => {
                self.scheduler.schedule(RefreshTrigger::GroupsChanged);
            }
        }
    }

    /// Reconnect after a transient close. Open failures are retried until one
    /// succeeds or the manager shuts down.
    async fn reconnect(&self) {
        let mut shutdown = self.shutdown_tx.subscribe();
        let mut delay = self.reconnect_delay;
        loop {
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.changed() => return,
                }
            }
            if *shutdown.borrow() {
                return;
            }
            match self.connect().await {
                Ok(()) => return,
                Err(_) => delay = self.reconnect_delay.max(MIN_OPEN_RETRY),
            }
        }
    }

    /// Close the active session and stop [`run`](Self::run).
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        if let Some(session) = self.shared.take_session().await {
            session.close().await;
        }
        self.shared
            .set_connection(ConnectionState::Disconnected { terminal: false })
            .await;
    }
}
