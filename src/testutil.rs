//! Test doubles for the WhatsApp collaborator seam.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use wagate_core::{
    error::GatewayError,
    group::GroupRecord,
    session::{OutgoingContent, SessionEvent},
    traits::{Connector, CredentialStore, Session},
};

use crate::gateway::{RefreshScheduler, RefreshTrigger};

pub fn record(id: &str, subject: Option<&str>, participants: Option<usize>) -> GroupRecord {
    GroupRecord {
        id: id.to_string(),
        subject: subject.map(str::to_string),
        participants: participants.map(|n| (0..n).map(|i| format!("{i}@s.whatsapp.net")).collect()),
        created_at: None,
    }
}

/// Session that records sends and serves a fixed group list.
#[derive(Default)]
pub struct MockSession {
    pub groups: Vec<GroupRecord>,
    pub fail: bool,
    pub sent: Mutex<Vec<(String, OutgoingContent)>>,
    pub closed: AtomicBool,
}

impl MockSession {
    pub fn with_groups(groups: Vec<GroupRecord>) -> Self {
        Self {
            groups,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, OutgoingContent)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Session for MockSession {
    async fn send(
        &self,
        recipient: &str,
        content: OutgoingContent,
    ) -> Result<String, GatewayError> {
        if self.fail {
            return Err(GatewayError::Collaborator("connection reset".into()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((recipient.to_string(), content));
        Ok(format!("MSG{}", sent.len()))
    }

    async fn participating_groups(&self) -> Result<Vec<GroupRecord>, GatewayError> {
        if self.fail {
            return Err(GatewayError::Collaborator("enumeration timed out".into()));
        }
        Ok(self.groups.clone())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Connector handing out the same session and keeping every event sender.
pub struct MockConnector {
    pub session: Arc<MockSession>,
    pub opens: AtomicUsize,
    pub fail: AtomicBool,
    pub senders: Mutex<Vec<mpsc::Sender<SessionEvent>>>,
}

impl MockConnector {
    pub fn new(session: MockSession) -> Self {
        Self {
            session: Arc::new(session),
            opens: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            senders: Mutex::new(Vec::new()),
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Event sender handed to the `n`th open (0-based).
    pub fn sender(&self, n: usize) -> mpsc::Sender<SessionEvent> {
        self.senders.lock().unwrap()[n].clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(
        &self,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Arc<dyn Session>, GatewayError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Collaborator("store init failed".into()));
        }
        self.senders.lock().unwrap().push(events);
        Ok(self.session.clone())
    }
}

#[derive(Default)]
pub struct MockCredentials {
    pub saves: AtomicUsize,
    pub fail: bool,
}

impl CredentialStore for MockCredentials {
    fn exists(&self) -> bool {
        self.saves.load(Ordering::SeqCst) > 0
    }

    fn save(&self) -> Result<(), GatewayError> {
        if self.fail {
            return Err(GatewayError::Persistence("disk full".into()));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn reset(&self) -> Result<(), GatewayError> {
        self.saves.store(0, Ordering::SeqCst);
        Ok(())
    }
}

/// Scheduler that records triggers instead of sleeping.
#[derive(Default)]
pub struct RecordingScheduler {
    pub triggers: Mutex<Vec<RefreshTrigger>>,
}

impl RecordingScheduler {
    pub fn triggers(&self) -> Vec<RefreshTrigger> {
        self.triggers.lock().unwrap().clone()
    }
}

impl RefreshScheduler for RecordingScheduler {
    fn schedule(&self, trigger: RefreshTrigger) {
        self.triggers.lock().unwrap().push(trigger);
    }
}
