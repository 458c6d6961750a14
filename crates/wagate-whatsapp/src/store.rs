//! Session directory management: the on-disk home of the credential state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use wagate_core::{error::GatewayError, traits::CredentialStore};

const DB_FILE: &str = "whatsapp.db";
const MANIFEST_FILE: &str = "credentials.json";

/// Bookkeeping written beside the library's database on credential updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CredentialManifest {
    pub updated_at: DateTime<Utc>,
    pub updates: u64,
}

/// Directory holding the WhatsApp credential database.
///
/// The database format belongs to `whatsapp-rust-sqlite-storage`; this type
/// only creates, inspects, and deletes the directory around it.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Database path handed to the SQLite backend. Creates the directory.
    pub fn db_path(&self) -> Result<String, GatewayError> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(self.dir.join(DB_FILE).to_string_lossy().into_owned())
    }

    /// Time of the last recorded credential update, if any.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.read_manifest().map(|m| m.updated_at)
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    pub(crate) fn read_manifest(&self) -> Option<CredentialManifest> {
        let content = std::fs::read_to_string(self.manifest_path()).ok()?;
        serde_json::from_str(&content).ok()
    }
}

impl CredentialStore for SessionStore {
    fn exists(&self) -> bool {
        self.dir.join(DB_FILE).exists()
    }

    fn save(&self) -> Result<(), GatewayError> {
        std::fs::create_dir_all(&self.dir)?;
        let updates = self.read_manifest().map(|m| m.updates).unwrap_or(0) + 1;
        let manifest = CredentialManifest {
            updated_at: Utc::now(),
            updates,
        };
        std::fs::write(
            self.manifest_path(),
            serde_json::to_string_pretty(&manifest)?,
        )?;
        debug!("credential manifest updated ({updates} updates)");
        Ok(())
    }

    fn reset(&self) -> Result<(), GatewayError> {
        if self.dir.exists() {
            info!("deleting WhatsApp session at {}", self.dir.display());
            std::fs::remove_dir_all(&self.dir).map_err(|e| {
                GatewayError::Config(format!(
                    "failed to delete session directory {}: {e}",
                    self.dir.display()
                ))
            })?;
        }
        Ok(())
    }
}
