//! Group records as reported by the client library and as served by the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder name for groups without a subject.
pub const UNNAMED_GROUP: &str = "Unknown Group";

/// A group chat as enumerated by the WhatsApp session.
///
/// Every field except `id` may be missing depending on what the server
/// returned for the group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupRecord {
    pub id: String,
    pub subject: Option<String>,
    pub participants: Option<Vec<String>>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Group summary served by `/groups` and mirrored to the snapshot file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub participants: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<GroupRecord> for GroupSummary {
    fn from(record: GroupRecord) -> Self {
        let name = match record.subject {
            Some(subject) if !subject.trim().is_empty() => subject,
            _ => UNNAMED_GROUP.to_string(),
        };
        let participants = record
            .participants
            .map(|p| u32::try_from(p.len()).unwrap_or(u32::MAX))
            .unwrap_or(0);

        Self {
            id: record.id,
            name,
            participants,
            created_at: record.created_at,
        }
    }
}
