//! Job identifiers.
//!
//! Job ids are short opaque strings rather than full UUIDs so they stay
//! readable in URLs and log lines.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of a generated job id in hex characters.
pub const JOB_ID_LEN: usize = 12;

/// Unique identifier for a conversion job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a new random job ID: the first 12 hex digits of a v4 UUID.
    #[must_use]
    pub fn new() -> Self {
        let mut raw = Uuid::new_v4().simple().to_string();
        raw.truncate(JOB_ID_LEN);
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
