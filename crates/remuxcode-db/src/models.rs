//! The persisted job record.

use chrono::{DateTime, Utc};
use remuxcode_common::{JobId, JobKind, JobSource, JobStatus};
use serde::{Deserialize, Serialize};

/// Durable projection of a job, one row in the `jobs` table.
///
/// The three outcome flags summarize which transformations actually changed
/// the file; `result` carries the per-subsystem detail as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    pub id: JobId,
    pub file_path: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub source: JobSource,
    pub progress: f64,
    pub error: Option<String>,
    pub result: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub video_converted: bool,
    pub audio_converted: bool,
    pub streams_cleaned: bool,
}

impl JobRecord {
    /// A fresh pending record with a generated id.
    pub fn new(file_path: impl Into<String>, kind: JobKind, source: JobSource) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            file_path: file_path.into(),
            kind,
            status: JobStatus::Pending,
            source,
            progress: 0.0,
            error: None,
            result: serde_json::Value::Object(Default::default()),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            video_converted: false,
            audio_converted: false,
            streams_cleaned: false,
        }
    }
}

/// Job counts grouped by status.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobCounts {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl JobCounts {
    pub fn add(&mut self, status: JobStatus, count: usize) {
        self.total += count;
        match status {
            JobStatus::Pending => self.pending += count,
            JobStatus::Running => self.running += count,
            JobStatus::Completed => self.completed += count,
            JobStatus::Failed => self.failed += count,
            JobStatus::Cancelled => self.cancelled += count,
        }
    }
}
