use chrono::{DateTime, Utc};
use remuxcode_common::{JobId, JobKind, JobSource, JobStatus};
use remuxcode_db::models::JobRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Fixed error recorded on cancelled jobs.
pub const CANCELLED_MESSAGE: &str = "Cancelled by user";

/// Outcome of one transformation step (audio, video or cleanup).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubsystemResult {
    pub success: bool,
    /// The step was requested but its decision pipeline found nothing to do.
    #[serde(default)]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl SubsystemResult {
    pub fn succeeded(detail: serde_json::Value) -> Self {
        Self {
            success: true,
            skipped: false,
            error: None,
            detail,
        }
    }

    pub fn skipped() -> Self {
        Self {
            success: false,
            skipped: true,
            error: None,
            detail: serde_json::Value::Null,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            skipped: false,
            error: Some(error.into()),
            detail: serde_json::Value::Null,
        }
    }

    pub fn is_failure(&self) -> bool {
        !self.success && !self.skipped
    }
}

/// Per-subsystem results; a `None` step was not requested by the job kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<SubsystemResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<SubsystemResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<SubsystemResult>,
}

impl JobResult {
    fn steps(&self) -> impl Iterator<Item = (&'static str, &SubsystemResult)> {
        [
            ("audio", self.audio.as_ref()),
            ("video", self.video.as_ref()),
            ("cleanup", self.cleanup.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, r)| r.map(|r| (name, r)))
    }

    pub fn audio_converted(&self) -> bool {
        self.audio.as_ref().is_some_and(|r| r.success)
    }

    pub fn video_converted(&self) -> bool {
        self.video.as_ref().is_some_and(|r| r.success)
    }

    pub fn streams_cleaned(&self) -> bool {
        self.cleanup.as_ref().is_some_and(|r| r.success)
    }

    /// At least one step changed the file.
    pub fn any_success(&self) -> bool {
        self.steps().any(|(_, r)| r.success)
    }

    /// The first failed step, formatted as `"{step}: {error}"`.
    pub fn first_error(&self) -> Option<String> {
        self.steps().find(|(_, r)| r.is_failure()).map(|(name, r)| {
            format!(
                "{}: {}",
                name,
                r.error.as_deref().unwrap_or("conversion failed")
            )
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub file_path: PathBuf,
    pub status: JobStatus,
    pub source: JobSource,
    pub progress: f64,
    pub error: Option<String>,
    pub result: JobResult,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(file_path: PathBuf, kind: JobKind, source: JobSource) -> Self {
        Self {
            id: JobId::new(),
            kind,
            file_path,
            status: JobStatus::Pending,
            source,
            progress: 0.0,
            error: None,
            result: JobResult::default(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// pending -> running. Returns false from any other state.
    pub fn start(&mut self) -> bool {
        if self.status != JobStatus::Pending {
            return false;
        }
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
        true
    }

    /// running -> completed.
    pub fn complete(&mut self) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        self.status = JobStatus::Completed;
        self.progress = 1.0;
        self.error = None;
        self.completed_at = Some(Utc::now());
        true
    }

    /// running -> failed.
    pub fn fail(&mut self, error: &str) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        self.status = JobStatus::Failed;
        self.error = Some(error.to_string());
        self.completed_at = Some(Utc::now());
        true
    }

    /// pending|running -> cancelled.
    pub fn cancel(&mut self) -> bool {
        if !self.status.is_cancellable() {
            return false;
        }
        self.status = JobStatus::Cancelled;
        self.error = Some(CANCELLED_MESSAGE.to_string());
        self.completed_at = Some(Utc::now());
        true
    }

    pub fn to_record(&self) -> JobRecord {
        JobRecord {
            id: self.id.clone(),
            file_path: self.file_path.to_string_lossy().into_owned(),
            kind: self.kind,
            status: self.status,
            source: self.source,
            progress: self.progress,
            error: self.error.clone(),
            result: serde_json::to_value(&self.result)
                .unwrap_or_else(|_| serde_json::Value::Object(Default::default())),
            created_at: self.created_at,
            updated_at: Utc::now(),
            started_at: self.started_at,
            completed_at: self.completed_at,
            video_converted: self.result.video_converted(),
            audio_converted: self.result.audio_converted(),
            streams_cleaned: self.result.streams_cleaned(),
        }
    }
}

impl From<JobRecord> for Job {
    fn from(record: JobRecord) -> Self {
        Self {
            id: record.id,
            kind: record.kind,
            file_path: PathBuf::from(record.file_path),
            status: record.status,
            source: record.source,
            progress: record.progress,
            error: record.error,
            result: serde_json::from_value(record.result).unwrap_or_default(),
            created_at: record.created_at,
            started_at: record.started_at,
            completed_at: record.completed_at,
        }
    }
}
