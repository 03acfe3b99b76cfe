//! Core job type definitions.
//!
//! All enums serialize in lowercase and round-trip through `Display`/`FromStr`
//! so the same spelling is used in JSON, in the database, and in URLs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a job.
///
/// Transitions only move forward: `Pending -> Running -> {Completed, Failed,
/// Cancelled}`. A restart reload is the only way back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Cancellation is only accepted while pending or running.
    pub fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub const ALL: [JobStatus; 5] = [
        Self::Pending,
        Self::Running,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
    ];
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

/// Which transformations a job requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Audio,
    Video,
    Cleanup,
    /// Audio, then video, then cleanup.
    #[default]
    Full,
}

impl JobKind {
    pub fn includes_audio(self) -> bool {
        matches!(self, Self::Audio | Self::Full)
    }

    pub fn includes_video(self) -> bool {
        matches!(self, Self::Video | Self::Full)
    }

    pub fn includes_cleanup(self) -> bool {
        matches!(self, Self::Cleanup | Self::Full)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Cleanup => "cleanup",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            "cleanup" => Ok(Self::Cleanup),
            "full" => Ok(Self::Full),
            _ => Err(format!(
                "Invalid job type: {}. Must be one of: audio, video, cleanup, full",
                s
            )),
        }
    }
}

/// What triggered a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobSource {
    Webhook,
    Api,
    Batch,
    /// Re-enqueued from the store at startup.
    Restart,
    Cli,
}

impl JobSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Api => "api",
            Self::Batch => "batch",
            Self::Restart => "restart",
            Self::Cli => "cli",
        }
    }
}

impl fmt::Display for JobSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "webhook" => Ok(Self::Webhook),
            "api" => Ok(Self::Api),
            "batch" => Ok(Self::Batch),
            "restart" => Ok(Self::Restart),
            "cli" => Ok(Self::Cli),
            _ => Err(format!("Invalid job source: {}", s)),
        }
    }
}
