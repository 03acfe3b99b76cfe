//! Media probing.

mod ffprobe;
mod types;

pub use ffprobe::{parse_ffprobe_json, FfprobeProvider};
pub use types::*;

use crate::Result;
use std::path::Path;

/// Source of stream-level metadata for a file.
///
/// Failures are reported as [`crate::Error::FileNotFound`],
/// [`crate::Error::ToolFailed`], [`crate::Error::ParseError`], or
/// [`crate::Error::Timeout`].
#[async_trait::async_trait]
pub trait MediaInfoProvider: Send + Sync {
    async fn analyze(&self, path: &Path) -> Result<MediaInfo>;
}
