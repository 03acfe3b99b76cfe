//! # remuxcode-av
//!
//! Media probing and conversion decisions for remuxcode.
//!
//! This crate provides:
//! - Stream-level media metadata via ffprobe, behind the [`MediaInfoProvider`] trait
//! - Three pure decision pipelines (audio, video, cleanup) that produce ffmpeg
//!   command specifications
//! - A [`CommandExecutor`] that runs those commands with a timeout
//! - Job-private working directories with safe finalization
//!
//! ## Features
//!
//! - `tracing` - Enable tracing support
//!
//! ## Example
//!
//! ```no_run
//! use remuxcode_av::{actions::audio, AudioConfig, FfprobeProvider, MediaInfoProvider};
//! use std::path::Path;
//!
//! # async fn example() -> remuxcode_av::Result<()> {
//! let info = FfprobeProvider::default().analyze(Path::new("/media/movie.mkv")).await?;
//! let config = AudioConfig::default();
//! if audio::should_convert(&info, &config) {
//!     let plan = audio::plan(&info, &config);
//!     println!("{}", plan.command(Path::new("/media/movie.mkv"), Path::new("/tmp/out.mkv")));
//! }
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod command;
mod error;
pub mod language;
pub mod probe;
pub mod tools;
pub mod workspace;

// Re-exports
pub use actions::{
    AudioConfig, AudioPlan, CleanupConfig, CleanupPlan, ContentType, VideoConfig, VideoPlan,
};
pub use command::{timeout_from_secs, CommandExecutor, CommandSpec, ToolExecutor, ToolOutput};
pub use error::{Error, Result};
pub use probe::{FfprobeProvider, MediaInfo, MediaInfoProvider};
pub use tools::{check_tool, check_tools, ToolInfo};
pub use workspace::{cleanup_orphans, Finalized, Workspace};
