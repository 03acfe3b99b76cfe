//! Conversion decision pipelines.
//!
//! Each pipeline is a pure function of [`MediaInfo`](crate::MediaInfo), its
//! config, and (for video and cleanup) a classifier result. It answers
//! whether anything must change and, if so, returns a plan that can render
//! the exact ffmpeg [`CommandSpec`](crate::CommandSpec):
//!
//! - [`audio`]: DTS/TrueHD to AC-3, E-AC-3, or AAC by channel count
//! - [`video`]: H.264 to HEVC with an anime or live-action profile
//! - [`cleanup`]: drop audio and subtitle streams outside a language keep-set

pub mod audio;
pub mod cleanup;
pub mod video;

pub use audio::{AudioAction, AudioCodec, AudioConfig, AudioConversion, AudioPlan, AudioTarget};
pub use cleanup::{CleanupConfig, CleanupPlan};
pub use video::{ContentType, EncodeProfile, VideoConfig, VideoPlan};
