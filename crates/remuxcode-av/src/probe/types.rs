//! Media information types.
//!
//! These are immutable snapshots of a file's streams. Decision pipelines only
//! classify them; nothing here is ever mutated after probing.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Information about a media file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MediaInfo {
    /// Path to the media file.
    pub file_path: PathBuf,
    /// Container format name as reported by the prober (e.g. "matroska,webm").
    pub container: String,
    /// Duration in seconds.
    pub duration: Option<f64>,
    /// File size in bytes.
    pub size: u64,
    pub video_streams: Vec<VideoStream>,
    pub audio_streams: Vec<AudioStream>,
    pub subtitle_streams: Vec<SubtitleStream>,
    /// Fonts and other embedded files.
    pub attachment_streams: Vec<AttachmentStream>,
    pub chapter_count: usize,
}

impl MediaInfo {
    /// The first video stream, which is the one considered for conversion.
    pub fn primary_video(&self) -> Option<&VideoStream> {
        self.video_streams.first()
    }
}

/// A video stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VideoStream {
    /// Container-wide stream index.
    pub index: u32,
    /// Codec identifier, lowercase (e.g. "h264", "hevc").
    pub codec: String,
    pub profile: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Pixel format (e.g. "yuv420p10le").
    pub pix_fmt: String,
    pub bit_depth: u8,
    /// Frame rate as a rational expression (e.g. "24000/1001").
    pub frame_rate: String,
}

impl VideoStream {
    pub fn is_hevc(&self) -> bool {
        matches!(self.codec.to_lowercase().as_str(), "hevc" | "h265")
    }

    pub fn is_h264(&self) -> bool {
        matches!(self.codec.to_lowercase().as_str(), "h264" | "avc" | "avc1")
    }

    pub fn is_10bit(&self) -> bool {
        self.bit_depth >= 10 || self.pix_fmt.contains("10")
    }

    /// Frame rate as a float, if the expression is well formed.
    pub fn fps(&self) -> Option<f64> {
        parse_frame_rate(&self.frame_rate)
    }
}

/// An audio stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AudioStream {
    /// Container-wide stream index.
    pub index: u32,
    /// Codec identifier, lowercase (e.g. "dts", "truehd", "ac3").
    pub codec: String,
    /// Codec profile (e.g. "DTS-HD MA").
    pub profile: Option<String>,
    pub channels: u32,
    pub channel_layout: Option<String>,
    pub sample_rate: u32,
    /// Bits per second, if the container reports it.
    pub bit_rate: Option<u64>,
    pub language: Option<String>,
    pub title: Option<String>,
    pub default: bool,
    pub forced: bool,
}

impl AudioStream {
    pub fn is_dts(&self) -> bool {
        self.codec.to_lowercase().starts_with("dts")
    }

    pub fn is_truehd(&self) -> bool {
        self.codec.eq_ignore_ascii_case("truehd")
    }

    /// Source bitrate in kbps, 0 when unknown.
    pub fn bitrate_kbps(&self) -> u32 {
        self.bit_rate.map(|b| (b / 1000) as u32).unwrap_or(0)
    }

    pub fn title_lower(&self) -> String {
        self.title.as_deref().unwrap_or_default().to_lowercase()
    }
}

/// A subtitle stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubtitleStream {
    /// Container-wide stream index.
    pub index: u32,
    pub codec: String,
    pub language: Option<String>,
    pub title: Option<String>,
    pub default: bool,
    pub forced: bool,
    /// Hearing-impaired disposition, or an SDH/CC marker in the title.
    pub hearing_impaired: bool,
}

/// An attachment stream (fonts, cover art).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AttachmentStream {
    /// Container-wide stream index.
    pub index: u32,
    pub codec: String,
    pub filename: Option<String>,
    pub mimetype: Option<String>,
}

/// Parse "num/den" or a plain number into frames per second.
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    if let Some((num, den)) = rate.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        return (den != 0.0).then(|| num / den);
    }
    rate.trim().parse().ok()
}
