//! FFprobe-based media probing.

use super::types::*;
use super::MediaInfoProvider;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    chapters: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    #[serde(default)]
    format_name: String,
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: u32,
    #[serde(default)]
    codec_type: String,
    codec_name: Option<String>,
    profile: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    pix_fmt: Option<String>,
    bits_per_raw_sample: Option<String>,
    r_frame_rate: Option<String>,
    channels: Option<u32>,
    channel_layout: Option<String>,
    sample_rate: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    disposition: FfprobeDisposition,
    #[serde(default)]
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    default: u8,
    #[serde(default)]
    forced: u8,
    #[serde(default)]
    hearing_impaired: u8,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
    title: Option<String>,
    filename: Option<String>,
    mimetype: Option<String>,
}

/// [`MediaInfoProvider`] backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProvider {
    program: PathBuf,
    timeout: Duration,
}

impl Default for FfprobeProvider {
    fn default() -> Self {
        Self::new(PathBuf::from("ffprobe"))
    }
}

impl FfprobeProvider {
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait::async_trait]
impl MediaInfoProvider for FfprobeProvider {
    async fn analyze(&self, path: &Path) -> Result<MediaInfo> {
        if !path.exists() {
            return Err(Error::file_not_found(path));
        }

        let child = Command::new(&self.program)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-show_chapters",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::tool_not_found("ffprobe")
                } else {
                    Error::Io(e)
                }
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::timeout("ffprobe", self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::tool_failed(
                "ffprobe",
                format!("exited with status {}: {}", output.status, stderr.trim()),
            ));
        }

        let json_str = String::from_utf8(output.stdout)
            .map_err(|e| Error::parse_error("ffprobe", format!("Invalid UTF-8: {}", e)))?;

        parse_ffprobe_json(path, &json_str)
    }
}

/// Parse `ffprobe -print_format json` output into [`MediaInfo`].
pub fn parse_ffprobe_json(path: &Path, json: &str) -> Result<MediaInfo> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::parse_error("ffprobe", e.to_string()))?;

    let mut info = MediaInfo {
        file_path: path.to_path_buf(),
        container: output.format.format_name,
        duration: output.format.duration.and_then(|s| s.parse().ok()),
        size: output.format.size.and_then(|s| s.parse().ok()).unwrap_or(0),
        chapter_count: output.chapters.len(),
        ..Default::default()
    };

    for stream in output.streams {
        let codec = stream.codec_name.clone().unwrap_or_default().to_lowercase();
        match stream.codec_type.as_str() {
            "video" => {
                let pix_fmt = stream.pix_fmt.unwrap_or_default();
                let bit_depth = bit_depth(&pix_fmt, stream.bits_per_raw_sample.as_deref());
                info.video_streams.push(VideoStream {
                    index: stream.index,
                    codec,
                    profile: stream.profile,
                    width: stream.width.unwrap_or(0),
                    height: stream.height.unwrap_or(0),
                    pix_fmt,
                    bit_depth,
                    frame_rate: stream.r_frame_rate.unwrap_or_else(|| "0/1".to_string()),
                });
            }
            "audio" => info.audio_streams.push(AudioStream {
                index: stream.index,
                codec,
                profile: stream.profile,
                channels: stream.channels.unwrap_or(0),
                channel_layout: stream.channel_layout,
                sample_rate: stream
                    .sample_rate
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
                bit_rate: stream.bit_rate.and_then(|s| s.parse().ok()),
                language: stream.tags.language,
                title: stream.tags.title,
                default: stream.disposition.default == 1,
                forced: stream.disposition.forced == 1,
            }),
            "subtitle" => {
                let title_lower = stream.tags.title.as_deref().unwrap_or_default().to_lowercase();
                let hearing_impaired = stream.disposition.hearing_impaired == 1
                    || ["sdh", "hearing", "impaired", "cc"]
                        .iter()
                        .any(|kw| title_lower.contains(kw));
                info.subtitle_streams.push(SubtitleStream {
                    index: stream.index,
                    codec,
                    language: stream.tags.language,
                    title: stream.tags.title,
                    default: stream.disposition.default == 1,
                    forced: stream.disposition.forced == 1,
                    hearing_impaired,
                });
            }
            "attachment" => info.attachment_streams.push(AttachmentStream {
                index: stream.index,
                codec,
                filename: stream.tags.filename,
                mimetype: stream.tags.mimetype,
            }),
            _ => {}
        }
    }

    Ok(info)
}

/// Bit depth from the pixel format name, falling back to `bits_per_raw_sample`.
fn bit_depth(pix_fmt: &str, bits_per_raw_sample: Option<&str>) -> u8 {
    if ["p10", "10le", "10be"].iter().any(|s| pix_fmt.contains(s)) {
        return 10;
    }
    if ["p12", "12le", "12be"].iter().any(|s| pix_fmt.contains(s)) {
        return 12;
    }
    bits_per_raw_sample
        .and_then(|s| s.parse().ok())
        .unwrap_or(8)
}
