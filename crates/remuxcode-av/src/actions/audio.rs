//! Audio compatibility transcoding decisions.
//!
//! DTS and TrueHD tracks are transcoded to a widely supported lossy codec
//! chosen by channel count. Every other audio track is stream-copied.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::command::CommandSpec;
use crate::language::language_name;
use crate::probe::{AudioStream, MediaInfo};

/// Minimum bitrate (kbps) for 5.1 AC-3/E-AC-3 output.
pub const SURROUND_FLOOR_KBPS: u32 = 448;
/// Minimum bitrate (kbps) for AAC output.
pub const AAC_FLOOR_KBPS: u32 = 128;

/// Audio pipeline settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AudioConfig {
    pub enabled: bool,
    pub convert_dts: bool,
    pub convert_truehd: bool,
    /// Keep the source track alongside the converted one.
    pub keep_original: bool,
    /// Use AC-3 rather than E-AC-3 for 3-6 channel sources.
    pub prefer_ac3: bool,
    pub ac3_bitrate: u32,
    pub eac3_bitrate: u32,
    pub aac_surround_bitrate: u32,
    pub aac_stereo_bitrate: u32,
    /// Seconds; 0 disables the timeout.
    pub job_timeout: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            convert_dts: true,
            convert_truehd: true,
            keep_original: false,
            prefer_ac3: true,
            ac3_bitrate: 640,
            eac3_bitrate: 1536,
            aac_surround_bitrate: 512,
            aac_stereo_bitrate: 320,
            job_timeout: 7200,
        }
    }
}

/// Target audio codecs for compatibility transcoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    /// AAC: stereo and 7.1 output.
    Aac,
    /// AC-3 (Dolby Digital): 5.1 output.
    Ac3,
    /// E-AC-3 (Dolby Digital Plus): 5.1 output.
    Eac3,
}

impl AudioCodec {
    /// Get the ffmpeg encoder name.
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            AudioCodec::Aac => "aac",
            AudioCodec::Ac3 => "ac3",
            AudioCodec::Eac3 => "eac3",
        }
    }
}

/// Codec, bitrate, and optional downmix layout for one converted stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioTarget {
    pub codec: AudioCodec,
    pub bitrate_kbps: u32,
    /// Set when the source must be downmixed, e.g. `"7.1"` for >8 channels.
    pub layout: Option<&'static str>,
}

/// Pick the output format for a stream with `channels` channels.
///
/// `source_kbps` is the source bitrate, 0 if unknown. The result never exceeds
/// the configured ceiling for the chosen codec, then is raised to the codec
/// floor.
pub fn determine_target(channels: u32, source_kbps: u32, config: &AudioConfig) -> AudioTarget {
    let (codec, ceiling, layout) = match channels {
        c if c > 8 => (AudioCodec::Aac, config.aac_surround_bitrate, Some("7.1")),
        c if c > 6 => (AudioCodec::Aac, config.aac_surround_bitrate, None),
        c if c > 2 => {
            if config.prefer_ac3 {
                (AudioCodec::Ac3, config.ac3_bitrate, None)
            } else {
                (AudioCodec::Eac3, config.eac3_bitrate, None)
            }
        }
        _ => (AudioCodec::Aac, config.aac_stereo_bitrate, None),
    };

    let requested = if source_kbps > 0 { source_kbps } else { ceiling };
    let capped = requested.min(ceiling);

    let floor = match codec {
        AudioCodec::Ac3 | AudioCodec::Eac3 => SURROUND_FLOOR_KBPS,
        AudioCodec::Aac => AAC_FLOOR_KBPS,
    };

    AudioTarget {
        codec,
        bitrate_kbps: capped.max(floor),
        layout,
    }
}

const TITLE_CODEC_KEYWORDS: &[&str] = &[
    "dts", "ac3", "eac3", "aac", "dolby", "truehd", "atmos", "pcm", "flac", "opus", "vorbis",
    "mp3", "lossless", "5.1", "7.1", "2.0", "stereo", "surround", "ma", "hr",
];

const TITLE_LANGUAGE_ONLY: &[&str] = &[
    "und", "eng", "spa", "fre", "fra", "ger", "deu", "ita", "por", "jpn", "chi", "zho", "kor",
    "rus", "english", "spanish", "french", "german", "italian", "japanese", "korean", "russian",
    "undefined",
];

/// Title for a converted track.
///
/// Commentary titles are kept verbatim. A title that names a codec or layout,
/// or is only a language, or is empty, becomes the language's display name,
/// since it would misdescribe the new track.
pub fn regenerate_title(language: Option<&str>, title: Option<&str>) -> String {
    let original = title.unwrap_or_default();
    let lower = original.to_lowercase();

    if lower.contains("commentary") {
        return original.to_string();
    }

    let stale = original.is_empty()
        || TITLE_CODEC_KEYWORDS.iter().any(|kw| lower.contains(kw))
        || TITLE_LANGUAGE_ONLY.contains(&lower.as_str());
    if !stale {
        return original.to_string();
    }

    let language = language.unwrap_or_default();
    let code = if language.is_empty() {
        "und".to_string()
    } else {
        language.to_lowercase()
    };
    match language_name(&code) {
        Some(name) => name.to_string(),
        None => capitalize(language),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// Whether a stream is one this config transcodes.
pub fn needs_conversion(stream: &AudioStream, config: &AudioConfig) -> bool {
    (config.convert_dts && stream.is_dts()) || (config.convert_truehd && stream.is_truehd())
}

/// True iff audio conversion is enabled and some stream needs it.
pub fn should_convert(info: &MediaInfo, config: &AudioConfig) -> bool {
    config.enabled
        && info
            .audio_streams
            .iter()
            .any(|s| needs_conversion(s, config))
}

/// A single converted stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioConversion {
    /// Container-wide index of the source stream.
    pub stream_index: u32,
    pub source_codec: String,
    pub channels: u32,
    pub target: AudioTarget,
    pub title: String,
}

/// What happens to each audio stream, in source order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum AudioAction {
    Copy { stream_index: u32 },
    Convert(AudioConversion),
}

/// The audio pipeline's decision for one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioPlan {
    pub actions: Vec<AudioAction>,
    pub keep_original: bool,
}

impl AudioPlan {
    pub fn requires_action(&self) -> bool {
        !self.conversions().is_empty()
    }

    pub fn conversions(&self) -> Vec<&AudioConversion> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                AudioAction::Convert(c) => Some(c),
                AudioAction::Copy { .. } => None,
            })
            .collect()
    }

    /// Indices of the streams being transcoded.
    pub fn affected_streams(&self) -> Vec<u32> {
        self.conversions().iter().map(|c| c.stream_index).collect()
    }

    /// Build the ffmpeg invocation.
    ///
    /// Per-stream options are addressed by output audio position. With
    /// `keep_original`, the source track is mapped twice (copy first, then the
    /// conversion) so every later output position shifts by one.
    pub fn command(&self, input: &Path, output: &Path) -> CommandSpec {
        let mut cmd = CommandSpec::new("ffmpeg");
        cmd.arg("-i").arg(input.to_string_lossy()).arg("-y");
        cmd.args(["-c:v", "copy", "-c:s", "copy"]);

        let mut out = 0usize;
        for action in &self.actions {
            match action {
                AudioAction::Copy { .. } => {
                    cmd.arg(format!("-c:a:{out}")).arg("copy");
                    out += 1;
                }
                AudioAction::Convert(c) => {
                    if self.keep_original {
                        cmd.arg(format!("-c:a:{out}")).arg("copy");
                        out += 1;
                    }
                    cmd.arg(format!("-c:a:{out}")).arg(c.target.codec.ffmpeg_name());
                    cmd.arg(format!("-b:a:{out}"))
                        .arg(format!("{}k", c.target.bitrate_kbps));
                    if let Some(layout) = c.target.layout {
                        cmd.arg(format!("-ac:a:{out}")).arg("8");
                        cmd.arg("-channel_layout:a").arg(layout);
                    }
                    if !c.title.is_empty() {
                        cmd.arg(format!("-metadata:s:a:{out}"))
                            .arg(format!("title={}", c.title));
                    }
                    out += 1;
                }
            }
        }

        if self.keep_original {
            cmd.args(["-map", "0:v?"]);
            for action in &self.actions {
                let index = match action {
                    AudioAction::Copy { stream_index } => *stream_index,
                    AudioAction::Convert(c) => {
                        cmd.arg("-map").arg(format!("0:{}", c.stream_index));
                        c.stream_index
                    }
                };
                cmd.arg("-map").arg(format!("0:{index}"));
            }
            cmd.args(["-map", "0:s?", "-map", "0:t?"]);
        } else {
            cmd.args(["-map", "0"]);
        }
        cmd.args(["-map_chapters", "0"]);
        cmd.arg(output.to_string_lossy());
        cmd
    }
}

/// Decide what to do with every audio stream in `info`.
pub fn plan(info: &MediaInfo, config: &AudioConfig) -> AudioPlan {
    let actions = info
        .audio_streams
        .iter()
        .map(|stream| {
            if config.enabled && needs_conversion(stream, config) {
                AudioAction::Convert(AudioConversion {
                    stream_index: stream.index,
                    source_codec: stream.codec.clone(),
                    channels: stream.channels,
                    target: determine_target(stream.channels, stream.bitrate_kbps(), config),
                    title: regenerate_title(stream.language.as_deref(), stream.title.as_deref()),
                })
            } else {
                AudioAction::Copy {
                    stream_index: stream.index,
                }
            }
        })
        .collect();

    AudioPlan {
        actions,
        keep_original: config.keep_original,
    }
}
