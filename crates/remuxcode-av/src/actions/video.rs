//! HEVC re-encode decisions.
//!
//! H.264 sources are re-encoded with libx265. Two parameter profiles exist:
//! one for animated content and one for everything else. Only CRF, preset,
//! tune, and output frame rate differ between them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::command::CommandSpec;
use crate::probe::MediaInfo;

/// Fixed x265 parameters shared by both profiles.
const X265_FIXED_PARAMS: &[&str] = &[
    "ref=4",
    "bframes=6",
    "open-gop=0",
    "keyint=240",
    "min-keyint=24",
    "scenecut=40",
];

/// Content classification consumed by the video pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Anime,
    LiveAction,
    Unknown,
}

impl ContentType {
    pub fn is_anime(self) -> bool {
        self == Self::Anime
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anime => "anime",
            Self::LiveAction => "live_action",
            Self::Unknown => "unknown",
        }
    }
}

impl std::str::FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anime" => Ok(Self::Anime),
            "live_action" | "live-action" | "liveaction" => Ok(Self::LiveAction),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("Invalid content type: {}", s)),
        }
    }
}

/// Video pipeline settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VideoConfig {
    pub enabled: bool,
    pub convert_10bit_x264: bool,
    pub convert_8bit_x264: bool,
    /// Only convert content classified as anime.
    pub anime_only: bool,
    /// Classify content to pick the encode profile; otherwise assume live action.
    pub anime_auto_detect: bool,
    /// Extra path fragments that mark a file as anime.
    pub anime_paths: Vec<String>,

    pub anime_crf: u8,
    pub anime_preset: String,
    pub anime_tune: Option<String>,
    pub anime_framerate: String,

    pub live_action_crf: u8,
    pub live_action_preset: String,
    pub live_action_tune: Option<String>,
    /// Empty keeps the source frame rate.
    pub live_action_framerate: String,

    /// kbps
    pub vbv_maxrate: u32,
    /// kbps
    pub vbv_bufsize: u32,
    pub level: String,
    pub profile: String,
    pub pix_fmt: String,
    /// Seconds; 0 disables the timeout.
    pub job_timeout: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            convert_10bit_x264: true,
            convert_8bit_x264: false,
            anime_only: true,
            anime_auto_detect: true,
            anime_paths: vec!["/Anime/".to_string(), "/アニメ/".to_string()],
            anime_crf: 19,
            anime_preset: "slow".to_string(),
            anime_tune: Some("animation".to_string()),
            anime_framerate: "24000/1001".to_string(),
            live_action_crf: 22,
            live_action_preset: "medium".to_string(),
            live_action_tune: None,
            live_action_framerate: String::new(),
            vbv_maxrate: 5000,
            vbv_bufsize: 10000,
            level: "4.1".to_string(),
            profile: "main10".to_string(),
            pix_fmt: "yuv420p10le".to_string(),
            job_timeout: 7200,
        }
    }
}

/// Profile-selected encoder settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodeProfile {
    pub crf: u8,
    pub preset: String,
    pub tune: Option<String>,
    /// Output frame rate; `None` keeps the source rate.
    pub framerate: Option<String>,
}

impl EncodeProfile {
    pub fn for_content(content_type: ContentType, config: &VideoConfig) -> Self {
        let (crf, preset, tune, framerate) = if content_type.is_anime() {
            (
                config.anime_crf,
                &config.anime_preset,
                &config.anime_tune,
                &config.anime_framerate,
            )
        } else {
            (
                config.live_action_crf,
                &config.live_action_preset,
                &config.live_action_tune,
                &config.live_action_framerate,
            )
        };

        Self {
            crf,
            preset: preset.clone(),
            tune: tune.clone().filter(|t| !t.is_empty()),
            framerate: (!framerate.is_empty()).then(|| framerate.clone()),
        }
    }
}

/// Should the primary video stream be re-encoded?
///
/// `content_type` only matters when `anime_only` is set.
pub fn should_convert(info: &MediaInfo, config: &VideoConfig, content_type: ContentType) -> bool {
    if !config.enabled {
        return false;
    }
    let Some(video) = info.primary_video() else {
        return false;
    };
    if video.is_hevc() {
        return false;
    }
    if config.anime_only && !content_type.is_anime() {
        return false;
    }
    if !video.is_h264() {
        return false;
    }
    if video.is_10bit() {
        config.convert_10bit_x264
    } else {
        config.convert_8bit_x264
    }
}

/// The video pipeline's decision for one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoPlan {
    pub stream_index: u32,
    pub source_codec: String,
    pub source_bit_depth: u8,
    pub content_type: ContentType,
    pub target_codec: &'static str,
    pub profile: EncodeProfile,
    pub vbv_maxrate: u32,
    pub vbv_bufsize: u32,
    pub level: String,
    pub encoder_profile: String,
    pub pix_fmt: String,
}

impl VideoPlan {
    pub fn affected_streams(&self) -> Vec<u32> {
        vec![self.stream_index]
    }

    /// The `-x265-params` value.
    pub fn x265_params(&self) -> String {
        let mut params = vec![
            format!("crf={}", self.profile.crf),
            format!("vbv-maxrate={}", self.vbv_maxrate),
            format!("vbv-bufsize={}", self.vbv_bufsize),
        ];
        params.extend(X265_FIXED_PARAMS.iter().map(|p| p.to_string()));
        params.join(":")
    }

    /// Build the ffmpeg invocation. Everything but the primary video is copied,
    /// and color metadata is pinned to BT.709.
    pub fn command(&self, input: &Path, output: &Path) -> CommandSpec {
        let mut cmd = CommandSpec::new("ffmpeg");
        cmd.args(["-hide_banner", "-loglevel", "warning", "-stats"]);
        cmd.args(["-analyzeduration", "10M", "-probesize", "10M"]);
        cmd.arg("-i").arg(input.to_string_lossy());
        cmd.args(["-map", "0", "-map_chapters", "0"]);
        cmd.args(["-c:v", "libx265"]);
        cmd.arg("-pix_fmt").arg(&self.pix_fmt);
        cmd.arg("-profile:v").arg(&self.encoder_profile);
        cmd.arg("-level:v").arg(&self.level);
        cmd.arg("-preset").arg(&self.profile.preset);
        if let Some(tune) = &self.profile.tune {
            cmd.arg("-tune").arg(tune);
        }
        cmd.arg("-x265-params").arg(self.x265_params());
        cmd.args(["-fps_mode", "cfr"]);
        if let Some(rate) = &self.profile.framerate {
            cmd.arg("-r").arg(rate);
        }
        cmd.args(["-color_primaries", "bt709", "-color_trc", "bt709", "-colorspace", "bt709"]);
        cmd.args(["-c:a", "copy", "-c:s", "copy", "-c:t", "copy"]);
        cmd.arg(output.to_string_lossy());
        cmd
    }
}

/// File name of the encoder's temporary output for `input`.
pub fn temp_output_name(input: &Path) -> String {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    format!("{name}.hevc-tmp.mkv")
}

/// Build the plan for the primary video stream, `None` if there is none.
///
/// This does not re-check [`should_convert`].
pub fn plan(info: &MediaInfo, config: &VideoConfig, content_type: ContentType) -> Option<VideoPlan> {
    let video = info.primary_video()?;
    Some(VideoPlan {
        stream_index: video.index,
        source_codec: video.codec.clone(),
        source_bit_depth: video.bit_depth,
        content_type,
        target_codec: "hevc",
        profile: EncodeProfile::for_content(content_type, config),
        vbv_maxrate: config.vbv_maxrate,
        vbv_bufsize: config.vbv_bufsize,
        level: config.level.clone(),
        encoder_profile: config.profile.clone(),
        pix_fmt: config.pix_fmt.clone(),
    })
}
