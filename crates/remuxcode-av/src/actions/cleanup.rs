//! Stream cleanup decisions.
//!
//! Drops audio and subtitle streams in languages nobody asked for, keeping
//! the original language, forced subtitles, and accessibility tracks. Kept
//! streams are copied, never re-encoded.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::command::CommandSpec;
use crate::language::alternate_code;
use crate::probe::{AudioStream, MediaInfo, SubtitleStream};

/// Cleanup pipeline settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub enabled: bool,
    pub clean_audio: bool,
    pub clean_subtitles: bool,
    /// ISO 639-2 codes that are always kept.
    pub keep_languages: Vec<String>,
    /// Keep streams tagged `und` or with no language tag.
    pub keep_undefined: bool,
    pub keep_commentary: bool,
    pub keep_audio_description: bool,
    pub keep_sdh: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            clean_audio: true,
            clean_subtitles: true,
            keep_languages: vec!["eng".to_string()],
            keep_undefined: false,
            keep_commentary: true,
            keep_audio_description: true,
            keep_sdh: true,
        }
    }
}

/// Language codes whose streams survive cleanup.
pub fn keep_set(config: &CleanupConfig, original_language: &str) -> BTreeSet<String> {
    let mut set: BTreeSet<String> = config
        .keep_languages
        .iter()
        .map(|l| l.to_lowercase())
        .collect();

    let original = original_language.trim().to_lowercase();
    if !original.is_empty() && original != "und" {
        if let Some(alt) = alternate_code(&original) {
            set.insert(alt.to_string());
        }
        set.insert(original);
    }

    if config.keep_undefined {
        set.insert("und".to_string());
        set.insert(String::new());
    }

    set
}

fn language_of(language: Option<&str>) -> String {
    language.unwrap_or_default().to_lowercase()
}

pub fn should_keep_audio(
    stream: &AudioStream,
    keep: &BTreeSet<String>,
    config: &CleanupConfig,
) -> bool {
    if keep.contains(&language_of(stream.language.as_deref())) {
        return true;
    }
    let title = stream.title_lower();
    if config.keep_commentary && title.contains("commentary") {
        return true;
    }
    config.keep_audio_description && (title.contains("description") || title.contains("descriptive"))
}

pub fn should_keep_subtitle(
    stream: &SubtitleStream,
    keep: &BTreeSet<String>,
    config: &CleanupConfig,
) -> bool {
    stream.forced
        || (config.keep_sdh && stream.hearing_impaired)
        || keep.contains(&language_of(stream.language.as_deref()))
}

/// The cleanup pipeline's decision for one file: which indices to keep and drop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanupPlan {
    pub original_language: String,
    pub keep_languages: BTreeSet<String>,
    pub video: Vec<u32>,
    pub audio_kept: Vec<u32>,
    pub audio_removed: Vec<u32>,
    pub subtitle_kept: Vec<u32>,
    pub subtitle_removed: Vec<u32>,
    pub attachments: Vec<u32>,
}

impl CleanupPlan {
    pub fn requires_action(&self) -> bool {
        !self.audio_removed.is_empty() || !self.subtitle_removed.is_empty()
    }

    /// Indices of the streams being dropped.
    pub fn affected_streams(&self) -> Vec<u32> {
        let mut dropped: Vec<u32> = self
            .audio_removed
            .iter()
            .chain(&self.subtitle_removed)
            .copied()
            .collect();
        dropped.sort_unstable();
        dropped
    }

    /// Every kept index, grouped video, audio, subtitle, attachment.
    pub fn keep_list(&self) -> Vec<u32> {
        self.video
            .iter()
            .chain(&self.audio_kept)
            .chain(&self.subtitle_kept)
            .chain(&self.attachments)
            .copied()
            .collect()
    }

    pub fn command(&self, input: &Path, output: &Path) -> CommandSpec {
        let mut cmd = CommandSpec::new("ffmpeg");
        cmd.arg("-i").arg(input.to_string_lossy()).arg("-y");
        for index in self.keep_list() {
            cmd.arg("-map").arg(format!("0:{index}"));
        }
        cmd.args(["-map_chapters", "0", "-c", "copy"]);
        cmd.arg(output.to_string_lossy());
        cmd
    }
}

/// Partition every stream in `info` into kept and removed.
///
/// A category whose cleaning is disabled keeps all of its streams.
pub fn plan(info: &MediaInfo, config: &CleanupConfig, original_language: &str) -> CleanupPlan {
    let keep = keep_set(config, original_language);

    let (mut audio_kept, mut audio_removed) = (Vec::new(), Vec::new());
    for stream in &info.audio_streams {
        if !config.clean_audio || should_keep_audio(stream, &keep, config) {
            audio_kept.push(stream.index);
        } else {
            audio_removed.push(stream.index);
        }
    }

    let (mut subtitle_kept, mut subtitle_removed) = (Vec::new(), Vec::new());
    for stream in &info.subtitle_streams {
        if !config.clean_subtitles || should_keep_subtitle(stream, &keep, config) {
            subtitle_kept.push(stream.index);
        } else {
            subtitle_removed.push(stream.index);
        }
    }

    CleanupPlan {
        original_language: original_language.to_string(),
        keep_languages: keep,
        video: info.video_streams.iter().map(|s| s.index).collect(),
        audio_kept,
        audio_removed,
        subtitle_kept,
        subtitle_removed,
        attachments: info.attachment_streams.iter().map(|s| s.index).collect(),
    }
}

/// True iff cleanup is enabled and would drop at least one stream.
pub fn should_cleanup(info: &MediaInfo, config: &CleanupConfig, original_language: &str) -> bool {
    config.enabled && plan(info, config, original_language).requires_action()
}
