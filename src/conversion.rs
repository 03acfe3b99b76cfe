//! Drives the decision pipelines against real files.
//!
//! [`ConversionService`] probes a file, asks the audio, video and cleanup
//! pipelines whether anything must change, and runs the resulting ffmpeg
//! commands inside a job-private [`Workspace`]. It is shared by the worker
//! pool, the HTTP analysis endpoints and the `run`/`analyze` commands.

use crate::arr::ArrRegistry;
use crate::classifier::{ArrClassifier, ContentClassifier, LanguageClassifier, PathContentClassifier};
use crate::config::Config;
use crate::paths::PathTranslator;
use crate::state::{JobResult, SubsystemResult};
use anyhow::{bail, Context, Result};
use remuxcode_av::actions::{audio, cleanup, video};
use remuxcode_av::tools::get_tool_path;
use remuxcode_av::{
    timeout_from_secs, AudioPlan, CleanupPlan, CommandExecutor, CommandSpec, ContentType,
    FfprobeProvider, MediaInfo, MediaInfoProvider, ToolExecutor, VideoPlan, Workspace,
};
use remuxcode_common::JobKind;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything the pipelines would decide for a file, without side effects.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub media: MediaInfo,
    pub content_type: ContentType,
    pub original_language: String,
    pub needs_audio_conversion: bool,
    pub needs_video_conversion: bool,
    pub needs_cleanup: bool,
    pub audio: Option<AudioPlan>,
    pub video: Option<VideoPlan>,
    pub cleanup: Option<CleanupPlan>,
}

/// Probes, plans and executes conversions.
pub struct ConversionService {
    config: Arc<Config>,
    probe: Arc<dyn MediaInfoProvider>,
    executor: Arc<dyn CommandExecutor>,
    content: Arc<dyn ContentClassifier>,
    language: Arc<dyn LanguageClassifier>,
    paths: PathTranslator,
}

impl ConversionService {
    pub fn new(
        config: Arc<Config>,
        probe: Arc<dyn MediaInfoProvider>,
        executor: Arc<dyn CommandExecutor>,
        content: Arc<dyn ContentClassifier>,
        language: Arc<dyn LanguageClassifier>,
    ) -> Self {
        let paths = PathTranslator::new(&config.path_mappings);
        Self {
            config,
            probe,
            executor,
            content,
            language,
            paths,
        }
    }

    /// Build the production service: ffprobe, ffmpeg, and classifiers that
    /// consult the configured Arr instances before falling back to paths.
    pub fn from_config(config: Arc<Config>, arrs: ArrRegistry) -> Self {
        let tools = &config.tools;
        let ffprobe = get_tool_path("ffprobe", tools.ffprobe_path.as_deref())
            .unwrap_or_else(|_| PathBuf::from("ffprobe"));
        let mut executor = ToolExecutor::new();
        if let Some(ffmpeg) = &tools.ffmpeg_path {
            executor = executor.with_program("ffmpeg", ffmpeg);
        }

        let classifier = Arc::new(ArrClassifier::new(
            arrs,
            PathContentClassifier::new(&config.video.anime_paths),
        ));

        Self::new(
            config.clone(),
            Arc::new(FfprobeProvider::new(ffprobe)),
            Arc::new(executor),
            classifier.clone(),
            classifier,
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn paths(&self) -> &PathTranslator {
        &self.paths
    }

    /// Probe a file.
    pub async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        self.probe
            .analyze(path)
            .await
            .with_context(|| format!("Failed to analyze {}", path.display()))
    }

    /// Content type for the video pipeline. An explicit override wins;
    /// otherwise the classifier decides when auto-detection is on.
    pub async fn content_type(&self, path: &Path, explicit: Option<ContentType>) -> ContentType {
        if let Some(content_type) = explicit {
            return content_type;
        }
        if self.config.video.anime_auto_detect {
            self.content.classify(path).await
        } else {
            ContentType::LiveAction
        }
    }

    /// Run every pipeline's decision for `path` without touching it.
    pub async fn analyze(&self, path: &Path, explicit: Option<ContentType>) -> Result<Analysis> {
        if !path.exists() {
            bail!("File not found: {}", path.display());
        }

        let media = self.probe(path).await?;
        let content_type = self.content_type(path, explicit).await;
        let original_language = self.language.original_language(path).await;
        let config = &self.config;

        let needs_audio_conversion = audio::should_convert(&media, &config.audio);
        let needs_video_conversion = video::should_convert(&media, &config.video, content_type);
        let needs_cleanup = cleanup::should_cleanup(&media, &config.cleanup, &original_language);

        Ok(Analysis {
            audio: needs_audio_conversion.then(|| audio::plan(&media, &config.audio)),
            video: needs_video_conversion
                .then(|| video::plan(&media, &config.video, content_type))
                .flatten(),
            cleanup: needs_cleanup
                .then(|| cleanup::plan(&media, &config.cleanup, &original_language)),
            media,
            content_type,
            original_language,
            needs_audio_conversion,
            needs_video_conversion,
            needs_cleanup,
        })
    }

    /// Apply the steps `kind` asks for, in order: audio, video, cleanup.
    ///
    /// Each step re-probes the file as left by the previous one. A step that
    /// fails is recorded in the result and does not stop later steps. The
    /// only error returned is a missing input file.
    pub async fn process(
        &self,
        path: &Path,
        kind: JobKind,
        job_id: &str,
        content_override: Option<ContentType>,
    ) -> Result<JobResult> {
        if !path.exists() {
            bail!("File not found: {}", path.display());
        }

        let mut result = JobResult::default();
        if kind.includes_audio() {
            let outcome = self.convert_audio(path, job_id).await;
            result.audio = Some(step_result("audio", path, outcome));
        }
        if kind.includes_video() {
            let outcome = self.convert_video(path, job_id, content_override).await;
            result.video = Some(step_result("video", path, outcome));
        }
        if kind.includes_cleanup() {
            let outcome = self.clean_streams(path, job_id).await;
            result.cleanup = Some(step_result("cleanup", path, outcome));
        }
        Ok(result)
    }

    async fn convert_audio(&self, path: &Path, job_id: &str) -> Result<Option<Value>> {
        let config = &self.config.audio;
        let info = self.probe(path).await?;
        if !audio::should_convert(&info, config) {
            tracing::info!("No audio conversion needed for {:?}", path);
            return Ok(None);
        }

        let plan = audio::plan(&info, config);
        let workspace = self.workspace(path, job_id)?;
        let spec = plan.command(workspace.input(), workspace.output());
        self.execute(&spec, config.job_timeout).await?;
        workspace.finalize(None)?;

        let conversions: Vec<Value> = plan
            .conversions()
            .into_iter()
            .map(|c| {
                json!({
                    "stream_index": c.stream_index,
                    "codec_from": c.source_codec,
                    "codec_to": c.target.codec.ffmpeg_name(),
                    "bitrate_kbps": c.target.bitrate_kbps,
                    "channels": c.channels,
                })
            })
            .collect();
        Ok(Some(json!({
            "streams_converted": conversions.len(),
            "conversions": conversions,
        })))
    }

    async fn convert_video(
        &self,
        path: &Path,
        job_id: &str,
        content_override: Option<ContentType>,
    ) -> Result<Option<Value>> {
        let config = &self.config.video;
        let info = self.probe(path).await?;
        let content_type = self.content_type(path, content_override).await;
        if !video::should_convert(&info, config, content_type) {
            tracing::info!(
                "No video conversion needed for {:?} ({})",
                path,
                content_type.as_str()
            );
            return Ok(None);
        }
        let Some(plan) = video::plan(&info, config, content_type) else {
            return Ok(None);
        };

        let workspace = self
            .workspace(path, job_id)?
            .with_output_name(&video::temp_output_name(path));
        let spec = plan.command(workspace.input(), workspace.output());
        self.execute(&spec, config.job_timeout).await?;
        let finalized = workspace.finalize(None)?;

        let new_size = std::fs::metadata(&finalized.path)
            .map(|m| m.len())
            .unwrap_or(0);
        Ok(Some(json!({
            "codec_from": plan.source_codec,
            "codec_to": plan.target_codec,
            "content_type": content_type.as_str(),
            "size_change_percent": size_change_percent(info.size, new_size),
        })))
    }

    async fn clean_streams(&self, path: &Path, job_id: &str) -> Result<Option<Value>> {
        let config = &self.config.cleanup;
        let info = self.probe(path).await?;
        let original_language = self.language.original_language(path).await;
        if !cleanup::should_cleanup(&info, config, &original_language) {
            tracing::info!("No streams to remove from {:?}", path);
            return Ok(None);
        }

        let plan = cleanup::plan(&info, config, &original_language);
        let workspace = self.workspace(path, job_id)?;
        let spec = plan.command(workspace.input(), workspace.output());
        self.execute(&spec, self.config.processing.cleanup_timeout)
            .await?;
        workspace.finalize(None)?;

        Ok(Some(json!({
            "audio_removed": plan.audio_removed.len(),
            "subtitle_removed": plan.subtitle_removed.len(),
            "original_language": plan.original_language,
        })))
    }

    fn workspace(&self, path: &Path, job_id: &str) -> Result<Workspace> {
        let root = self
            .paths
            .volume_root(path, self.config.processing.temp_dir.as_deref());
        Ok(Workspace::new(path, &root, job_id)?)
    }

    async fn execute(&self, spec: &CommandSpec, timeout_secs: u64) -> Result<()> {
        tracing::info!("Running {}", spec.program);
        tracing::debug!("{}", spec);
        self.executor
            .run(spec, timeout_from_secs(timeout_secs))
            .await?;
        Ok(())
    }
}

fn step_result(step: &str, path: &Path, outcome: Result<Option<Value>>) -> SubsystemResult {
    match outcome {
        Ok(Some(detail)) => {
            tracing::info!("{} step finished for {:?}", step, path);
            SubsystemResult::succeeded(detail)
        }
        Ok(None) => SubsystemResult::skipped(),
        Err(e) => {
            tracing::error!("{} step failed for {:?}: {:#}", step, path, e);
            SubsystemResult::failed(format!("{:#}", e))
        }
    }
}

/// Percent change from `before` to `after`, one decimal place.
fn size_change_percent(before: u64, after: u64) -> f64 {
    if before == 0 {
        return 0.0;
    }
    let change = (after as f64 - before as f64) / before as f64 * 100.0;
    (change * 10.0).round() / 10.0
}
