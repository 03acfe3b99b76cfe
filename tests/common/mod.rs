//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which wires an in-memory job store, a scripted
//! media prober and a scripted executor into the real queue, conversion
//! service, worker pool and router. Nothing here needs ffmpeg installed.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::Notify;
use tower::ServiceExt;

use remuxcode::arr::{ArrRegistry, RadarrClient, RegisteredArr, RenameProtocol, SonarrClient};
use remuxcode::classifier::{PathContentClassifier, PathLanguageClassifier};
use remuxcode::config::{ArrConfig, ArrType, Config, PathMapping};
use remuxcode::conversion::ConversionService;
use remuxcode::processor::JobProcessor;
use remuxcode::server::{create_router, AppContext};
use remuxcode::state::{Job, JobQueue};
use remuxcode_av::probe::{AudioStream, MediaInfo, SubtitleStream, VideoStream};
use remuxcode_av::{CommandExecutor, CommandSpec, MediaInfoProvider, ToolOutput};
use remuxcode_common::JobId;
use remuxcode_db::pool::init_memory_pool;

/// Returns the same stream layout for every existing file unless a file has
/// its own entry.
#[derive(Default)]
pub struct ScriptedProbe {
    default: Mutex<MediaInfo>,
    files: Mutex<HashMap<PathBuf, MediaInfo>>,
}

impl ScriptedProbe {
    pub fn new(default: MediaInfo) -> Self {
        Self {
            default: Mutex::new(default),
            files: Mutex::default(),
        }
    }

    pub fn set(&self, path: &Path, info: MediaInfo) {
        self.files.lock().insert(path.to_path_buf(), info);
    }
}

#[async_trait::async_trait]
impl MediaInfoProvider for ScriptedProbe {
    async fn analyze(&self, path: &Path) -> remuxcode_av::Result<MediaInfo> {
        if !path.exists() {
            return Err(remuxcode_av::Error::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let info = self
            .files
            .lock()
            .get(path)
            .cloned()
            .unwrap_or_else(|| self.default.lock().clone());
        Ok(MediaInfo {
            file_path: path.to_path_buf(),
            ..info
        })
    }
}

/// Records every command. On success it writes the output file, as ffmpeg
/// would. It can be told to fail, or to hold until released.
#[derive(Default)]
pub struct ScriptedExecutor {
    runs: Mutex<Vec<CommandSpec>>,
    failure: Mutex<Option<String>>,
    hold: AtomicBool,
    pub started: Notify,
    pub release: Notify,
}

impl ScriptedExecutor {
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock() = Some(message.to_string());
    }

    pub fn hold(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    /// Let the held command finish and stop holding later ones.
    pub fn unhold(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }

    pub fn runs(&self) -> Vec<CommandSpec> {
        self.runs.lock().clone()
    }
}

#[async_trait::async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn run(
        &self,
        spec: &CommandSpec,
        _timeout: Option<Duration>,
    ) -> remuxcode_av::Result<ToolOutput> {
        self.runs.lock().push(spec.clone());

        if self.hold.load(Ordering::SeqCst) {
            self.started.notify_one();
            self.release.notified().await;
        }

        if let Some(message) = self.failure.lock().clone() {
            return Err(remuxcode_av::Error::tool_failed(&spec.program, message));
        }

        let output = spec.args.last().cloned().unwrap_or_default();
        std::fs::write(&output, b"converted")?;
        Ok(ToolOutput {
            exit_code: Some(0),
            stderr_excerpt: String::new(),
        })
    }
}

/// A 10-bit H.264 file with a Japanese DTS 5.1 track, a German stereo track
/// and English and French subtitles.
pub fn sample_media() -> MediaInfo {
    MediaInfo {
        container: "matroska,webm".into(),
        duration: Some(1420.5),
        size: 1_000_000,
        video_streams: vec![VideoStream {
            index: 0,
            codec: "h264".into(),
            width: 1920,
            height: 1080,
            pix_fmt: "yuv420p10le".into(),
            bit_depth: 10,
            frame_rate: "24000/1001".into(),
            ..Default::default()
        }],
        audio_streams: vec![
            AudioStream {
                index: 1,
                codec: "dts".into(),
                channels: 6,
                bit_rate: Some(1_509_000),
                language: Some("jpn".into()),
                ..Default::default()
            },
            AudioStream {
                index: 2,
                codec: "aac".into(),
                channels: 2,
                bit_rate: Some(192_000),
                language: Some("ger".into()),
                ..Default::default()
            },
        ],
        subtitle_streams: vec![
            SubtitleStream {
                index: 3,
                codec: "subrip".into(),
                language: Some("eng".into()),
                ..Default::default()
            },
            SubtitleStream {
                index: 4,
                codec: "subrip".into(),
                language: Some("fre".into()),
                ..Default::default()
            },
        ],
        ..Default::default()
    }
}

/// A file none of the pipelines want to touch.
pub fn clean_media() -> MediaInfo {
    MediaInfo {
        container: "matroska,webm".into(),
        size: 1000,
        video_streams: vec![VideoStream {
            index: 0,
            codec: "hevc".into(),
            pix_fmt: "yuv420p10le".into(),
            bit_depth: 10,
            ..Default::default()
        }],
        audio_streams: vec![AudioStream {
            index: 1,
            codec: "ac3".into(),
            channels: 6,
            language: Some("eng".into()),
            ..Default::default()
        }],
        ..Default::default()
    }
}

pub fn arr_config(arr_type: ArrType, url: &str) -> ArrConfig {
    ArrConfig {
        name: arr_type.to_string(),
        arr_type,
        url: url.to_string(),
        api_key: "test-key".to_string(),
        enabled: true,
        auto_rename: true,
    }
}

/// A registry with one Radarr and/or one Sonarr pointed at mock servers.
pub fn arr_registry(radarr: Option<&str>, sonarr: Option<&str>) -> ArrRegistry {
    let mut arrs = Vec::new();
    if let Some(url) = radarr {
        arrs.push(RegisteredArr {
            name: "radarr".into(),
            kind: ArrType::Radarr,
            auto_rename: true,
            client: Arc::new(RadarrClient::new(&arr_config(ArrType::Radarr, url))),
        });
    }
    if let Some(url) = sonarr {
        arrs.push(RegisteredArr {
            name: "sonarr".into(),
            kind: ArrType::Sonarr,
            auto_rename: true,
            client: Arc::new(SonarrClient::new(&arr_config(ArrType::Sonarr, url))),
        });
    }
    ArrRegistry::new(arrs)
}

pub fn fast_rename() -> RenameProtocol {
    RenameProtocol::new(Duration::from_millis(10), Duration::from_millis(200))
}

/// Test harness wrapping the real queue, service and router.
pub struct TestHarness {
    pub ctx: AppContext,
    pub queue: Arc<JobQueue>,
    pub service: Arc<ConversionService>,
    pub probe: Arc<ScriptedProbe>,
    pub executor: Arc<ScriptedExecutor>,
    /// Library root that test media files live under.
    pub media: TempDir,
    /// Root for job workspaces.
    pub scratch: TempDir,
}

impl TestHarness {
    /// Default configuration, no Arr instances.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::build(config, ArrRegistry::default())
    }

    pub fn with_arrs(arrs: ArrRegistry) -> Self {
        Self::build(Config::default(), arrs)
    }

    pub fn build(config: Config, arrs: ArrRegistry) -> Self {
        let media = TempDir::new().expect("failed to create media dir");
        Self::assemble(config, arrs, media)
    }

    /// Paths the Arr reports under `container` resolve to the media root.
    pub fn with_mapping(container: &str, arrs: ArrRegistry) -> Self {
        let media = TempDir::new().expect("failed to create media dir");
        let mut config = Config::default();
        config.path_mappings.push(PathMapping {
            container: container.to_string(),
            host: media.path().to_string_lossy().into_owned(),
        });
        Self::assemble(config, arrs, media)
    }

    fn assemble(mut config: Config, arrs: ArrRegistry, media: TempDir) -> Self {
        let scratch = TempDir::new().expect("failed to create scratch dir");
        config.processing.temp_dir = Some(scratch.path().to_path_buf());

        let probe = Arc::new(ScriptedProbe::new(sample_media()));
        let executor = Arc::new(ScriptedExecutor::default());
        let content = PathContentClassifier::new(&config.video.anime_paths);
        let service = Arc::new(ConversionService::new(
            Arc::new(config),
            probe.clone(),
            executor.clone(),
            Arc::new(content.clone()),
            Arc::new(PathLanguageClassifier::new(content)),
        ));

        let pool = init_memory_pool().expect("failed to create in-memory pool");
        let queue = Arc::new(JobQueue::new(pool));
        let ctx = AppContext::new(queue.clone(), service.clone(), arrs);

        Self {
            ctx,
            queue,
            service,
            probe,
            executor,
            media,
            scratch,
        }
    }

    /// Create a file under the media root and return its path.
    pub fn media_file(&self, relative: &str) -> PathBuf {
        let path = self.media.path().join(relative);
        std::fs::create_dir_all(path.parent().expect("file has a parent"))
            .expect("failed to create media folder");
        std::fs::write(&path, b"original").expect("failed to write media file");
        path
    }

    pub fn processor(&self) -> Arc<JobProcessor> {
        Arc::new(
            JobProcessor::new(
                self.queue.clone(),
                self.service.clone(),
                self.ctx.arrs.clone(),
            )
            .with_rename_protocol(fast_rename()),
        )
    }

    pub fn router(&self) -> Router {
        create_router(self.ctx.clone())
    }

    /// Send one request through the router and decode the JSON reply.
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
        api_key: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = api_key {
            builder = builder.header("X-API-Key", key);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("failed to build request");

        let response = self
            .router()
            .oneshot(request)
            .await
            .expect("router failed");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to read body")
            .to_bytes();
        let json = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into()));
        (status, json)
    }

    /// Start Axum on a random port.
    pub async fn serve(&self) -> SocketAddr {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        addr
    }

    /// Poll until the job reaches a terminal status.
    pub async fn wait_for_terminal(&self, id: &JobId) -> Job {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let job = self.queue.get(id).expect("job should exist");
            if job.status.is_terminal() {
                return job;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job {} still {} after 10s",
                id,
                job.status
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
