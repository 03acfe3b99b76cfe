use crate::config::ArrType;
use crate::conversion::Analysis;
use crate::server::{store_error, AppContext};
use crate::state::{Job, Removal};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use remuxcode_av::actions::audio;
use remuxcode_common::paths::is_video_file;
use remuxcode_common::{JobId, JobKind, JobSource, JobStatus};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use walkdir::WalkDir;

type ApiError = (StatusCode, String);

pub fn api_routes() -> Router<AppContext> {
    Router::new()
        .route("/convert", post(convert))
        .route("/api/convert/movies", post(convert_movies))
        .route("/api/convert/series", post(convert_series))
        .route("/jobs", get(list_jobs))
        .route("/jobs/:id", get(get_job).delete(delete_job))
        .route("/stats", get(stats))
        .route("/analyze", get(analyze))
        .route("/scan", get(scan))
}

fn parse_kind(kind: Option<&str>) -> Result<JobKind, ApiError> {
    kind.map_or(Ok(JobKind::Full), |k| {
        k.parse().map_err(|e: String| (StatusCode::BAD_REQUEST, e))
    })
}

#[derive(Deserialize)]
struct ConvertRequest {
    path: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

async fn convert(
    State(ctx): State<AppContext>,
    Json(payload): Json<ConvertRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let kind = parse_kind(payload.kind.as_deref())?;

    let reported = payload.path.trim();
    if reported.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "path is required".to_string()));
    }

    let path = ctx.paths.translate(reported);
    if !path.is_file() {
        return Err((
            StatusCode::NOT_FOUND,
            format!("File not found: {}", path.display()),
        ));
    }

    let job = ctx
        .queue
        .enqueue(path, kind, JobSource::Api)
        .map_err(store_error)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Job queued",
            "job_id": job.id,
            "status_url": format!("/jobs/{}", job.id),
        })),
    ))
}

#[derive(Deserialize)]
struct MovieBatchRequest {
    movie_ids: Vec<i64>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Deserialize)]
struct SeriesBatchRequest {
    series_ids: Vec<i64>,
    #[serde(rename = "type")]
    kind: Option<String>,
    season_number: Option<i32>,
}

async fn convert_movies(
    State(ctx): State<AppContext>,
    Json(payload): Json<MovieBatchRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let kind = parse_kind(payload.kind.as_deref())?;
    let job_ids = queue_batch(&ctx, ArrType::Radarr, &payload.movie_ids, None, kind).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": format!("Queued {} movie(s)", job_ids.len()),
            "job_ids": job_ids,
        })),
    ))
}

async fn convert_series(
    State(ctx): State<AppContext>,
    Json(payload): Json<SeriesBatchRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let kind = parse_kind(payload.kind.as_deref())?;
    let job_ids = queue_batch(
        &ctx,
        ArrType::Sonarr,
        &payload.series_ids,
        payload.season_number,
        kind,
    )
    .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": format!("Queued {} episode(s)", job_ids.len()),
            "job_ids": job_ids,
        })),
    ))
}

/// Resolve each entity's files through the Arr and queue the ones that exist.
async fn queue_batch(
    ctx: &AppContext,
    arr_type: ArrType,
    entity_ids: &[i64],
    season: Option<i32>,
    kind: JobKind,
) -> Result<Vec<JobId>, ApiError> {
    let arr = ctx.arrs.first(arr_type).ok_or_else(|| {
        let name = match arr_type {
            ArrType::Radarr => "Radarr",
            ArrType::Sonarr => "Sonarr",
        };
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{} not configured", name),
        )
    })?;

    let mut job_ids = Vec::new();
    for &id in entity_ids {
        let paths = match arr.client.file_paths(id, season).await {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!("Could not resolve files of {} item {}: {:#}", arr.name, id, e);
                continue;
            }
        };

        for reported in paths {
            let path = ctx.paths.translate(&reported);
            if !path.is_file() {
                tracing::warn!("Batch file does not exist: {:?}", path);
                continue;
            }
            let job = ctx
                .queue
                .enqueue(path, kind, JobSource::Batch)
                .map_err(store_error)?;
            job_ids.push(job.id);
        }
    }
    Ok(job_ids)
}

#[derive(Deserialize)]
struct ListJobsQuery {
    status: Option<String>,
    limit: Option<usize>,
}

async fn list_jobs(
    State(ctx): State<AppContext>,
    Query(params): Query<ListJobsQuery>,
) -> Result<Json<Value>, ApiError> {
    let status = params
        .status
        .as_deref()
        .map(|s| s.parse::<JobStatus>())
        .transpose()
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;

    let jobs = ctx.queue.list(params.limit, status).map_err(store_error)?;
    Ok(Json(json!({ "jobs": jobs })))
}

async fn get_job(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    ctx.queue.get(&JobId::from(id)).map(Json).map_err(store_error)
}

async fn delete_job(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = JobId::from(id);
    let message = match ctx.queue.remove(&id).map_err(store_error)? {
        Removal::Cancelled(_) => "Job cancelled",
        Removal::Deleted => "Job deleted",
    };
    Ok(Json(json!({ "message": message, "job_id": id })))
}

async fn stats(State(ctx): State<AppContext>) -> Result<Json<Value>, ApiError> {
    let counts = ctx.queue.stats().map_err(store_error)?;
    Ok(Json(json!({
        "jobs": counts,
        "workers": ctx.config.processing.workers,
    })))
}

#[derive(Deserialize)]
struct AnalyzeQuery {
    path: Option<String>,
}

async fn analyze(
    State(ctx): State<AppContext>,
    Query(params): Query<AnalyzeQuery>,
) -> Result<Json<Value>, ApiError> {
    let reported = params
        .path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "path parameter required".to_string()))?;

    let path = ctx.paths.translate(&reported);
    if !path.is_file() {
        return Err((
            StatusCode::NOT_FOUND,
            format!("File not found: {}", path.display()),
        ));
    }

    let analysis = ctx
        .service
        .analyze(&path, None)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)))?;

    Ok(Json(analysis_json(&ctx, &analysis)))
}

fn analysis_json(ctx: &AppContext, analysis: &Analysis) -> Value {
    let media = &analysis.media;
    let video = media.primary_video().map(|v| {
        json!({
            "codec": v.codec,
            "bit_depth": v.bit_depth,
            "resolution": format!("{}x{}", v.width, v.height),
            "profile": v.profile,
            "is_hevc": v.is_hevc(),
        })
    });
    let audio_streams: Vec<Value> = media
        .audio_streams
        .iter()
        .map(|a| {
            json!({
                "index": a.index,
                "codec": a.codec,
                "channels": a.channels,
                "language": a.language,
                "title": a.title,
                "needs_conversion": audio::needs_conversion(a, &ctx.config.audio),
            })
        })
        .collect();

    json!({
        "file": media.file_path,
        "format": media.container,
        "duration": media.duration,
        "size": media.size,
        "video": video,
        "audio_streams": audio_streams,
        "subtitle_count": media.subtitle_streams.len(),
        "needs_audio_conversion": analysis.needs_audio_conversion,
        "needs_video_conversion": analysis.needs_video_conversion,
        "needs_cleanup": analysis.needs_cleanup,
        "is_anime": analysis.content_type.is_anime(),
        "content_type": analysis.content_type,
        "original_language": analysis.original_language,
        "plans": {
            "audio": analysis.audio,
            "video": analysis.video,
            "cleanup": analysis.cleanup,
        },
    })
}

#[derive(Deserialize)]
struct ScanQuery {
    path: Option<String>,
    #[serde(default)]
    recursive: bool,
    filter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanFilter {
    Any,
    Video,
    Audio,
    Anime,
}

impl ScanFilter {
    fn parse(filter: Option<&str>) -> Result<Self, ApiError> {
        match filter.unwrap_or("any") {
            "any" => Ok(Self::Any),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "anime" => Ok(Self::Anime),
            other => Err((
                StatusCode::BAD_REQUEST,
                format!("Invalid filter: {}. Must be one of: any, video, audio, anime", other),
            )),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Anime => "anime",
        }
    }

    fn matches(self, analysis: &Analysis) -> bool {
        match self {
            Self::Any => true,
            Self::Video => analysis.needs_video_conversion,
            Self::Audio => analysis.needs_audio_conversion,
            Self::Anime => analysis.content_type.is_anime(),
        }
    }
}

/// List video files under a directory with each file's conversion needs.
async fn scan(
    State(ctx): State<AppContext>,
    Query(params): Query<ScanQuery>,
) -> Result<Json<Value>, ApiError> {
    let filter = ScanFilter::parse(params.filter.as_deref())?;
    let reported = params
        .path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "path parameter required".to_string()))?;

    let directory = ctx.paths.translate(&reported);
    if !directory.is_dir() {
        return Err((
            StatusCode::NOT_FOUND,
            format!("Directory not found: {}", directory.display()),
        ));
    }

    let recursive = params.recursive;
    let root = directory.clone();
    let files = tokio::task::spawn_blocking(move || video_files(&root, recursive))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let mut entries = Vec::new();
    let (mut needs_video, mut needs_audio, mut anime) = (0, 0, 0);
    for file in &files {
        let analysis = match ctx.service.analyze(file, None).await {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!("Scan could not analyze {:?}: {:#}", file, e);
                if filter == ScanFilter::Any {
                    entries.push(json!({ "file": file, "error": format!("{:#}", e) }));
                }
                continue;
            }
        };

        needs_video += usize::from(analysis.needs_video_conversion);
        needs_audio += usize::from(analysis.needs_audio_conversion);
        anime += usize::from(analysis.content_type.is_anime());

        if filter.matches(&analysis) {
            entries.push(json!({
                "file": file,
                "size": analysis.media.size,
                "video_codec": analysis.media.primary_video().map(|v| v.codec.clone()),
                "needs_video_conversion": analysis.needs_video_conversion,
                "needs_audio_conversion": analysis.needs_audio_conversion,
                "needs_cleanup": analysis.needs_cleanup,
                "is_anime": analysis.content_type.is_anime(),
            }));
        }
    }

    Ok(Json(json!({
        "directory": directory,
        "recursive": recursive,
        "filter": filter.as_str(),
        "total_files": files.len(),
        "summary": {
            "needs_video_conversion": needs_video,
            "needs_audio_conversion": needs_audio,
            "anime_files": anime,
        },
        "files": entries,
    })))
}

fn video_files(root: &std::path::Path, recursive: bool) -> Vec<PathBuf> {
    let walker = WalkDir::new(root).min_depth(1).follow_links(true);
    let walker = if recursive { walker } else { walker.max_depth(1) };

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_video_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}
