use crate::arr::ArrWebhook;
use crate::server::{store_error, AppContext};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use remuxcode_common::paths::is_video_file;
use remuxcode_common::{JobKind, JobSource};
use serde_json::{json, Value};

pub fn webhook_routes() -> Router<AppContext> {
    Router::new().route("/webhook", post(handle_webhook))
}

/// Queue a full conversion for every existing video file the event names.
async fn handle_webhook(
    State(ctx): State<AppContext>,
    Json(payload): Json<ArrWebhook>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, String)> {
    if payload.is_test() {
        tracing::info!("Received test webhook");
        return Ok((
            StatusCode::OK,
            Json(json!({ "message": "Test event received", "job_ids": [] })),
        ));
    }

    let origin = payload.origin().ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            "Unknown webhook format".to_string(),
        )
    })?;

    tracing::info!(
        "Received {:?} webhook: {} for {}",
        origin,
        payload.event_type,
        payload.title()
    );

    let mut job_ids = Vec::new();
    for reported in payload.file_paths() {
        let path = ctx.paths.translate(&reported);
        if !path.is_file() {
            tracing::warn!("Webhook file does not exist: {:?} (reported as {})", path, reported);
            continue;
        }
        if !is_video_file(&path) {
            tracing::debug!("Ignoring non-video file {:?}", path);
            continue;
        }

        let job = ctx
            .queue
            .enqueue(path, JobKind::Full, JobSource::Webhook)
            .map_err(store_error)?;
        job_ids.push(job.id);
    }

    if job_ids.is_empty() {
        return Ok((
            StatusCode::OK,
            Json(json!({ "message": "No files to process", "job_ids": [] })),
        ));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": format!("Queued {} file(s)", job_ids.len()),
            "job_ids": job_ids,
        })),
    ))
}
