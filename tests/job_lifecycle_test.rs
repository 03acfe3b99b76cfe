//! Jobs from enqueue to terminal state through the worker pool.

mod common;

use common::{arr_registry, clean_media, TestHarness};
use remuxcode::state::{JobQueue, CANCELLED_MESSAGE};
use remuxcode_common::{JobKind, JobSource, JobStatus};
use remuxcode_db::pool::get_conn;
use remuxcode_db::queries;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_full_job_runs_every_step() {
    let harness = TestHarness::new();
    let file = harness.media_file("Anime/Show/Season 01/ep01.mkv");
    let job = harness
        .queue
        .enqueue(file.clone(), JobKind::Full, JobSource::Api)
        .unwrap();

    harness.processor().process_job(&job.id).await;

    let done = harness.queue.get(&job.id).unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress, 1.0);
    assert!(done.error.is_none());
    assert!(done.started_at.is_some());
    assert!(done.completed_at.is_some());

    let audio = done.result.audio.as_ref().unwrap();
    assert!(audio.success);
    assert_eq!(audio.detail["streams_converted"], 1);
    assert_eq!(audio.detail["conversions"][0]["codec_from"], "dts");

    let video = done.result.video.as_ref().unwrap();
    assert!(video.success);
    assert_eq!(video.detail["codec_to"], "hevc");
    assert_eq!(video.detail["content_type"], "anime");

    let cleanup = done.result.cleanup.as_ref().unwrap();
    assert!(cleanup.success);
    assert_eq!(cleanup.detail["original_language"], "jpn");

    let programs: Vec<String> = harness
        .executor
        .runs()
        .into_iter()
        .map(|spec| spec.program)
        .collect();
    assert_eq!(programs, vec!["ffmpeg", "ffmpeg", "ffmpeg"]);

    // The replaced file is what the last step wrote.
    assert_eq!(std::fs::read(&file).unwrap(), b"converted");

    let conn = get_conn(harness.queue.pool()).unwrap();
    let record = queries::jobs::get_job(&conn, job.id.as_str()).unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert!(record.audio_converted);
    assert!(record.video_converted);
    assert!(record.streams_cleaned);
}

#[tokio::test]
async fn test_nothing_to_do_still_completes() {
    let harness = TestHarness::new();
    harness.probe.set(
        &harness.media.path().join("Movies/Quiet (2001)/quiet.mkv"),
        clean_media(),
    );
    let file = harness.media_file("Movies/Quiet (2001)/quiet.mkv");
    let job = harness
        .queue
        .enqueue(file.clone(), JobKind::Full, JobSource::Api)
        .unwrap();

    harness.processor().process_job(&job.id).await;

    let done = harness.queue.get(&job.id).unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.result.audio.as_ref().unwrap().skipped);
    assert!(done.result.video.as_ref().unwrap().skipped);
    assert!(done.result.cleanup.as_ref().unwrap().skipped);
    assert!(harness.executor.runs().is_empty());
    assert_eq!(std::fs::read(&file).unwrap(), b"original");
}

#[tokio::test]
async fn test_failed_step_fails_job_and_keeps_original() {
    let harness = TestHarness::new();
    harness.executor.fail_with("Invalid data found when processing input");
    let file = harness.media_file("Movies/Broken (2010)/broken.mkv");
    let job = harness
        .queue
        .enqueue(file.clone(), JobKind::Audio, JobSource::Api)
        .unwrap();

    harness.processor().process_job(&job.id).await;

    let done = harness.queue.get(&job.id).unwrap();
    assert_eq!(done.status, JobStatus::Failed);
    let error = done.error.unwrap();
    assert!(error.contains("Invalid data found"), "{}", error);
    assert!(!done.result.audio.unwrap().success);
    assert!(done.result.video.is_none());

    assert_eq!(std::fs::read(&file).unwrap(), b"original");
    let leftovers: Vec<_> = std::fs::read_dir(harness.scratch.path())
        .unwrap()
        .collect();
    assert!(leftovers.is_empty(), "temp files left: {:?}", leftovers);
}

#[tokio::test]
async fn test_file_removed_after_enqueue() {
    let harness = TestHarness::new();
    let file = harness.media_file("Movies/Gone (2020)/gone.mkv");
    let job = harness
        .queue
        .enqueue(file.clone(), JobKind::Full, JobSource::Webhook)
        .unwrap();
    std::fs::remove_file(&file).unwrap();

    harness.processor().process_job(&job.id).await;

    let done = harness.queue.get(&job.id).unwrap();
    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(
        done.error.as_deref(),
        Some(format!("File not found: {}", file.display()).as_str())
    );
    assert!(harness.executor.runs().is_empty());
}

#[tokio::test]
async fn test_cancel_while_running_keeps_cancelled_and_skips_rename() {
    let radarr = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/command"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .expect(0)
        .mount(&radarr)
        .await;

    let harness = TestHarness::with_arrs(arr_registry(Some(&radarr.uri()), None));
    harness.executor.hold();
    let file = harness.media_file("movies/Film (1999)/film.mkv");
    let job = harness
        .queue
        .enqueue(file, JobKind::Full, JobSource::Api)
        .unwrap();

    let processor = harness.processor();
    let id = job.id.clone();
    let running = tokio::spawn(async move { processor.process_job(&id).await });

    harness.executor.started.notified().await;
    assert_eq!(
        harness.queue.get(&job.id).unwrap().status,
        JobStatus::Running
    );
    let cancelled = harness.queue.cancel(&job.id).unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);

    harness.executor.unhold();
    running.await.unwrap();

    let done = harness.queue.get(&job.id).unwrap();
    assert_eq!(done.status, JobStatus::Cancelled);
    assert_eq!(done.error.as_deref(), Some(CANCELLED_MESSAGE));
    // Results of the steps that ran are still recorded.
    assert!(done.result.audio.unwrap().success);

    radarr.verify().await;
}

#[tokio::test]
async fn test_cancel_while_pending_never_runs() {
    let harness = TestHarness::new();
    let file = harness.media_file("Movies/Later (2005)/later.mkv");
    let job = harness
        .queue
        .enqueue(file.clone(), JobKind::Full, JobSource::Api)
        .unwrap();
    harness.queue.cancel(&job.id).unwrap();

    harness.processor().process_job(&job.id).await;

    let done = harness.queue.get(&job.id).unwrap();
    assert_eq!(done.status, JobStatus::Cancelled);
    assert!(done.started_at.is_none());
    assert!(harness.executor.runs().is_empty());
    assert_eq!(std::fs::read(&file).unwrap(), b"original");
}

fn set_store_offline(queue: &JobQueue, offline: bool) {
    let sql = if offline {
        "ALTER TABLE jobs RENAME TO jobs_offline"
    } else {
        "ALTER TABLE jobs_offline RENAME TO jobs"
    };
    get_conn(queue.pool()).unwrap().execute_batch(sql).unwrap();
}

#[tokio::test]
async fn test_store_failure_on_start_fails_job() {
    let harness = TestHarness::new();
    let file = harness.media_file("Movies/Film (1999)/film.mkv");
    let job = harness
        .queue
        .enqueue(file.clone(), JobKind::Full, JobSource::Api)
        .unwrap();

    set_store_offline(&harness.queue, true);
    harness.processor().process_job(&job.id).await;
    set_store_offline(&harness.queue, false);

    let done = harness.queue.get(&job.id).unwrap();
    assert_eq!(done.status, JobStatus::Failed);
    assert!(done
        .error
        .unwrap()
        .starts_with("Failed to persist job state"));
    assert!(harness.executor.runs().is_empty());
    assert_eq!(std::fs::read(&file).unwrap(), b"original");
}

#[tokio::test]
async fn test_store_failure_on_finish_fails_job_and_skips_rename() {
    let radarr = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/command"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .expect(0)
        .mount(&radarr)
        .await;

    let harness = TestHarness::with_arrs(arr_registry(Some(&radarr.uri()), None));
    harness.executor.hold();
    let file = harness.media_file("movies/Film (1999)/film.mkv");
    let job = harness
        .queue
        .enqueue(file, JobKind::Full, JobSource::Api)
        .unwrap();

    let processor = harness.processor();
    let id = job.id.clone();
    let running = tokio::spawn(async move { processor.process_job(&id).await });

    harness.executor.started.notified().await;
    set_store_offline(&harness.queue, true);
    harness.executor.unhold();
    running.await.unwrap();
    set_store_offline(&harness.queue, false);

    let done = harness.queue.get(&job.id).unwrap();
    assert_eq!(done.status, JobStatus::Failed);
    assert!(done
        .error
        .as_deref()
        .unwrap()
        .starts_with("Failed to persist job state"));
    assert!(done.result.audio.unwrap().success);

    let conn = get_conn(harness.queue.pool()).unwrap();
    let stored = queries::jobs::get_job(&conn, job.id.as_str()).unwrap();
    assert_eq!(stored.status, JobStatus::Running);

    radarr.verify().await;
}

#[tokio::test]
async fn test_unfinished_jobs_resume_after_restart() {
    let harness = TestHarness::new();
    let first = harness.media_file("Movies/One (2001)/one.mkv");
    let second = harness.media_file("Movies/Two (2002)/two.mkv");
    let done = harness.media_file("Movies/Three (2003)/three.mkv");

    let pending = harness
        .queue
        .enqueue(first.clone(), JobKind::Audio, JobSource::Webhook)
        .unwrap();
    let running = harness
        .queue
        .enqueue(second, JobKind::Video, JobSource::Api)
        .unwrap();
    let finished = harness
        .queue
        .enqueue(done, JobKind::Full, JobSource::Api)
        .unwrap();
    harness.queue.begin(&running.id).unwrap();
    harness.processor().process_job(&finished.id).await;

    // A new process sees only the store.
    let restarted = JobQueue::new(harness.queue.pool().clone());
    assert_eq!(restarted.resume_pending().unwrap(), 2);

    let resumed = restarted.get(&pending.id).unwrap();
    assert_eq!(resumed.status, JobStatus::Pending);
    assert_eq!(resumed.source, JobSource::Restart);
    assert_eq!(resumed.kind, JobKind::Audio);
    assert_eq!(resumed.file_path, first);
    assert_eq!(
        resumed.created_at.timestamp_micros(),
        pending.created_at.timestamp_micros()
    );

    let resumed = restarted.get(&running.id).unwrap();
    assert_eq!(resumed.status, JobStatus::Pending);
    assert!(resumed.completed_at.is_none());

    let mut queued = vec![
        restarted.next_job().await.unwrap(),
        restarted.next_job().await.unwrap(),
    ];
    queued.sort();
    let mut expected = vec![pending.id, running.id];
    expected.sort();
    assert_eq!(queued, expected);

    assert_eq!(
        restarted.get(&finished.id).unwrap().status,
        JobStatus::Completed
    );
}

#[tokio::test]
async fn test_worker_pool_drains_queue() {
    let harness = TestHarness::new();
    let shutdown = CancellationToken::new();
    let workers = harness.processor().start(2, shutdown.clone());
    assert_eq!(workers.len(), 2);

    let mut ids = Vec::new();
    for n in 0..4 {
        let file = harness.media_file(&format!("Movies/Film {n} (2000)/film{n}.mkv"));
        let job = harness
            .queue
            .enqueue(file, JobKind::Audio, JobSource::Batch)
            .unwrap();
        ids.push(job.id);
    }

    for id in &ids {
        let job = harness.wait_for_terminal(id).await;
        assert_eq!(job.status, JobStatus::Completed, "{:?}", job.error);
    }
    assert_eq!(harness.executor.runs().len(), 4);

    let stats = harness.queue.stats().unwrap();
    assert_eq!(stats.completed, 4);
    assert_eq!(stats.pending, 0);

    shutdown.cancel();
    for worker in workers {
        tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .expect("worker did not stop")
            .unwrap();
    }
}

#[tokio::test]
async fn test_successful_job_triggers_rename() {
    let radarr = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/movie"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 4, "title": "Film", "path": "/movies/Film (1999)"}
        ])))
        .mount(&radarr)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v3/command"))
        .and(body_partial_json(json!({"name": "RefreshMovie", "movieIds": [4]})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&radarr)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/command/1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": 1, "status": "completed"})),
        )
        .mount(&radarr)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/moviefile"))
        .and(query_param("movieId", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 9, "path": "/movies/Film (1999)/film.mkv"}
        ])))
        .mount(&radarr)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v3/command"))
        .and(body_partial_json(json!({
            "name": "RenameMovie",
            "movieIds": [4],
            "movieFileIds": [9]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 2})))
        .expect(1)
        .mount(&radarr)
        .await;

    let harness = TestHarness::with_arrs(arr_registry(Some(&radarr.uri()), None));
    let file = harness.media_file("movies/Film (1999)/film.mkv");
    let job = harness
        .queue
        .enqueue(file, JobKind::Audio, JobSource::Webhook)
        .unwrap();

    harness.processor().process_job(&job.id).await;

    assert_eq!(
        harness.queue.get(&job.id).unwrap().status,
        JobStatus::Completed
    );
    radarr.verify().await;
}

#[tokio::test]
async fn test_failed_job_does_not_rename() {
    let radarr = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/command"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .expect(0)
        .mount(&radarr)
        .await;

    let harness = TestHarness::with_arrs(arr_registry(Some(&radarr.uri()), None));
    harness.executor.fail_with("encoder exploded");
    let file = harness.media_file("movies/Film (1999)/film.mkv");
    let job = harness
        .queue
        .enqueue(file, JobKind::Audio, JobSource::Api)
        .unwrap();

    harness.processor().process_job(&job.id).await;

    assert_eq!(
        harness.queue.get(&job.id).unwrap().status,
        JobStatus::Failed
    );
    radarr.verify().await;
}
