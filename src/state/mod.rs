//! In-memory job registry and work queue, backed by the SQLite job store.
//!
//! Every status change is written to the store while the registry lock is
//! held. When that write fails the in-memory job is marked failed, since
//! the store can no longer track it. Job ids flow to workers over an
//! unbounded channel whose receiver is shared behind a mutex; each id is
//! received by exactly one worker.

mod types;

pub use types::*;

use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use remuxcode_common::{Error, JobId, JobKind, JobSource, JobStatus, Result};
use remuxcode_db::models::JobCounts;
use remuxcode_db::pool::{get_conn, DbPool};
use remuxcode_db::queries;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::{mpsc, Mutex};

/// Statuses removed by the retention sweep.
pub const PURGEABLE_STATUSES: [JobStatus; 3] =
    [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled];

/// What `remove` did to a job.
#[derive(Debug, Clone)]
pub enum Removal {
    Cancelled(Job),
    Deleted,
}

/// Final state reached by `finish`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finished {
    Completed,
    Failed(String),
    /// The job was cancelled while its steps ran; results were recorded but
    /// the status stays cancelled.
    Cancelled,
}

pub struct JobQueue {
    jobs: RwLock<HashMap<JobId, Job>>,
    sender: mpsc::UnboundedSender<JobId>,
    receiver: Mutex<mpsc::UnboundedReceiver<JobId>>,
    pool: DbPool,
}

impl JobQueue {
    pub fn new(pool: DbPool) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            jobs: RwLock::new(HashMap::new()),
            sender,
            receiver: Mutex::new(receiver),
            pool,
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    fn persist(&self, job: &Job) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        queries::jobs::save_job(&conn, &job.to_record())
    }

    /// Register, persist and queue a new pending job.
    pub fn enqueue(&self, file_path: PathBuf, kind: JobKind, source: JobSource) -> Result<Job> {
        let job = Job::new(file_path, kind, source);
        self.submit(job.clone())?;
        tracing::info!(
            "Queued job {}: {} for {} ({})",
            job.id,
            job.kind,
            job.file_name(),
            job.source
        );
        Ok(job)
    }

    fn submit(&self, job: Job) -> Result<()> {
        let id = job.id.clone();
        {
            let mut jobs = self.jobs.write();
            self.persist(&job)?;
            jobs.insert(id.clone(), job);
        }
        self.sender
            .send(id)
            .map_err(|_| Error::internal("job queue is closed"))
    }

    /// Wait for the next queued job id.
    pub async fn next_job(&self) -> Option<JobId> {
        self.receiver.lock().await.recv().await
    }

    /// A job from the registry, or from the store for jobs finished before
    /// the last restart.
    pub fn get(&self, id: &JobId) -> Result<Job> {
        if let Some(job) = self.jobs.read().get(id) {
            return Ok(job.clone());
        }
        let conn = get_conn(&self.pool)?;
        queries::jobs::get_job(&conn, id.as_str()).map(Job::from)
    }

    /// Jobs newest-first, optionally filtered by status.
    pub fn list(&self, limit: Option<usize>, status: Option<JobStatus>) -> Result<Vec<Job>> {
        let conn = get_conn(&self.pool)?;
        let store_limit = if status.is_some() { None } else { limit };
        let records = queries::jobs::list_jobs(&conn, store_limit)?;

        Ok(records
            .into_iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .take(limit.unwrap_or(usize::MAX))
            .map(Job::from)
            .collect())
    }

    /// Cancel a pending or running job.
    pub fn cancel(&self, id: &JobId) -> Result<Job> {
        let mut jobs = self.jobs.write();
        if !jobs.contains_key(id) {
            drop(jobs);
            let job = self.get(id)?;
            return Err(Error::conflict(format!(
                "job {} is {} and cannot be cancelled",
                id, job.status
            )));
        }

        let job = jobs
            .get_mut(id)
            .ok_or_else(|| Error::not_found(format!("job {}", id)))?;
        if !job.cancel() {
            return Err(Error::conflict(format!(
                "job {} is {} and cannot be cancelled",
                id, job.status
            )));
        }

        self.persist(job)?;
        tracing::info!("Cancelled job {}", id);
        Ok(job.clone())
    }

    /// Delete a finished job from the registry and the store.
    pub fn delete(&self, id: &JobId) -> Result<()> {
        let job = self.get(id)?;
        if !job.status.is_terminal() {
            return Err(Error::conflict(format!(
                "job {} is {} and cannot be deleted",
                id, job.status
            )));
        }

        let mut jobs = self.jobs.write();
        let conn = get_conn(&self.pool)?;
        queries::jobs::delete_job(&conn, id.as_str())?;
        jobs.remove(id);
        tracing::info!("Deleted job {}", id);
        Ok(())
    }

    /// Cancel the job if it is still active, otherwise delete it.
    pub fn remove(&self, id: &JobId) -> Result<Removal> {
        let job = self.get(id)?;
        if job.status.is_cancellable() {
            match self.cancel(id) {
                Ok(job) => return Ok(Removal::Cancelled(job)),
                // Finished between the lookup and the cancel.
                Err(Error::Conflict(_)) => {}
                Err(e) => return Err(e),
            }
        }
        self.delete(id).map(|_| Removal::Deleted)
    }

    /// Mark a dequeued job running. Returns `None` when the job is gone or
    /// is no longer pending (e.g. cancelled while queued).
    pub fn begin(&self, id: &JobId) -> Result<Option<Job>> {
        let mut jobs = self.jobs.write();
        let Some(job) = jobs.get_mut(id) else {
            return Ok(None);
        };
        if !job.start() {
            return Ok(None);
        }

        if let Err(e) = self.persist(job) {
            job.fail(&format!("Failed to persist job state: {}", e));
            return Err(e);
        }
        Ok(Some(job.clone()))
    }

    /// Record results and move the job to its terminal state.
    ///
    /// A job cancelled while running keeps its cancelled status. The terminal
    /// state only reaches the registry once it is stored; if the store write
    /// fails the job is failed instead.
    pub fn finish(&self, id: &JobId, result: JobResult, error: Option<String>) -> Result<Finished> {
        let mut jobs = self.jobs.write();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| Error::not_found(format!("job {}", id)))?;

        let mut next = job.clone();
        next.result = result;
        let finished = match (next.status, error) {
            (JobStatus::Cancelled, _) => Finished::Cancelled,
            (_, Some(error)) => {
                next.fail(&error);
                Finished::Failed(error)
            }
            (_, None) => {
                next.complete();
                Finished::Completed
            }
        };

        if let Err(e) = self.persist(&next) {
            job.result = next.result;
            job.fail(&format!("Failed to persist job state: {}", e));
            return Err(e);
        }
        *job = next;
        Ok(finished)
    }

    /// Re-queue jobs that were pending or running when the process stopped.
    ///
    /// Each job restarts from scratch as pending with its original path and
    /// kind; earlier partial results are discarded.
    pub fn resume_pending(&self) -> Result<usize> {
        let conn = get_conn(&self.pool)?;
        let records = queries::jobs::list_resumable_jobs(&conn)?;
        drop(conn);

        let count = records.len();
        for record in records {
            let mut job = Job::from(record);
            job.status = JobStatus::Pending;
            job.source = JobSource::Restart;
            job.progress = 0.0;
            job.error = None;
            job.result = JobResult::default();
            job.completed_at = None;
            self.submit(job)?;
        }

        if count > 0 {
            tracing::info!("Resumed {} pending job(s) from the store", count);
        }
        Ok(count)
    }

    /// Drop finished jobs older than `days` from the store and the registry.
    pub fn purge(&self, days: u32) -> Result<usize> {
        let cutoff = Utc::now() - ChronoDuration::days(i64::from(days));
        let mut jobs = self.jobs.write();
        let conn = get_conn(&self.pool)?;
        let removed =
            queries::jobs::purge_jobs_older_than(&conn, i64::from(days), &PURGEABLE_STATUSES)?;

        jobs.retain(|_, job| {
            !(PURGEABLE_STATUSES.contains(&job.status)
                && job.completed_at.is_some_and(|t| t < cutoff))
        });

        if removed > 0 {
            tracing::info!("Purged {} job(s) older than {} days", removed, days);
        }
        Ok(removed)
    }

    pub fn stats(&self) -> Result<JobCounts> {
        let conn = get_conn(&self.pool)?;
        queries::jobs::count_jobs(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use remuxcode_db::pool::init_memory_pool;

    fn queue() -> JobQueue {
        JobQueue::new(init_memory_pool().unwrap())
    }

    fn enqueue(q: &JobQueue) -> Job {
        q.enqueue(PathBuf::from("/m/a.mkv"), JobKind::Full, JobSource::Api)
            .unwrap()
    }

    #[tokio::test]
    async fn test_enqueue_persists_and_delivers() {
        let q = queue();
        let job = enqueue(&q);

        assert_eq!(q.next_job().await, Some(job.id.clone()));
        let stored = q.get(&job.id).unwrap();
        assert_eq!(stored.status, JobStatus::Pending);
        assert_eq!(q.stats().unwrap().pending, 1);
    }

    #[test]
    fn test_begin_and_finish() {
        let q = queue();
        let job = enqueue(&q);

        let running = q.begin(&job.id).unwrap().unwrap();
        assert_eq!(running.status, JobStatus::Running);
        assert!(q.begin(&job.id).unwrap().is_none());

        let finished = q.finish(&job.id, JobResult::default(), None).unwrap();
        assert_eq!(finished, Finished::Completed);

        let done = q.get(&job.id).unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress, 1.0);
    }

    fn set_store_offline(q: &JobQueue, offline: bool) {
        let sql = if offline {
            "ALTER TABLE jobs RENAME TO jobs_offline"
        } else {
            "ALTER TABLE jobs_offline RENAME TO jobs"
        };
        get_conn(&q.pool).unwrap().execute_batch(sql).unwrap();
    }

    fn stored_status(q: &JobQueue, id: &JobId) -> JobStatus {
        let conn = get_conn(&q.pool).unwrap();
        queries::jobs::get_job(&conn, id.as_str()).unwrap().status
    }

    #[test]
    fn test_begin_store_failure_fails_job() {
        let q = queue();
        let job = enqueue(&q);

        set_store_offline(&q, true);
        assert_matches!(q.begin(&job.id), Err(Error::Database(_)));
        set_store_offline(&q, false);

        let failed = q.get(&job.id).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed
            .error
            .unwrap()
            .starts_with("Failed to persist job state"));
    }

    #[test]
    fn test_finish_store_failure_fails_job() {
        let q = queue();
        let job = enqueue(&q);
        q.begin(&job.id).unwrap();

        let result = JobResult {
            audio: Some(SubsystemResult::succeeded(serde_json::Value::Null)),
            ..Default::default()
        };
        set_store_offline(&q, true);
        assert_matches!(q.finish(&job.id, result, None), Err(Error::Database(_)));
        set_store_offline(&q, false);

        let failed = q.get(&job.id).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed
            .error
            .as_deref()
            .unwrap()
            .starts_with("Failed to persist job state"));
        assert!(failed.result.audio_converted());
        // Never reported as completed anywhere.
        assert_eq!(stored_status(&q, &job.id), JobStatus::Running);
    }

    #[test]
    fn test_cancel_while_running_stays_cancelled() {
        let q = queue();
        let job = enqueue(&q);
        q.begin(&job.id).unwrap();

        let cancelled = q.cancel(&job.id).unwrap();
        assert_eq!(cancelled.error.as_deref(), Some(CANCELLED_MESSAGE));

        let result = JobResult {
            audio: Some(SubsystemResult::succeeded(serde_json::Value::Null)),
            ..Default::default()
        };
        assert_eq!(q.finish(&job.id, result, None).unwrap(), Finished::Cancelled);

        let stored = q.get(&job.id).unwrap();
        assert_eq!(stored.status, JobStatus::Cancelled);
        assert!(stored.result.audio_converted());
    }

    #[test]
    fn test_cancel_terminal_is_conflict() {
        let q = queue();
        let job = enqueue(&q);
        q.begin(&job.id).unwrap();
        q.finish(&job.id, JobResult::default(), Some("boom".into()))
            .unwrap();

        assert_matches!(q.cancel(&job.id), Err(Error::Conflict(_)));
        assert_matches!(q.cancel(&JobId::from("missing")), Err(Error::NotFound(_)));
    }

    #[test]
    fn test_cancelled_pending_job_is_not_started() {
        let q = queue();
        let job = enqueue(&q);
        q.cancel(&job.id).unwrap();
        assert!(q.begin(&job.id).unwrap().is_none());
    }

    #[test]
    fn test_remove_cancels_then_deletes() {
        let q = queue();
        let job = enqueue(&q);

        assert_matches!(q.remove(&job.id), Ok(Removal::Cancelled(_)));
        assert_matches!(q.remove(&job.id), Ok(Removal::Deleted));
        assert_matches!(q.get(&job.id), Err(Error::NotFound(_)));
    }

    #[test]
    fn test_delete_active_is_conflict() {
        let q = queue();
        let job = enqueue(&q);
        assert_matches!(q.delete(&job.id), Err(Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_resume_pending_requeues_as_restart() {
        let pool = init_memory_pool().unwrap();
        let (pending_id, running_id, done_id) = {
            let q = JobQueue::new(pool.clone());
            let a = enqueue(&q);
            let b = q
                .enqueue(PathBuf::from("/m/b.mkv"), JobKind::Audio, JobSource::Webhook)
                .unwrap();
            let c = enqueue(&q);
            q.begin(&b.id).unwrap();
            q.begin(&c.id).unwrap();
            q.finish(&c.id, JobResult::default(), None).unwrap();
            (a.id, b.id, c.id)
        };

        let q = JobQueue::new(pool);
        assert_eq!(q.resume_pending().unwrap(), 2);

        let mut delivered = vec![q.next_job().await.unwrap(), q.next_job().await.unwrap()];
        delivered.sort();
        let mut expected = vec![pending_id.clone(), running_id.clone()];
        expected.sort();
        assert_eq!(delivered, expected);

        let resumed = q.get(&running_id).unwrap();
        assert_eq!(resumed.status, JobStatus::Pending);
        assert_eq!(resumed.kind, JobKind::Audio);
        assert_eq!(resumed.source, JobSource::Restart);
        assert_eq!(resumed.progress, 0.0);
        assert_eq!(q.get(&done_id).unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_list_filters_by_status() {
        let q = queue();
        let a = enqueue(&q);
        enqueue(&q);
        q.cancel(&a.id).unwrap();

        assert_eq!(q.list(None, None).unwrap().len(), 2);
        let cancelled = q.list(None, Some(JobStatus::Cancelled)).unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].id, a.id);
        assert_eq!(q.list(Some(1), None).unwrap().len(), 1);
    }
}
