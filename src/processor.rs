use crate::arr::{ArrRegistry, RenameProtocol};
use crate::conversion::ConversionService;
use crate::state::{Finished, JobQueue};
use remuxcode_common::JobId;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Worker pool that pulls job ids from the queue and runs them
pub struct JobProcessor {
    queue: Arc<JobQueue>,
    service: Arc<ConversionService>,
    arrs: ArrRegistry,
    rename: RenameProtocol,
}

impl JobProcessor {
    pub fn new(queue: Arc<JobQueue>, service: Arc<ConversionService>, arrs: ArrRegistry) -> Self {
        Self {
            queue,
            service,
            arrs,
            rename: RenameProtocol::default(),
        }
    }

    pub fn with_rename_protocol(mut self, rename: RenameProtocol) -> Self {
        self.rename = rename;
        self
    }

    /// Launch `workers` tasks that run until `shutdown` is cancelled or the
    /// queue closes.
    pub fn start(self: Arc<Self>, workers: usize, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        tracing::info!("Starting {} job worker(s)", workers);
        (0..workers.max(1))
            .map(|worker| {
                let processor = self.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { processor.run(worker, shutdown).await })
            })
            .collect()
    }

    async fn run(&self, worker: usize, shutdown: CancellationToken) {
        tracing::debug!("Worker {} started", worker);

        loop {
            let next = tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,
                next = self.queue.next_job() => next,
            };

            match next {
                Some(id) => self.process_job(&id).await,
                None => break,
            }
        }

        tracing::debug!("Worker {} stopped", worker);
    }

    /// Run one job to a terminal state.
    pub async fn process_job(&self, id: &JobId) {
        let job = match self.queue.begin(id) {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::debug!("Skipping job {}: no longer pending", id);
                return;
            }
            Err(e) => {
                tracing::error!("Failed to start job {}: {}", id, e);
                return;
            }
        };

        tracing::info!("Processing job {} ({}): {:?}", job.id, job.kind, job.file_path);

        let (result, error) = match self
            .service
            .process(&job.file_path, job.kind, job.id.as_str(), None)
            .await
        {
            Ok(result) => {
                let error = result.first_error();
                (result, error)
            }
            Err(e) => (Default::default(), Some(format!("{:#}", e))),
        };
        let any_success = result.any_success();

        match self.queue.finish(id, result, error) {
            Ok(Finished::Completed) => tracing::info!("Job {} completed", id),
            Ok(Finished::Failed(error)) => tracing::error!("Job {} failed: {}", id, error),
            Ok(Finished::Cancelled) => {
                tracing::info!("Job {} was cancelled, not triggering rename", id);
                return;
            }
            Err(e) => {
                tracing::error!("Failed to record result of job {}: {}", id, e);
                return;
            }
        }

        if any_success {
            self.rename.trigger(&self.arrs, &job.file_path).await;
        }
    }
}
