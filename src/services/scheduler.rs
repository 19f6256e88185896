use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::sleep;

use crate::app_state::AppState;
use crate::models::job::{ImageStatus, ImageUpdate, JobId};
use crate::services::processor::{ProcessedImage, ProcessorError};

/// Polls the tracker for startable jobs and feeds their images to the
/// configured processor.
pub struct Scheduler {
    state: AppState,
}

impl Scheduler {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Run until `shutdown` resolves. Jobs already running are awaited before
    /// returning.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut running = JoinSet::new();
        let poll_interval = self.state.config.poll_interval();

        tracing::info!(
            processor = self.state.processor.name(),
            max_concurrent_jobs = self.state.config.max_concurrent_jobs,
            "Scheduler started"
        );

        loop {
            while let Some(job_id) = self.start_next().await {
                let state = self.state.clone();
                running.spawn(process_job(state, job_id));
            }

            // Reap finished tasks so the set does not grow unbounded.
            while let Some(result) = running.try_join_next() {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Job task panicked");
                }
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = sleep(poll_interval) => {}
            }
        }

        tracing::info!(in_flight = running.len(), "Scheduler stopping, waiting for running jobs");
        while let Some(result) = running.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Job task panicked");
            }
        }
    }

    async fn start_next(&self) -> Option<JobId> {
        self.state.tracker.lock().await.start_next_job()
    }
}

/// Process every image of a started job and report each outcome.
pub async fn process_job(state: AppState, job_id: JobId) {
    let Some(job) = state.tracker.lock().await.get_job(&job_id) else {
        tracing::warn!(job_id = %job_id, "Started job vanished before processing");
        return;
    };

    tracing::info!(job_id = %job_id, images = job.progress.pending, "Processing job");
    let start = std::time::Instant::now();

    // Images resolved outside the scheduler keep their outcome.
    let paths: Vec<(usize, String)> = job
        .images
        .into_iter()
        .enumerate()
        .filter(|(_, image)| !image.status.is_terminal())
        .map(|(idx, image)| (idx, image.path))
        .collect();

    stream::iter(paths)
        .for_each_concurrent(state.config.image_concurrency, |(index, path)| {
            let state = state.clone();
            let job_id = job_id.clone();
            async move { process_image(&state, &job_id, index, &path).await }
        })
        .await;

    tracing::info!(
        job_id = %job_id,
        duration_ms = start.elapsed().as_millis() as u64,
        "Job processing finished"
    );
}

async fn process_image(state: &AppState, job_id: &str, index: usize, path: &str) {
    if let Err(e) = state.tracker.lock().await.update_image_status(
        job_id,
        index,
        ImageStatus::Processing,
        ImageUpdate::default(),
    ) {
        // Job was removed while running; nothing to report to.
        tracing::warn!(job_id = %job_id, index, error = %e, "Skipping image");
        return;
    }

    let (status, update) = match process_with_retry(state, job_id, index, path).await {
        Ok(processed) => {
            let mut update = ImageUpdate::completed(processed.output_path);
            update.analysis = processed.analysis;
            (ImageStatus::Completed, update)
        }
        Err(e) => (ImageStatus::Failed, ImageUpdate::failed(e.to_string())),
    };

    if let Err(e) = state
        .tracker
        .lock()
        .await
        .update_image_status(job_id, index, status, update)
    {
        tracing::warn!(job_id = %job_id, index, error = %e, "Lost image result");
    }
}

async fn process_with_retry(
    state: &AppState,
    job_id: &str,
    index: usize,
    path: &str,
) -> Result<ProcessedImage, ProcessorError> {
    let processor = Arc::clone(&state.processor);
    let max_retries = state.config.max_retries;
    let retry_delay: Duration = state.config.retry_delay();
    let mut attempt = 0;

    loop {
        match processor.process(path).await {
            Ok(processed) => {
                tracing::debug!(job_id = %job_id, index, attempt, "Image processed");
                return Ok(processed);
            }
            Err(e) if attempt < max_retries => {
                attempt += 1;
                tracing::warn!(
                    job_id = %job_id,
                    index,
                    attempt,
                    max_retries,
                    error = %e,
                    "Provider call failed, retrying"
                );
                sleep(retry_delay).await;
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, index, error = %e, "Image processing failed");
                return Err(e);
            }
        }
    }
}
