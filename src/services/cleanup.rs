use std::io::ErrorKind;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::models::event::JobEvent;
use crate::services::tracker::SharedTracker;

/// Removes completed jobs and their source files after a grace period.
pub struct CleanupService {
    tracker: SharedTracker,
    delay: Duration,
}

impl CleanupService {
    pub fn new(tracker: SharedTracker, delay: Duration) -> Self {
        Self { tracker, delay }
    }

    /// Subscribe to the tracker and handle `JobComplete` events in the
    /// background until the returned handle is aborted.
    pub async fn spawn(self) -> JoinHandle<()> {
        let events = self.tracker.lock().await.subscribe();
        tokio::spawn(self.listen(events))
    }

    async fn listen(self, mut events: broadcast::Receiver<JobEvent>) {
        loop {
            match events.recv().await {
                Ok(JobEvent::JobComplete { job_id }) => {
                    let tracker = self.tracker.clone();
                    let delay = self.delay;
                    tracing::debug!(job_id = %job_id, delay_secs = delay.as_secs(), "Cleanup scheduled");
                    tokio::spawn(async move {
                        sleep(delay).await;
                        cleanup_job(&tracker, &job_id).await;
                    });
                }
                Ok(other) => {
                    tracing::trace!(job_id = other.job_id(), "Cleanup ignoring event");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Cleanup listener lagged, some completions were missed");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

/// Drop the job record and delete its source images.
pub async fn cleanup_job(tracker: &SharedTracker, job_id: &str) {
    let Some(job) = tracker.lock().await.remove_job(job_id) else {
        tracing::debug!(job_id = %job_id, "Job already removed");
        return;
    };

    let mut deleted = 0;
    for image in &job.images {
        match tokio::fs::remove_file(&image.path).await {
            Ok(()) => deleted += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(job_id = %job_id, path = %image.path, error = %e, "Failed to delete source image");
            }
        }
    }

    tracing::info!(job_id = %job_id, deleted, "Job cleaned up");
}
