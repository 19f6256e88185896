use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use crate::models::event::JobEvent;
use crate::models::job::{
    ImageStatus, ImageUpdate, Job, JobId, JobProgress, JobStatus, TrackerStats,
};

/// Tracker handle shared between the scheduler, cleanup and any reader.
/// Each read-modify-write runs under a single lock acquisition.
pub type SharedTracker = Arc<Mutex<JobTracker>>;

/// In-memory registry of processing jobs.
///
/// Holds every job until it is explicitly removed, a FIFO of jobs waiting to
/// start and the set of started jobs. `max_concurrent` is advisory: callers
/// consult [`JobTracker::can_start_new_job`] before starting a job, the
/// tracker itself never refuses [`JobTracker::start_job`] for capacity.
pub struct JobTracker {
    jobs: HashMap<JobId, Job>,
    queue: VecDeque<JobId>,
    active: HashSet<JobId>,
    max_concurrent: usize,
    events: broadcast::Sender<JobEvent>,
}

impl JobTracker {
    pub fn new(max_concurrent: usize, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            jobs: HashMap::new(),
            queue: VecDeque::new(),
            active: HashSet::new(),
            max_concurrent,
            events,
        }
    }

    pub fn into_shared(self) -> SharedTracker {
        Arc::new(Mutex::new(self))
    }

    /// Receive every event emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Register a job with one pending image per path and queue it.
    /// Id uniqueness is the caller's responsibility; a reused id replaces the
    /// earlier record.
    pub fn create_job<I, S>(&mut self, job_id: impl Into<JobId>, image_paths: I) -> Job
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let job = Job::new(job_id, image_paths);
        let job_id = job.job_id.clone();

        if self.jobs.insert(job_id.clone(), job.clone()).is_some() {
            tracing::warn!(job_id = %job_id, "Job id reused, replacing existing record");
            self.active.remove(&job_id);
            self.queue.retain(|id| id != &job_id);
        }
        self.queue.push_back(job_id.clone());

        tracing::info!(job_id = %job_id, images = job.progress.total, "Job created");
        metrics::counter!("jobs_created_total").increment(1);
        self.record_gauges();

        job
    }

    /// Snapshot of a job; later mutations are not reflected in it.
    pub fn get_job(&self, job_id: &str) -> Option<Job> {
        self.jobs.get(job_id).cloned()
    }

    /// Move a job into the active set and emit `JobStart`.
    ///
    /// Does not check `max_concurrent`. A job with no images is completed
    /// right away. Only pending jobs can be started.
    pub fn start_job(&mut self, job_id: &str) -> Result<(), TrackerError> {
        let Some(job) = self.jobs.get_mut(job_id) else {
            tracing::warn!(job_id = %job_id, "Ignoring start of unknown job");
            return Err(TrackerError::JobNotFound(job_id.to_string()));
        };
        if job.status != JobStatus::Pending {
            tracing::warn!(job_id = %job_id, status = %job.status, "Ignoring start of job already started");
            return Err(TrackerError::AlreadyStarted {
                job_id: job_id.to_string(),
                status: job.status,
            });
        }

        job.status = JobStatus::Processing;
        self.active.insert(job_id.to_string());
        self.queue.retain(|id| id != job_id);

        tracing::info!(job_id = %job_id, "Job started");
        self.emit(JobEvent::JobStart {
            job_id: job_id.to_string(),
        });

        self.complete_if_resolved(job_id);
        self.record_gauges();
        Ok(())
    }

    /// Start the head of the pending queue if capacity allows.
    pub fn start_next_job(&mut self) -> Option<JobId> {
        if !self.can_start_new_job() {
            return None;
        }
        let job_id = self.get_next_job()?;
        // The queue only holds ids of registered jobs.
        self.start_job(&job_id).ok()?;
        Some(job_id)
    }

    /// Record a status change for one image.
    ///
    /// Fields of `update` that are `None` leave the image untouched. Progress
    /// counters are recounted from the images, so repeating a call for the
    /// same index never double counts. When the last unresolved image
    /// resolves the job completes and `JobComplete` is emitted once. A
    /// `JobUpdate` with the new snapshot follows every successful call.
    pub fn update_image_status(
        &mut self,
        job_id: &str,
        index: usize,
        status: ImageStatus,
        update: ImageUpdate,
    ) -> Result<(), TrackerError> {
        if status == ImageStatus::Pending {
            tracing::warn!(job_id = %job_id, index, "Rejected image update back to pending");
            return Err(TrackerError::InvalidStatus(status));
        }

        let Some(job) = self.jobs.get_mut(job_id) else {
            tracing::warn!(job_id = %job_id, index, "Dropping image update for unknown job");
            return Err(TrackerError::JobNotFound(job_id.to_string()));
        };

        let len = job.images.len();
        let Some(image) = job.images.get_mut(index) else {
            tracing::warn!(job_id = %job_id, index, len, "Dropping image update with index out of range");
            return Err(TrackerError::ImageOutOfRange {
                job_id: job_id.to_string(),
                index,
                len,
            });
        };

        let previous = image.status;
        image.status = status;
        if let Some(output_path) = update.output_path {
            image.output_path = Some(output_path);
        }
        if let Some(error) = update.error {
            image.error = Some(error);
        }
        if let Some(analysis) = update.analysis {
            image.analysis = Some(analysis);
        }

        if previous.is_terminal() && previous != status {
            tracing::debug!(
                job_id = %job_id,
                index,
                from = %previous,
                to = %status,
                "Overwriting resolved image status"
            );
        }

        job.progress = JobProgress::from_images(&job.images);

        if previous != status {
            match status {
                ImageStatus::Completed => metrics::counter!("images_completed_total").increment(1),
                ImageStatus::Failed => metrics::counter!("images_failed_total").increment(1),
                _ => {}
            }
        }

        tracing::debug!(
            job_id = %job_id,
            index,
            status = %status,
            completed = job.progress.completed,
            failed = job.progress.failed,
            pending = job.progress.pending,
            "Image status updated"
        );

        self.complete_if_resolved(job_id);

        if let Some(job) = self.jobs.get(job_id) {
            self.emit(JobEvent::JobUpdate {
                job_id: job_id.to_string(),
                job: Box::new(job.clone()),
            });
        }
        Ok(())
    }

    /// Whether the scheduler may start another job now.
    pub fn can_start_new_job(&self) -> bool {
        self.active.len() < self.max_concurrent && !self.queue.is_empty()
    }

    /// Head of the pending queue, left in place.
    pub fn get_next_job(&self) -> Option<JobId> {
        self.queue.front().cloned()
    }

    /// Drop a job from every collection. Removing an unknown id is a no-op.
    pub fn remove_job(&mut self, job_id: &str) -> Option<Job> {
        let removed = self.jobs.remove(job_id);
        self.active.remove(job_id);
        self.queue.retain(|id| id != job_id);

        if removed.is_some() {
            tracing::info!(job_id = %job_id, "Job removed");
            self.record_gauges();
        }
        removed
    }

    pub fn get_stats(&self) -> TrackerStats {
        TrackerStats {
            total_jobs: self.jobs.len(),
            active_jobs: self.active.len(),
            queued_jobs: self.queue.len(),
            max_concurrent: self.max_concurrent,
        }
    }

    pub fn active_job_ids(&self) -> Vec<JobId> {
        self.active.iter().cloned().collect()
    }

    pub fn queued_job_ids(&self) -> Vec<JobId> {
        self.queue.iter().cloned().collect()
    }

    fn complete_if_resolved(&mut self, job_id: &str) {
        let Some(job) = self.jobs.get_mut(job_id) else {
            return;
        };
        if job.status == JobStatus::Completed || !job.is_resolved() {
            return;
        }

        job.status = JobStatus::Completed;
        job.completed_at = Some(Utc::now());
        let progress = job.progress;

        self.active.remove(job_id);
        self.queue.retain(|id| id != job_id);

        tracing::info!(
            job_id = %job_id,
            completed = progress.completed,
            failed = progress.failed,
            "Job completed"
        );
        metrics::counter!("jobs_completed_total").increment(1);

        self.emit(JobEvent::JobComplete {
            job_id: job_id.to_string(),
        });
        self.record_gauges();
    }

    fn emit(&self, event: JobEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn record_gauges(&self) {
        metrics::gauge!("job_queue_depth").set(self.queue.len() as f64);
        metrics::gauge!("active_jobs").set(self.active.len() as f64);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Image index {index} out of range for job {job_id} ({len} images)")]
    ImageOutOfRange {
        job_id: JobId,
        index: usize,
        len: usize,
    },

    #[error("Images cannot be moved to status {0}")]
    InvalidStatus(ImageStatus),

    #[error("Job {job_id} cannot be started, it is already {status}")]
    AlreadyStarted { job_id: JobId, status: JobStatus },
}
