use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

/// Caller-supplied opaque job identifier.
pub type JobId = String;

/// Generate a fresh job id for callers that do not carry their own.
pub fn new_job_id() -> JobId {
    Uuid::new_v4().to_string()
}

/// Lifecycle of a whole job. A job never fails as a whole; per-image
/// failures only show up in `ImageTask::status` and `JobProgress::failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
}

/// Lifecycle of a single image inside a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ImageStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ImageStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ImageStatus::Completed | ImageStatus::Failed)
    }
}

/// One source image and what became of it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageTask {
    pub path: String,
    pub status: ImageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
}

impl ImageTask {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: ImageStatus::Pending,
            output_path: None,
            error: None,
            analysis: None,
        }
    }
}

/// Aggregate counters. `pending` counts images that are not yet resolved,
/// so `completed + failed + pending == total` always holds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
}

impl JobProgress {
    /// Recount from image statuses.
    pub fn from_images(images: &[ImageTask]) -> Self {
        let completed = images
            .iter()
            .filter(|i| i.status == ImageStatus::Completed)
            .count();
        let failed = images
            .iter()
            .filter(|i| i.status == ImageStatus::Failed)
            .count();

        Self {
            total: images.len(),
            completed,
            failed,
            pending: images.len() - completed - failed,
        }
    }
}

/// A batch of images submitted together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub job_id: JobId,
    pub status: JobStatus,
    pub images: Vec<ImageTask>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: JobProgress,
}

impl Job {
    pub fn new<I, S>(job_id: impl Into<JobId>, image_paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let images: Vec<ImageTask> = image_paths.into_iter().map(ImageTask::new).collect();
        let progress = JobProgress::from_images(&images);

        Self {
            job_id: job_id.into(),
            status: JobStatus::Pending,
            images,
            created_at: Utc::now(),
            completed_at: None,
            progress,
        }
    }

    /// True when every image is completed or failed. Vacuously true for a
    /// job without images.
    pub fn is_resolved(&self) -> bool {
        self.images.iter().all(|i| i.status.is_terminal())
    }

    /// `(index, output_path)` of every successfully processed image, in order.
    pub fn completed_outputs(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.images.iter().enumerate().filter_map(|(idx, image)| {
            match (image.status, image.output_path.as_deref()) {
                (ImageStatus::Completed, Some(path)) => Some((idx, path)),
                _ => None,
            }
        })
    }
}

/// Optional payload accompanying an image status change. Fields left as
/// `None` keep whatever the image already had.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageUpdate {
    pub output_path: Option<String>,
    pub error: Option<String>,
    pub analysis: Option<String>,
}

impl ImageUpdate {
    pub fn completed(output_path: impl Into<String>) -> Self {
        Self {
            output_path: Some(output_path.into()),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_analysis(mut self, analysis: impl Into<String>) -> Self {
        self.analysis = Some(analysis.into());
        self
    }
}

/// Registry sizes for external reporting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackerStats {
    pub total_jobs: usize,
    pub active_jobs: usize,
    pub queued_jobs: usize,
    pub max_concurrent: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_all_pending() {
        let job = Job::new("job-1", ["a.png", "b.png", "c.png"]);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.images.len(), 3);
        assert!(job.images.iter().all(|i| i.status == ImageStatus::Pending));
        assert_eq!(
            job.progress,
            JobProgress { total: 3, completed: 0, failed: 0, pending: 3 }
        );
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_empty_job_is_resolved() {
        let job = Job::new("empty", Vec::<String>::new());
        assert_eq!(job.progress.total, 0);
        assert!(job.is_resolved());
    }

    #[test]
    fn test_progress_counts_processing_as_unresolved() {
        let mut images = vec![ImageTask::new("a"), ImageTask::new("b"), ImageTask::new("c")];
        images[0].status = ImageStatus::Processing;
        images[1].status = ImageStatus::Failed;
        let progress = JobProgress::from_images(&images);
        assert_eq!(progress.pending, 2);
        assert_eq!(progress.failed, 1);
        assert_eq!(progress.completed + progress.failed + progress.pending, progress.total);
    }

    #[test]
    fn test_completed_outputs_skips_failed() {
        let mut job = Job::new("job", ["a", "b", "c"]);
        job.images[0].status = ImageStatus::Completed;
        job.images[0].output_path = Some("out/a.png".to_string());
        job.images[1].status = ImageStatus::Failed;
        job.images[2].status = ImageStatus::Completed;
        job.images[2].output_path = Some("out/c.png".to_string());

        let outputs: Vec<_> = job.completed_outputs().collect();
        assert_eq!(outputs, vec![(0, "out/a.png"), (2, "out/c.png")]);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ImageStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
        assert_eq!(JobStatus::Completed.to_string(), "completed");
    }
}
