use serde::Serialize;

use super::job::{Job, JobId};

/// Notifications broadcast by the job tracker.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// A job moved from the pending queue into the active set.
    JobStart { job_id: JobId },

    /// An image status changed; carries a snapshot of the job after the change.
    JobUpdate { job_id: JobId, job: Box<Job> },

    /// Every image of the job is completed or failed.
    JobComplete { job_id: JobId },
}

impl JobEvent {
    pub fn job_id(&self) -> &str {
        match self {
            JobEvent::JobStart { job_id }
            | JobEvent::JobUpdate { job_id, .. }
            | JobEvent::JobComplete { job_id } => job_id,
        }
    }
}
