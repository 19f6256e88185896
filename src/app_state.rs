use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::processor::ImageProcessor;
use crate::services::tracker::{JobTracker, SharedTracker};

/// Shared state handed to the scheduler and to whatever front end queries
/// job status.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tracker: SharedTracker,
    pub processor: Arc<dyn ImageProcessor>,
}

impl AppState {
    pub fn new(config: AppConfig, processor: Arc<dyn ImageProcessor>) -> Self {
        let tracker = JobTracker::new(config.max_concurrent_jobs, config.event_capacity);
        Self {
            config: Arc::new(config),
            tracker: tracker.into_shared(),
            processor,
        }
    }
}
