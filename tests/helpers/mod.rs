//! Test helper utilities shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use batch_enhance::config::AppConfig;
use batch_enhance::models::event::JobEvent;
use batch_enhance::services::processor::{ImageProcessor, ProcessedImage, ProcessorError};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Config with tight timings so scheduler tests finish quickly.
pub fn fast_config(max_concurrent_jobs: usize) -> AppConfig {
    AppConfig {
        max_concurrent_jobs,
        image_concurrency: 2,
        max_retries: 1,
        retry_delay_ms: 1,
        poll_interval_ms: 5,
        cleanup_delay_secs: 0,
        output_dir: "outputs".to_string(),
        event_capacity: 256,
    }
}

/// Processor double keyed on the source path:
/// - paths containing `bad` always fail
/// - paths containing `flaky` fail on the first attempt only
/// - everything else succeeds with `<path>.out`
#[derive(Default)]
pub struct FakeProcessor {
    attempts: Mutex<HashMap<String, usize>>,
}

impl FakeProcessor {
    pub fn attempts(&self, path: &str) -> usize {
        self.attempts.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ImageProcessor for FakeProcessor {
    fn name(&self) -> &str {
        "fake"
    }

    async fn process(&self, source_path: &str) -> Result<ProcessedImage, ProcessorError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let count = attempts.entry(source_path.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        tokio::task::yield_now().await;

        if source_path.contains("bad") {
            return Err(ProcessorError::Provider("content rejected".to_string()));
        }
        if source_path.contains("flaky") && attempt == 1 {
            return Err(ProcessorError::EmptyResponse);
        }

        Ok(ProcessedImage {
            output_path: format!("{}.out", source_path),
            analysis: Some(format!("enhanced on attempt {}", attempt)),
        })
    }
}

/// Wait for the `JobComplete` event of `job_id`.
pub async fn wait_for_completion(
    events: &mut broadcast::Receiver<JobEvent>,
    job_id: &str,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(JobEvent::JobComplete { job_id: id }) if id == job_id => return Ok(()),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => return Err(e),
            }
        }
    })
    .await;

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(format!("Job {} did not complete within {:?}", job_id, timeout).into()),
    }
}
