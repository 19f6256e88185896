use batch_enhance::{
    app_state::AppState,
    config::AppConfig,
    models::job::new_job_id,
    services::{cleanup::CleanupService, processor::LocalCopyProcessor, scheduler::Scheduler},
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting image enhancement worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    metrics::describe_counter!("jobs_created_total", "Total enhancement jobs submitted");
    metrics::describe_counter!("jobs_completed_total", "Total enhancement jobs completed");
    metrics::describe_counter!("images_completed_total", "Images enhanced successfully");
    metrics::describe_counter!("images_failed_total", "Images the provider failed to enhance");
    metrics::describe_gauge!("job_queue_depth", "Jobs waiting to start");
    metrics::describe_gauge!("active_jobs", "Jobs currently being processed");

    let processor = LocalCopyProcessor::new(&config.output_dir);
    let cleanup_delay = config.cleanup_delay();
    let state = AppState::new(config, Arc::new(processor));

    let cleanup = CleanupService::new(state.tracker.clone(), cleanup_delay)
        .spawn()
        .await;

    // Every path on the command line becomes one image of a single job.
    let paths: Vec<String> = std::env::args().skip(1).collect();
    if !paths.is_empty() {
        let job_id = new_job_id();
        state.tracker.lock().await.create_job(job_id.clone(), paths);
        tracing::info!(job_id = %job_id, "Queued job from command line");
    }

    tracing::info!("Worker ready, starting job processing loop");

    Scheduler::new(state.clone())
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
        })
        .await;

    cleanup.abort();
    let stats = state.tracker.lock().await.get_stats();
    tracing::info!(
        total_jobs = stats.total_jobs,
        active_jobs = stats.active_jobs,
        queued_jobs = stats.queued_jobs,
        "Worker stopped"
    );
}
