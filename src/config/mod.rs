use garde::Validate;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AppConfig {
    /// Upper bound on jobs in the active set at once.
    #[serde(default = "default_max_concurrent_jobs")]
    #[garde(range(min = 1))]
    pub max_concurrent_jobs: usize,

    /// Images of one job sent to the provider in parallel.
    #[serde(default = "default_image_concurrency")]
    #[garde(range(min = 1, max = 20))]
    pub image_concurrency: usize,

    /// Extra attempts after a failed provider call.
    #[serde(default = "default_max_retries")]
    #[garde(range(max = 10))]
    pub max_retries: u32,

    /// Pause between provider attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    #[garde(skip)]
    pub retry_delay_ms: u64,

    /// How often the scheduler checks for startable jobs.
    #[serde(default = "default_poll_interval_ms")]
    #[garde(range(min = 1))]
    pub poll_interval_ms: u64,

    /// Delay between job completion and removal of its records and sources.
    #[serde(default = "default_cleanup_delay_secs")]
    #[garde(skip)]
    pub cleanup_delay_secs: u64,

    /// Directory the worker's processor writes results into.
    #[serde(default = "default_output_dir")]
    #[garde(length(min = 1))]
    pub output_dir: String,

    /// Buffer size of the tracker's event channel.
    #[serde(default = "default_event_capacity")]
    #[garde(range(min = 1))]
    pub event_capacity: usize,
}

fn default_max_concurrent_jobs() -> usize {
    2
}

fn default_image_concurrency() -> usize {
    3
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_cleanup_delay_secs() -> u64 {
    3600
}

fn default_output_dir() -> String {
    "outputs".to_string()
}

fn default_event_capacity() -> usize {
    256
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            image_concurrency: default_image_concurrency(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            cleanup_delay_secs: default_cleanup_delay_secs(),
            output_dir: default_output_dir(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit set of `KEY=value` pairs instead of the process
    /// environment.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self = envy::from_iter(vars)?;
        config.validate()?;
        Ok(config)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_secs(self.cleanup_delay_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] garde::Report),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AppConfig::from_vars(Vec::new()).unwrap();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.image_concurrency, 3);
        assert_eq!(config.cleanup_delay(), Duration::from_secs(3600));
        assert_eq!(config.output_dir, "outputs");
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_vars(vars(&[
            ("MAX_CONCURRENT_JOBS", "5"),
            ("POLL_INTERVAL_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(config.max_concurrent_jobs, 5);
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = AppConfig::from_vars(vars(&[("MAX_CONCURRENT_JOBS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_empty_output_dir_rejected() {
        let err = AppConfig::from_vars(vars(&[("OUTPUT_DIR", "")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unparseable_value_rejected() {
        let err = AppConfig::from_vars(vars(&[("MAX_RETRIES", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env(_)));
    }
}
