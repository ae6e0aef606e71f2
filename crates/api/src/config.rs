use std::time::Duration;

use mealscan_estimator::EstimatorConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Base HTTP URL of the external estimation service.
    pub estimator_url: String,
    /// Bounded wait for estimation job submission, in seconds.
    pub estimator_submit_timeout_secs: u64,
    /// Bounded wait for each estimation status event, in seconds.
    pub estimator_event_timeout_secs: u64,
    /// Maximum number of tasks executing concurrently.
    pub worker_limit: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                  |
    /// |---------------------------------|--------------------------|
    /// | `HOST`                          | `0.0.0.0`                |
    /// | `PORT`                          | `3000`                   |
    /// | `CORS_ORIGINS`                  | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS`          | `30`                     |
    /// | `SHUTDOWN_TIMEOUT_SECS`         | `30`                     |
    /// | `ESTIMATOR_URL`                 | `http://localhost:8001`  |
    /// | `ESTIMATOR_SUBMIT_TIMEOUT_SECS` | `30`                     |
    /// | `ESTIMATOR_EVENT_TIMEOUT_SECS`  | `120`                    |
    /// | `WORKER_LIMIT`                  | `4`                      |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let estimator_url =
            std::env::var("ESTIMATOR_URL").unwrap_or_else(|_| "http://localhost:8001".into());

        let estimator_submit_timeout_secs: u64 = std::env::var("ESTIMATOR_SUBMIT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("ESTIMATOR_SUBMIT_TIMEOUT_SECS must be a valid u64");

        let estimator_event_timeout_secs: u64 = std::env::var("ESTIMATOR_EVENT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("ESTIMATOR_EVENT_TIMEOUT_SECS must be a valid u64");

        let worker_limit: usize = std::env::var("WORKER_LIMIT")
            .unwrap_or_else(|_| "4".into())
            .parse()
            .expect("WORKER_LIMIT must be a valid usize");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            estimator_url,
            estimator_submit_timeout_secs,
            estimator_event_timeout_secs,
            worker_limit,
        }
    }

    /// Derive the estimator client configuration.
    pub fn estimator_config(&self) -> EstimatorConfig {
        let mut config = EstimatorConfig::new(self.estimator_url.clone());
        config.submit_timeout = Duration::from_secs(self.estimator_submit_timeout_secs);
        config.event_timeout = Duration::from_secs(self.estimator_event_timeout_secs);
        config
    }
}
