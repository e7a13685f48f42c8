use crate::config::AppConfig;
use crate::pipeline::Pipeline;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    // Stateless between runs; each request gets its own database copy.
    pub pipeline: Pipeline,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: Pipeline) -> Self {
        Self {
            config,
            pipeline,
            startup_time: chrono::Utc::now(),
        }
    }
}
