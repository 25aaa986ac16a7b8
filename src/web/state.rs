use crate::config::AppConfig;
use crate::db::pool::DuckDbConnectionManager;
use crate::rag::orchestrator::RagSystem;
use crate::timeline::TimelineService;
use r2d2::Pool;
use std::sync::Arc;

/// Shared application state for the web server.
///
/// `rag` is `None` when the pipeline failed to initialize at startup (bad
/// LLM configuration); the chat endpoint then answers 503 while the data
/// endpoints keep working.
pub struct AppState {
    pub config: AppConfig,
    pub db_pool: Pool<DuckDbConnectionManager>,
    pub rag: Option<Arc<RagSystem>>,
    pub timeline: TimelineService,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db_pool: Pool<DuckDbConnectionManager>,
        rag: Option<Arc<RagSystem>>,
    ) -> Self {
        Self {
            config,
            db_pool,
            rag,
            timeline: TimelineService::new(),
            startup_time: chrono::Utc::now(),
        }
    }
}
