use clap::Parser;
use r2d2::Pool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

mod config;
mod data;
mod db;
mod llm;
mod rag;
mod search;
mod timeline;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::db::conversation::ConversationStore;
use crate::db::pool::DuckDbConnectionManager;
use crate::llm::NluClient;
use crate::rag::context::ContextRetriever;
use crate::rag::executor::SqlExecutor;
use crate::rag::orchestrator::RagSystem;
use crate::search::index::VectorIndex;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!("Initializing DuckDB connection pool");
    let db_manager = DuckDbConnectionManager::new(config.database.connection_string.clone());
    let pool = Pool::builder()
        .max_size(config.database.pool_size as u32)
        .build(db_manager)?;

    // An unreachable store is fatal; everything downstream needs it.
    {
        let conn = pool.get()?;
        db::schema::ensure_schema(&conn)?;

        if let Err(e) = data::seed::seed_knowledge_base(&conn) {
            // Degrades retrieval quality only; the pipeline tolerates an
            // empty knowledge base.
            error!("Failed to seed knowledge base: {}", e);
        }

        if args.seed {
            info!("Loading synthetic demo data");
            data::seed::seed_demo_data(&conn, config.data.seed_days_back)
                .map_err(|e| -> Box<dyn std::error::Error> { e })?;
        }
    }

    // Build the RAG pipeline. A misconfigured LLM backend leaves the data
    // endpoints up and the chat endpoint answering service-unavailable.
    info!("Initializing LLM backend: {}", config.llm.backend);
    let rag = match NluClient::new(&config.llm) {
        Ok(nlu) => {
            let retriever = ContextRetriever::new(Arc::new(VectorIndex::new(pool.clone())));
            let executor = SqlExecutor::new(
                pool.clone(),
                Duration::from_secs(config.database.statement_timeout_secs),
            );
            let conversations = ConversationStore::new(pool.clone());
            Some(Arc::new(RagSystem::new(
                Arc::new(nlu),
                retriever,
                executor,
                conversations,
            )))
        }
        Err(e) => {
            error!("Failed to initialize RAG system: {}", e);
            None
        }
    };

    // Create application state
    let app_state = Arc::new(AppState::new(config.clone(), pool, rag));

    // Start the web server
    info!(
        "Starting FloatChat server on {}:{}",
        config.web.host, config.web.port
    );
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                e.to_string(),
            )) as Box<dyn std::error::Error>);
        }
    }

    Ok(())
}
