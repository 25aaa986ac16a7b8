use chrono::Utc;
use std::error::Error;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::db::conversation::ConversationStore;
use crate::llm::{self, NluClient};
use crate::rag::context::ContextRetriever;
use crate::rag::executor::SqlExecutor;
use crate::rag::models::{
    ConversationTurn, ExecutionMetadata, OrchestratedResponse, QueryAnalysis, SqlGeneration,
};
use crate::rag::viz;

type PipelineError = Box<dyn Error + Send + Sync>;

/// Top-level coordinator for the chat pipeline: query understanding ->
/// context retrieval -> conditional SQL generation/execution -> response
/// generation -> visualization -> conversation persistence.
///
/// Every external call has a local recovery path; the caller always gets a
/// well-formed response, degraded rather than failed. Collaborators are
/// injected once at startup and shared across requests.
pub struct RagSystem {
    nlu: Arc<NluClient>,
    retriever: ContextRetriever,
    executor: SqlExecutor,
    conversations: ConversationStore,
}

impl RagSystem {
    pub fn new(
        nlu: Arc<NluClient>,
        retriever: ContextRetriever,
        executor: SqlExecutor,
        conversations: ConversationStore,
    ) -> Self {
        Self {
            nlu,
            retriever,
            executor,
            conversations,
        }
    }

    pub async fn process_query(
        &self,
        user_query: &str,
        session_id: Option<String>,
    ) -> OrchestratedResponse {
        let session_id = session_id
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("session_{}", Utc::now().to_rfc3339()));
        let started = Instant::now();

        info!(
            "processing query for session {}: {}",
            session_id,
            user_query.chars().take(100).collect::<String>()
        );

        match self.run_pipeline(user_query, &session_id, started).await {
            Ok(response) => {
                info!(
                    "query processed in {}ms for session {}",
                    response.processing_time_ms, session_id
                );
                response
            }
            Err(e) => {
                error!("query processing failed: {}", e);
                OrchestratedResponse::pipeline_error(e.to_string(), session_id)
            }
        }
    }

    async fn run_pipeline(
        &self,
        user_query: &str,
        session_id: &str,
        started: Instant,
    ) -> Result<OrchestratedResponse, PipelineError> {
        // Step 1: understand the query. Understanding failure is recovered
        // with the deterministic default analysis; the verbatim input is
        // attached on every path.
        let mut analysis = match self.nlu.understand(user_query, session_id).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("query understanding failed, using fallback analysis: {}", e);
                QueryAnalysis::fallback(user_query)
            }
        };
        analysis.original_query = user_query.to_string();

        // Steps 2 and 3: context retrieval always runs; SQL generation only
        // when the intent needs data. The two share no state and run
        // concurrently when both are needed.
        let (context, generated) = if analysis.intent.requires_data() {
            let (context, generated) = tokio::join!(
                self.retriever.retrieve(&analysis),
                self.generate_sql_or_fallback(&analysis)
            );
            (context, Some(generated))
        } else {
            (self.retriever.retrieve(&analysis).await, None)
        };

        // Step 4: execute. Failure yields rows = None but the pipeline
        // continues with whatever it has.
        let (rows, sql_metadata) = match &generated {
            Some(generated) => {
                let (rows, metadata) = self.executor.execute(generated).await;
                (rows, Some(metadata))
            }
            None => (None, None),
        };

        // Step 5: generate the prose answer.
        let response_text = match self
            .nlu
            .generate_response(&analysis, rows.as_deref(), &context)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!("response generation failed, using fallback text: {}", e);
                llm::fallback_response(rows.as_deref())
            }
        };

        // Step 6: visualization, only when requested and there is data.
        let visualization = match &rows {
            Some(rows) if analysis.requires_visualization && !rows.is_empty() => {
                viz::synthesize(&analysis, rows)
            }
            _ => None,
        };

        // Step 7: best-effort persistence; never surfaces to the caller.
        let turn = self.build_turn(
            session_id,
            user_query,
            &analysis,
            &response_text,
            sql_metadata.as_ref(),
            started,
        )?;
        if let Err(e) = self.conversations.append(turn).await {
            warn!("failed to store conversation turn: {}", e);
        }

        // Step 8: assemble the response.
        let total_data_rows = rows.as_ref().map_or(0, Vec::len);
        let data_results = rows.map(|mut rows| {
            rows.truncate(10);
            rows
        });

        Ok(OrchestratedResponse {
            response_text,
            query_analysis: Some(analysis),
            context_sources: context.len(),
            sql_metadata,
            data_results,
            total_data_rows,
            visualization,
            processing_time_ms: started.elapsed().as_millis() as u64,
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
            error: None,
        })
    }

    async fn generate_sql_or_fallback(&self, analysis: &QueryAnalysis) -> SqlGeneration {
        match self.nlu.generate_sql(analysis).await {
            Ok(generated) => generated,
            Err(e) => {
                warn!("SQL generation failed, using fallback query: {}", e);
                SqlGeneration::fallback()
            }
        }
    }

    fn build_turn(
        &self,
        session_id: &str,
        user_query: &str,
        analysis: &QueryAnalysis,
        response_text: &str,
        sql_metadata: Option<&ExecutionMetadata>,
        started: Instant,
    ) -> Result<ConversationTurn, PipelineError> {
        Ok(ConversationTurn {
            session_id: session_id.to_string(),
            user_query: user_query.to_string(),
            system_response: response_text.to_string(),
            intent: Some(analysis.intent.to_string()),
            extracted_entities: Some(serde_json::to_string(&analysis.entities)?),
            generated_sql: sql_metadata
                .and_then(ExecutionMetadata::query)
                .map(str::to_string),
            response_time_ms: Some(started.elapsed().as_millis() as u64),
            created_at: Utc::now(),
        })
    }

    /// Conversation history for a session, oldest first. Failures degrade to
    /// an empty history.
    pub async fn conversation_history(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Vec<ConversationTurn> {
        match self.conversations.history(session_id, limit).await {
            Ok(turns) => turns,
            Err(e) => {
                error!("failed to load conversation history: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::DuckDbConnectionManager;
    use crate::db::schema;
    use crate::llm::{CompletionBackend, LlmError};
    use crate::rag::models::{Intent, VizKind};
    use crate::search::index::VectorIndex;
    use async_trait::async_trait;
    use r2d2::Pool;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FailingBackend;

    #[async_trait]
    impl CompletionBackend for FailingBackend {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            Err(LlmError::ConnectionError("backend offline".to_string()))
        }
    }

    struct ScriptedBackend {
        responses: Mutex<VecDeque<String>>,
    }

    impl ScriptedBackend {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| LlmError::ResponseError("script exhausted".to_string()))
        }
    }

    fn test_pool(with_schema: bool) -> Pool<DuckDbConnectionManager> {
        let pool = Pool::builder()
            .max_size(1)
            .build(DuckDbConnectionManager::new(":memory:".to_string()))
            .unwrap();
        if with_schema {
            schema::ensure_schema(&pool.get().unwrap()).unwrap();
        }
        pool
    }

    fn system(
        backend: Box<dyn CompletionBackend>,
        pool: Pool<DuckDbConnectionManager>,
    ) -> RagSystem {
        let nlu = Arc::new(NluClient::with_backend(backend, Duration::from_secs(5)));
        let retriever = ContextRetriever::new(Arc::new(VectorIndex::new(pool.clone())));
        let executor = SqlExecutor::new(pool.clone(), Duration::from_secs(5));
        let conversations = ConversationStore::new(pool);
        RagSystem::new(nlu, retriever, executor, conversations)
    }

    #[tokio::test]
    async fn nlu_outage_degrades_to_fallbacks_without_error() {
        let rag = system(Box::new(FailingBackend), test_pool(true));

        let response = rag
            .process_query("any query", Some("s1".to_string()))
            .await;

        assert!(!response.response_text.is_empty());
        assert!(response.error.is_none());
        let analysis = response.query_analysis.unwrap();
        assert_eq!(analysis.original_query, "any query");
        assert_eq!(analysis.intent, Intent::DataQuery);
        assert_eq!(response.session_id, "s1");
        // The fallback count query runs against the seeded schema.
        assert!(matches!(
            response.sql_metadata,
            Some(ExecutionMetadata::Success { .. })
        ));
        assert_eq!(response.total_data_rows, 1);
    }

    #[tokio::test]
    async fn everything_broken_still_returns_a_well_formed_response() {
        // No schema at all: fallback SQL fails, persistence fails, search
        // fails. All of it is recovered locally.
        let rag = system(Box::new(FailingBackend), test_pool(false));

        let response = rag
            .process_query("what is out there", Some("s1".to_string()))
            .await;

        assert!(!response.response_text.is_empty());
        assert!(response.error.is_none());
        assert!(matches!(
            response.sql_metadata,
            Some(ExecutionMetadata::Failure { .. })
        ));
        assert!(response.data_results.is_none());
        assert!(response.visualization.is_none());
        assert_eq!(response.total_data_rows, 0);
    }

    #[tokio::test]
    async fn end_to_end_map_scenario() {
        let pool = test_pool(true);
        {
            let conn = pool.get().unwrap();
            conn.execute_batch(
                "CREATE TABLE regional_means (latitude DOUBLE, longitude DOUBLE, avg_temp DOUBLE);
                 INSERT INTO regional_means VALUES (-15.2, 72.3, 24.5);",
            )
            .unwrap();
        }

        let understanding = r#"{
            "intent": "data_query",
            "entities": {
                "geographic_region": "Indian Ocean",
                "parameters": ["temperature"],
                "data_type": "profiles"
            },
            "language": "en",
            "complexity": "simple",
            "requires_visualization": true
        }"#;
        let generation = r#"{
            "sql": "SELECT latitude, longitude, avg_temp FROM regional_means LIMIT 10",
            "explanation": "Average temperature in the Indian Ocean",
            "estimated_rows": 1,
            "safety_checks": ["read-only", "limited results"]
        }"#;
        let backend = ScriptedBackend::new(&[
            understanding,
            generation,
            "The average temperature in the Indian Ocean is 24.5 deg C.",
        ]);

        let rag = system(Box::new(backend), pool);
        let response = rag
            .process_query(
                "What is the average temperature in the Indian Ocean?",
                Some("t1".to_string()),
            )
            .await;

        assert!(response.error.is_none());
        assert_eq!(response.total_data_rows, 1);
        assert_eq!(response.data_results.as_ref().unwrap().len(), 1);

        let visualization = response.visualization.expect("expected a chart spec");
        assert_eq!(visualization.kind, VizKind::Map);
        assert_eq!(visualization.lat_column.as_deref(), Some("latitude"));
        assert_eq!(visualization.lon_column.as_deref(), Some("longitude"));
        assert_eq!(visualization.data_count, 1);

        assert_eq!(
            response.response_text,
            "The average temperature in the Indian Ocean is 24.5 deg C."
        );

        let history = rag.conversation_history("t1", 10).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].intent.as_deref(), Some("data_query"));
        assert_eq!(
            history[0].generated_sql.as_deref(),
            Some("SELECT latitude, longitude, avg_temp FROM regional_means LIMIT 10")
        );
    }

    #[tokio::test]
    async fn greeting_intent_skips_the_sql_branch() {
        let backend = ScriptedBackend::new(&[
            r#"{"intent": "greeting", "requires_visualization": false}"#,
            "Hello! Ask me about Argo floats.",
        ]);
        let rag = system(Box::new(backend), test_pool(true));

        let response = rag.process_query("hi", Some("s2".to_string())).await;

        assert!(response.sql_metadata.is_none());
        assert!(response.data_results.is_none());
        assert!(response.visualization.is_none());
        assert_eq!(response.total_data_rows, 0);
        assert_eq!(response.response_text, "Hello! Ask me about Argo floats.");
    }

    #[tokio::test]
    async fn missing_session_id_generates_one() {
        let rag = system(Box::new(FailingBackend), test_pool(true));
        let response = rag.process_query("hello", None).await;
        assert!(response.session_id.starts_with("session_"));
    }

    #[tokio::test]
    async fn repeated_turns_accumulate_in_order() {
        let pool = test_pool(true);
        let rag = system(Box::new(FailingBackend), pool);

        for i in 0..3 {
            rag.process_query(&format!("query {}", i), Some("s9".to_string()))
                .await;
        }

        let history = rag.conversation_history("s9", 10).await;
        assert_eq!(history.len(), 3);
        let queries: Vec<&str> = history.iter().map(|t| t.user_query.as_str()).collect();
        assert_eq!(queries, ["query 0", "query 1", "query 2"]);
    }
}
