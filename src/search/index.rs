use async_trait::async_trait;
use duckdb::params_from_iter;
use r2d2::Pool;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

use crate::db::pool::DuckDbConnectionManager;
use crate::search::{embedder, SearchError, SearchHit, SemanticSearch};

/// DuckDB-backed vector index over the `knowledge_documents` table.
///
/// Candidates are filtered by metadata in SQL, scored by cosine similarity
/// in process, and returned similarity-descending. The corpus is small and
/// curated, so a full scan per query is fine.
pub struct VectorIndex {
    pool: Pool<DuckDbConnectionManager>,
}

struct Candidate {
    content: String,
    content_type: String,
    region: String,
    embedding: String,
}

impl VectorIndex {
    pub fn new(pool: Pool<DuckDbConnectionManager>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SemanticSearch for VectorIndex {
    async fn search(
        &self,
        query: &str,
        limit: usize,
        filters: &HashMap<String, String>,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let query_embedding = embedder::embed(query);

        let pool = self.pool.clone();
        let region = filters.get("region").cloned();
        let content_type = filters.get("content_type").cloned();

        let candidates = tokio::task::spawn_blocking(
            move || -> Result<Vec<Candidate>, SearchError> {
                let conn = pool.get().map_err(|e| SearchError::Store(e.to_string()))?;

                let mut sql = String::from(
                    "SELECT content, content_type, region, embedding FROM knowledge_documents",
                );
                let mut clauses = Vec::new();
                let mut params = Vec::new();
                if let Some(region) = region {
                    clauses.push("region = ?");
                    params.push(region);
                }
                if let Some(content_type) = content_type {
                    clauses.push("content_type = ?");
                    params.push(content_type);
                }
                if !clauses.is_empty() {
                    sql.push_str(" WHERE ");
                    sql.push_str(&clauses.join(" AND "));
                }

                let mut stmt = conn
                    .prepare(&sql)
                    .map_err(|e| SearchError::Store(e.to_string()))?;
                let rows = stmt
                    .query_map(params_from_iter(params), |row| {
                        Ok(Candidate {
                            content: row.get(0)?,
                            content_type: row.get(1)?,
                            region: row.get(2)?,
                            embedding: row.get(3)?,
                        })
                    })
                    .map_err(|e| SearchError::Store(e.to_string()))?;

                rows.collect::<Result<Vec<_>, _>>()
                    .map_err(|e| SearchError::Store(e.to_string()))
            },
        )
        .await
        .map_err(|e| SearchError::Store(e.to_string()))??;

        let mut hits = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let stored: Vec<f32> = serde_json::from_str(&candidate.embedding)
                .map_err(|e| SearchError::Encoding(e.to_string()))?;
            hits.push(SearchHit {
                similarity: embedder::cosine_similarity(&query_embedding, &stored),
                content: candidate.content,
                content_type: candidate.content_type,
                region: candidate.region,
            });
        }

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
        });
        hits.truncate(limit);

        debug!("vector index returned {} hits for: {}", hits.len(), query);
        Ok(hits)
    }
}
