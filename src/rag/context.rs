use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::rag::models::QueryAnalysis;
use crate::search::SemanticSearch;

/// How many knowledge-base hits are requested per query.
const RESULT_LIMIT: usize = 5;
/// Hits at or below this similarity are discarded.
const SIMILARITY_THRESHOLD: f32 = 0.3;

/// Turns a query analysis into a search phrase plus filter set and pulls
/// relevant context strings from the semantic-search capability.
pub struct ContextRetriever {
    search: Arc<dyn SemanticSearch>,
}

impl ContextRetriever {
    pub fn new(search: Arc<dyn SemanticSearch>) -> Self {
        Self { search }
    }

    /// Retrieval failure must never abort the pipeline: any search error is
    /// logged and an empty context is returned.
    pub async fn retrieve(&self, analysis: &QueryAnalysis) -> Vec<String> {
        let entities = &analysis.entities;

        let mut search_terms: Vec<String> = Vec::new();
        if let Some(region) = &entities.geographic_region {
            search_terms.push(region.clone());
        }
        search_terms.extend(entities.parameters.iter().cloned());
        if let Some(data_type) = &entities.data_type {
            search_terms.push(data_type.to_string());
        }

        let search_query = if search_terms.is_empty() {
            "oceanographic data".to_string()
        } else {
            search_terms.join(" ")
        };

        let mut filters = HashMap::new();
        if let Some(region) = &entities.geographic_region {
            filters.insert(
                "region".to_string(),
                region.to_lowercase().replace(' ', "_"),
            );
        }

        match self
            .search
            .search(&search_query, RESULT_LIMIT, &filters)
            .await
        {
            Ok(hits) => {
                let context: Vec<String> = hits
                    .into_iter()
                    .filter(|hit| hit.similarity > SIMILARITY_THRESHOLD)
                    .map(|hit| hit.content)
                    .collect();
                info!(
                    "retrieved {} context items for: {}",
                    context.len(),
                    search_query
                );
                context
            }
            Err(e) => {
                warn!("context retrieval failed: {}", e);
                Vec::new()
            }
        }
    }
}
