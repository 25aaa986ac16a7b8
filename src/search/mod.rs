pub mod embedder;
pub mod index;

use async_trait::async_trait;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum SearchError {
    Store(String),
    Encoding(String),
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchError::Store(msg) => write!(f, "search store error: {}", msg),
            SearchError::Encoding(msg) => write!(f, "search encoding error: {}", msg),
        }
    }
}

impl Error for SearchError {}

/// One scored match from the knowledge base.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub content: String,
    pub content_type: String,
    pub region: String,
    pub similarity: f32,
}

/// Semantic-search capability consumed by the context retriever. The core
/// only depends on this seam; `index::VectorIndex` is the production impl.
#[async_trait]
pub trait SemanticSearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        limit: usize,
        filters: &HashMap<String, String>,
    ) -> Result<Vec<SearchHit>, SearchError>;
}
