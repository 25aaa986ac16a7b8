use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One result row: column name -> scalar value, in result-set column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    DataQuery,
    Visualization,
    Export,
    Information,
    Greeting,
}

impl Intent {
    /// Whether this intent triggers the SQL generation/execution branch.
    pub fn requires_data(&self) -> bool {
        matches!(self, Intent::DataQuery | Intent::Visualization)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Intent::DataQuery => "data_query",
            Intent::Visualization => "visualization",
            Intent::Export => "export",
            Intent::Information => "information",
            Intent::Greeting => "greeting",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Profiles,
    Measurements,
    Summaries,
    Floats,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Profiles => "profiles",
            DataType::Measurements => "measurements",
            DataType::Summaries => "summaries",
            DataType::Floats => "floats",
        };
        write!(f, "{}", s)
    }
}

// Advisory only; carried through the contract but unused downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    #[default]
    Simple,
    Moderate,
    Complex,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Entities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geographic_region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_period: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub float_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeographicBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl GeographicBounds {
    /// Default query scope when no region is specified.
    pub const INDIAN_OCEAN: GeographicBounds = GeographicBounds {
        lat_min: -40.0,
        lat_max: 30.0,
        lon_min: -90.0,
        lon_max: 90.0,
    };
}

/// Structured interpretation of a user utterance, as returned by the NLU
/// capability (or the deterministic fallback when it is unreachable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub intent: Intent,
    #[serde(default)]
    pub entities: Entities,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub requires_visualization: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geographic_bounds: Option<GeographicBounds>,
    /// Verbatim input text; attached by the orchestrator on every path.
    #[serde(default)]
    pub original_query: String,
}

fn default_language() -> String {
    "en".to_string()
}

impl QueryAnalysis {
    /// Deterministic analysis used when query understanding fails.
    pub fn fallback(original_query: &str) -> Self {
        Self {
            intent: Intent::DataQuery,
            entities: Entities {
                geographic_region: Some("Indian Ocean".to_string()),
                time_period: Some("recent".to_string()),
                parameters: vec!["temperature".to_string(), "salinity".to_string()],
                float_ids: Vec::new(),
                data_type: Some(DataType::Profiles),
            },
            language: "en".to_string(),
            complexity: Complexity::Simple,
            requires_visualization: true,
            geographic_bounds: Some(GeographicBounds::INDIAN_OCEAN),
            original_query: original_query.to_string(),
        }
    }
}

/// Output of the SQL-generation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlGeneration {
    pub sql: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub estimated_rows: i64,
    #[serde(default)]
    pub safety_checks: Vec<String>,
}

impl SqlGeneration {
    /// Trivial count query used when SQL generation fails. Must pass the
    /// safety validator, hence the LIMIT clause.
    pub fn fallback() -> Self {
        Self {
            sql: "SELECT COUNT(*) AS total_profiles FROM argo_profiles WHERE qc_flag = '1' LIMIT 1"
                .to_string(),
            explanation: "Count of quality-controlled Argo profiles".to_string(),
            estimated_rows: 1,
            safety_checks: vec!["basic count query".to_string()],
        }
    }
}

/// Outcome metadata from the SQL executor. Exactly one variant per execution;
/// `rows` is absent whenever this is `Failure`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExecutionMetadata {
    Success {
        query: String,
        explanation: String,
        rows_returned: usize,
        safety_checks: Vec<String>,
    },
    Failure {
        error: String,
    },
}

impl ExecutionMetadata {
    pub fn query(&self) -> Option<&str> {
        match self {
            ExecutionMetadata::Success { query, .. } => Some(query),
            ExecutionMetadata::Failure { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VizKind {
    Map,
    Profile,
    Timeseries,
    Scatter,
}

/// Declarative chart specification inferred from the result shape.
#[derive(Debug, Clone, Serialize)]
pub struct VisualizationSpec {
    #[serde(rename = "type")]
    pub kind: VizKind,
    pub data: Vec<Row>,
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth_column: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameter_columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_column: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub value_columns: Vec<String>,
    pub title: String,
    pub data_count: usize,
}

/// Append-only conversation log entry.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationTurn {
    pub session_id: String,
    pub user_query: String,
    pub system_response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_entities: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
}

/// The unit returned to the chat caller.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratedResponse {
    pub response_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_analysis: Option<QueryAnalysis>,
    pub context_sources: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_metadata: Option<ExecutionMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_results: Option<Vec<Row>>,
    pub total_data_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization: Option<VisualizationSpec>,
    pub processing_time_ms: u64,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OrchestratedResponse {
    /// Terminal apology response for failures not recovered inside the
    /// pipeline. The only path where exception text reaches the caller.
    pub fn pipeline_error(error: String, session_id: String) -> Self {
        Self {
            response_text: format!(
                "I apologize, but I encountered an error processing your query: {}. \
                 Please try rephrasing your question or ask for help with Argo data queries.",
                error
            ),
            query_analysis: None,
            context_sources: 0,
            sql_metadata: None,
            data_results: None,
            total_data_rows: 0,
            visualization: None,
            processing_time_ms: 0,
            session_id,
            timestamp: Utc::now(),
            error: Some(error),
        }
    }
}
