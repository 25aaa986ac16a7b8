pub mod providers;

use crate::config::LlmConfig;
use crate::rag::models::{QueryAnalysis, Row, SqlGeneration};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::error::Error;
use std::fmt;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
        }
    }
}

impl Error for LlmError {}

/// Transport seam: send one prompt, get one text completion back.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Natural-language understanding client for the chat pipeline.
///
/// Wraps a completion backend with the three task prompts (query
/// understanding, SQL generation, response generation) and coerces the
/// backend's semi-structured text into the typed contract. The external
/// text is never trusted as already-typed; parsing is a fallible step and
/// callers own the documented fallbacks.
pub struct NluClient {
    backend: Box<dyn CompletionBackend>,
    timeout: Duration,
}

impl NluClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let backend: Box<dyn CompletionBackend> = match config.backend.as_str() {
            "remote" => Box::new(providers::remote::RemoteLlmProvider::new(config)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self {
            backend,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Build a client over an arbitrary backend. Used by tests to inject
    /// scripted or failing backends.
    pub fn with_backend(backend: Box<dyn CompletionBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub async fn understand(
        &self,
        user_query: &str,
        session_id: &str,
    ) -> Result<QueryAnalysis, LlmError> {
        debug!("understanding query for session {}", session_id);
        let prompt = understanding_prompt(user_query);
        let response = self.complete_with_timeout(&prompt).await?;
        parse_json_payload::<QueryAnalysis>(&response)
    }

    pub async fn generate_sql(&self, analysis: &QueryAnalysis) -> Result<SqlGeneration, LlmError> {
        let prompt = sql_prompt(analysis)?;
        let response = self.complete_with_timeout(&prompt).await?;
        parse_json_payload::<SqlGeneration>(&response)
    }

    pub async fn generate_response(
        &self,
        analysis: &QueryAnalysis,
        rows: Option<&[Row]>,
        context: &[String],
    ) -> Result<String, LlmError> {
        let prompt = response_prompt(analysis, rows, context)?;
        let response = self.complete_with_timeout(&prompt).await?;
        Ok(response.trim().to_string())
    }

    async fn complete_with_timeout(&self, prompt: &str) -> Result<String, LlmError> {
        match tokio::time::timeout(self.timeout, self.backend.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::ConnectionError(format!(
                "request timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

/// Extract the outermost JSON object from completion text and deserialize
/// it. Models routinely wrap JSON in prose or code fences.
fn parse_json_payload<T: DeserializeOwned>(response: &str) -> Result<T, LlmError> {
    let start = response
        .find('{')
        .ok_or_else(|| LlmError::ResponseError("No JSON object in response".to_string()))?;
    let end = response
        .rfind('}')
        .ok_or_else(|| LlmError::ResponseError("No JSON object in response".to_string()))?;
    if end < start {
        return Err(LlmError::ResponseError(
            "No JSON object in response".to_string(),
        ));
    }

    serde_json::from_str(&response[start..=end])
        .map_err(|e| LlmError::ResponseError(format!("Failed to parse response JSON: {}", e)))
}

fn understanding_prompt(user_query: &str) -> String {
    format!(
        r#"You are an expert oceanographic data analyst specializing in Argo float data.
Analyze the following user query and extract key information.

User Query: "{}"

Respond with JSON only:
{{
    "intent": "data_query|visualization|export|information|greeting",
    "entities": {{
        "geographic_region": "extracted region name",
        "time_period": "extracted date range or relative time",
        "parameters": ["temperature", "salinity", "pressure", "depth"],
        "float_ids": ["specific float IDs if mentioned"],
        "data_type": "profiles|measurements|summaries|floats"
    }},
    "language": "en|hi|auto",
    "complexity": "simple|moderate|complex",
    "requires_visualization": true,
    "geographic_bounds": {{
        "lat_min": 0.0,
        "lat_max": 0.0,
        "lon_min": 0.0,
        "lon_max": 0.0
    }}
}}

Omit entity keys that do not apply. Focus on the Indian Ocean region by
default. Handle both English and Hindi queries.
"#,
        user_query
    )
}

const SCHEMA_INFO: &str = r#"Available Tables:
1. argo_floats: float_id, wmo_id, deployment_latitude, deployment_longitude, last_latitude, last_longitude, platform_type, status
2. argo_profiles: id, float_id, cycle_number, profile_date, latitude, longitude, data_mode, qc_flag
3. argo_measurements: profile_id, level_number, pressure, depth, temperature, salinity, temperature_qc, salinity_qc
4. data_summaries: region_name, min_latitude, max_latitude, min_longitude, max_longitude, total_profiles, avg_temperature, avg_salinity

Key Relationships:
- argo_floats.float_id -> argo_profiles.float_id
- argo_profiles.id -> argo_measurements.profile_id

Geographic bounds for the Indian Ocean: lat[-40, 30], lon[-90, 90]"#;

fn sql_prompt(analysis: &QueryAnalysis) -> Result<String, LlmError> {
    let analysis_json = serde_json::to_string_pretty(analysis)
        .map_err(|e| LlmError::ResponseError(e.to_string()))?;

    Ok(format!(
        r#"Generate a safe, read-only SQL query for Argo oceanographic data.

Query Analysis: {}

Database Schema:
{}

Rules:
1. Only SELECT queries are allowed
2. Always filter on quality flags (qc_flag = '1' for good data)
3. Use proper geographic bounds
4. Include appropriate JOINs
5. Always end with a LIMIT clause to bound the result size
6. Use ISO date formatting

Respond with JSON only:
{{
    "sql": "SELECT ... FROM ... WHERE ... LIMIT ...",
    "explanation": "What this query does",
    "estimated_rows": 100,
    "safety_checks": ["list of safety validations applied"]
}}
"#,
        analysis_json, SCHEMA_INFO
    ))
}

fn response_prompt(
    analysis: &QueryAnalysis,
    rows: Option<&[Row]>,
    context: &[String],
) -> Result<String, LlmError> {
    let analysis_json = serde_json::to_string_pretty(analysis)
        .map_err(|e| LlmError::ResponseError(e.to_string()))?;

    let sample = rows.map(|r| &r[..r.len().min(5)]).unwrap_or(&[]);
    let sample_json =
        serde_json::to_string_pretty(sample).map_err(|e| LlmError::ResponseError(e.to_string()))?;
    let truncation_note = match rows {
        Some(r) if r.len() > 5 => "(showing first 5 rows)",
        _ => "",
    };

    let language = if analysis.language == "hi" {
        "Hindi"
    } else {
        "English"
    };

    let context_block = if context.is_empty() {
        "None".to_string()
    } else {
        context.join("\n")
    };

    Ok(format!(
        r#"Generate a natural language response about Argo oceanographic data.

Original Query Analysis: {}

SQL Results: {} {}

Additional Context: {}

Instructions:
1. Respond in {}
2. Be conversational and informative
3. Include specific data values when available
4. Mention data sources and quality
5. Suggest follow-up questions
6. Keep the response under 500 words
7. Use proper units (deg C, PSU, dbar, meters)
"#,
        analysis_json, sample_json, truncation_note, context_block, language
    ))
}

/// Deterministic prose used when response generation fails.
pub fn fallback_response(rows: Option<&[Row]>) -> String {
    match rows {
        Some(rows) if !rows.is_empty() => format!(
            "Based on recent Argo float data I found {} matching records with \
             temperature and salinity measurements from various depths and locations. \
             The data comes from the global Argo float network and is quality \
             controlled (QC flag = 1). Would you like to see specific depth profiles \
             or temperature trends?",
            rows.len()
        ),
        _ => "I could not retrieve matching measurements right now, but I can answer \
              questions about Argo floats, ocean temperature, salinity, and pressure \
              profiles. Try asking about a region such as the Indian Ocean."
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::models::Intent;

    #[test]
    fn parses_json_wrapped_in_prose_and_fences() {
        let text = r#"Sure, here is the analysis:
```json
{"intent": "data_query", "requires_visualization": true}
```
Let me know if you need anything else."#;
        let analysis: QueryAnalysis = parse_json_payload(text).unwrap();
        assert_eq!(analysis.intent, Intent::DataQuery);
        assert!(analysis.requires_visualization);
    }

    #[test]
    fn missing_json_is_a_response_error() {
        let result = parse_json_payload::<QueryAnalysis>("no structured output here");
        assert!(matches!(result, Err(LlmError::ResponseError(_))));
    }

    #[test]
    fn reversed_braces_are_a_response_error() {
        let result = parse_json_payload::<QueryAnalysis>("} nothing {");
        assert!(matches!(result, Err(LlmError::ResponseError(_))));
    }

    #[test]
    fn analysis_defaults_fill_optional_fields() {
        let analysis: QueryAnalysis = parse_json_payload(r#"{"intent": "greeting"}"#).unwrap();
        assert_eq!(analysis.intent, Intent::Greeting);
        assert_eq!(analysis.language, "en");
        assert!(!analysis.requires_visualization);
        assert!(analysis.entities.parameters.is_empty());
        assert!(analysis.original_query.is_empty());
    }

    #[test]
    fn sql_generation_parses_with_defaults() {
        let generated: SqlGeneration =
            parse_json_payload(r#"{"sql": "SELECT 1 LIMIT 1"}"#).unwrap();
        assert_eq!(generated.sql, "SELECT 1 LIMIT 1");
        assert!(generated.safety_checks.is_empty());
    }
}
