//! Column-role inference over result rows.
//!
//! Roles are detected by case-insensitive substring matching on column
//! names, mirroring the upstream contract. The ambiguity that a column like
//! `translation` matches `lat` is known and preserved; do not add smarter
//! heuristics here.

use crate::rag::models::{QueryAnalysis, Row, VisualizationSpec, VizKind};

/// Rows attached to a spec are capped to bound response size.
const MAX_DATA_ROWS: usize = 100;

/// Build a chart specification from the shape of the result set, or `None`
/// when there is nothing to draw.
pub fn synthesize(analysis: &QueryAnalysis, rows: &[Row]) -> Option<VisualizationSpec> {
    let first = rows.first()?;
    let columns: Vec<String> = first.keys().cloned().collect();

    let has_coordinates = columns.iter().any(|c| {
        contains_ci(c, "latitude")
            || contains_ci(c, "longitude")
            || contains_ci(c, "lat")
            || contains_ci(c, "lon")
    });
    let has_depth = columns
        .iter()
        .any(|c| contains_ci(c, "depth") || contains_ci(c, "pressure"));
    let has_temporal = columns.iter().any(|c| {
        contains_ci(c, "date") || contains_ci(c, "time") || contains_ci(c, "profile_date")
    });

    let mut spec = VisualizationSpec {
        kind: VizKind::Scatter,
        data: rows.iter().take(MAX_DATA_ROWS).cloned().collect(),
        columns: columns.clone(),
        lat_column: None,
        lon_column: None,
        color_column: None,
        depth_column: None,
        parameter_columns: Vec::new(),
        time_column: None,
        value_columns: Vec::new(),
        title: synthesize_title(analysis),
        data_count: rows.len(),
    };

    // Priority order is deliberate: coordinates beat depth beat time.
    if has_coordinates {
        spec.kind = VizKind::Map;
        spec.lat_column = columns.iter().find(|c| contains_ci(c, "lat")).cloned();
        spec.lon_column = columns.iter().find(|c| contains_ci(c, "lon")).cloned();
        spec.color_column = columns
            .iter()
            .find(|c| {
                is_numeric(first, c) && !contains_ci(c, "lat") && !contains_ci(c, "lon")
            })
            .cloned();
    } else if has_depth {
        spec.kind = VizKind::Profile;
        let depth_column = columns
            .iter()
            .find(|c| contains_ci(c, "depth") || contains_ci(c, "pressure"))
            .cloned();
        spec.parameter_columns = columns
            .iter()
            .filter(|c| is_numeric(first, c) && Some(*c) != depth_column.as_ref())
            .take(3)
            .cloned()
            .collect();
        spec.depth_column = depth_column;
    } else if has_temporal {
        spec.kind = VizKind::Timeseries;
        spec.time_column = columns
            .iter()
            .find(|c| contains_ci(c, "date") || contains_ci(c, "time"))
            .cloned();
        spec.value_columns = columns
            .iter()
            .filter(|c| is_numeric(first, c))
            .take(2)
            .cloned()
            .collect();
    }

    Some(spec)
}

fn contains_ci(column: &str, needle: &str) -> bool {
    column.to_lowercase().contains(needle)
}

fn is_numeric(row: &Row, column: &str) -> bool {
    row.get(column).is_some_and(|v| v.is_number())
}

fn synthesize_title(analysis: &QueryAnalysis) -> String {
    let entities = &analysis.entities;
    let mut parts = Vec::new();

    if !entities.parameters.is_empty() {
        parts.push(
            entities
                .parameters
                .iter()
                .take(2)
                .cloned()
                .collect::<Vec<_>>()
                .join(" & "),
        );
    }
    if let Some(region) = &entities.geographic_region {
        parts.push(format!("in {}", region));
    }
    if let Some(period) = &entities.time_period {
        parts.push(format!("({})", period));
    }

    if parts.is_empty() {
        "Argo Data Visualization".to_string()
    } else {
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::models::{Entities, Intent, QueryAnalysis};
    use serde_json::json;

    fn analysis() -> QueryAnalysis {
        QueryAnalysis {
            intent: Intent::Visualization,
            entities: Entities::default(),
            language: "en".to_string(),
            complexity: Default::default(),
            requires_visualization: true,
            geographic_bounds: None,
            original_query: "show me a map".to_string(),
        }
    }

    fn row(pairs: &[(&str, serde_json::Value)]) -> Row {
        let mut row = Row::new();
        for (k, v) in pairs {
            row.insert(k.to_string(), v.clone());
        }
        row
    }

    #[test]
    fn empty_rows_yield_no_spec() {
        assert!(synthesize(&analysis(), &[]).is_none());
    }

    #[test]
    fn coordinates_produce_a_map_with_truncated_data() {
        let rows: Vec<Row> = (0..150)
            .map(|i| {
                row(&[
                    ("latitude", json!(-15.2)),
                    ("longitude", json!(72.3)),
                    ("avg_temp", json!(20.0 + i as f64 * 0.01)),
                ])
            })
            .collect();

        let spec = synthesize(&analysis(), &rows).unwrap();
        assert_eq!(spec.kind, VizKind::Map);
        assert_eq!(spec.data_count, 150);
        assert_eq!(spec.data.len(), 100);
        assert_eq!(spec.lat_column.as_deref(), Some("latitude"));
        assert_eq!(spec.lon_column.as_deref(), Some("longitude"));
        assert_eq!(spec.color_column.as_deref(), Some("avg_temp"));
        assert_eq!(spec.columns, ["latitude", "longitude", "avg_temp"]);
    }

    #[test]
    fn coordinates_win_over_depth() {
        let rows = vec![row(&[
            ("latitude", json!(-10.0)),
            ("longitude", json!(60.0)),
            ("depth", json!(500.0)),
        ])];

        let spec = synthesize(&analysis(), &rows).unwrap();
        assert_eq!(spec.kind, VizKind::Map);
    }

    #[test]
    fn depth_produces_profile_with_capped_parameters() {
        let rows = vec![row(&[
            ("pressure", json!(100.0)),
            ("temperature", json!(15.0)),
            ("salinity", json!(35.1)),
            ("oxygen", json!(4.2)),
            ("nitrate", json!(1.1)),
        ])];

        let spec = synthesize(&analysis(), &rows).unwrap();
        assert_eq!(spec.kind, VizKind::Profile);
        assert_eq!(spec.depth_column.as_deref(), Some("pressure"));
        assert_eq!(spec.parameter_columns, ["temperature", "salinity", "oxygen"]);
    }

    #[test]
    fn temporal_produces_timeseries_with_two_value_columns() {
        let rows = vec![row(&[
            ("profile_date", json!("2025-01-01")),
            ("avg_temp", json!(24.0)),
            ("avg_salinity", json!(35.0)),
            ("count", json!(12)),
        ])];

        let spec = synthesize(&analysis(), &rows).unwrap();
        assert_eq!(spec.kind, VizKind::Timeseries);
        assert_eq!(spec.time_column.as_deref(), Some("profile_date"));
        assert_eq!(spec.value_columns, ["avg_temp", "avg_salinity"]);
    }

    #[test]
    fn plain_numbers_fall_back_to_scatter() {
        let rows = vec![row(&[("a", json!(1)), ("b", json!(2))])];
        let spec = synthesize(&analysis(), &rows).unwrap();
        assert_eq!(spec.kind, VizKind::Scatter);
        assert!(spec.lat_column.is_none());
    }

    #[test]
    fn title_joins_parameters_region_and_period() {
        let mut analysis = analysis();
        analysis.entities = Entities {
            geographic_region: Some("Indian Ocean".to_string()),
            time_period: Some("2024".to_string()),
            parameters: vec![
                "temperature".to_string(),
                "salinity".to_string(),
                "pressure".to_string(),
            ],
            ..Default::default()
        };
        let rows = vec![row(&[("a", json!(1))])];

        let spec = synthesize(&analysis, &rows).unwrap();
        assert_eq!(spec.title, "temperature & salinity in Indian Ocean (2024)");
    }

    #[test]
    fn default_title_when_no_entities() {
        let rows = vec![row(&[("a", json!(1))])];
        let spec = synthesize(&analysis(), &rows).unwrap();
        assert_eq!(spec.title, "Argo Data Visualization");
    }
}
