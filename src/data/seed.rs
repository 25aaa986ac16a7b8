//! Knowledge-base and demo-data seeding.
//!
//! Runs at startup on the blocking path, before the server accepts traffic.
//! Both seeders are idempotent: they skip tables that already hold data.

use chrono::{DateTime, Duration, Utc};
use duckdb::{params, Connection};
use std::collections::HashMap;
use std::error::Error;
use tracing::info;

use crate::data::synth::{self, SyntheticProfile};
use crate::search::embedder;
use crate::timeline::TimelineService;

type SeedError = Box<dyn Error + Send + Sync>;

struct KnowledgeItem {
    content: &'static str,
    content_type: &'static str,
    region: &'static str,
    importance: f64,
}

const KNOWLEDGE_BASE: &[KnowledgeItem] = &[
    KnowledgeItem {
        content: "Argo floats are autonomous oceanographic instruments that drift with \
                  ocean currents and measure temperature, salinity, and pressure profiles \
                  from the surface down to 2000 meters depth.",
        content_type: "general_knowledge",
        region: "global",
        importance: 1.0,
    },
    KnowledgeItem {
        content: "Ocean temperature varies from about -2 deg C in polar regions to over \
                  30 deg C in tropical surface waters. The Indian Ocean has warm surface \
                  temperatures typically between 25 and 30 deg C.",
        content_type: "parameter_info",
        region: "indian_ocean",
        importance: 0.9,
    },
    KnowledgeItem {
        content: "Salinity is measured in Practical Salinity Units (PSU). Open-ocean \
                  salinity typically ranges from 30 to 37 PSU, with the Indian Ocean \
                  around 34.5 to 36.5 PSU.",
        content_type: "parameter_info",
        region: "indian_ocean",
        importance: 0.9,
    },
    KnowledgeItem {
        content: "Pressure in oceanography is measured in decibars (dbar); 1 dbar is \
                  roughly 1 meter of depth. Argo floats typically profile to 2000 dbar.",
        content_type: "parameter_info",
        region: "global",
        importance: 0.8,
    },
    KnowledgeItem {
        content: "Quality control flags indicate data reliability: 1=good, 2=probably \
                  good, 3=probably bad, 4=bad, 5=value changed, 8=estimated, 9=missing.",
        content_type: "technical_info",
        region: "global",
        importance: 0.7,
    },
    KnowledgeItem {
        content: "The Indian Ocean covers approximately 70.6 million square kilometers \
                  and contains important water masses including Antarctic Intermediate \
                  Water and Indian Deep Water.",
        content_type: "regional_info",
        region: "indian_ocean",
        importance: 0.8,
    },
];

/// Embed and store the curated knowledge documents the retriever searches.
pub fn seed_knowledge_base(conn: &Connection) -> Result<usize, SeedError> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM knowledge_documents", [], |row| {
        row.get(0)
    })?;
    if existing > 0 {
        return Ok(0);
    }

    let mut stmt = conn.prepare(
        "INSERT INTO knowledge_documents (id, content, content_type, region, importance, embedding) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )?;

    for (i, item) in KNOWLEDGE_BASE.iter().enumerate() {
        let embedding = serde_json::to_string(&embedder::embed(item.content))?;
        stmt.execute(params![
            i as i64,
            item.content,
            item.content_type,
            item.region,
            item.importance,
            embedding,
        ])?;
    }

    info!("seeded {} knowledge documents", KNOWLEDGE_BASE.len());
    Ok(KNOWLEDGE_BASE.len())
}

/// Load a synthetic Indian-Ocean dataset so the platform answers real
/// queries out of the box. Only runs against an empty profile table.
pub fn seed_demo_data(conn: &Connection, days_back: i64) -> Result<(), SeedError> {
    let existing: i64 =
        conn.query_row("SELECT COUNT(*) FROM argo_profiles", [], |row| row.get(0))?;
    if existing > 0 {
        info!("profile data already present, skipping demo seed");
        return Ok(());
    }

    let region = "indian_ocean";
    let bbox = TimelineService::regions()
        .iter()
        .find(|(name, _)| *name == region)
        .map(|(_, bbox)| *bbox)
        .unwrap_or([-180.0, -90.0, 180.0, 90.0]);

    let end = Utc::now();
    let start = end - Duration::days(days_back.max(1));
    let profiles = synth::generate_profiles(bbox, start, end);

    insert_floats(conn, &profiles)?;
    insert_profiles_and_measurements(conn, &profiles)?;
    insert_summary(conn, region, bbox, &profiles)?;

    info!(
        "seeded {} synthetic profiles for {} ({} to {})",
        profiles.len(),
        region,
        start.date_naive(),
        end.date_naive()
    );
    Ok(())
}

fn timestamp_literal(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn insert_floats(conn: &Connection, profiles: &[SyntheticProfile]) -> Result<(), SeedError> {
    // Last profile per float wins; profiles are sorted ascending by time.
    let mut latest: HashMap<&str, &SyntheticProfile> = HashMap::new();
    for profile in profiles {
        latest.insert(profile.float_id.as_str(), profile);
    }

    let mut stmt = conn.prepare(
        "INSERT INTO argo_floats \
         (float_id, wmo_id, deployment_date, deployment_latitude, deployment_longitude, \
          last_position_date, last_latitude, last_longitude, platform_type, status, \
          has_core_data, has_bgc_data) \
         VALUES (?, ?, CAST(? AS TIMESTAMP), ?, ?, CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?, ?)",
    )?;

    for (float_id, profile) in latest {
        stmt.execute(params![
            float_id.parse::<i64>()?,
            float_id,
            timestamp_literal(&profile.timestamp),
            profile.latitude,
            profile.longitude,
            timestamp_literal(&profile.timestamp),
            profile.latitude,
            profile.longitude,
            "APEX",
            "active",
            true,
            false,
        ])?;
    }

    Ok(())
}

fn insert_profiles_and_measurements(
    conn: &Connection,
    profiles: &[SyntheticProfile],
) -> Result<(), SeedError> {
    let mut profile_stmt = conn.prepare(
        "INSERT INTO argo_profiles \
         (id, float_id, cycle_number, profile_date, latitude, longitude, data_mode, qc_flag) \
         VALUES (?, ?, ?, CAST(? AS TIMESTAMP), ?, ?, ?, ?)",
    )?;
    let mut measurement_stmt = conn.prepare(
        "INSERT INTO argo_measurements \
         (profile_id, level_number, pressure, depth, temperature, salinity, \
          temperature_qc, salinity_qc) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )?;

    for (profile_id, profile) in profiles.iter().enumerate() {
        profile_stmt.execute(params![
            profile_id as i64,
            profile.float_id.parse::<i64>()?,
            (profile_id + 1) as i64,
            timestamp_literal(&profile.timestamp),
            profile.latitude,
            profile.longitude,
            "R",
            "1",
        ])?;

        for (level, &pressure) in profile.pressure.iter().enumerate() {
            measurement_stmt.execute(params![
                profile_id as i64,
                level as i64,
                pressure,
                // 1 dbar is roughly 1 m of depth
                pressure,
                profile.temperature[level],
                profile.salinity[level],
                "1",
                "1",
            ])?;
        }
    }

    Ok(())
}

fn insert_summary(
    conn: &Connection,
    region: &str,
    bbox: synth::BoundingBox,
    profiles: &[SyntheticProfile],
) -> Result<(), SeedError> {
    let mut temps = Vec::new();
    let mut sals = Vec::new();
    for profile in profiles {
        temps.extend(&profile.temperature);
        sals.extend(&profile.salinity);
    }
    let avg_temperature = mean(&temps);
    let avg_salinity = mean(&sals);

    conn.execute(
        "INSERT INTO data_summaries \
         (region_name, description, min_latitude, max_latitude, min_longitude, max_longitude, \
          total_profiles, avg_temperature, avg_salinity) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            region,
            format!(
                "Synthetic Argo coverage for the {} region",
                region.replace('_', " ")
            ),
            bbox[1],
            bbox[3],
            bbox[0],
            bbox[2],
            profiles.len() as i64,
            avg_temperature,
            avg_salinity,
        ],
    )?;

    Ok(())
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;

    fn connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::ensure_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn knowledge_seed_is_idempotent() {
        let conn = connection();
        assert_eq!(seed_knowledge_base(&conn).unwrap(), KNOWLEDGE_BASE.len());
        assert_eq!(seed_knowledge_base(&conn).unwrap(), 0);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM knowledge_documents", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count as usize, KNOWLEDGE_BASE.len());
    }

    #[test]
    fn demo_seed_populates_all_tables_once() {
        let conn = connection();
        seed_demo_data(&conn, 30).unwrap();

        let profiles: i64 = conn
            .query_row("SELECT COUNT(*) FROM argo_profiles", [], |r| r.get(0))
            .unwrap();
        let measurements: i64 = conn
            .query_row("SELECT COUNT(*) FROM argo_measurements", [], |r| r.get(0))
            .unwrap();
        let floats: i64 = conn
            .query_row("SELECT COUNT(*) FROM argo_floats", [], |r| r.get(0))
            .unwrap();
        let summaries: i64 = conn
            .query_row("SELECT COUNT(*) FROM data_summaries", [], |r| r.get(0))
            .unwrap();

        assert!(profiles >= 20);
        assert_eq!(measurements, profiles * synth::PRESSURE_LEVELS as i64);
        assert!(floats > 0 && floats <= profiles);
        assert_eq!(summaries, 1);

        // Second run is a no-op.
        seed_demo_data(&conn, 30).unwrap();
        let profiles_after: i64 = conn
            .query_row("SELECT COUNT(*) FROM argo_profiles", [], |r| r.get(0))
            .unwrap();
        assert_eq!(profiles, profiles_after);
    }
}
