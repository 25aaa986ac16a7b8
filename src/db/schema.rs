use duckdb::Connection;

/// Creates all tables the platform relies on. Idempotent, safe to run at
/// every startup.
pub fn ensure_schema(conn: &Connection) -> duckdb::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS argo_floats (
            float_id            BIGINT PRIMARY KEY,
            wmo_id              VARCHAR,
            deployment_date     TIMESTAMP,
            deployment_latitude DOUBLE,
            deployment_longitude DOUBLE,
            last_position_date  TIMESTAMP,
            last_latitude       DOUBLE,
            last_longitude      DOUBLE,
            platform_type       VARCHAR,
            status              VARCHAR DEFAULT 'active',
            has_core_data       BOOLEAN DEFAULT true,
            has_bgc_data        BOOLEAN DEFAULT false
        );

        CREATE TABLE IF NOT EXISTS argo_profiles (
            id            BIGINT PRIMARY KEY,
            float_id      BIGINT,
            cycle_number  INTEGER,
            profile_date  TIMESTAMP,
            latitude      DOUBLE,
            longitude     DOUBLE,
            data_mode     VARCHAR DEFAULT 'R',
            qc_flag       VARCHAR DEFAULT '1'
        );

        CREATE TABLE IF NOT EXISTS argo_measurements (
            profile_id     BIGINT,
            level_number   INTEGER,
            pressure       DOUBLE,
            depth          DOUBLE,
            temperature    DOUBLE,
            salinity       DOUBLE,
            temperature_qc VARCHAR DEFAULT '1',
            salinity_qc    VARCHAR DEFAULT '1'
        );

        CREATE TABLE IF NOT EXISTS data_summaries (
            region_name     VARCHAR,
            description     VARCHAR,
            min_latitude    DOUBLE,
            max_latitude    DOUBLE,
            min_longitude   DOUBLE,
            max_longitude   DOUBLE,
            total_profiles  BIGINT,
            avg_temperature DOUBLE,
            avg_salinity    DOUBLE
        );

        CREATE TABLE IF NOT EXISTS knowledge_documents (
            id           BIGINT,
            content      VARCHAR,
            content_type VARCHAR,
            region       VARCHAR,
            importance   DOUBLE,
            embedding    VARCHAR
        );

        CREATE TABLE IF NOT EXISTS conversation_history (
            session_id        VARCHAR,
            user_query        VARCHAR,
            system_response   VARCHAR,
            intent            VARCHAR,
            extracted_entities VARCHAR,
            generated_sql     VARCHAR,
            response_time_ms  BIGINT,
            created_at        VARCHAR
        );
        "#,
    )
}
