use chrono::{DateTime, Utc};
use duckdb::params;
use r2d2::Pool;
use std::error::Error;

use crate::db::pool::DuckDbConnectionManager;
use crate::rag::models::ConversationTurn;

type StoreError = Box<dyn Error + Send + Sync>;

/// Append-only conversation log keyed by session id.
///
/// Entries are never mutated. Same-session concurrent writers are not
/// ordered against each other; a session represents one interactive user.
#[derive(Clone)]
pub struct ConversationStore {
    pool: Pool<DuckDbConnectionManager>,
}

struct StoredTurn {
    session_id: String,
    user_query: String,
    system_response: String,
    intent: Option<String>,
    extracted_entities: Option<String>,
    generated_sql: Option<String>,
    response_time_ms: Option<i64>,
    created_at: String,
}

impl ConversationStore {
    pub fn new(pool: Pool<DuckDbConnectionManager>) -> Self {
        Self { pool }
    }

    pub async fn append(&self, turn: ConversationTurn) -> Result<(), StoreError> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let conn = pool.get()?;
            conn.execute(
                "INSERT INTO conversation_history \
                 (session_id, user_query, system_response, intent, extracted_entities, \
                  generated_sql, response_time_ms, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    turn.session_id,
                    turn.user_query,
                    turn.system_response,
                    turn.intent,
                    turn.extracted_entities,
                    turn.generated_sql,
                    turn.response_time_ms.map(|ms| ms as i64),
                    turn.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await?
    }

    /// Most recent `limit` turns for a session, in chronological order.
    pub async fn history(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, StoreError> {
        let pool = self.pool.clone();
        let session_id = session_id.to_string();

        let stored = tokio::task::spawn_blocking(move || -> Result<Vec<StoredTurn>, StoreError> {
            let conn = pool.get()?;
            let mut stmt = conn.prepare(
                "SELECT session_id, user_query, system_response, intent, extracted_entities, \
                        generated_sql, response_time_ms, created_at \
                 FROM conversation_history \
                 WHERE session_id = ? \
                 ORDER BY created_at DESC \
                 LIMIT ?",
            )?;

            let rows = stmt.query_map(params![session_id, limit as i64], |row| {
                Ok(StoredTurn {
                    session_id: row.get(0)?,
                    user_query: row.get(1)?,
                    system_response: row.get(2)?,
                    intent: row.get(3)?,
                    extracted_entities: row.get(4)?,
                    generated_sql: row.get(5)?,
                    response_time_ms: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?;

            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await??;

        let mut turns = Vec::with_capacity(stored.len());
        for stored_turn in stored.into_iter().rev() {
            let created_at = DateTime::parse_from_rfc3339(&stored_turn.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| -> StoreError { e.to_string().into() })?;
            turns.push(ConversationTurn {
                session_id: stored_turn.session_id,
                user_query: stored_turn.user_query,
                system_response: stored_turn.system_response,
                intent: stored_turn.intent,
                extracted_entities: stored_turn.extracted_entities,
                generated_sql: stored_turn.generated_sql,
                response_time_ms: stored_turn.response_time_ms.map(|ms| ms as u64),
                created_at,
            });
        }

        Ok(turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use chrono::TimeZone;

    fn test_store() -> ConversationStore {
        let pool = Pool::builder()
            .max_size(1)
            .build(DuckDbConnectionManager::new(":memory:".to_string()))
            .unwrap();
        schema::ensure_schema(&pool.get().unwrap()).unwrap();
        ConversationStore::new(pool)
    }

    fn turn(session_id: &str, query: &str, minute: u32) -> ConversationTurn {
        ConversationTurn {
            session_id: session_id.to_string(),
            user_query: query.to_string(),
            system_response: "{}".to_string(),
            intent: Some("data_query".to_string()),
            extracted_entities: None,
            generated_sql: None,
            response_time_ms: Some(42),
            created_at: Utc.with_ymd_and_hms(2025, 9, 3, 12, minute, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn appends_are_returned_in_chronological_order() {
        let store = test_store();
        store.append(turn("s1", "first", 0)).await.unwrap();
        store.append(turn("s1", "second", 1)).await.unwrap();
        store.append(turn("s1", "third", 2)).await.unwrap();

        let history = store.history("s1", 10).await.unwrap();
        let queries: Vec<&str> = history.iter().map(|t| t.user_query.as_str()).collect();
        assert_eq!(queries, ["first", "second", "third"]);
    }

    #[tokio::test]
    async fn limit_keeps_the_most_recent_turns() {
        let store = test_store();
        for i in 0..5u32 {
            store.append(turn("s1", &format!("q{}", i), i)).await.unwrap();
        }

        let history = store.history("s1", 2).await.unwrap();
        let queries: Vec<&str> = history.iter().map(|t| t.user_query.as_str()).collect();
        assert_eq!(queries, ["q3", "q4"]);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = test_store();
        store.append(turn("s1", "mine", 0)).await.unwrap();
        store.append(turn("s2", "other", 0)).await.unwrap();

        let history = store.history("s1", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].user_query, "mine");
        assert_eq!(history[0].response_time_ms, Some(42));
    }
}
