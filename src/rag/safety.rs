//! Lexical read-only guard for LLM-generated SQL.
//!
//! This is a deliberately naive substring check, not a SQL parser. It will
//! reject legitimate SELECTs whose identifiers happen to contain a forbidden
//! keyword (a column named `created_at` trips `create`). That false-positive
//! class is an accepted trade-off of keeping the guard trivially auditable;
//! do not replace it with anything cleverer.

const FORBIDDEN_KEYWORDS: &[&str] = &[
    "delete", "update", "insert", "drop", "create", "alter", "truncate", "exec", "execute",
    "grant", "revoke",
];

/// Returns true only for statements the executor is allowed to run:
/// a SELECT, free of write/DDL keywords, with an explicit row limit.
pub fn validate_sql(sql: &str) -> bool {
    let sql_lower = sql.trim().to_lowercase();

    if !sql_lower.starts_with("select") {
        return false;
    }

    if FORBIDDEN_KEYWORDS.iter().any(|kw| sql_lower.contains(kw)) {
        return false;
    }

    // A missing limit is a safety failure, never patched with a default.
    if !sql_lower.contains("limit") && !sql_lower.contains("top") {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_select_with_limit() {
        assert!(validate_sql("SELECT * FROM argo_profiles LIMIT 10"));
    }

    #[test]
    fn tolerates_leading_whitespace_and_case() {
        assert!(validate_sql("  select 1 limit 1"));
        assert!(validate_sql("\n\tSeLeCt latitude FROM argo_profiles LIMIT 5"));
    }

    #[test]
    fn rejects_non_select_statements() {
        assert!(!validate_sql("UPDATE argo_profiles SET qc_flag = '4'"));
        assert!(!validate_sql("DELETE FROM argo_profiles"));
        assert!(!validate_sql(""));
    }

    #[test]
    fn rejects_every_forbidden_keyword_even_in_comments() {
        // Substring semantics: a keyword inside a trailing comment still fails.
        for kw in FORBIDDEN_KEYWORDS {
            let sql = format!("SELECT * FROM argo_profiles LIMIT 10 -- {}", kw);
            assert!(!validate_sql(&sql), "keyword {} slipped through", kw);
        }
    }

    #[test]
    fn rejects_keyword_inside_identifier() {
        // Known false positive, pinned on purpose.
        assert!(!validate_sql(
            "SELECT created_at FROM argo_profiles LIMIT 10"
        ));
    }

    #[test]
    fn requires_row_limiting_clause() {
        assert!(!validate_sql("SELECT * FROM argo_profiles"));
        assert!(validate_sql("SELECT * FROM argo_profiles LIMIT 10"));
        assert!(validate_sql("SELECT TOP 10 * FROM argo_profiles"));
    }

    #[test]
    fn is_a_pure_function() {
        let sql = "SELECT latitude, longitude FROM argo_profiles LIMIT 100";
        assert_eq!(validate_sql(sql), validate_sql(sql));
        let bad = "DROP TABLE argo_profiles";
        assert_eq!(validate_sql(bad), validate_sql(bad));
    }
}
