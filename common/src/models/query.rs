//! SQL query models.
//!
//! Request and result envelope for the `execute_query` tool.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// Message used when a query returns at least one row.
const MSG_WITH_ROWS: &str = "Query executed successfully";
/// Message used when a query returns no rows.
const MSG_NO_ROWS: &str = "Query executed successfully, no rows returned";

/// One result row: an ordered mapping of column name to JSON value.
///
/// `serde_json::Map` preserves insertion order, so iteration order equals
/// the driver-reported column order.
pub type Row = serde_json::Map<String, Value>;

/// Arguments of one `execute_query` call. No persistent identity, the
/// lifetime is one tool call.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QueryRequest {
    /// Logical name of the database to query (e.g. "alarms").
    #[validate(length(min = 1, message = "Database name is required"))]
    pub database: String,

    /// SQL text, must start with SELECT or WITH.
    #[validate(length(min = 1, message = "Query text is required"))]
    pub query: String,
}

/// Uniform result envelope returned for every successful query.
///
/// Produced fresh per call, never cached.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct QueryEnvelope {
    /// Always true; failures are surfaced as typed errors instead.
    pub success: bool,

    /// The query text as received.
    pub query: String,

    /// Result rows in driver order.
    pub result: Vec<Row>,

    /// Number of rows in `result`.
    pub count: usize,

    /// Column names from the first row, empty when there are no rows.
    pub columns: Vec<String>,

    /// Fixed human-readable status message.
    pub message: String,
}

impl QueryEnvelope {
    /// Wraps raw rows into the response envelope.
    ///
    /// Column names are derived from the first row; the row count always
    /// equals `result.len()`.
    pub fn encode(query: impl Into<String>, rows: Vec<Row>) -> Self {
        let columns = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        let message = if rows.is_empty() {
            MSG_NO_ROWS
        } else {
            MSG_WITH_ROWS
        };
        Self {
            success: true,
            query: query.into(),
            count: rows.len(),
            columns,
            result: rows,
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_encode_counts_rows() {
        let rows = vec![
            row(&[("x", json!(1))]),
            row(&[("x", json!(2))]),
        ];
        let envelope = QueryEnvelope::encode("SELECT x FROM t", rows);
        assert!(envelope.success);
        assert_eq!(envelope.count, 2);
        assert_eq!(envelope.result.len(), 2);
        assert_eq!(envelope.message, "Query executed successfully");
    }

    #[test]
    fn test_encode_zero_rows() {
        let envelope = QueryEnvelope::encode("SELECT 1 WHERE false", vec![]);
        assert_eq!(envelope.count, 0);
        assert!(envelope.columns.is_empty());
        assert_eq!(
            envelope.message,
            "Query executed successfully, no rows returned"
        );
    }

    #[test]
    fn test_encode_columns_from_first_row() {
        let rows = vec![row(&[("b", json!(1)), ("a", json!(2))])];
        let envelope = QueryEnvelope::encode("SELECT b, a FROM t", rows);
        // Insertion order is preserved, not sorted
        assert_eq!(envelope.columns, vec!["b", "a"]);
    }

    #[test]
    fn test_encode_echoes_query() {
        let envelope = QueryEnvelope::encode("SELECT 1 AS x", vec![row(&[("x", json!(1))])]);
        assert_eq!(envelope.query, "SELECT 1 AS x");
        assert_eq!(envelope.columns, vec!["x"]);
    }
}
