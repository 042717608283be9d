//! MCP tool definitions and dispatch.
//!
//! One tool is exposed: `execute_query`. The definition carries the
//! LLM-facing usage text; the router decodes arguments and delegates to the
//! query gateway.

use std::sync::Arc;

use common::errors::{AppError, AppResult};
use common::models::QueryRequest;
use serde::Serialize;
use serde_json::{json, Value};

use crate::gateway::QueryExecutor;

/// Name of the query tool.
pub const EXECUTE_QUERY: &str = "execute_query";

/// Tool metadata advertised through `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    /// Tool name used in `tools/call`.
    pub name: String,
    /// Usage description shown to the calling agent.
    pub description: String,
    /// JSON Schema for the tool arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Dispatches tool calls to the gateway.
pub struct ToolRouter {
    executor: Arc<dyn QueryExecutor>,
}

impl ToolRouter {
    /// Creates a router over a query executor.
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Returns the registered tool definitions.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        vec![execute_query_definition()]
    }

    /// Executes a named tool with raw JSON arguments.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> AppResult<Value> {
        match name {
            EXECUTE_QUERY => {
                let req: QueryRequest = serde_json::from_value(arguments)
                    .map_err(|e| AppError::Validation(format!("invalid tool arguments: {e}")))?;
                let envelope = self.executor.execute(&req).await?;
                serde_json::to_value(envelope)
                    .map_err(|e| AppError::QueryExecution(format!("serialization failed: {e}")))
            }
            other => Err(AppError::UnknownTool(other.to_string())),
        }
    }
}

fn execute_query_definition() -> ToolDefinition {
    ToolDefinition {
        name: EXECUTE_QUERY.to_string(),
        description: "Execute a read-only SQL query on a specified database.\n\
            \n\
            Runs SELECT queries to retrieve data, check table schemas, list \
            tables, or perform any read-only database operation. Returns the \
            rows, row count, and column names.\n\
            \n\
            Example queries:\n\
            - List tables: SELECT table_name FROM information_schema.tables \
            WHERE table_schema = 'public'\n\
            - Show schema: SELECT column_name, data_type FROM \
            information_schema.columns WHERE table_name = 'users'\n\
            - Get data: SELECT * FROM customers WHERE created_at > \
            '2024-01-01' LIMIT 10\n\
            \n\
            When unsure about column meanings, query for database comments \
            using col_description rather than inferring from data patterns."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "database": {
                    "type": "string",
                    "description": "Logical name of the database to query (e.g. \"alarms\")"
                },
                "query": {
                    "type": "string",
                    "description": "PostgreSQL SELECT query to execute"
                }
            },
            "required": ["database", "query"]
        }),
    }
}
