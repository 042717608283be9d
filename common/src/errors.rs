//! Application error types.
//!
//! One error taxonomy shared by the gateway and the MCP server layer.

use thiserror::Error;

/// Result alias used throughout the workspace.
pub type AppResult<T> = Result<T, AppError>;

/// Errors surfaced by the query gateway.
///
/// Every failure of a tool call maps to exactly one variant; the server
/// layer translates variants into JSON-RPC error codes. Failures are
/// all-or-nothing per call, no variant carries partial results.
#[derive(Debug, Error)]
pub enum AppError {
    /// The query does not start with an allowed read-only keyword.
    /// Raised before the query reaches any database connection.
    #[error("Only SELECT queries are allowed for safety")]
    DisallowedQuery,

    /// The registry holds no connections at all (every startup connect
    /// attempt failed, or none were configured).
    #[error("No database connections available")]
    NoConnections,

    /// The named logical database is not present in the registry.
    #[error("Database '{name}' not found. Available: {available:?}")]
    DatabaseNotFound {
        name: String,
        available: Vec<String>,
    },

    /// The database rejected the statement as malformed (SQLSTATE 42601).
    /// Carries the driver's diagnostic text unmodified.
    #[error("SQL syntax error: {0}")]
    SqlSyntax(String),

    /// Any other driver or runtime failure during execution.
    #[error("Query execution failed: {0}")]
    QueryExecution(String),

    /// Invalid request shape (empty database name or query text).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid or unusable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller asked for a tool this server does not expose.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

impl AppError {
    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::DisallowedQuery => "DISALLOWED_QUERY",
            AppError::NoConnections => "NO_CONNECTIONS",
            AppError::DatabaseNotFound { .. } => "DATABASE_NOT_FOUND",
            AppError::SqlSyntax(_) => "SQL_SYNTAX_ERROR",
            AppError::QueryExecution(_) => "QUERY_EXECUTION_FAILED",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::UnknownTool(_) => "UNKNOWN_TOOL",
        }
    }
}
