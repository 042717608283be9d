//! SQL statement validator.
//!
//! Enforces the read-only contract before a query reaches any database.

use crate::errors::AppError;

/// Validates SQL statements for the read-only contract.
pub struct SqlValidator;

/// Leading keywords accepted as read-only.
const ALLOWED_PREFIXES: [&str; 2] = ["SELECT", "WITH"];

impl SqlValidator {
    /// Checks that a statement starts with an allowed read-only keyword.
    ///
    /// This is a syntactic prefix check only: it trims whitespace,
    /// upper-cases, and compares the leading keyword. It cannot catch a
    /// write smuggled through a nested construct, e.g. a data-modifying
    /// CTE under a WITH prefix. That limitation is accepted; the database
    /// role used by the gateway is the real enforcement boundary.
    ///
    /// # Errors
    /// Returns `AppError::DisallowedQuery` for any other leading keyword.
    pub fn validate(sql: &str) -> Result<(), AppError> {
        let sql_upper = sql.trim().to_uppercase();
        if ALLOWED_PREFIXES
            .iter()
            .any(|prefix| sql_upper.starts_with(prefix))
        {
            Ok(())
        } else {
            Err(AppError::DisallowedQuery)
        }
    }
}
