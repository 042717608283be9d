//! Row decoding.
//!
//! Converts driver rows into a fixed intermediate representation: an
//! ordered mapping of column name to a small closed set of JSON scalar
//! kinds (null, boolean, integer, float, string, datetime-as-string,
//! binary-as-base64). Values outside the set are stringified at the
//! boundary rather than failing the call; intervals, money amounts and
//! network addresses get their own textual renderings.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use common::models::Row as RowObject;
use serde_json::Value;
use sqlx::postgres::types::{PgInterval, PgMoney};
use sqlx::postgres::PgRow;
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::{Column, Row, TypeInfo};

/// Decodes one driver row into an ordered column-name-to-value mapping.
///
/// Column order in the returned object equals the driver-reported order.
pub fn decode_row(row: &PgRow) -> RowObject {
    let mut object = RowObject::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_value(row, idx, column.type_info().name());
        object.insert(column.name().to_string(), value);
    }
    object
}

fn decode_value(row: &PgRow, idx: usize, type_name: &str) -> Value {
    match type_name {
        "BOOL" => get::<bool>(row, idx).map(Value::Bool).unwrap_or(Value::Null),
        "INT2" => get::<i16>(row, idx).map(Value::from).unwrap_or(Value::Null),
        "INT4" => get::<i32>(row, idx).map(Value::from).unwrap_or(Value::Null),
        "INT8" => get::<i64>(row, idx).map(Value::from).unwrap_or(Value::Null),
        "FLOAT4" => get::<f32>(row, idx)
            .map(|v| Value::from(f64::from(v)))
            .unwrap_or(Value::Null),
        "FLOAT8" => get::<f64>(row, idx).map(Value::from).unwrap_or(Value::Null),
        // Decimals are stringified, JSON numbers cannot hold them losslessly
        "NUMERIC" => get::<BigDecimal>(row, idx)
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => get::<String>(row, idx)
            .map(Value::String)
            .unwrap_or(Value::Null),
        "UUID" => get::<uuid::Uuid>(row, idx)
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),
        "TIMESTAMPTZ" => get::<DateTime<Utc>>(row, idx)
            .map(|v| Value::String(v.to_rfc3339()))
            .unwrap_or(Value::Null),
        "TIMESTAMP" => get::<NaiveDateTime>(row, idx)
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),
        "DATE" => get::<NaiveDate>(row, idx)
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),
        "TIME" => get::<NaiveTime>(row, idx)
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),
        "JSON" | "JSONB" => get::<Value>(row, idx).unwrap_or(Value::Null),
        "BYTEA" => get::<Vec<u8>>(row, idx)
            .map(|v| Value::String(BASE64.encode(v)))
            .unwrap_or(Value::Null),
        "INTERVAL" => get::<PgInterval>(row, idx)
            .map(|v| Value::String(format_interval(&v)))
            .unwrap_or(Value::Null),
        "MONEY" => get::<PgMoney>(row, idx)
            .map(|v| Value::String(v.to_bigdecimal(2).to_string()))
            .unwrap_or(Value::Null),
        "INET" | "CIDR" => get::<IpNetwork>(row, idx)
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),
        // The internal 1-byte char type, distinct from CHAR(n)
        "\"CHAR\"" => get::<i8>(row, idx)
            .map(|v| Value::String(char::from(v as u8).to_string()))
            .unwrap_or(Value::Null),
        "TEXT[]" | "VARCHAR[]" | "NAME[]" => get::<Vec<String>>(row, idx)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "INT2[]" => get::<Vec<i16>>(row, idx).map(Value::from).unwrap_or(Value::Null),
        "INT4[]" => get::<Vec<i32>>(row, idx).map(Value::from).unwrap_or(Value::Null),
        "INT8[]" => get::<Vec<i64>>(row, idx).map(Value::from).unwrap_or(Value::Null),
        "BOOL[]" => get::<Vec<bool>>(row, idx).map(Value::from).unwrap_or(Value::Null),
        "FLOAT8[]" => get::<Vec<f64>>(row, idx).map(Value::from).unwrap_or(Value::Null),
        "UUID[]" => get::<Vec<uuid::Uuid>>(row, idx)
            .map(|v| Value::from(v.iter().map(ToString::to_string).collect::<Vec<_>>()))
            .unwrap_or(Value::Null),
        other => {
            // Anything still out of set: fall back to the driver's text
            // form when it decodes as a string, otherwise surface NULL
            match get::<String>(row, idx) {
                Some(v) => Value::String(v),
                None => {
                    tracing::debug!(column_type = other, "Undecodable column, returning null");
                    Value::Null
                }
            }
        }
    }
}

/// Renders an interval the way the server prints it: months and days as
/// counted components, the sub-day remainder as a clock time.
fn format_interval(interval: &PgInterval) -> String {
    let secs = interval.microseconds / 1_000_000;
    let micros = (interval.microseconds % 1_000_000).abs();
    let hours = secs / 3600;
    let minutes = (secs % 3600).abs() / 60;
    let seconds = (secs % 60).abs();
    let mut parts = Vec::new();
    if interval.months != 0 {
        parts.push(format!("{} mons", interval.months));
    }
    if interval.days != 0 {
        parts.push(format!("{} days", interval.days));
    }
    parts.push(format!("{hours:02}:{minutes:02}:{seconds:02}.{micros:06}"));
    parts.join(" ")
}

/// Fetches a nullable column value; both SQL NULL and a decode failure
/// collapse to `None`.
fn get<'r, T>(row: &'r PgRow, idx: usize) -> Option<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get::<Option<T>, _>(idx).ok().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_rendering() {
        let interval = PgInterval {
            months: 1,
            days: 2,
            microseconds: 3_661_000_000,
        };
        assert_eq!(format_interval(&interval), "1 mons 2 days 01:01:01.000000");

        let sub_second = PgInterval {
            months: 0,
            days: 0,
            microseconds: 500_000,
        };
        assert_eq!(format_interval(&sub_second), "00:00:00.500000");
    }

    #[test]
    fn test_money_stringifies_with_two_decimals() {
        assert_eq!(PgMoney(1234).to_bigdecimal(2).to_string(), "12.34");
        assert_eq!(PgMoney(-50).to_bigdecimal(2).to_string(), "-0.50");
    }
}
